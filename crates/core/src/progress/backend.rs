//! Raw persistence for the checkpoint document.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::Result;

/// Where the serialized checkpoint document lives.
pub trait CheckpointBackend {
	/// Human-readable location used in errors and logs.
	fn location(&self) -> &Path;

	/// Current document, or `None` when nothing has been stored yet.
	fn load_raw(&self) -> Result<Option<String>>;

	/// Replaces the document. Must not leave a partial document behind.
	fn save_raw(&mut self, content: &str) -> Result<()>;

	/// Copies the current document aside, tagged with `stamp`.
	///
	/// Returns the archive location, or `None` when there was nothing to copy.
	fn archive(&mut self, stamp: u64) -> Result<Option<PathBuf>>;
}

/// JSON file on disk, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct FileBackend {
	path: PathBuf,
}

impl FileBackend {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	fn archive_path(&self, stamp: u64, attempt: u32) -> PathBuf {
		let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "progress".into());
		name.push(format!(".{stamp}"));
		if attempt > 0 {
			name.push(format!("-{attempt}"));
		}
		name.push(".bak");
		self.path.with_file_name(name)
	}
}

impl CheckpointBackend for FileBackend {
	fn location(&self) -> &Path {
		&self.path
	}

	fn load_raw(&self) -> Result<Option<String>> {
		match fs::read_to_string(&self.path) {
			Ok(content) => Ok(Some(content)),
			Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
			Err(err) => Err(err.into()),
		}
	}

	fn save_raw(&mut self, content: &str) -> Result<()> {
		let dir = match self.path.parent() {
			Some(parent) if !parent.as_os_str().is_empty() => parent,
			_ => Path::new("."),
		};
		fs::create_dir_all(dir)?;
		let mut tmp = NamedTempFile::new_in(dir)?;
		tmp.write_all(content.as_bytes())?;
		tmp.as_file().sync_all()?;
		tmp.persist(&self.path).map_err(|e| e.error)?;
		Ok(())
	}

	fn archive(&mut self, stamp: u64) -> Result<Option<PathBuf>> {
		if !self.path.exists() {
			return Ok(None);
		}
		let mut attempt = 0;
		let mut target = self.archive_path(stamp, attempt);
		while target.exists() {
			attempt += 1;
			target = self.archive_path(stamp, attempt);
		}
		fs::copy(&self.path, &target)?;
		Ok(Some(target))
	}
}

/// In-memory backend, mainly for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
	content: Option<String>,
	archives: Vec<(PathBuf, String)>,
}

impl MemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}

	/// Starts with an existing document.
	pub fn with_content(content: impl Into<String>) -> Self {
		Self {
			content: Some(content.into()),
			archives: Vec::new(),
		}
	}

	pub fn content(&self) -> Option<&str> {
		self.content.as_deref()
	}

	pub fn archives(&self) -> &[(PathBuf, String)] {
		&self.archives
	}
}

impl CheckpointBackend for MemoryBackend {
	fn location(&self) -> &Path {
		Path::new("<memory>")
	}

	fn load_raw(&self) -> Result<Option<String>> {
		Ok(self.content.clone())
	}

	fn save_raw(&mut self, content: &str) -> Result<()> {
		self.content = Some(content.to_string());
		Ok(())
	}

	fn archive(&mut self, stamp: u64) -> Result<Option<PathBuf>> {
		let Some(content) = &self.content else {
			return Ok(None);
		};
		let path = PathBuf::from(format!("<memory>.{stamp}.bak"));
		self.archives.push((path.clone(), content.clone()));
		Ok(Some(path))
	}
}
