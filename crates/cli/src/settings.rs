//! Config file loading and command-line overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use courier::Config;
use courier_runtime::BrowserSettings;
use serde::{Deserialize, Serialize};

use crate::cli::RunArgs;
use crate::contacts::Columns;

pub const DEFAULT_CONFIG_FILE: &str = "courier.json";
pub const DEFAULT_PROGRESS_FILE: &str = "courier-progress.json";
pub const DEFAULT_LOG_FILE: &str = "courier.log";

/// Everything `courier.json` may hold. Core tunables sit at the top level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
	#[serde(flatten)]
	pub core: Config,
	pub browser: BrowserSettings,
	pub columns: Columns,
	pub progress_file: Option<PathBuf>,
	pub log_file: Option<PathBuf>,
}

impl Settings {
	/// Loads `explicit`, else `./courier.json` if it exists, else defaults.
	pub fn load(explicit: Option<&Path>) -> Result<Self> {
		let path = match explicit {
			Some(path) => path.to_path_buf(),
			None => {
				let default = PathBuf::from(DEFAULT_CONFIG_FILE);
				if !default.exists() {
					return Ok(Self::default());
				}
				default
			}
		};

		let content = std::fs::read_to_string(&path).with_context(|| format!("reading config {}", path.display()))?;
		let settings: Self =
			serde_json::from_str(&content).with_context(|| format!("parsing config {}", path.display()))?;
		settings
			.core
			.validate()
			.with_context(|| format!("validating config {}", path.display()))?;
		Ok(settings)
	}

	/// `--progress-file`, then the config value, then the default name.
	pub fn progress_path(&self, flag: Option<&Path>) -> PathBuf {
		flag.map(Path::to_path_buf)
			.or_else(|| self.progress_file.clone())
			.unwrap_or_else(|| PathBuf::from(DEFAULT_PROGRESS_FILE))
	}

	/// Log file next to the checkpoint unless configured or disabled.
	pub fn log_path(&self, flag: Option<&Path>, disabled: bool, progress: &Path) -> Option<PathBuf> {
		if disabled {
			return None;
		}
		let path = flag.map(Path::to_path_buf).or_else(|| self.log_file.clone()).unwrap_or_else(|| {
			progress
				.parent()
				.map(|dir| dir.join(DEFAULT_LOG_FILE))
				.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
		});
		Some(path)
	}

	/// Applies `run` flags over the file values.
	pub fn apply_run_overrides(&mut self, args: &RunArgs) -> Result<()> {
		if let Some(url) = &args.app_url {
			if url.trim().is_empty() {
				bail!("--app-url must not be empty");
			}
			self.core.app_url.clone_from(url);
		}
		if args.attach {
			self.browser.attach = true;
		}
		if args.headless {
			self.browser.headless = true;
		}
		if let Some(port) = args.port {
			self.browser.port = port;
		}
		if let Some(chrome) = &args.chrome {
			self.browser.executable = Some(chrome.clone());
		}
		if let Some(dir) = &args.user_data_dir {
			self.browser.user_data_dir = Some(dir.clone());
		}
		if let Some(profile) = &args.profile_directory {
			self.browser.profile_directory = Some(profile.clone());
		}
		Ok(())
	}
}
