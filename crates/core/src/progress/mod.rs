//! Durable record of delivered work items.
//!
//! The store is the only state that survives a process restart. A record is
//! written after each successful delivery and is only removed by an explicit
//! [`reset`](ProgressStore::reset), which archives the previous document first.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CourierError, Result};
use crate::work_item::WorkItem;

mod backend;

pub use backend::{CheckpointBackend, FileBackend, MemoryBackend};


const CHECKPOINT_SCHEMA_VERSION: u32 = 1;

/// What was delivered for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointRecord {
	/// Filled from the map key on load.
	#[serde(skip)]
	pub key: String,
	pub display_name: String,
	pub payload_snapshot: String,
	/// Position of the item in the input it was delivered from.
	pub sequence_index: usize,
	/// Unix seconds.
	#[serde(default)]
	pub recorded_at: u64,
}

impl CheckpointRecord {
	/// Whether `item` carries the same content this record was written for.
	pub fn matches(&self, item: &WorkItem) -> bool {
		self.display_name == item.display_name && self.payload_snapshot == item.payload
	}
}

/// On-disk format of the checkpoint file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckpointFile {
	schema: u32,
	#[serde(default)]
	records: BTreeMap<String, CheckpointRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchReason {
	ContentChanged,
	NotRecorded,
}

impl fmt::Display for MismatchReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MismatchReason::ContentChanged => f.write_str("content changed"),
			MismatchReason::NotRecorded => f.write_str("not previously recorded"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
	pub key: String,
	pub reason: MismatchReason,
}

/// Work items compared against the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
	/// Keys whose record matches the item exactly, in input order.
	pub matches: Vec<String>,
	pub mismatches: Vec<Mismatch>,
}

impl Reconciliation {
	/// Items that were delivered before but whose content has since changed.
	pub fn changed(&self) -> impl Iterator<Item = &Mismatch> {
		self.mismatches
			.iter()
			.filter(|m| m.reason == MismatchReason::ContentChanged)
	}

	/// Items with no record at all.
	pub fn pending(&self) -> impl Iterator<Item = &Mismatch> {
		self.mismatches.iter().filter(|m| m.reason == MismatchReason::NotRecorded)
	}

	/// Whether any item was processed before, with or without changes.
	pub fn has_prior_progress(&self) -> bool {
		!self.matches.is_empty() || self.changed().next().is_some()
	}
}

/// Checkpoint records keyed by work-item key.
#[derive(Debug)]
pub struct ProgressStore<B: CheckpointBackend = FileBackend> {
	backend: B,
	records: BTreeMap<String, CheckpointRecord>,
}

impl ProgressStore<FileBackend> {
	/// Opens the JSON checkpoint file at `path`, which need not exist yet.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
		Self::with_backend(FileBackend::new(path))
	}
}

impl<B: CheckpointBackend> ProgressStore<B> {
	pub fn with_backend(backend: B) -> Result<Self> {
		let mut store = Self {
			backend,
			records: BTreeMap::new(),
		};
		store.load()?;
		Ok(store)
	}

	pub fn location(&self) -> &Path {
		self.backend.location()
	}

	pub fn backend(&self) -> &B {
		&self.backend
	}

	/// Re-reads the document from the backend.
	///
	/// A missing or blank document is an empty store; anything else that does
	/// not parse is an error, never silently discarded.
	pub fn load(&mut self) -> Result<&BTreeMap<String, CheckpointRecord>> {
		let records = match self.backend.load_raw()? {
			Some(content) if !content.trim().is_empty() => self.parse(&content)?,
			_ => BTreeMap::new(),
		};
		debug!(target: "courier.progress", path = %self.location().display(), records = records.len(), "checkpoint loaded");
		self.records = records;
		Ok(&self.records)
	}

	fn parse(&self, content: &str) -> Result<BTreeMap<String, CheckpointRecord>> {
		let file: CheckpointFile = serde_json::from_str(content).map_err(|e| self.corrupt(e.to_string()))?;
		if file.schema != CHECKPOINT_SCHEMA_VERSION {
			return Err(self.corrupt(format!("unsupported schema {}", file.schema)));
		}
		Ok(file
			.records
			.into_iter()
			.map(|(key, mut record)| {
				record.key.clone_from(&key);
				(key, record)
			})
			.collect())
	}

	fn corrupt(&self, reason: String) -> CourierError {
		CourierError::Checkpoint {
			path: self.location().to_path_buf(),
			reason,
		}
	}

	pub fn get(&self, key: &str) -> Option<&CheckpointRecord> {
		self.records.get(key)
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// Whether `item` was already delivered with identical content.
	pub fn is_processed(&self, item: &WorkItem) -> bool {
		self.get(&item.key).is_some_and(|r| r.matches(item))
	}

	/// Compares `items` against the stored records. Read-only.
	pub fn reconcile(&self, items: &[WorkItem]) -> Reconciliation {
		let mut out = Reconciliation::default();
		for item in items {
			match self.get(&item.key) {
				Some(record) if record.matches(item) => out.matches.push(item.key.clone()),
				Some(_) => out.mismatches.push(Mismatch {
					key: item.key.clone(),
					reason: MismatchReason::ContentChanged,
				}),
				None => out.mismatches.push(Mismatch {
					key: item.key.clone(),
					reason: MismatchReason::NotRecorded,
				}),
			}
		}
		out
	}

	/// Records a delivery and persists the whole document.
	pub fn record(&mut self, item: &WorkItem, sequence_index: usize) -> Result<()> {
		let record = CheckpointRecord {
			key: item.key.clone(),
			display_name: item.display_name.clone(),
			payload_snapshot: item.payload.clone(),
			sequence_index,
			recorded_at: unix_now(),
		};
		let previous = self.records.insert(item.key.clone(), record);
		if let Err(err) = self.persist() {
			match previous {
				Some(previous) => self.records.insert(item.key.clone(), previous),
				None => self.records.remove(&item.key),
			};
			return Err(err);
		}
		debug!(target: "courier.progress", key = %item.key, sequence_index, "checkpoint recorded");
		Ok(())
	}

	/// Archives the current document and clears the store.
	///
	/// Returns where the archive was written, if there was anything to archive.
	pub fn reset(&mut self) -> Result<Option<PathBuf>> {
		let archived = self.backend.archive(unix_now())?;
		let previous = std::mem::take(&mut self.records);
		if let Err(err) = self.persist() {
			self.records = previous;
			return Err(err);
		}
		info!(
			target: "courier.progress",
			archive = ?archived.as_ref().map(|p| p.display().to_string()),
			"checkpoint reset"
		);
		Ok(archived)
	}

	/// Archives and clears whatever `backend` holds without parsing it, so a
	/// document too damaged to [`load`](Self::load) can still be reset.
	pub fn reset_unparsed(backend: B) -> Result<(Self, Option<PathBuf>)> {
		let mut store = Self {
			backend,
			records: BTreeMap::new(),
		};
		let archived = store.reset()?;
		Ok((store, archived))
	}

	fn persist(&mut self) -> Result<()> {
		let file = CheckpointFile {
			schema: CHECKPOINT_SCHEMA_VERSION,
			records: self.records.clone(),
		};
		let json = serde_json::to_string_pretty(&file)?;
		self.backend.save_raw(&json)
	}
}

fn unix_now() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
