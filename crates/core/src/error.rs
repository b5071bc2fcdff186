//! Error types shared across the core crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::fault::FatalError;

/// Errors surfaced by core operations outside of the per-action fault path.
#[derive(Debug, Error)]
pub enum CourierError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// The checkpoint file exists but could not be used.
	#[error("checkpoint store {path}: {reason}")]
	Checkpoint { path: PathBuf, reason: String },

	#[error("invalid configuration: {0}")]
	Config(String),

	#[error(transparent)]
	Fatal(#[from] FatalError),
}

pub type Result<T> = std::result::Result<T, CourierError>;
