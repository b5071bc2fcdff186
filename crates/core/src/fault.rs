//! Fault classification.
//!
//! Every fault raised by a surface interaction is mapped to exactly one
//! [`FaultVerdict`]. The mapping is pure and data-driven: [`SignatureClassifier`]
//! matches fault messages against two pattern sets, and anything it does not
//! recognize is [`FaultVerdict::Transient`].

use std::fmt;

use regex::{RegexSet, RegexSetBuilder};
use thiserror::Error;

use crate::surface::{SurfaceError, SurfaceErrorKind};

/// Connection-loss and session-termination signatures.
pub const SESSION_FATAL_SIGNATURES: &[&str] = &[
	"failed to establish a new connection",
	"max retries exceeded",
	"actively refused",
	"connection refused",
	"invalid session",
	"session deleted",
	"session closed",
	"not connected to devtools",
	"devtools not connected",
	"websocket closed",
	"target closed",
];

/// Signatures of a session that cannot be created at all.
pub const UNRECOVERABLE_SIGNATURES: &[&str] = &[
	"session not created",
	"only supports chrome version",
	"user data directory is already in use",
	"cannot find chrome binary",
];

/// How a raised fault affects the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FaultVerdict {
	/// Element timing or visibility problem; retry locally.
	Transient,
	/// The session or its connection is gone; restart it.
	SessionFatal,
	/// A session cannot be created; stop.
	Unrecoverable,
}

impl fmt::Display for FaultVerdict {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			FaultVerdict::Transient => "transient",
			FaultVerdict::SessionFatal => "session-fatal",
			FaultVerdict::Unrecoverable => "unrecoverable",
		};
		f.write_str(name)
	}
}

/// Maps a raised fault to a verdict. Must be pure and total.
pub trait FaultClassifier: Send + Sync {
	fn classify(&self, fault: &SurfaceError) -> FaultVerdict;
}

/// Classifier driven by case-insensitive message patterns.
#[derive(Debug, Clone)]
pub struct SignatureClassifier {
	session_fatal: RegexSet,
	unrecoverable: RegexSet,
}

impl SignatureClassifier {
	/// Builds a classifier from regex patterns.
	pub fn from_patterns<S: AsRef<str>>(session_fatal: &[S], unrecoverable: &[S]) -> Result<Self, regex::Error> {
		Ok(Self {
			session_fatal: build_set(session_fatal.iter().map(AsRef::as_ref))?,
			unrecoverable: build_set(unrecoverable.iter().map(AsRef::as_ref))?,
		})
	}

	/// Built-in signatures extended with extra regex patterns.
	pub fn with_extra<S: AsRef<str>>(extra_session_fatal: &[S], extra_unrecoverable: &[S]) -> Result<Self, regex::Error> {
		let session_fatal: Vec<String> = SESSION_FATAL_SIGNATURES
			.iter()
			.map(|s| regex::escape(s))
			.chain(extra_session_fatal.iter().map(|s| s.as_ref().to_string()))
			.collect();
		let unrecoverable: Vec<String> = UNRECOVERABLE_SIGNATURES
			.iter()
			.map(|s| regex::escape(s))
			.chain(extra_unrecoverable.iter().map(|s| s.as_ref().to_string()))
			.collect();
		Self::from_patterns(&session_fatal, &unrecoverable)
	}
}

impl Default for SignatureClassifier {
	fn default() -> Self {
		Self::with_extra::<&str>(&[], &[]).expect("built-in fault signatures should compile")
	}
}

impl FaultClassifier for SignatureClassifier {
	fn classify(&self, fault: &SurfaceError) -> FaultVerdict {
		if fault.kind == SurfaceErrorKind::SessionNotCreated || self.unrecoverable.is_match(&fault.message) {
			return FaultVerdict::Unrecoverable;
		}
		if fault.kind == SurfaceErrorKind::Connection || self.session_fatal.is_match(&fault.message) {
			return FaultVerdict::SessionFatal;
		}
		FaultVerdict::Transient
	}
}

fn build_set<'a>(patterns: impl Iterator<Item = &'a str>) -> Result<RegexSet, regex::Error> {
	RegexSetBuilder::new(patterns).case_insensitive(true).build()
}

/// A condition the workflow cannot continue past.
///
/// Returned up to the run entry point, which decides how to exit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{verdict} fault: {message}")]
pub struct FatalError {
	pub verdict: FaultVerdict,
	pub message: String,
}

impl FatalError {
	pub fn new(verdict: FaultVerdict, message: impl Into<String>) -> Self {
		Self {
			verdict,
			message: message.into(),
		}
	}

	/// Escalates a fault; transient verdicts are promoted to session-fatal.
	pub fn from_fault(verdict: FaultVerdict, fault: &SurfaceError) -> Self {
		Self::new(verdict.max(FaultVerdict::SessionFatal), fault.to_string())
	}
}
