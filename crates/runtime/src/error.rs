//! Error types for the browser runtime.

use std::time::Duration;

use courier::{SurfaceError, SurfaceErrorKind};
use thiserror::Error;

/// Errors raised while launching, probing or talking to the browser.
#[derive(Debug, Error)]
pub enum RuntimeError {
	#[error("cannot find chrome binary: {0}")]
	BrowserNotFound(String),

	/// The browser process could not be started or never exposed its endpoint.
	#[error("session not created: {0}")]
	Launch(String),

	#[error("failed to establish a new connection to {url}: {reason}")]
	ConnectionFailed { url: String, reason: String },

	#[error("devtools endpoint {url}: {reason}")]
	Http { url: String, reason: String },

	#[error("CDP error {code}: {message}")]
	Cdp { code: i64, message: String },

	#[error("CDP command '{method}' timed out after {duration:?}")]
	Timeout { method: String, duration: Duration },

	#[error("websocket closed")]
	Closed,

	#[error("CDP protocol error: {0}")]
	Protocol(String),

	#[error("JavaScript exception: {0}")]
	Script(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// CDP error messages that mean the element reference went away.
const STALE_OBJECT_MESSAGES: &[&str] = &[
	"could not find object with given id",
	"could not find node with given id",
	"cannot find context with specified id",
	"execution context was destroyed",
	"stale element",
];

impl From<RuntimeError> for SurfaceError {
	fn from(err: RuntimeError) -> Self {
		let kind = match &err {
			RuntimeError::BrowserNotFound(_) | RuntimeError::Launch(_) => SurfaceErrorKind::SessionNotCreated,
			RuntimeError::ConnectionFailed { .. } | RuntimeError::Closed => SurfaceErrorKind::Connection,
			RuntimeError::Timeout { .. } => SurfaceErrorKind::Timeout,
			RuntimeError::Script(message) | RuntimeError::Cdp { message, .. } => {
				let lower = message.to_lowercase();
				if STALE_OBJECT_MESSAGES.iter().any(|m| lower.contains(m)) {
					SurfaceErrorKind::Stale
				} else if lower.contains("not interactable") {
					SurfaceErrorKind::NotInteractable
				} else if lower.contains("click intercepted") {
					SurfaceErrorKind::ClickIntercepted
				} else if matches!(err, RuntimeError::Script(_)) {
					SurfaceErrorKind::Script
				} else {
					SurfaceErrorKind::Other
				}
			}
			RuntimeError::Http { .. } | RuntimeError::Protocol(_) | RuntimeError::Io(_) => SurfaceErrorKind::Other,
		};
		SurfaceError::new(kind, err.to_string())
	}
}
