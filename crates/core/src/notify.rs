//! Operator notification sink.

use std::fmt;

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
	Info,
	Warning,
	Critical,
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Severity::Info => "info",
			Severity::Warning => "warning",
			Severity::Critical => "critical",
		};
		f.write_str(name)
	}
}

/// Receives restart and terminal-failure notices.
pub trait Notifier: Send + Sync {
	fn notify(&self, title: &str, message: &str, severity: Severity);
}

/// Notifier that writes through the structured log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
	fn notify(&self, title: &str, message: &str, severity: Severity) {
		match severity {
			Severity::Info => info!(target: "courier.notify", %title, %message, "notification"),
			Severity::Warning => warn!(target: "courier.notify", %title, %message, "notification"),
			Severity::Critical => error!(target: "courier.notify", %title, %message, "notification"),
		}
	}
}
