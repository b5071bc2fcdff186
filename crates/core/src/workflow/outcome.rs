//! Per-item outcomes and the end-of-run summary.

use std::fmt;

use crate::fault::FatalError;

pub const ALREADY_PROCESSED: &str = "already processed";
pub const ALREADY_SENT: &str = "already sent";
pub const RESTARTED_DURING_DELIVERY: &str = "session restarted during delivery";

/// What happened to one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
	Delivered,
	Skipped(String),
	Failed(String),
}

impl RunOutcome {
	pub fn reason(&self) -> Option<&str> {
		match self {
			RunOutcome::Delivered => None,
			RunOutcome::Skipped(reason) | RunOutcome::Failed(reason) => Some(reason),
		}
	}
}

impl fmt::Display for RunOutcome {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RunOutcome::Delivered => f.write_str("delivered"),
			RunOutcome::Skipped(reason) => write!(f, "skipped ({reason})"),
			RunOutcome::Failed(reason) => write!(f, "failed ({reason})"),
		}
	}
}

/// Outcome of one item together with what identifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
	pub sequence_index: usize,
	pub key: String,
	pub display_name: String,
	pub outcome: RunOutcome,
}

/// Counts and reasons for a whole run, complete or aborted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
	/// Items in the input, processed or not.
	pub total_items: usize,
	/// Reports in processing order.
	pub items: Vec<ItemReport>,
	pub restarts: u32,
	/// Fatal condition that stopped the run early.
	pub aborted: Option<String>,
}

impl RunSummary {
	pub fn new(total_items: usize) -> Self {
		Self {
			total_items,
			..Default::default()
		}
	}

	pub fn push(&mut self, report: ItemReport) {
		self.items.push(report);
	}

	pub fn processed(&self) -> usize {
		self.items.len()
	}

	pub fn delivered(&self) -> usize {
		self.count(|o| matches!(o, RunOutcome::Delivered))
	}

	pub fn failed(&self) -> usize {
		self.count(|o| matches!(o, RunOutcome::Failed(_)))
	}

	pub fn skipped(&self) -> usize {
		self.count(|o| matches!(o, RunOutcome::Skipped(_)))
	}

	pub fn is_aborted(&self) -> bool {
		self.aborted.is_some()
	}

	fn count(&self, pred: impl Fn(&RunOutcome) -> bool) -> usize {
		self.items.iter().filter(|r| pred(&r.outcome)).count()
	}
}

/// Summary plus the fatal error, if the run ended on one.
#[derive(Debug)]
pub struct RunReport {
	pub summary: RunSummary,
	pub fatal: Option<FatalError>,
}

impl RunReport {
	pub fn into_result(self) -> Result<RunSummary, (RunSummary, FatalError)> {
		match self.fatal {
			None => Ok(self.summary),
			Some(err) => Err((self.summary, err)),
		}
	}
}
