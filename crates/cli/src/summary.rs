//! Human-readable reports.

use std::fmt::Write as _;

use colored::Colorize;
use courier::{Reconciliation, RunOutcome, RunSummary, WorkItem};

const RULE: &str = "==================================================";

/// End-of-run report; always lists every failed and skipped item with its reason.
pub fn render_summary(summary: &RunSummary) -> String {
	let mut out = String::new();
	let _ = writeln!(out, "{RULE}");
	let _ = writeln!(out, "{}", "DELIVERY SUMMARY".bold());
	let _ = writeln!(out, "{RULE}");
	let _ = writeln!(out, "Contacts in file:   {}", summary.total_items);
	let _ = writeln!(out, "Processed:          {}", summary.processed());
	let _ = writeln!(out, "Delivered:          {}", summary.delivered().to_string().green());
	let _ = writeln!(out, "Failed:             {}", summary.failed().to_string().red());
	let _ = writeln!(out, "Skipped:            {}", summary.skipped().to_string().yellow());
	let _ = writeln!(out, "Session restarts:   {}", summary.restarts);

	let failed: Vec<_> = summary
		.items
		.iter()
		.filter(|r| matches!(r.outcome, RunOutcome::Failed(_)))
		.collect();
	if !failed.is_empty() {
		let _ = writeln!(out, "\n{}", "Failed:".red().bold());
		for report in failed {
			let _ = writeln!(out, "  {} {} ({})", "✗".red(), report.display_name, report.key);
			let _ = writeln!(out, "    reason: {}", report.outcome.reason().unwrap_or_default());
		}
	}

	let skipped: Vec<_> = summary
		.items
		.iter()
		.filter(|r| matches!(r.outcome, RunOutcome::Skipped(_)))
		.collect();
	if !skipped.is_empty() {
		let _ = writeln!(out, "\n{}", "Skipped:".yellow().bold());
		for report in skipped {
			let _ = writeln!(
				out,
				"  - {} ({}): {}",
				report.display_name,
				report.key,
				report.outcome.reason().unwrap_or_default()
			);
		}
	}

	if let Some(reason) = &summary.aborted {
		let unprocessed = summary.total_items.saturating_sub(summary.processed());
		let _ = writeln!(out, "\n{} {reason}", "Run aborted:".red().bold());
		let _ = writeln!(out, "  {unprocessed} contact(s) were not processed");
	}
	let _ = writeln!(out, "{RULE}");
	out
}

/// Checkpoint comparison for `status` and before a run.
pub fn render_reconciliation(items: &[WorkItem], reconciliation: &Reconciliation) -> String {
	let name_of = |key: &str| {
		items
			.iter()
			.find(|item| item.key == key)
			.map(|item| item.display_name.as_str())
			.unwrap_or_default()
	};

	let mut out = String::new();
	let _ = writeln!(out, "Contacts:            {}", items.len());
	let _ = writeln!(out, "Already delivered:   {}", reconciliation.matches.len().to_string().green());
	let changed: Vec<_> = reconciliation.changed().collect();
	let _ = writeln!(out, "Changed since sent:  {}", changed.len().to_string().yellow());
	let _ = writeln!(out, "Pending:             {}", reconciliation.pending().count());
	for mismatch in changed {
		let _ = writeln!(out, "  ~ {} ({}): {}", name_of(&mismatch.key), mismatch.key, mismatch.reason);
	}
	out
}
