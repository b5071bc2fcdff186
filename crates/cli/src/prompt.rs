//! Operator prompts.

use std::io::IsTerminal;

use anyhow::Result;
use courier::Reconciliation;
use dialoguer::{Confirm, Select};

use crate::cli::MismatchAction;

/// Decides what to do with existing progress.
///
/// `preset` wins; otherwise the operator is asked when a terminal is attached.
/// Unattended runs resume, since resuming never sends a message twice.
pub fn resolve_mismatch(reconciliation: &Reconciliation, preset: Option<MismatchAction>) -> Result<MismatchAction> {
	if let Some(action) = preset {
		return Ok(action);
	}
	if !reconciliation.has_prior_progress() {
		return Ok(MismatchAction::Resume);
	}
	if !std::io::stdin().is_terminal() {
		tracing::info!(target: "courier.cli", "no terminal attached; resuming from checkpoint");
		return Ok(MismatchAction::Resume);
	}

	let changed = reconciliation.changed().count();
	let prompt = if changed > 0 {
		format!(
			"{} contact(s) already delivered, {changed} of them with a different message now. What next?",
			reconciliation.matches.len() + changed
		)
	} else {
		format!("{} contact(s) already delivered. What next?", reconciliation.matches.len())
	};

	let choice = Select::new()
		.with_prompt(prompt)
		.items(&[
			"Resume: skip contacts already delivered",
			"Reset: archive progress and deliver to everyone",
			"Abort",
		])
		.default(0)
		.interact()?;

	Ok(match choice {
		0 => MismatchAction::Resume,
		1 => MismatchAction::Reset,
		_ => MismatchAction::Abort,
	})
}

/// Asks before discarding progress; `false` without a terminal.
pub fn confirm_reset(records: usize) -> Result<bool> {
	if !std::io::stdin().is_terminal() {
		return Ok(false);
	}
	Ok(Confirm::new()
		.with_prompt(format!("Archive and clear {records} checkpoint record(s)?"))
		.default(false)
		.interact()?)
}
