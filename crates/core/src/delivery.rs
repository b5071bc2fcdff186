//! Multi-line text injection with ordered fallbacks.
//!
//! Each line goes in through the clipboard first, then as one typed string,
//! then one character at a time. Lines are joined with a soft line break and
//! the message is submitted once at the end.

use std::fmt;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::DeliveryPacing;
use crate::executor::ActionExecutor;
use crate::fault::FatalError;
use crate::surface::{Action, Key, Locator, SessionFactory};

/// Copies `arguments[0]` to the clipboard without moving focus away from the
/// element that had it.
pub const CLIPBOARD_SCRIPT: &str = r#"
const text = arguments[0];
const previous = document.activeElement;
const area = document.createElement('textarea');
area.value = text;
area.setAttribute('readonly', '');
area.style.position = 'fixed';
area.style.opacity = '0';
document.body.appendChild(area);
area.select();
const copied = document.execCommand('copy');
document.body.removeChild(area);
if (previous && typeof previous.focus === 'function') {
	previous.focus();
}
if (!copied) {
	throw new Error('clipboard copy was rejected');
}
return true;
"#;

/// The step that stopped an item from being delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailedStep {
	SearchBox,
	SearchQuery,
	SearchResults,
	SearchItem,
	MessageBox,
	ClearField,
	/// Soft break after the 1-based line `line`.
	LineBreak { line: usize },
	Submit,
}

impl fmt::Display for FailedStep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FailedStep::SearchBox => f.write_str("could not clear the search box"),
			FailedStep::SearchQuery => f.write_str("could not search for the recipient"),
			FailedStep::SearchResults => f.write_str("search results did not appear"),
			FailedStep::SearchItem => f.write_str("recipient not found in search results"),
			FailedStep::MessageBox => f.write_str("could not focus the message box"),
			FailedStep::ClearField => f.write_str("could not clear the message box"),
			FailedStep::LineBreak { line } => write!(f, "line break after line {line} failed"),
			FailedStep::Submit => f.write_str("could not submit the message"),
		}
	}
}

/// Result of a delivery attempt that did not hit a fatal fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
	Sent,
	Failed(FailedStep),
}

/// Internal control flow: a failed step ends the item, a fatal error ends the run.
pub(crate) enum StepError {
	Fatal(FatalError),
	Failed(FailedStep),
}

impl From<FatalError> for StepError {
	fn from(err: FatalError) -> Self {
		StepError::Fatal(err)
	}
}

/// Maps an executor `false` to a failed step.
pub(crate) fn require(ok: bool, step: FailedStep) -> Result<(), StepError> {
	if ok { Ok(()) } else { Err(StepError::Failed(step)) }
}

pub(crate) fn finish(result: Result<(), StepError>) -> Result<Delivery, FatalError> {
	match result {
		Ok(()) => Ok(Delivery::Sent),
		Err(StepError::Failed(step)) => Ok(Delivery::Failed(step)),
		Err(StepError::Fatal(err)) => Err(err),
	}
}

/// Writes a multi-line message into an input element and submits it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDeliveryProtocol {
	pacing: DeliveryPacing,
}

impl TextDeliveryProtocol {
	pub fn new(pacing: DeliveryPacing) -> Self {
		Self { pacing }
	}

	/// Clears `target`, enters `text` line by line and submits it.
	pub async fn deliver<F: SessionFactory>(
		&self,
		exec: &mut ActionExecutor<'_, F>,
		target: &Locator,
		text: &str,
	) -> Result<Delivery, FatalError> {
		let outcome = finish(self.run(exec, target, text).await)?;
		match &outcome {
			Delivery::Sent => info!(target: "courier.delivery", field = %target, "message submitted"),
			Delivery::Failed(step) => warn!(target: "courier.delivery", field = %target, %step, "delivery failed"),
		}
		Ok(outcome)
	}

	async fn run<F: SessionFactory>(
		&self,
		exec: &mut ActionExecutor<'_, F>,
		target: &Locator,
		text: &str,
	) -> Result<(), StepError> {
		for action in [Action::Activate, Action::Press(Key::SelectAll), Action::Press(Key::Delete)] {
			require(exec.perform(target, action).await?, FailedStep::ClearField)?;
		}

		let lines: Vec<&str> = text.split('\n').map(|line| line.trim_end_matches('\r')).collect();
		for (index, line) in lines.iter().enumerate() {
			if !line.trim().is_empty() {
				self.inject_line(exec, target, line).await?;
			}
			if index + 1 < lines.len() {
				require(
					exec.perform(target, Action::Press(Key::LineBreak)).await?,
					FailedStep::LineBreak { line: index + 1 },
				)?;
				tokio::time::sleep(self.pacing.line_break_settle()).await;
			}
		}

		tokio::time::sleep(self.pacing.submit_settle()).await;
		require(exec.perform(target, Action::Press(Key::Submit)).await?, FailedStep::Submit)
	}

	/// Clipboard paste, then whole-line typing, then per-character typing.
	async fn inject_line<F: SessionFactory>(
		&self,
		exec: &mut ActionExecutor<'_, F>,
		target: &Locator,
		line: &str,
	) -> Result<(), FatalError> {
		if exec.run_script(CLIPBOARD_SCRIPT, vec![Value::from(line)]).await? {
			tokio::time::sleep(self.pacing.clipboard_settle()).await;
			if exec.perform(target, Action::Press(Key::Paste)).await? {
				return Ok(());
			}
		}

		debug!(target: "courier.delivery", "clipboard paste failed; typing line");
		if exec.perform(target, Action::Type(line.to_string())).await? {
			return Ok(());
		}

		debug!(target: "courier.delivery", "line typing failed; typing per character");
		let mut dropped = 0usize;
		for ch in line.chars() {
			if !exec.perform(target, Action::Type(ch.to_string())).await? {
				dropped += 1;
			}
			tokio::time::sleep(self.pacing.char_interval()).await;
		}
		if dropped > 0 {
			warn!(target: "courier.delivery", dropped, "characters could not be typed");
		}
		Ok(())
	}
}
