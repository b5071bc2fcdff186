//! Navigates from the chat list to one recipient's message box.

use std::time::Duration;

use tracing::debug;

use crate::config::Locators;
use crate::delivery::{Delivery, FailedStep, StepError, finish, require};
use crate::executor::ActionExecutor;
use crate::fault::FatalError;
use crate::surface::{Action, Key, SessionFactory};

/// Searches for `recipient` and focuses its message box.
pub(crate) async fn open<F: SessionFactory>(
	exec: &mut ActionExecutor<'_, F>,
	locators: &Locators,
	recipient: &str,
	settle: Duration,
) -> Result<Delivery, FatalError> {
	finish(steps(exec, locators, recipient, settle).await)
}

async fn steps<F: SessionFactory>(
	exec: &mut ActionExecutor<'_, F>,
	locators: &Locators,
	recipient: &str,
	settle: Duration,
) -> Result<(), StepError> {
	debug!(target: "courier.workflow", %recipient, "searching for recipient");
	for action in [Action::Clear, Action::Press(Key::SelectAll), Action::Press(Key::Delete)] {
		require(exec.perform(&locators.search_box, action).await?, FailedStep::SearchBox)?;
	}
	require(
		exec.perform(&locators.search_box, Action::Type(recipient.to_string())).await?,
		FailedStep::SearchQuery,
	)?;
	tokio::time::sleep(settle).await;
	require(
		exec.perform(&locators.search_box, Action::Press(Key::Submit)).await?,
		FailedStep::SearchQuery,
	)?;

	require(exec.perform(&locators.search_results, Action::Activate).await?, FailedStep::SearchResults)?;
	require(exec.perform(&locators.search_item, Action::Activate).await?, FailedStep::SearchItem)?;
	tokio::time::sleep(settle).await;

	require(exec.perform(&locators.message_box, Action::Activate).await?, FailedStep::MessageBox)?;
	tokio::time::sleep(settle).await;
	Ok(())
}
