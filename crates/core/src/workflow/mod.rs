//! The delivery loop over a list of work items.
//!
//! [`WorkflowOrchestrator`] owns the session controller, the progress store and
//! the per-run outcome map. Items are handled strictly in input order; a
//! [`FatalError`] stops the loop but the session is always torn down and a
//! (partial) summary is always produced.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::{Config, DeliveryPacing, Locators};
use crate::delivery::{Delivery, TextDeliveryProtocol};
use crate::executor::{ActionExecutor, RetryPolicy};
use crate::fault::{FatalError, FaultClassifier};
use crate::notify::{Notifier, Severity};
use crate::progress::{CheckpointBackend, ProgressStore};
use crate::session::{SessionController, SessionSettings};
use crate::surface::SessionFactory;
use crate::work_item::WorkItem;

mod conversation;
mod outcome;

pub use outcome::{
	ALREADY_PROCESSED, ALREADY_SENT, ItemReport, RESTARTED_DURING_DELIVERY, RunOutcome, RunReport, RunSummary,
};

#[cfg(test)]
mod tests;

/// Loop tunables derived from [`Config`].
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
	pub retry: RetryPolicy,
	pub element_timeout: Duration,
	pub item_restart_retries: u32,
	pub settle_delay: Duration,
	pub search_settle: Duration,
	pub pacing: DeliveryPacing,
	pub locators: Locators,
}

impl WorkflowSettings {
	pub fn from_config(config: &Config) -> Self {
		Self {
			retry: RetryPolicy::from_config(config),
			element_timeout: config.element_timeout(),
			item_restart_retries: config.item_restart_retries,
			settle_delay: config.settle_delay(),
			search_settle: config.search_settle(),
			pacing: config.pacing,
			locators: config.locators.clone(),
		}
	}
}

/// Drives work items through the session with checkpointing.
pub struct WorkflowOrchestrator<F: SessionFactory, B: CheckpointBackend> {
	session: SessionController<F>,
	store: ProgressStore<B>,
	classifier: Arc<dyn FaultClassifier>,
	notifier: Arc<dyn Notifier>,
	settings: WorkflowSettings,
	/// Keys delivered during this run, across session restarts.
	delivered: HashSet<String>,
}

impl<F: SessionFactory, B: CheckpointBackend> WorkflowOrchestrator<F, B> {
	pub fn new(
		factory: F,
		store: ProgressStore<B>,
		config: &Config,
		classifier: Arc<dyn FaultClassifier>,
		notifier: Arc<dyn Notifier>,
	) -> Self {
		let session = SessionController::new(
			factory,
			SessionSettings::from_config(config),
			Arc::clone(&classifier),
			Arc::clone(&notifier),
		);
		Self {
			session,
			store,
			classifier,
			notifier,
			settings: WorkflowSettings::from_config(config),
			delivered: HashSet::new(),
		}
	}

	pub fn session(&self) -> &SessionController<F> {
		&self.session
	}

	pub fn store(&self) -> &ProgressStore<B> {
		&self.store
	}

	pub fn into_store(self) -> ProgressStore<B> {
		self.store
	}

	/// Processes `items` in order and tears the session down afterwards.
	pub async fn run(&mut self, items: &[WorkItem]) -> RunReport {
		info!(target: "courier.workflow", items = items.len(), "run started");
		let mut summary = RunSummary::new(items.len());

		let fatal = self.process_all(items, &mut summary).await.err();

		self.session.teardown().await;
		summary.restarts = self.session.restarts();

		if let Some(err) = &fatal {
			error!(target: "courier.workflow", error = %err, processed = summary.processed(), "run aborted");
			self.notifier.notify("Run aborted", &err.to_string(), Severity::Critical);
			summary.aborted = Some(err.to_string());
		}
		info!(
			target: "courier.workflow",
			delivered = summary.delivered(),
			failed = summary.failed(),
			skipped = summary.skipped(),
			restarts = summary.restarts,
			"run finished"
		);
		RunReport { summary, fatal }
	}

	async fn process_all(&mut self, items: &[WorkItem], summary: &mut RunSummary) -> Result<(), FatalError> {
		let mut settle_pending = false;
		for (index, item) in items.iter().enumerate() {
			info!(
				target: "courier.workflow",
				item = index + 1,
				total = items.len(),
				key = %item.key,
				name = %item.display_name,
				"processing item"
			);

			if settle_pending {
				tokio::time::sleep(self.settings.settle_delay).await;
			}
			let (outcome, touched) = self.process_item(index, item).await?;
			settle_pending = touched;

			match &outcome {
				RunOutcome::Delivered => info!(target: "courier.workflow", key = %item.key, "delivered"),
				RunOutcome::Skipped(reason) => info!(target: "courier.workflow", key = %item.key, %reason, "skipped"),
				RunOutcome::Failed(reason) => warn!(target: "courier.workflow", key = %item.key, %reason, "failed"),
			}
			summary.push(ItemReport {
				sequence_index: index,
				key: item.key.clone(),
				display_name: item.display_name.clone(),
				outcome,
			});
		}
		Ok(())
	}

	/// Returns the outcome and whether the surface was used for the item.
	async fn process_item(&mut self, index: usize, item: &WorkItem) -> Result<(RunOutcome, bool), FatalError> {
		if self.session.check_and_refresh().await? {
			debug!(target: "courier.workflow", key = %item.key, "session refreshed before item");
		}

		if self.store.is_processed(item) {
			return Ok((RunOutcome::Skipped(ALREADY_PROCESSED.into()), false));
		}
		if self.delivered.contains(&item.key) {
			return Ok((RunOutcome::Skipped(ALREADY_SENT.into()), false));
		}

		self.session.create().await?;

		let mut restarts_left = self.settings.item_restart_retries;
		loop {
			let generation = self.session.generation();
			let delivery = self.attempt(item).await?;
			let restarted = self.session.generation() != generation;

			match delivery {
				Delivery::Sent => {
					if restarted {
						warn!(
							target: "courier.workflow",
							key = %item.key,
							"session restarted mid-item but the message was submitted; not resending"
						);
					}
					self.delivered.insert(item.key.clone());
					self.checkpoint(index, item);
					return Ok((RunOutcome::Delivered, true));
				}
				Delivery::Failed(step) if restarted => {
					if restarts_left == 0 {
						debug!(target: "courier.workflow", key = %item.key, %step, "no item retries left");
						return Ok((RunOutcome::Failed(RESTARTED_DURING_DELIVERY.into()), true));
					}
					restarts_left -= 1;
					info!(
						target: "courier.workflow",
						key = %item.key,
						%step,
						"session restarted during delivery; retrying item from the start"
					);
				}
				Delivery::Failed(step) => return Ok((RunOutcome::Failed(step.to_string()), true)),
			}
		}
	}

	async fn attempt(&mut self, item: &WorkItem) -> Result<Delivery, FatalError> {
		let settings = &self.settings;
		let mut exec = ActionExecutor::new(
			&mut self.session,
			self.classifier.as_ref(),
			self.notifier.as_ref(),
			settings.retry,
			settings.element_timeout,
		);

		let opened = conversation::open(&mut exec, &settings.locators, &item.key, settings.search_settle).await?;
		if let Delivery::Failed(step) = opened {
			return Ok(Delivery::Failed(step));
		}
		TextDeliveryProtocol::new(settings.pacing)
			.deliver(&mut exec, &settings.locators.message_box, &item.payload)
			.await
	}

	/// A failed write does not undo a submitted message.
	fn checkpoint(&mut self, index: usize, item: &WorkItem) {
		if let Err(err) = self.store.record(item, index) {
			error!(target: "courier.workflow", key = %item.key, error = %err, "checkpoint not saved");
			self.notifier.notify(
				"Checkpoint not saved",
				&format!("{} was delivered but could not be recorded: {err}", item.key),
				Severity::Warning,
			);
		}
	}
}
