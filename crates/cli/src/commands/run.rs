use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use courier::{FaultClassifier, LogNotifier, Notifier, ProgressStore, WorkflowOrchestrator};
use courier_runtime::CdpSessionFactory;
use tracing::info;

use crate::cli::{MismatchAction, RunArgs};
use crate::settings::Settings;
use crate::summary::{render_reconciliation, render_summary};
use crate::{contacts, prompt};

pub async fn execute(args: RunArgs, mut settings: Settings, progress: &Path) -> Result<()> {
	settings.apply_run_overrides(&args)?;
	settings.core.validate()?;

	let items = contacts::load(&args.contacts, &settings.columns)?;
	let mut store =
		ProgressStore::open(progress).with_context(|| format!("opening checkpoint {}", progress.display()))?;
	info!(
		target: "courier.cli",
		contacts = items.len(),
		checkpoint = %progress.display(),
		records = store.len(),
		"starting run"
	);

	let reconciliation = store.reconcile(&items);
	if reconciliation.has_prior_progress() {
		print!("{}", render_reconciliation(&items, &reconciliation));
	}
	match prompt::resolve_mismatch(&reconciliation, args.on_mismatch)? {
		MismatchAction::Resume => {}
		MismatchAction::Reset => {
			if let Some(archive) = store.reset()? {
				println!("Previous progress archived to {}", archive.display());
			}
		}
		MismatchAction::Abort => {
			println!("Aborted; nothing was sent.");
			return Ok(());
		}
	}

	let classifier: Arc<dyn FaultClassifier> = Arc::new(settings.core.classifier()?);
	let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
	let factory = CdpSessionFactory::new(settings.browser.clone(), settings.core.app_url.clone());
	let mut orchestrator = WorkflowOrchestrator::new(factory, store, &settings.core, classifier, notifier);

	let report = orchestrator.run(&items).await;
	print!("{}", render_summary(&report.summary));

	match report.into_result() {
		Ok(_) => Ok(()),
		Err((_, fatal)) => Err(fatal.into()),
	}
}
