use std::path::Path;

use anyhow::{Context, Result};
use courier::ProgressStore;

use crate::contacts;
use crate::settings::Settings;
use crate::summary::render_reconciliation;

pub fn execute(contacts_file: &Path, settings: &Settings, progress: &Path) -> Result<()> {
	let items = contacts::load(contacts_file, &settings.columns)?;
	let store = ProgressStore::open(progress).with_context(|| format!("opening checkpoint {}", progress.display()))?;

	println!("Checkpoint:          {} ({} record(s))", store.location().display(), store.len());
	print!("{}", render_reconciliation(&items, &store.reconcile(&items)));
	Ok(())
}
