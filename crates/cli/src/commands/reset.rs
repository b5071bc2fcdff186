use std::path::Path;

use anyhow::{Context, Result};
use courier::{CourierError, FileBackend, ProgressStore};
use tracing::warn;

use crate::prompt;

pub fn execute(yes: bool, progress: &Path) -> Result<()> {
	if !progress.exists() {
		println!("No checkpoint at {}; nothing to reset.", progress.display());
		return Ok(());
	}

	let (records, damaged) = match ProgressStore::open(progress) {
		Ok(store) => (store.len(), false),
		Err(CourierError::Checkpoint { reason, .. }) => {
			warn!(target: "courier.cli", %reason, "checkpoint is damaged; it will be archived as-is");
			(0, true)
		}
		Err(err) => return Err(err).with_context(|| format!("opening checkpoint {}", progress.display())),
	};

	if !yes && !prompt::confirm_reset(records)? {
		println!("Reset cancelled; pass --yes to reset without a prompt.");
		return Ok(());
	}

	let archived = if damaged {
		ProgressStore::reset_unparsed(FileBackend::new(progress))?.1
	} else {
		ProgressStore::open(progress)?.reset()?
	};

	match archived {
		Some(path) => println!("Checkpoint archived to {} and cleared.", path.display()),
		None => println!("Checkpoint cleared."),
	}
	Ok(())
}
