mod reset;
mod run;
mod status;

use std::path::Path;

use anyhow::Result;
use courier::FatalError;

use crate::cli::Commands;
use crate::settings::Settings;

pub async fn dispatch(command: Commands, settings: Settings, progress: &Path) -> Result<()> {
	match command {
		Commands::Run(args) => run::execute(args, settings, progress).await,
		Commands::Status { contacts } => status::execute(&contacts, &settings, progress),
		Commands::Reset { yes } => reset::execute(yes, progress),
	}
}

/// `2` when the run stopped on a fatal fault, `1` for any other error.
pub fn exit_code(err: &anyhow::Error) -> u8 {
	if err.chain().any(|cause| cause.is::<FatalError>()) {
		2
	} else {
		1
	}
}
