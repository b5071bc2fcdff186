use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use courier_cli::cli::{Cli, Commands};
use courier_cli::settings::Settings;
use courier_cli::{commands, logging};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	let settings = match Settings::load(cli.config.as_deref()) {
		Ok(settings) => settings,
		Err(err) => {
			eprintln!("{} {err:#}", "error:".red().bold());
			return ExitCode::FAILURE;
		}
	};
	let progress = settings.progress_path(cli.progress_file.as_deref());
	let log_file = match cli.command {
		Commands::Run(_) => settings.log_path(cli.log_file.as_deref(), cli.no_log_file, &progress),
		_ => cli.log_file.clone(),
	};

	if let Err(err) = logging::init_logging(cli.verbose, log_file.as_deref()) {
		eprintln!("{} {err:#}", "error:".red().bold());
		return ExitCode::FAILURE;
	}

	match commands::dispatch(cli.command, settings, &progress).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!(target: "courier.cli", error = %format!("{err:#}"), "command failed");
			eprintln!("{} {err:#}", "error:".red().bold());
			ExitCode::from(commands::exit_code(&err))
		}
	}
}
