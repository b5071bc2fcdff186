//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is unset.
pub fn default_directives(verbose: u8) -> &'static str {
	match verbose {
		0 => "warn,courier=info",
		1 => "info,courier=debug",
		_ => "debug,courier=trace",
	}
}

/// Logs to stderr and, when `log_file` is set, appends the same events to it
/// without colors.
pub fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<()> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

	let stderr = fmt::layer().with_writer(std::io::stderr).with_target(verbose > 0);

	let file = match log_file {
		Some(path) => {
			if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
				std::fs::create_dir_all(dir).with_context(|| format!("creating log directory {}", dir.display()))?;
			}
			let file = OpenOptions::new()
				.create(true)
				.append(true)
				.open(path)
				.with_context(|| format!("opening log file {}", path.display()))?;
			Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
		}
		None => None,
	};

	tracing_subscriber::registry()
		.with(filter)
		.with(stderr)
		.with(file)
		.try_init()
		.context("installing log subscriber")?;
	Ok(())
}
