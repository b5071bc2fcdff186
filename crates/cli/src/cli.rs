use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(about = "Deliver messages to a list of recipients through a browser session")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v debug, -vv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// JSON config file (defaults to ./courier.json when present)
	#[arg(long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Checkpoint file recording delivered items
	#[arg(long, global = true, value_name = "FILE")]
	pub progress_file: Option<PathBuf>,

	/// Also write logs to this file
	#[arg(long, global = true, value_name = "FILE")]
	pub log_file: Option<PathBuf>,

	/// Do not write a log file
	#[arg(long, global = true, conflicts_with = "log_file")]
	pub no_log_file: bool,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Deliver every pending message in a contacts file
	Run(RunArgs),

	/// Compare a contacts file against the checkpoint without opening a browser
	Status {
		/// CSV or spreadsheet with "First Name", "Mobile Phone" and "Message" columns
		contacts: PathBuf,
	},

	/// Archive the checkpoint file and start over
	Reset {
		/// Skip the confirmation prompt
		#[arg(short, long)]
		yes: bool,
	},
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
	/// CSV or spreadsheet with "First Name", "Mobile Phone" and "Message" columns
	pub contacts: PathBuf,

	/// What to do when the checkpoint already holds progress
	#[arg(long, value_enum, value_name = "ACTION")]
	pub on_mismatch: Option<MismatchAction>,

	/// Attach to a browser already listening on the debugging port
	#[arg(long)]
	pub attach: bool,

	/// Remote debugging port
	#[arg(long)]
	pub port: Option<u16>,

	/// Browser executable
	#[arg(long, value_name = "PATH")]
	pub chrome: Option<PathBuf>,

	/// Browser user data directory
	#[arg(long, value_name = "DIR")]
	pub user_data_dir: Option<PathBuf>,

	/// Profile inside the user data directory (e.g. "Profile 2")
	#[arg(long, value_name = "NAME")]
	pub profile_directory: Option<String>,

	/// Run the browser without a window
	#[arg(long)]
	pub headless: bool,

	/// Application URL to open in each session
	#[arg(long)]
	pub app_url: Option<String>,
}

/// Operator decision when prior progress exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MismatchAction {
	/// Keep the checkpoint and skip what was delivered
	Resume,
	/// Archive the checkpoint and deliver everything again
	Reset,
	/// Stop without sending anything
	Abort,
}
