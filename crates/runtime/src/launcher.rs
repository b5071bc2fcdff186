//! Browser launch settings and the launched process.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::{Result, RuntimeError};
use crate::finder::find_chrome;
use crate::probe::{Endpoint, fetch_version};
use crate::process::{pick_debug_port, reap};

const ENDPOINT_POLL: Duration = Duration::from_millis(200);

/// How the browser is obtained and driven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserSettings {
	/// Browser executable; discovered when unset.
	pub executable: Option<PathBuf>,
	/// Remote debugging port, or the first port tried when launching.
	pub port: u16,
	/// Persistent profile root. Keeping it between runs keeps the app logged in.
	pub user_data_dir: Option<PathBuf>,
	/// Profile inside `user_data_dir`, e.g. `Default` or `Profile 2`.
	pub profile_directory: Option<String>,
	pub headless: bool,
	/// Attach to a browser already listening on `port` instead of launching one.
	pub attach: bool,
	pub extra_args: Vec<String>,
	pub launch_timeout_secs: u64,
	pub command_timeout_secs: u64,
	/// Time the browser gets to exit after `Browser.close` before it is killed.
	pub close_grace_ms: u64,
}

impl Default for BrowserSettings {
	fn default() -> Self {
		Self {
			executable: None,
			port: 9222,
			user_data_dir: None,
			profile_directory: None,
			headless: false,
			attach: false,
			extra_args: Vec::new(),
			launch_timeout_secs: 20,
			command_timeout_secs: 30,
			close_grace_ms: 3_000,
		}
	}
}

impl BrowserSettings {
	pub fn launch_timeout(&self) -> Duration {
		Duration::from_secs(self.launch_timeout_secs)
	}

	pub fn command_timeout(&self) -> Duration {
		Duration::from_secs(self.command_timeout_secs)
	}

	pub fn close_grace(&self) -> Duration {
		Duration::from_millis(self.close_grace_ms)
	}

	/// Configured profile root, else `<data dir>/courier/profile`.
	pub fn profile_root(&self) -> PathBuf {
		self.user_data_dir.clone().unwrap_or_else(|| {
			dirs::data_local_dir()
				.unwrap_or_else(std::env::temp_dir)
				.join("courier")
				.join("profile")
		})
	}
}

/// Command-line flags for a launch on `port`.
pub fn launch_args(settings: &BrowserSettings, port: u16, user_data_dir: &Path) -> Vec<String> {
	let mut args = vec![
		format!("--remote-debugging-port={port}"),
		format!("--user-data-dir={}", user_data_dir.display()),
		"--no-first-run".to_string(),
		"--no-default-browser-check".to_string(),
	];
	if let Some(profile) = &settings.profile_directory {
		args.push(format!("--profile-directory={profile}"));
	}
	if settings.headless {
		args.push("--headless=new".to_string());
	}
	args.extend(settings.extra_args.iter().cloned());
	args.push("about:blank".to_string());
	args
}

/// A browser started by courier. Killed when dropped.
#[derive(Debug)]
pub struct BrowserProcess {
	child: Child,
	port: u16,
}

impl BrowserProcess {
	/// Starts the browser and waits for its DevTools endpoint.
	pub async fn launch(settings: &BrowserSettings) -> Result<(Self, Endpoint)> {
		let executable = find_chrome(settings.executable.as_deref())?;
		let port = pick_debug_port(settings.port)
			.ok_or_else(|| RuntimeError::Launch(format!("no free debugging port at or after {}", settings.port)))?;
		let user_data_dir = settings.profile_root();
		std::fs::create_dir_all(&user_data_dir)?;

		let args = launch_args(settings, port, &user_data_dir);
		info!(
			target: "courier.cdp",
			executable = %executable.display(),
			port,
			profile = %user_data_dir.display(),
			"launching browser"
		);

		let mut cmd = Command::new(&executable);
		cmd.args(&args)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::null())
			.kill_on_drop(true);
		#[cfg(unix)]
		cmd.process_group(0);

		let child = cmd
			.spawn()
			.map_err(|e| RuntimeError::Launch(format!("failed to start {}: {e}", executable.display())))?;
		let mut process = Self { child, port };
		let endpoint = process.wait_for_endpoint(settings.launch_timeout()).await?;
		Ok((process, endpoint))
	}

	async fn wait_for_endpoint(&mut self, timeout: Duration) -> Result<Endpoint> {
		let deadline = tokio::time::Instant::now() + timeout;
		let mut last_error = "endpoint not reachable".to_string();

		while tokio::time::Instant::now() < deadline {
			tokio::time::sleep(ENDPOINT_POLL).await;

			if let Some(status) = self.child.try_wait()? {
				return Err(RuntimeError::Launch(format!(
					"browser exited before its debugging endpoint came up ({status}); \
					 another instance may already own the profile"
				)));
			}

			match fetch_version(self.port).await {
				Ok(endpoint) => {
					debug!(target: "courier.cdp", port = self.port, browser = ?endpoint.version.browser, "endpoint ready");
					return Ok(endpoint);
				}
				Err(e) => last_error = e.to_string(),
			}
		}

		let _ = self.child.start_kill();
		Err(RuntimeError::Launch(format!(
			"debugging endpoint on port {} not available after {timeout:?}: {last_error}",
			self.port
		)))
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	pub fn pid(&self) -> Option<u32> {
		self.child.id()
	}

	/// Waits up to `grace` for the process to exit, then kills it.
	pub async fn shutdown(mut self, grace: Duration) -> Result<()> {
		reap(&mut self.child, grace).await?;
		Ok(())
	}
}
