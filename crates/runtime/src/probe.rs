//! DevTools HTTP discovery: `/json/version`, `/json/list` and `/json/new`.

use std::time::Duration;

use courier_protocol::{TargetInfo, VersionInfo};
use serde::de::DeserializeOwned;

use crate::error::{Result, RuntimeError};

const PROBE_TIMEOUT: Duration = Duration::from_millis(400);

/// A reachable DevTools HTTP endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
	/// `http://host:port` that answered.
	pub base: String,
	pub version: VersionInfo,
}

fn client() -> Result<reqwest::Client> {
	reqwest::Client::builder()
		.timeout(PROBE_TIMEOUT)
		.no_proxy()
		.build()
		.map_err(|e| RuntimeError::Http {
			url: String::new(),
			reason: format!("failed to create HTTP client: {e}"),
		})
}

/// Resolves the DevTools endpoint on `port`, trying IPv4, `localhost`, then IPv6.
pub async fn fetch_version(port: u16) -> Result<Endpoint> {
	let client = client()?;
	let mut last_error = "no response".to_string();

	for base in [
		format!("http://127.0.0.1:{port}"),
		format!("http://localhost:{port}"),
		format!("http://[::1]:{port}"),
	] {
		match get_json::<VersionInfo>(&client, reqwest::Method::GET, &format!("{base}/json/version")).await {
			Ok(version) => return Ok(Endpoint { base, version }),
			Err(e) => last_error = e.to_string(),
		}
	}

	Err(RuntimeError::ConnectionFailed {
		url: format!("127.0.0.1:{port}"),
		reason: last_error,
	})
}

/// Lists the targets known to the browser at `base`.
pub async fn list_targets(base: &str) -> Result<Vec<TargetInfo>> {
	get_json(&client()?, reqwest::Method::GET, &format!("{base}/json/list")).await
}

/// Opens a new page target; recent Chrome only accepts `PUT` here.
pub async fn open_target(base: &str, url: &str) -> Result<TargetInfo> {
	get_json(&client()?, reqwest::Method::PUT, &format!("{base}/json/new?{url}")).await
}

async fn get_json<T: DeserializeOwned>(client: &reqwest::Client, method: reqwest::Method, url: &str) -> Result<T> {
	let http_err = |reason: String| RuntimeError::Http {
		url: url.to_string(),
		reason,
	};

	let response = client.request(method, url).send().await.map_err(|e| http_err(e.to_string()))?;
	if !response.status().is_success() {
		return Err(http_err(format!("unexpected status {}", response.status())));
	}
	response.json().await.map_err(|e| http_err(format!("invalid JSON: {e}")))
}

/// Picks the page target to drive: one already showing `preferred_url`, else
/// the first attachable page.
pub fn select_page_target<'a>(targets: &'a [TargetInfo], preferred_url: &str) -> Option<&'a TargetInfo> {
	let attachable = || {
		targets
			.iter()
			.filter(|t| t.is_page() && t.web_socket_debugger_url.is_some())
	};
	let preferred = preferred_url.trim_end_matches('/');

	attachable()
		.find(|t| !preferred.is_empty() && t.url.starts_with(preferred))
		.or_else(|| attachable().next())
}
