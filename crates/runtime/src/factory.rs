//! [`SessionFactory`] that launches (or attaches to) Chromium and hands out
//! [`CdpSurface`]s.

use async_trait::async_trait;
use courier::{SessionFactory, SurfaceResult};
use courier_protocol::methods;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::connection::CdpConnection;
use crate::error::{Result, RuntimeError};
use crate::launcher::{BrowserProcess, BrowserSettings};
use crate::probe::{Endpoint, fetch_version, list_targets, open_target, select_page_target};
use crate::surface::CdpSurface;

struct Launched {
	process: BrowserProcess,
	browser_ws: String,
}

pub struct CdpSessionFactory {
	settings: BrowserSettings,
	app_url: String,
	launched: Option<Launched>,
}

impl CdpSessionFactory {
	/// `app_url` picks the page target to reuse when attaching to a running browser.
	pub fn new(settings: BrowserSettings, app_url: impl Into<String>) -> Self {
		Self {
			settings,
			app_url: app_url.into(),
			launched: None,
		}
	}

	async fn endpoint(&mut self) -> Result<Endpoint> {
		if self.settings.attach {
			return fetch_version(self.settings.port).await.map_err(|e| {
				RuntimeError::Launch(format!(
					"no browser with remote debugging on port {}: {e}",
					self.settings.port
				))
			});
		}

		// A process left over from a failed teardown would hold the profile lock.
		if let Some(stale) = self.launched.take() {
			warn!(target: "courier.cdp", pid = ?stale.process.pid(), "stopping leftover browser");
			stale.process.shutdown(self.settings.close_grace()).await?;
		}

		let (process, endpoint) = BrowserProcess::launch(&self.settings).await?;
		self.launched = Some(Launched {
			process,
			browser_ws: endpoint.version.web_socket_debugger_url.clone(),
		});
		Ok(endpoint)
	}

	async fn open_page(&self, endpoint: &Endpoint) -> Result<CdpSurface> {
		let targets = list_targets(&endpoint.base).await?;
		let page_ws = match select_page_target(&targets, &self.app_url) {
			Some(target) => {
				debug!(target: "courier.cdp", id = %target.id, url = %target.url, "reusing page target");
				target.web_socket_debugger_url.clone()
			}
			None => {
				debug!(target: "courier.cdp", "no attachable page; opening one");
				open_target(&endpoint.base, "about:blank").await?.web_socket_debugger_url
			}
		};
		let page_ws = page_ws.ok_or_else(|| RuntimeError::Launch("page target has no debugger URL".into()))?;

		let conn = CdpConnection::connect(&page_ws, self.settings.command_timeout()).await?;
		let surface = CdpSurface::new(conn);
		surface.enable().await?;
		Ok(surface)
	}

	async fn close_browser(&mut self) -> Result<()> {
		let Some(launched) = self.launched.take() else {
			return Ok(());
		};

		match CdpConnection::connect(&launched.browser_ws, self.settings.close_grace()).await {
			Ok(browser) => {
				// The browser usually drops the socket before replying.
				if let Err(e) = browser.send(methods::BROWSER_CLOSE, Value::Null).await {
					debug!(target: "courier.cdp", error = %e, "Browser.close");
				}
			}
			Err(e) => debug!(target: "courier.cdp", error = %e, "browser socket unavailable; killing"),
		}
		launched.process.shutdown(self.settings.close_grace()).await
	}
}

#[async_trait]
impl SessionFactory for CdpSessionFactory {
	type Surface = CdpSurface;

	async fn create(&mut self) -> SurfaceResult<CdpSurface> {
		let endpoint = self.endpoint().await?;
		info!(
			target: "courier.cdp",
			base = %endpoint.base,
			browser = endpoint.version.browser.as_deref().unwrap_or("unknown"),
			attach = self.settings.attach,
			"browser endpoint ready"
		);

		match self.open_page(&endpoint).await {
			Ok(surface) => Ok(surface),
			Err(e) => {
				if let Err(close_err) = self.close_browser().await {
					warn!(target: "courier.cdp", error = %close_err, "failed to stop browser after setup error");
				}
				Err(RuntimeError::Launch(e.to_string()).into())
			}
		}
	}

	async fn destroy(&mut self, surface: CdpSurface) -> SurfaceResult<()> {
		surface.close().await;
		drop(surface);
		self.close_browser().await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use courier::SurfaceErrorKind;
	use serde_json::json;

	use super::*;
	use crate::testing::FakeBrowser;

	fn attach_to(port: u16) -> CdpSessionFactory {
		let settings = BrowserSettings {
			attach: true,
			port,
			command_timeout_secs: 2,
			..Default::default()
		};
		CdpSessionFactory::new(settings, "https://web.whatsapp.com/")
	}

	#[tokio::test]
	async fn attach_connects_to_the_listed_page_and_enables_domains() {
		let browser = FakeBrowser::start(|_, _| Ok(json!({}))).await;
		let mut factory = attach_to(browser.port());

		let surface = factory.create().await.unwrap();
		assert_eq!(browser.connections(), 1);
		assert_eq!(browser.methods(), vec!["Page.enable", "Runtime.enable"]);
		assert!(surface.connection().url().ends_with("/devtools/page/P1"));

		factory.destroy(surface).await.unwrap();
		tokio::time::sleep(Duration::from_millis(50)).await;
		assert!(!browser.methods().iter().any(|m| m == "Browser.close"));
	}

	#[tokio::test]
	async fn attach_without_a_browser_is_session_not_created() {
		let port = {
			let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
			listener.local_addr().unwrap().port()
		};
		let mut factory = attach_to(port);

		let err = factory.create().await.err().unwrap();
		assert_eq!(err.kind, SurfaceErrorKind::SessionNotCreated);
		assert!(err.message.contains(&port.to_string()));
	}

	#[tokio::test]
	async fn setup_failure_after_connect_is_session_not_created() {
		let browser = FakeBrowser::start(|method, _| match method {
			"Runtime.enable" => Err((-32000, "Runtime domain unavailable".to_string())),
			_ => Ok(json!({})),
		})
		.await;
		let mut factory = attach_to(browser.port());

		let err = factory.create().await.err().unwrap();
		assert_eq!(err.kind, SurfaceErrorKind::SessionNotCreated);
		assert!(err.message.contains("Runtime domain unavailable"));
	}
}
