//! Port selection and shutdown for the launched browser.

use std::time::Duration;

use tokio::process::Child;
use tracing::debug;

/// Number of ports tried after the preferred one when it is taken.
const PORT_SEARCH_SPAN: u16 = 32;

/// Returns `true` when `port` can be bound on localhost.
pub fn port_available(port: u16) -> bool {
	std::net::TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// First bindable port at or after `preferred`.
pub fn pick_debug_port(preferred: u16) -> Option<u16> {
	(0..PORT_SEARCH_SPAN)
		.filter_map(|offset| preferred.checked_add(offset))
		.find(|port| port_available(*port))
}

/// Waits up to `grace` for `child` to exit on its own, then kills it.
pub async fn reap(child: &mut Child, grace: Duration) -> std::io::Result<()> {
	let waited = tokio::time::timeout(grace, child.wait()).await;
	match waited {
		Ok(status) => {
			let status = status?;
			debug!(target: "courier.cdp", %status, "browser exited");
			Ok(())
		}
		Err(_) => {
			debug!(target: "courier.cdp", pid = ?child.id(), "browser still running; killing");
			child.kill().await
		}
	}
}
