//! WebSocket transport with command/response correlation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use courier_protocol::{Command, Incoming, RawMessage};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

use crate::error::{Result, RuntimeError};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<std::result::Result<Value, courier_protocol::ErrorObject>>>>>;

/// One DevTools WebSocket, shared by every command sent to its target.
pub struct CdpConnection {
	url: String,
	next_id: AtomicU64,
	pending: Pending,
	writer: tokio::sync::Mutex<SplitSink<Socket, Message>>,
	closed: Arc<AtomicBool>,
	timeout: Duration,
	reader: JoinHandle<()>,
}

impl CdpConnection {
	/// Connects to `url`; each command waits at most `timeout` for its reply.
	pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
		debug!(target: "courier.cdp", url, "connecting");
		let (socket, _) = tokio_tungstenite::connect_async(url)
			.await
			.map_err(|e| RuntimeError::ConnectionFailed {
				url: url.to_string(),
				reason: e.to_string(),
			})?;
		let (writer, reader) = socket.split();

		let pending: Pending = Arc::default();
		let closed = Arc::new(AtomicBool::new(false));
		let reader = tokio::spawn(read_loop(reader, Arc::clone(&pending), Arc::clone(&closed)));

		Ok(Self {
			url: url.to_string(),
			next_id: AtomicU64::new(1),
			pending,
			writer: tokio::sync::Mutex::new(writer),
			closed,
			timeout,
			reader,
		})
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Sends `method` and waits for its result.
	pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
		if self.is_closed() {
			return Err(RuntimeError::Closed);
		}

		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		let frame = serde_json::to_string(&Command {
			id,
			method: method.to_string(),
			params,
		})
		.map_err(|e| RuntimeError::Protocol(format!("failed to serialize {method}: {e}")))?;

		// Registered before sending so a fast reply cannot be missed.
		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(id, tx);

		trace!(target: "courier.cdp", id, method, "send");
		let sent = self.writer.lock().await.send(Message::Text(frame.into())).await;
		if let Err(e) = sent {
			self.pending.lock().remove(&id);
			debug!(target: "courier.cdp", id, method, error = %e, "send failed");
			return Err(RuntimeError::Closed);
		}

		let reply = match tokio::time::timeout(self.timeout, rx).await {
			Ok(Ok(reply)) => reply,
			Ok(Err(_)) => return Err(RuntimeError::Closed),
			Err(_) => {
				self.pending.lock().remove(&id);
				return Err(RuntimeError::Timeout {
					method: method.to_string(),
					duration: self.timeout,
				});
			}
		};

		reply.map_err(|err| RuntimeError::Cdp {
			code: err.code,
			message: err.message,
		})
	}

	/// Typed variant of [`send`](Self::send).
	pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R>
	where
		P: Serialize + ?Sized,
		R: DeserializeOwned,
	{
		let params =
			serde_json::to_value(params).map_err(|e| RuntimeError::Protocol(format!("failed to serialize {method}: {e}")))?;
		let result = self.send(method, params).await?;
		serde_json::from_value(result).map_err(|e| RuntimeError::Protocol(format!("unexpected {method} result: {e}")))
	}

	/// Sends a close frame; pending commands fail with [`RuntimeError::Closed`].
	pub async fn close(&self) {
		let _ = self.writer.lock().await.close().await;
		self.closed.store(true, Ordering::SeqCst);
	}
}

impl Drop for CdpConnection {
	fn drop(&mut self) {
		self.reader.abort();
	}
}

async fn read_loop(mut reader: SplitStream<Socket>, pending: Pending, closed: Arc<AtomicBool>) {
	while let Some(frame) = reader.next().await {
		let text = match frame {
			Ok(Message::Text(text)) => text.to_string(),
			Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
				Ok(text) => text,
				Err(_) => continue,
			},
			Ok(Message::Close(_)) => break,
			Ok(_) => continue,
			Err(e) => {
				warn!(target: "courier.cdp", error = %e, "websocket read failed");
				break;
			}
		};

		let raw: RawMessage = match serde_json::from_str(&text) {
			Ok(raw) => raw,
			Err(e) => {
				warn!(target: "courier.cdp", error = %e, "dropping malformed frame");
				continue;
			}
		};

		match raw.into_incoming() {
			Some(Incoming::Response(response)) => match pending.lock().remove(&response.id) {
				Some(tx) => {
					let _ = tx.send(response.outcome);
				}
				None => trace!(target: "courier.cdp", id = response.id, "reply for unknown command"),
			},
			Some(Incoming::Event(event)) => trace!(target: "courier.cdp", method = %event.method, "event"),
			None => {}
		}
	}

	debug!(target: "courier.cdp", "websocket closed");
	closed.store(true, Ordering::SeqCst);
	// Dropping the senders wakes every waiter with a closed channel.
	pending.lock().clear();
}
