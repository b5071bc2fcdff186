//! Loopback DevTools server for tests.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

type Handler = dyn Fn(&str, &Value) -> Result<Value, (i64, String)> + Send + Sync;

#[derive(Clone)]
enum Mode {
	Respond(Arc<Handler>),
	Silent,
	HangUpOn(String),
}

/// Serves `/json/*` discovery plus a WebSocket endpoint on one port and
/// records every command it receives.
pub struct FakeBrowser {
	port: u16,
	calls: Arc<Mutex<Vec<(String, Value)>>>,
	connections: Arc<Mutex<usize>>,
}

impl FakeBrowser {
	pub async fn start<H>(handler: H) -> Self
	where
		H: Fn(&str, &Value) -> Result<Value, (i64, String)> + Send + Sync + 'static,
	{
		Self::spawn(Mode::Respond(Arc::new(handler))).await
	}

	/// Accepts commands but never answers them.
	pub async fn silent() -> Self {
		Self::spawn(Mode::Silent).await
	}

	/// Answers `{}` until `method` arrives, then drops the socket.
	pub async fn hang_up_on(method: &str) -> Self {
		Self::spawn(Mode::HangUpOn(method.to_string())).await
	}

	async fn spawn(mode: Mode) -> Self {
		let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
		let port = listener.local_addr().unwrap().port();
		let calls: Arc<Mutex<Vec<(String, Value)>>> = Arc::default();
		let connections: Arc<Mutex<usize>> = Arc::default();

		let (task_calls, task_connections) = (Arc::clone(&calls), Arc::clone(&connections));
		tokio::spawn(async move {
			while let Ok((stream, _)) = listener.accept().await {
				let (mode, calls, connections) = (mode.clone(), Arc::clone(&task_calls), Arc::clone(&task_connections));
				tokio::spawn(async move {
					if is_upgrade(&stream).await {
						*connections.lock() += 1;
						serve_socket(stream, mode, calls).await;
					} else {
						serve_discovery(stream, port).await;
					}
				});
			}
		});

		Self {
			port,
			calls,
			connections,
		}
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	pub fn ws_url(&self) -> String {
		format!("ws://127.0.0.1:{}/devtools/page/P1", self.port)
	}

	pub fn calls(&self) -> Vec<(String, Value)> {
		self.calls.lock().clone()
	}

	pub fn methods(&self) -> Vec<String> {
		self.calls.lock().iter().map(|(method, _)| method.clone()).collect()
	}

	pub fn params_of(&self, method: &str) -> Vec<Value> {
		self.calls
			.lock()
			.iter()
			.filter(|(m, _)| m == method)
			.map(|(_, params)| params.clone())
			.collect()
	}

	pub fn connections(&self) -> usize {
		*self.connections.lock()
	}
}

async fn is_upgrade(stream: &TcpStream) -> bool {
	let mut buf = [0u8; 2048];
	for _ in 0..50 {
		let Ok(n) = stream.peek(&mut buf).await else {
			return false;
		};
		let head = String::from_utf8_lossy(&buf[..n]).to_ascii_lowercase();
		if head.contains("\r\n\r\n") || n == buf.len() {
			return head.contains("upgrade: websocket");
		}
		tokio::time::sleep(std::time::Duration::from_millis(5)).await;
	}
	false
}

async fn serve_socket(stream: TcpStream, mode: Mode, calls: Arc<Mutex<Vec<(String, Value)>>>) {
	let Ok(mut socket) = tokio_tungstenite::accept_async(stream).await else {
		return;
	};
	while let Some(Ok(frame)) = socket.next().await {
		let Message::Text(text) = frame else {
			continue;
		};
		let Ok(command) = serde_json::from_str::<Value>(&text) else {
			continue;
		};
		let id = command["id"].clone();
		let method = command["method"].as_str().unwrap_or_default().to_string();
		let params = command.get("params").cloned().unwrap_or(Value::Null);
		calls.lock().push((method.clone(), params.clone()));

		let reply = match &mode {
			Mode::Silent => continue,
			Mode::HangUpOn(target) if *target == method => return,
			Mode::HangUpOn(_) => json!({"id": id, "result": {}}),
			Mode::Respond(handler) => match handler(&method, &params) {
				Ok(result) => json!({"id": id, "result": result}),
				Err((code, message)) => json!({"id": id, "error": {"code": code, "message": message}}),
			},
		};
		if socket.send(Message::Text(reply.to_string().into())).await.is_err() {
			return;
		}
	}
}

async fn serve_discovery(stream: TcpStream, port: u16) {
	let routes = vec![
		(
			"/json/version",
			json!({
				"Browser": "Chrome/126.0.0.0",
				"webSocketDebuggerUrl": format!("ws://127.0.0.1:{port}/devtools/browser/B1"),
			})
			.to_string(),
		),
		(
			"/json/list",
			json!([{
				"id": "P1",
				"type": "page",
				"title": "",
				"url": "about:blank",
				"webSocketDebuggerUrl": format!("ws://127.0.0.1:{port}/devtools/page/P1"),
			}])
			.to_string(),
		),
	];
	answer(stream, &routes).await;
}

/// Serves fixed JSON bodies by path on a fresh port.
pub async fn serve_http(routes: Vec<(&'static str, String)>) -> u16 {
	let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
	let port = listener.local_addr().unwrap().port();
	let routes = Arc::new(routes);
	tokio::spawn(async move {
		while let Ok((stream, _)) = listener.accept().await {
			let routes = Arc::clone(&routes);
			tokio::spawn(async move { answer(stream, &routes).await });
		}
	});
	port
}

async fn answer(mut stream: TcpStream, routes: &[(&str, String)]) {
	let mut buf = vec![0u8; 4096];
	let mut read = 0;
	loop {
		match stream.read(&mut buf[read..]).await {
			Ok(0) | Err(_) => return,
			Ok(n) => read += n,
		}
		if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") || read == buf.len() {
			break;
		}
	}

	let head = String::from_utf8_lossy(&buf[..read]);
	let path = head.split_whitespace().nth(1).unwrap_or("/");
	let path = path.split('?').next().unwrap_or(path);
	let (status, body) = match routes.iter().find(|(route, _)| *route == path) {
		Some((_, body)) => ("200 OK", body.as_str()),
		None => ("404 Not Found", "{}"),
	};
	let response = format!(
		"HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
		body.len()
	);
	let _ = stream.write_all(response.as_bytes()).await;
	let _ = stream.shutdown().await;
}
