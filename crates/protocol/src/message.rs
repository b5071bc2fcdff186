//! Command/response/event envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Method names used by courier.
pub mod methods {
	pub const PAGE_ENABLE: &str = "Page.enable";
	pub const PAGE_NAVIGATE: &str = "Page.navigate";
	pub const RUNTIME_ENABLE: &str = "Runtime.enable";
	pub const RUNTIME_EVALUATE: &str = "Runtime.evaluate";
	pub const RUNTIME_CALL_FUNCTION_ON: &str = "Runtime.callFunctionOn";
	pub const RUNTIME_RELEASE_OBJECT: &str = "Runtime.releaseObject";
	pub const INPUT_INSERT_TEXT: &str = "Input.insertText";
	pub const INPUT_DISPATCH_KEY_EVENT: &str = "Input.dispatchKeyEvent";
	pub const BROWSER_CLOSE: &str = "Browser.close";
}

/// Outgoing command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
	pub id: u64,
	pub method: String,
	#[serde(default, skip_serializing_if = "Value::is_null")]
	pub params: Value,
}

/// Error object carried by a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
}

/// Any frame received from the browser, before it is told apart.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMessage {
	#[serde(default)]
	pub id: Option<u64>,
	#[serde(default)]
	pub result: Option<Value>,
	#[serde(default)]
	pub error: Option<ErrorObject>,
	#[serde(default)]
	pub method: Option<String>,
	#[serde(default)]
	pub params: Option<Value>,
}

/// Reply to a [`Command`] with the same `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
	pub id: u64,
	pub outcome: Result<Value, ErrorObject>,
}

/// Unsolicited notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
	pub method: String,
	pub params: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
	Response(Response),
	Event(Event),
}

impl RawMessage {
	/// Frames with an `id` are responses, frames with only a `method` are events.
	pub fn into_incoming(self) -> Option<Incoming> {
		if let Some(id) = self.id {
			let outcome = match self.error {
				Some(error) => Err(error),
				None => Ok(self.result.unwrap_or(Value::Null)),
			};
			return Some(Incoming::Response(Response { id, outcome }));
		}
		let method = self.method?;
		Some(Incoming::Event(Event {
			method,
			params: self.params.unwrap_or(Value::Null),
		}))
	}
}
