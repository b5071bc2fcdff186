//! [`RemoteSurface`] over one DevTools page target.
//!
//! Elements are held as `Runtime` object ids. Every element operation runs a
//! small function on the object through `Runtime.callFunctionOn`, which throws
//! when the node has been detached so the fault classifier sees a stale
//! element rather than a silent no-op.

use std::time::Duration;

use async_trait::async_trait;
use courier::{ElementHandle, Key, Locator, LocatorStrategy, RemoteSurface, SurfaceResult};
use courier_protocol::{
	CallArgument, CallFunctionOnParams, EvaluateParams, EvaluateResult, InsertTextParams, KeyEventParams, KeyEventType,
	methods, modifiers,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::trace;

use crate::connection::CdpConnection;
use crate::error::{Result, RuntimeError};

const RESOLVE_POLL: Duration = Duration::from_millis(250);

const ACTIVATE_FN: &str = r#"function() {
	if (!this.isConnected) throw new Error('stale element: node is detached');
	this.scrollIntoView({block: 'center', inline: 'center'});
	const rect = this.getBoundingClientRect();
	if (rect.width === 0 && rect.height === 0) throw new Error('element not interactable: zero size');
	const hit = document.elementFromPoint(rect.left + rect.width / 2, rect.top + rect.height / 2);
	if (hit && hit !== this && !this.contains(hit) && !hit.contains(this)) {
		throw new Error('element click intercepted by ' + hit.tagName);
	}
	if (typeof this.focus === 'function') this.focus();
	this.click();
}"#;

const FOCUS_FN: &str = r#"function() {
	if (!this.isConnected) throw new Error('stale element: node is detached');
	const host = this.isContentEditable ? (this.closest('[contenteditable="true"]') || this) : this;
	const active = document.activeElement;
	if (active !== host && !host.contains(active)) host.focus();
}"#;

const CLEAR_FN: &str = r#"function() {
	if (!this.isConnected) throw new Error('stale element: node is detached');
	if ('value' in this) {
		this.value = '';
	} else {
		this.textContent = '';
	}
	this.dispatchEvent(new Event('input', {bubbles: true}));
}"#;

/// JavaScript expression evaluating to the first element matching `locator`, or `null`.
pub fn query_expression(locator: &Locator) -> String {
	let selector = Value::String(locator.selector.clone());
	match locator.strategy {
		LocatorStrategy::Css => format!("document.querySelector({selector})"),
		LocatorStrategy::Xpath => format!(
			"document.evaluate({selector}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue"
		),
	}
}

fn key(kind: KeyEventType, mods: u8, key: &str, code: &str, vk: i32) -> KeyEventParams {
	KeyEventParams {
		kind,
		modifiers: mods,
		key: key.to_string(),
		code: code.to_string(),
		windows_virtual_key_code: vk,
		text: None,
		commands: Vec::new(),
	}
}

/// Down/up event pair producing `chord` on the focused element.
pub fn key_events(chord: Key) -> Vec<KeyEventParams> {
	let (mods, name, code, vk, text, command) = match chord {
		Key::SelectAll => (modifiers::CTRL, "a", "KeyA", 65, None, Some("selectAll")),
		Key::Delete => (0, "Delete", "Delete", 46, None, Some("deleteForward")),
		Key::Paste => (modifiers::CTRL, "v", "KeyV", 86, None, Some("paste")),
		Key::LineBreak => (modifiers::SHIFT, "Enter", "Enter", 13, Some("\r"), None),
		Key::Submit => (0, "Enter", "Enter", 13, Some("\r"), None),
	};

	let down_kind = if text.is_some() {
		KeyEventType::KeyDown
	} else {
		KeyEventType::RawKeyDown
	};
	let mut down = key(down_kind, mods, name, code, vk);
	down.text = text.map(str::to_string);
	down.commands = command.map(str::to_string).into_iter().collect();

	vec![down, key(KeyEventType::KeyUp, mods, name, code, vk)]
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NavigateResult {
	#[serde(default)]
	error_text: Option<String>,
}

/// A page target driven over DevTools.
pub struct CdpSurface {
	conn: CdpConnection,
}

impl CdpSurface {
	pub fn new(conn: CdpConnection) -> Self {
		Self { conn }
	}

	pub fn connection(&self) -> &CdpConnection {
		&self.conn
	}

	/// Enables the domains the surface relies on.
	pub async fn enable(&self) -> Result<()> {
		self.conn.send(methods::PAGE_ENABLE, Value::Null).await?;
		self.conn.send(methods::RUNTIME_ENABLE, Value::Null).await?;
		Ok(())
	}

	pub async fn close(&self) {
		self.conn.close().await;
	}

	async fn evaluate(&self, expression: String, return_by_value: bool) -> Result<EvaluateResult> {
		let params = EvaluateParams {
			expression,
			return_by_value,
			await_promise: return_by_value,
			..Default::default()
		};
		self.conn.call(methods::RUNTIME_EVALUATE, &params).await
	}

	async fn call_on(&self, object_id: &str, function: &str, arguments: Vec<CallArgument>) -> Result<Value> {
		let params = CallFunctionOnParams {
			function_declaration: function.to_string(),
			object_id: object_id.to_string(),
			arguments,
			return_by_value: true,
			await_promise: true,
			user_gesture: true,
		};
		let result: EvaluateResult = self.conn.call(methods::RUNTIME_CALL_FUNCTION_ON, &params).await?;
		if let Some(details) = result.exception_details {
			return Err(RuntimeError::Script(details.message()));
		}
		Ok(result.result.value.unwrap_or(Value::Null))
	}

	async fn query_once(&self, locator: &Locator) -> Result<Option<ElementHandle>> {
		let result = self.evaluate(query_expression(locator), false).await?;
		if let Some(details) = result.exception_details {
			return Err(RuntimeError::Script(details.message()));
		}
		Ok(result.result.live_object_id().map(ElementHandle::new))
	}

	async fn release_object(&self, object_id: &str) -> Result<()> {
		self.conn
			.call::<_, Value>(methods::RUNTIME_RELEASE_OBJECT, &json!({"objectId": object_id}))
			.await
			.map(drop)
	}

	async fn focus(&self, element: &ElementHandle) -> Result<()> {
		self.call_on(element.id(), FOCUS_FN, Vec::new()).await.map(drop)
	}
}

/// Errors while the page is between documents; resolution keeps polling through them.
fn is_transitional(err: &RuntimeError) -> bool {
	let RuntimeError::Cdp { message, .. } = err else {
		return false;
	};
	let lower = message.to_lowercase();
	lower.contains("context") && (lower.contains("destroyed") || lower.contains("cannot find"))
}

#[async_trait]
impl RemoteSurface for CdpSurface {
	async fn navigate(&self, url: &str) -> SurfaceResult<()> {
		let result: NavigateResult = self.conn.call(methods::PAGE_NAVIGATE, &json!({"url": url})).await?;
		match result.error_text.filter(|text| !text.is_empty()) {
			Some(reason) => Err(RuntimeError::ConnectionFailed {
				url: url.to_string(),
				reason,
			}
			.into()),
			None => Ok(()),
		}
	}

	async fn resolve(&self, locator: &Locator, timeout: Duration) -> SurfaceResult<Option<ElementHandle>> {
		let deadline = tokio::time::Instant::now() + timeout;
		loop {
			match self.query_once(locator).await {
				Ok(Some(handle)) => {
					trace!(target: "courier.cdp", locator = %locator, object = handle.id(), "resolved");
					return Ok(Some(handle));
				}
				Ok(None) => {}
				Err(e) if is_transitional(&e) => trace!(target: "courier.cdp", error = %e, "page in transition"),
				Err(e) => return Err(e.into()),
			}

			let now = tokio::time::Instant::now();
			if now >= deadline {
				return Ok(None);
			}
			tokio::time::sleep(RESOLVE_POLL.min(deadline - now)).await;
		}
	}

	async fn activate(&self, element: &ElementHandle) -> SurfaceResult<()> {
		self.call_on(element.id(), ACTIVATE_FN, Vec::new()).await?;
		Ok(())
	}

	async fn type_text(&self, element: &ElementHandle, text: &str) -> SurfaceResult<()> {
		self.focus(element).await?;
		let params = InsertTextParams { text: text.to_string() };
		self.conn.call::<_, Value>(methods::INPUT_INSERT_TEXT, &params).await?;
		Ok(())
	}

	async fn clear(&self, element: &ElementHandle) -> SurfaceResult<()> {
		self.call_on(element.id(), CLEAR_FN, Vec::new()).await?;
		Ok(())
	}

	async fn press(&self, element: &ElementHandle, chord: Key) -> SurfaceResult<()> {
		self.focus(element).await?;
		for event in key_events(chord) {
			self.conn.call::<_, Value>(methods::INPUT_DISPATCH_KEY_EVENT, &event).await?;
		}
		Ok(())
	}

	async fn execute_script(&self, script: &str, args: Vec<Value>) -> SurfaceResult<Value> {
		let global = self.evaluate("globalThis".to_string(), false).await?;
		let Some(global_id) = global.result.object_id else {
			return Err(RuntimeError::Protocol("globalThis has no object id".into()).into());
		};
		let function = format!("function() {{\n{script}\n}}");
		let arguments = args.into_iter().map(CallArgument::value).collect();
		let outcome = self.call_on(&global_id, &function, arguments).await;
		if let Err(e) = self.release_object(&global_id).await {
			trace!(target: "courier.cdp", error = %e, "global object release failed");
		}
		Ok(outcome?)
	}

	async fn release(&self, element: ElementHandle) -> SurfaceResult<()> {
		self.release_object(element.id()).await?;
		Ok(())
	}
}
