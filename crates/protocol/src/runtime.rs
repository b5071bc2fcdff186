//! `Runtime` domain parameters and results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mirror object for a JavaScript value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub subtype: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub class_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub object_id: Option<String>,
}

impl RemoteObject {
	/// A live object reference, excluding `null`.
	pub fn live_object_id(&self) -> Option<&str> {
		if self.kind != "object" || self.subtype.as_deref() == Some("null") {
			return None;
		}
		self.object_id.as_deref()
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
	#[serde(default)]
	pub text: String,
	#[serde(default)]
	pub line_number: i64,
	#[serde(default)]
	pub column_number: i64,
	#[serde(default)]
	pub exception: Option<RemoteObject>,
}

impl ExceptionDetails {
	/// The thrown value's description when present, else the summary text.
	pub fn message(&self) -> String {
		self.exception
			.as_ref()
			.and_then(|e| e.description.clone())
			.unwrap_or_else(|| self.text.clone())
	}
}

/// Result of `Runtime.evaluate` and `Runtime.callFunctionOn`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
	pub result: RemoteObject,
	#[serde(default)]
	pub exception_details: Option<ExceptionDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
	pub expression: String,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub return_by_value: bool,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub await_promise: bool,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub user_gesture: bool,
}

/// Argument passed to `Runtime.callFunctionOn`: a JSON value or an object reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallArgument {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub object_id: Option<String>,
}

impl CallArgument {
	pub fn value(value: Value) -> Self {
		Self {
			value: Some(value),
			object_id: None,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFunctionOnParams {
	pub function_declaration: String,
	pub object_id: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub arguments: Vec<CallArgument>,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub return_by_value: bool,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub await_promise: bool,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub user_gesture: bool,
}
