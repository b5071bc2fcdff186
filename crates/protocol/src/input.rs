//! `Input` domain parameters.

use serde::{Deserialize, Serialize};

/// Modifier bit flags for `Input.dispatchKeyEvent`.
pub mod modifiers {
	pub const ALT: u8 = 1;
	pub const CTRL: u8 = 2;
	pub const META: u8 = 4;
	pub const SHIFT: u8 = 8;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyEventType {
	KeyDown,
	KeyUp,
	RawKeyDown,
	Char,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEventParams {
	#[serde(rename = "type")]
	pub kind: KeyEventType,
	#[serde(default, skip_serializing_if = "is_zero")]
	pub modifiers: u8,
	pub key: String,
	pub code: String,
	#[serde(default, skip_serializing_if = "is_zero_i32")]
	pub windows_virtual_key_code: i32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub text: Option<String>,
	/// Editing commands run with the event, e.g. `selectAll` or `paste`.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertTextParams {
	pub text: String,
}

fn is_zero(value: &u8) -> bool {
	*value == 0
}

fn is_zero_i32(value: &i32) -> bool {
	*value == 0
}
