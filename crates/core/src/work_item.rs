//! Work items and recipient identifier normalization.

use serde::{Deserialize, Serialize};

/// One recipient and the message to deliver to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
	/// Normalized recipient identifier; the item's identity.
	pub key: String,
	pub display_name: String,
	/// Multi-line message body.
	pub payload: String,
}

impl WorkItem {
	/// Builds an item, normalizing `raw_identifier` into its key.
	pub fn new(raw_identifier: &str, display_name: impl Into<String>, payload: impl Into<String>) -> Self {
		Self {
			key: normalize_identifier(raw_identifier),
			display_name: display_name.into(),
			payload: payload.into(),
		}
	}
}

/// Two-digit E.164 country codes. Codes starting with `1` or `7` are one digit,
/// anything else not listed here is three digits (the code space is prefix-free).
const TWO_DIGIT_COUNTRY_CODES: &[&str] = &[
	"20", "27", "30", "31", "32", "33", "34", "36", "39", "40", "41", "43", "44", "45", "46", "47", "48", "49", "51", "52", "53", "54", "55",
	"56", "57", "58", "60", "61", "62", "63", "64", "65", "66", "81", "82", "84", "86", "90", "91", "92", "93", "94", "95", "98",
];

/// Length of the country code at the start of `digits`.
fn country_code_len(digits: &str) -> usize {
	if digits.starts_with('1') || digits.starts_with('7') {
		return 1;
	}
	match digits.get(..2) {
		Some(prefix) if TWO_DIGIT_COUNTRY_CODES.contains(&prefix) => 2,
		_ => 3.min(digits.len()),
	}
}

/// Canonical form of a recipient identifier.
///
/// Keeps digits and a leading `+`, turns a leading `00` international prefix
/// into `+`, and strips zeros between the country code and the subscriber
/// number. Identifiers without an international prefix lose their leading zeros.
/// Returns an empty string when no subscriber digits remain.
pub fn normalize_identifier(raw: &str) -> String {
	let trimmed = raw.trim();
	let has_plus = trimmed.starts_with('+');
	let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();

	let international = if has_plus {
		Some(digits.as_str())
	} else {
		digits.strip_prefix("00")
	};

	match international {
		Some(rest) => {
			let rest = rest.trim_start_matches('0');
			let (country, subscriber) = rest.split_at(country_code_len(rest));
			let subscriber = subscriber.trim_start_matches('0');
			if subscriber.is_empty() {
				return String::new();
			}
			format!("+{country}{subscriber}")
		}
		None => digits.trim_start_matches('0').to_string(),
	}
}
