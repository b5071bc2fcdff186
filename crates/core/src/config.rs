//! Run configuration.
//!
//! Every field has a default so a partial JSON file (or none at all) is valid.
//! Durations are stored as integer milliseconds/seconds to keep the file format
//! plain.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CourierError, Result};
use crate::fault::SignatureClassifier;
use crate::surface::Locator;

pub const DEFAULT_APP_URL: &str = "https://web.whatsapp.com/";

/// Element locators for the messaging surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Locators {
	/// Present once the application has finished loading.
	pub ready: Locator,
	pub search_box: Locator,
	pub search_results: Locator,
	pub search_item: Locator,
	pub message_box: Locator,
}

impl Default for Locators {
	fn default() -> Self {
		Self {
			ready: Locator::css("new chat button", "button[aria-label*='New chat']"),
			search_box: Locator::xpath("search box", "//p[contains(@class, 'selectable-text')][1]"),
			search_results: Locator::xpath("search results", "//div[contains(@aria-label, 'Search results')][1]"),
			search_item: Locator::xpath("search result item", "(.//div[@role='listitem'])[2]"),
			message_box: Locator::css(
				"message box",
				"div[aria-label*='Type a message'][aria-owns='emoji-suggestion'] > p[class*='selectable-text']",
			),
		}
	}
}

/// Delays inserted by the text delivery protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeliveryPacing {
	pub clipboard_settle_ms: u64,
	pub line_break_settle_ms: u64,
	pub submit_settle_ms: u64,
	pub char_interval_ms: u64,
}

impl Default for DeliveryPacing {
	fn default() -> Self {
		Self {
			clipboard_settle_ms: 500,
			line_break_settle_ms: 500,
			submit_settle_ms: 1000,
			char_interval_ms: 100,
		}
	}
}

impl DeliveryPacing {
	/// No delays at all.
	pub const IMMEDIATE: Self = Self {
		clipboard_settle_ms: 0,
		line_break_settle_ms: 0,
		submit_settle_ms: 0,
		char_interval_ms: 0,
	};

	pub fn clipboard_settle(&self) -> Duration {
		Duration::from_millis(self.clipboard_settle_ms)
	}

	pub fn line_break_settle(&self) -> Duration {
		Duration::from_millis(self.line_break_settle_ms)
	}

	pub fn submit_settle(&self) -> Duration {
		Duration::from_millis(self.submit_settle_ms)
	}

	pub fn char_interval(&self) -> Duration {
		Duration::from_millis(self.char_interval_ms)
	}
}

/// Extra fault signatures appended to the built-in ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignatureConfig {
	pub session_fatal: Vec<String>,
	pub unrecoverable: Vec<String>,
}

/// Tunables for one workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
	pub app_url: String,
	/// Per-element wait when resolving a locator.
	pub element_timeout_ms: u64,
	/// Wait for the application to become ready after each session creation.
	pub ready_timeout_secs: u64,
	/// Total attempts per action for transient faults.
	pub max_attempts: u32,
	pub retry_delay_ms: u64,
	/// Session restarts one action may trigger before a session-fatal fault is final.
	pub max_session_restarts_per_action: u32,
	/// Proactive restart once a session is this old; `0` disables.
	pub restart_interval_secs: u64,
	/// Times an item is retried from scratch after a restart interrupted it.
	pub item_restart_retries: u32,
	/// Courtesy delay between work items.
	pub settle_delay_ms: u64,
	/// Wait after typing a search query and after opening a conversation.
	pub search_settle_ms: u64,
	pub pacing: DeliveryPacing,
	pub locators: Locators,
	pub signatures: SignatureConfig,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			app_url: DEFAULT_APP_URL.to_string(),
			element_timeout_ms: 50_000,
			ready_timeout_secs: 600,
			max_attempts: 5,
			retry_delay_ms: 2_000,
			max_session_restarts_per_action: 1,
			restart_interval_secs: 30 * 60,
			item_restart_retries: 1,
			settle_delay_ms: 2_000,
			search_settle_ms: 2_000,
			pacing: DeliveryPacing::default(),
			locators: Locators::default(),
			signatures: SignatureConfig::default(),
		}
	}
}

impl Config {
	pub fn validate(&self) -> Result<()> {
		if self.app_url.trim().is_empty() {
			return Err(CourierError::Config("appUrl must not be empty".into()));
		}
		if self.max_attempts == 0 {
			return Err(CourierError::Config("maxAttempts must be at least 1".into()));
		}
		self.classifier()?;
		Ok(())
	}

	/// Builds the fault classifier from built-in and configured signatures.
	pub fn classifier(&self) -> Result<SignatureClassifier> {
		SignatureClassifier::with_extra(self.signatures.session_fatal.as_slice(), self.signatures.unrecoverable.as_slice())
			.map_err(|e| CourierError::Config(format!("invalid fault signature: {e}")))
	}

	pub fn element_timeout(&self) -> Duration {
		Duration::from_millis(self.element_timeout_ms)
	}

	pub fn ready_timeout(&self) -> Duration {
		Duration::from_secs(self.ready_timeout_secs)
	}

	pub fn retry_delay(&self) -> Duration {
		Duration::from_millis(self.retry_delay_ms)
	}

	pub fn restart_interval(&self) -> Option<Duration> {
		(self.restart_interval_secs > 0).then(|| Duration::from_secs(self.restart_interval_secs))
	}

	pub fn settle_delay(&self) -> Duration {
		Duration::from_millis(self.settle_delay_ms)
	}

	pub fn search_settle(&self) -> Duration {
		Duration::from_millis(self.search_settle_ms)
	}
}
