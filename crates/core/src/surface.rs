//! Interface to the remote automation surface.
//!
//! The core never talks to a browser directly. A [`SessionFactory`] builds and
//! destroys sessions, and each session is a [`RemoteSurface`] that resolves
//! [`Locator`]s to at most one element and performs primitive operations on it.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// How a locator's selector is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocatorStrategy {
	Css,
	Xpath,
}

/// Opaque descriptor resolving to zero or one element at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locator {
	/// Short name used in logs and failure reasons.
	pub label: String,
	pub strategy: LocatorStrategy,
	pub selector: String,
}

impl Locator {
	pub fn css(label: impl Into<String>, selector: impl Into<String>) -> Self {
		Self {
			label: label.into(),
			strategy: LocatorStrategy::Css,
			selector: selector.into(),
		}
	}

	pub fn xpath(label: impl Into<String>, selector: impl Into<String>) -> Self {
		Self {
			label: label.into(),
			strategy: LocatorStrategy::Xpath,
			selector: selector.into(),
		}
	}
}

impl fmt::Display for Locator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.label)
	}
}

/// Key chords the delivery protocol sends to a focused element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
	SelectAll,
	Delete,
	Paste,
	/// Soft line break inside a message, distinct from [`Key::Submit`].
	LineBreak,
	Submit,
}

impl fmt::Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Key::SelectAll => "select-all",
			Key::Delete => "delete",
			Key::Paste => "paste",
			Key::LineBreak => "line-break",
			Key::Submit => "submit",
		};
		f.write_str(name)
	}
}

/// A primitive interaction applied to a resolved element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
	Activate,
	Clear,
	Type(String),
	Press(Key),
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Action::Activate => f.write_str("activate"),
			Action::Clear => f.write_str("clear"),
			Action::Type(text) => write!(f, "type ({} chars)", text.chars().count()),
			Action::Press(key) => write!(f, "press {key}"),
		}
	}
}

/// Surface-specific reference to a resolved element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn id(&self) -> &str {
		&self.0
	}
}

/// Coarse fault category reported by a surface implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceErrorKind {
	NotFound,
	Stale,
	NotInteractable,
	ClickIntercepted,
	Timeout,
	Script,
	/// The underlying session could not be created at all.
	SessionNotCreated,
	/// The transport to the session is gone.
	Connection,
	Other,
}

impl fmt::Display for SurfaceErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			SurfaceErrorKind::NotFound => "element not found",
			SurfaceErrorKind::Stale => "stale element",
			SurfaceErrorKind::NotInteractable => "element not interactable",
			SurfaceErrorKind::ClickIntercepted => "click intercepted",
			SurfaceErrorKind::Timeout => "timed out",
			SurfaceErrorKind::Script => "script error",
			SurfaceErrorKind::SessionNotCreated => "session not created",
			SurfaceErrorKind::Connection => "connection lost",
			SurfaceErrorKind::Other => "surface error",
		};
		f.write_str(name)
	}
}

/// A fault raised by one surface interaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct SurfaceError {
	pub kind: SurfaceErrorKind,
	pub message: String,
}

impl SurfaceError {
	pub fn new(kind: SurfaceErrorKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
		}
	}

	pub fn not_found(locator: &Locator) -> Self {
		Self::new(SurfaceErrorKind::NotFound, format!("no element for {} ({})", locator.label, locator.selector))
	}
}

pub type SurfaceResult<T> = std::result::Result<T, SurfaceError>;

/// One live session on the remote surface.
#[async_trait]
pub trait RemoteSurface: Send + Sync {
	/// Loads `url` in the session's page.
	async fn navigate(&self, url: &str) -> SurfaceResult<()>;

	/// Waits up to `timeout` for `locator` to match; `Ok(None)` when it never does.
	async fn resolve(&self, locator: &Locator, timeout: Duration) -> SurfaceResult<Option<ElementHandle>>;

	async fn activate(&self, element: &ElementHandle) -> SurfaceResult<()>;

	async fn type_text(&self, element: &ElementHandle, text: &str) -> SurfaceResult<()>;

	async fn clear(&self, element: &ElementHandle) -> SurfaceResult<()>;

	async fn press(&self, element: &ElementHandle, key: Key) -> SurfaceResult<()>;

	/// Runs `script` as a function body receiving `args` as `arguments`.
	async fn execute_script(&self, script: &str, args: Vec<Value>) -> SurfaceResult<Value>;

	/// Drops the surface's reference to `element`; the handle is dead afterwards.
	async fn release(&self, element: ElementHandle) -> SurfaceResult<()>;
}

/// Builds and tears down sessions.
#[async_trait]
pub trait SessionFactory: Send {
	type Surface: RemoteSurface;

	async fn create(&mut self) -> SurfaceResult<Self::Surface>;

	async fn destroy(&mut self, surface: Self::Surface) -> SurfaceResult<()>;
}
