//! Wire types for the Chrome DevTools Protocol.
//!
//! This crate contains the serde-serializable shapes exchanged with a
//! Chromium browser: the JSON-RPC style envelope sent over the DevTools
//! WebSocket, the HTTP discovery documents, and the parameter/result types
//! of the handful of `Page`, `Runtime` and `Input` methods courier uses.
//!
//! Types in this crate are pure data. Connection handling and the mapping to
//! courier's surface model live in `courier-runtime`.

pub mod discovery;
pub mod input;
pub mod message;
pub mod runtime;

pub use discovery::*;
pub use input::*;
pub use message::*;
pub use runtime::*;
