//! Chromium runtime for courier.
//!
//! Launches (or attaches to) a Chromium-family browser with a persistent
//! profile and drives one page over the Chrome DevTools Protocol. The
//! [`CdpSessionFactory`] plugs into [`courier::SessionController`].

pub mod connection;
pub mod error;
pub mod factory;
pub mod finder;
pub mod launcher;
pub mod probe;
pub mod process;
pub mod surface;

#[cfg(test)]
mod testing;

pub use connection::CdpConnection;
pub use error::{Result, RuntimeError};
pub use factory::CdpSessionFactory;
pub use finder::find_chrome;
pub use launcher::{BrowserProcess, BrowserSettings};
pub use surface::CdpSurface;
