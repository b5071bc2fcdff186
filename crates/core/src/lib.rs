//! Resilient message delivery over a remote automation surface.
//!
//! The crate is organized around the pieces of one delivery run:
//!
//! - [`fault`] classifies surface faults into retry / restart / stop verdicts.
//! - [`executor`] wraps single interactions in classified retry.
//! - [`session`] owns the live session and restarts it on age or loss.
//! - [`delivery`] injects multi-line text with ordered fallbacks.
//! - [`progress`] persists what was delivered so reruns skip it.
//! - [`workflow`] drives a list of [`WorkItem`]s through all of the above.
//!
//! Browser specifics live behind the [`surface`] traits; see the
//! `courier-runtime` crate for the Chrome DevTools implementation.

pub mod config;
pub mod delivery;
pub mod error;
pub mod executor;
pub mod fault;
pub mod notify;
pub mod progress;
pub mod session;
pub mod surface;
pub mod work_item;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use config::{Config, DeliveryPacing, Locators};
pub use delivery::{Delivery, FailedStep, TextDeliveryProtocol};
pub use error::{CourierError, Result};
pub use executor::{ActionExecutor, RetryPolicy};
pub use fault::{FatalError, FaultClassifier, FaultVerdict, SignatureClassifier};
pub use notify::{LogNotifier, Notifier, Severity};
pub use progress::{CheckpointBackend, CheckpointRecord, FileBackend, MemoryBackend, ProgressStore, Reconciliation};
pub use session::{SessionController, SessionSettings, SessionState};
pub use surface::{
	Action, ElementHandle, Key, Locator, LocatorStrategy, RemoteSurface, SessionFactory, SurfaceError,
	SurfaceErrorKind, SurfaceResult,
};
pub use work_item::{WorkItem, normalize_identifier};
pub use workflow::{ItemReport, RunOutcome, RunReport, RunSummary, WorkflowOrchestrator, WorkflowSettings};
