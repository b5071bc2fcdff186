//! Session lifecycle: creation, age tracking, proactive and reactive restart.
//!
//! The controller exclusively owns the live [`SessionHandle`]. Callers borrow
//! the surface for one operation at a time and never keep it across a restart;
//! the [`generation`](SessionController::generation) counter tells them when
//! the session underneath them was replaced.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::fault::{FatalError, FaultClassifier, FaultVerdict};
use crate::notify::{Notifier, Severity};
use crate::surface::{Locator, RemoteSurface, SessionFactory};

/// Lifecycle state of the controlled session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Uninitialized,
	Active,
	Restarting,
	/// A restart failed; the workflow must stop.
	Dead,
}

/// One live session plus its creation time.
pub struct SessionHandle<S> {
	surface: S,
	created_at: Instant,
	generation: u64,
}

impl<S> SessionHandle<S> {
	pub fn surface(&self) -> &S {
		&self.surface
	}

	pub fn age(&self) -> Duration {
		self.created_at.elapsed()
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}
}

/// Baseline the controller re-establishes after every creation.
#[derive(Debug, Clone)]
pub struct SessionSettings {
	pub app_url: String,
	pub ready_locator: Locator,
	pub ready_timeout: Duration,
	/// Proactive restart threshold; `None` disables it.
	pub restart_interval: Option<Duration>,
}

impl SessionSettings {
	pub fn from_config(config: &Config) -> Self {
		Self {
			app_url: config.app_url.clone(),
			ready_locator: config.locators.ready.clone(),
			ready_timeout: config.ready_timeout(),
			restart_interval: config.restart_interval(),
		}
	}
}

/// Owns the session and decides when it is replaced.
pub struct SessionController<F: SessionFactory> {
	factory: F,
	handle: Option<SessionHandle<F::Surface>>,
	state: SessionState,
	settings: SessionSettings,
	classifier: Arc<dyn FaultClassifier>,
	notifier: Arc<dyn Notifier>,
	generation: u64,
	restarts: u32,
}

impl<F: SessionFactory> SessionController<F> {
	pub fn new(factory: F, settings: SessionSettings, classifier: Arc<dyn FaultClassifier>, notifier: Arc<dyn Notifier>) -> Self {
		Self {
			factory,
			handle: None,
			state: SessionState::Uninitialized,
			settings,
			classifier,
			notifier,
			generation: 0,
			restarts: 0,
		}
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	/// Generation of the current session; bumped on every creation.
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Number of restarts performed so far.
	pub fn restarts(&self) -> u32 {
		self.restarts
	}

	/// Age of the live session, if any.
	pub fn age(&self) -> Option<Duration> {
		self.handle.as_ref().map(SessionHandle::age)
	}

	/// Borrows the live surface.
	pub fn surface(&self) -> Option<&F::Surface> {
		match self.state {
			SessionState::Active => self.handle.as_ref().map(SessionHandle::surface),
			_ => None,
		}
	}

	/// Creates the first session. A no-op when one is already active.
	pub async fn create(&mut self) -> Result<(), FatalError> {
		match self.state {
			SessionState::Active => return Ok(()),
			SessionState::Dead => return Err(self.dead_error()),
			SessionState::Uninitialized | SessionState::Restarting => {}
		}

		match self.establish().await {
			Ok(handle) => {
				info!(target: "courier.session", generation = handle.generation, "session ready");
				self.handle = Some(handle);
				self.state = SessionState::Active;
				Ok(())
			}
			Err(err) => {
				self.state = SessionState::Dead;
				error!(target: "courier.session", error = %err, "could not create session");
				self.notifier.notify("Session could not be created", &err.message, Severity::Critical);
				Err(err)
			}
		}
	}

	/// Restarts the session when it has outlived the restart interval.
	///
	/// Returns whether a restart happened.
	pub async fn check_and_refresh(&mut self) -> Result<bool, FatalError> {
		match self.state {
			SessionState::Dead => return Err(self.dead_error()),
			SessionState::Uninitialized | SessionState::Restarting => return Ok(false),
			SessionState::Active => {}
		}

		let (Some(interval), Some(age)) = (self.settings.restart_interval, self.age()) else {
			return Ok(false);
		};
		if age < interval {
			return Ok(false);
		}

		self.restart(&format!("session age {}s reached restart interval {}s", age.as_secs(), interval.as_secs()))
			.await?;
		Ok(true)
	}

	/// Replaces the current session with a fresh one.
	///
	/// Teardown errors on the old session are logged and ignored. Failing to
	/// bring up the replacement leaves the controller [`SessionState::Dead`].
	pub async fn restart(&mut self, reason: &str) -> Result<(), FatalError> {
		if self.state == SessionState::Dead {
			return Err(self.dead_error());
		}

		self.state = SessionState::Restarting;
		warn!(target: "courier.session", %reason, generation = self.generation, "restarting session");
		self.notifier.notify("Session restart", reason, Severity::Warning);

		self.destroy_current().await;

		match self.establish().await {
			Ok(handle) => {
				self.restarts += 1;
				info!(
					target: "courier.session",
					generation = handle.generation,
					restarts = self.restarts,
					"session restarted"
				);
				self.handle = Some(handle);
				self.state = SessionState::Active;
				Ok(())
			}
			Err(err) => {
				self.state = SessionState::Dead;
				error!(target: "courier.session", error = %err, "session restart failed");
				self.notifier.notify("Session restart failed", &err.message, Severity::Critical);
				Err(err)
			}
		}
	}

	/// Destroys the live session, if any.
	pub async fn teardown(&mut self) {
		self.destroy_current().await;
		if self.state != SessionState::Dead {
			self.state = SessionState::Uninitialized;
		}
	}

	async fn destroy_current(&mut self) {
		let Some(handle) = self.handle.take() else {
			return;
		};
		debug!(target: "courier.session", generation = handle.generation, "destroying session");
		if let Err(err) = self.factory.destroy(handle.surface).await {
			warn!(target: "courier.session", error = %err, "session teardown failed; continuing");
		}
	}

	/// Creates a session, loads the application and waits for it to be ready.
	async fn establish(&mut self) -> Result<SessionHandle<F::Surface>, FatalError> {
		let surface = match self.factory.create().await {
			Ok(surface) => surface,
			Err(fault) => {
				let verdict = self.classifier.classify(&fault);
				return Err(FatalError::from_fault(verdict, &fault));
			}
		};

		if let Err(message) = self.await_baseline(&surface).await {
			if let Err(err) = self.factory.destroy(surface).await {
				debug!(target: "courier.session", error = %err, "discarding unready session failed");
			}
			return Err(FatalError::new(FaultVerdict::SessionFatal, message));
		}

		self.generation += 1;
		Ok(SessionHandle {
			surface,
			created_at: Instant::now(),
			generation: self.generation,
		})
	}

	async fn await_baseline(&self, surface: &F::Surface) -> Result<(), String> {
		let settings = &self.settings;
		debug!(target: "courier.session", url = %settings.app_url, "loading application");
		surface
			.navigate(&settings.app_url)
			.await
			.map_err(|e| format!("navigation to {} failed: {e}", settings.app_url))?;

		match surface.resolve(&settings.ready_locator, settings.ready_timeout).await {
			Ok(Some(_)) => Ok(()),
			Ok(None) => Err(format!(
				"application not ready after {}s ({} never appeared)",
				settings.ready_timeout.as_secs(),
				settings.ready_locator
			)),
			Err(e) => Err(format!("waiting for {} failed: {e}", settings.ready_locator)),
		}
	}

	fn dead_error(&self) -> FatalError {
		FatalError::new(FaultVerdict::SessionFatal, "session is dead after a failed restart")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::surface::SurfaceErrorKind;
	use crate::testing::{Call, FakeHub, controller};

	#[tokio::test(start_paused = true)]
	async fn create_stamps_generation_and_loads_app() {
		let hub = FakeHub::new();
		let mut ctl = controller(&hub, Some(Duration::from_secs(60)));

		ctl.create().await.unwrap();

		assert_eq!(ctl.state(), SessionState::Active);
		assert_eq!(ctl.generation(), 1);
		assert_eq!(ctl.age(), Some(Duration::ZERO));
		assert_eq!(hub.lifecycle(), vec![Call::Create(1), Call::Navigate("https://app.test/".into())]);
	}

	#[tokio::test(start_paused = true)]
	async fn check_and_refresh_restarts_only_after_interval() {
		let hub = FakeHub::new();
		let mut ctl = controller(&hub, Some(Duration::from_secs(60)));
		ctl.create().await.unwrap();

		tokio::time::advance(Duration::from_secs(59)).await;
		assert!(!ctl.check_and_refresh().await.unwrap());

		tokio::time::advance(Duration::from_secs(1)).await;
		assert!(ctl.check_and_refresh().await.unwrap());
		assert_eq!(ctl.generation(), 2);
		assert_eq!(ctl.restarts(), 1);
		assert_eq!(ctl.age(), Some(Duration::ZERO));
		assert_eq!(hub.count(|c| matches!(c, Call::Destroy(1))), 1);
		assert_eq!(hub.notifications_titled("Session restart"), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn disabled_interval_never_restarts() {
		let hub = FakeHub::new();
		let mut ctl = controller(&hub, None);
		ctl.create().await.unwrap();

		tokio::time::advance(Duration::from_secs(86_400)).await;
		assert!(!ctl.check_and_refresh().await.unwrap());
		assert_eq!(ctl.generation(), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn failed_restart_leaves_controller_dead() {
		let hub = FakeHub::new();
		let mut ctl = controller(&hub, None);
		ctl.create().await.unwrap();

		hub.fail_next_create(SurfaceErrorKind::Connection, "connection refused");
		let err = ctl.restart("test").await.unwrap_err();

		assert_eq!(err.verdict, FaultVerdict::SessionFatal);
		assert_eq!(ctl.state(), SessionState::Dead);
		assert!(ctl.surface().is_none());
		assert!(ctl.check_and_refresh().await.is_err());
		assert_eq!(hub.notifications_titled("Session restart failed"), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn unready_application_is_session_fatal() {
		let hub = FakeHub::new();
		hub.hide(&crate::testing::ready_locator());
		let mut ctl = controller(&hub, None);

		let err = ctl.create().await.unwrap_err();

		assert_eq!(err.verdict, FaultVerdict::SessionFatal);
		assert!(err.message.contains("not ready"));
		assert_eq!(hub.count(|c| matches!(c, Call::Destroy(_))), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn creation_failure_uses_classifier_verdict() {
		let hub = FakeHub::new();
		hub.fail_next_create(SurfaceErrorKind::SessionNotCreated, "profile locked");
		let mut ctl = controller(&hub, None);

		let err = ctl.create().await.unwrap_err();
		assert_eq!(err.verdict, FaultVerdict::Unrecoverable);
	}

	#[tokio::test(start_paused = true)]
	async fn teardown_destroys_and_resets_state() {
		let hub = FakeHub::new();
		let mut ctl = controller(&hub, None);
		ctl.create().await.unwrap();

		ctl.teardown().await;

		assert_eq!(ctl.state(), SessionState::Uninitialized);
		assert_eq!(hub.count(|c| matches!(c, Call::Destroy(1))), 1);
	}
}
