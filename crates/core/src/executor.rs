//! Classified retry around single surface interactions.
//!
//! [`ActionExecutor`] resolves a locator, applies one [`Action`] and decides
//! from the [`FaultVerdict`] of any fault whether to retry in place, restart
//! the session, or give up.

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, trace, warn};

use crate::config::Config;
use crate::fault::{FatalError, FaultClassifier, FaultVerdict};
use crate::notify::{Notifier, Severity};
use crate::session::SessionController;
use crate::surface::{Action, Locator, RemoteSurface, SessionFactory, SurfaceError, SurfaceErrorKind, SurfaceResult};

/// Retry limits for one executor call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total attempts for transient faults, including the first.
	pub max_attempts: u32,
	pub delay: Duration,
	/// Session restarts one call may trigger.
	pub max_session_restarts: u32,
}

impl RetryPolicy {
	pub fn from_config(config: &Config) -> Self {
		Self {
			max_attempts: config.max_attempts.max(1),
			delay: config.retry_delay(),
			max_session_restarts: config.max_session_restarts_per_action,
		}
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::from_config(&Config::default())
	}
}

/// Budget left in one executor call. Never outlives the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryContext {
	pub attempts_remaining: u32,
	pub backoff_delay: Duration,
	pub session_restarts_remaining: u32,
}

impl RetryContext {
	fn new(policy: &RetryPolicy) -> Self {
		Self {
			attempts_remaining: policy.max_attempts.max(1),
			backoff_delay: policy.delay,
			session_restarts_remaining: policy.max_session_restarts,
		}
	}
}

enum Operation<'o> {
	Element { locator: &'o Locator, action: &'o Action },
	Script { source: &'o str, args: &'o [Value] },
}

impl fmt::Display for Operation<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Operation::Element { locator, action } => write!(f, "{action} on {locator}"),
			Operation::Script { .. } => f.write_str("script"),
		}
	}
}

/// Runs surface interactions with classified retry.
pub struct ActionExecutor<'a, F: SessionFactory> {
	session: &'a mut SessionController<F>,
	classifier: &'a dyn FaultClassifier,
	notifier: &'a dyn Notifier,
	policy: RetryPolicy,
	element_timeout: Duration,
}

impl<'a, F: SessionFactory> ActionExecutor<'a, F> {
	pub fn new(
		session: &'a mut SessionController<F>,
		classifier: &'a dyn FaultClassifier,
		notifier: &'a dyn Notifier,
		policy: RetryPolicy,
		element_timeout: Duration,
	) -> Self {
		Self {
			session,
			classifier,
			notifier,
			policy,
			element_timeout,
		}
	}

	pub fn session(&self) -> &SessionController<F> {
		self.session
	}

	/// Resolves `locator` and applies `action` to it.
	///
	/// `Ok(false)` means transient retries ran out; the caller decides what
	/// that means for the item. `Err` means the workflow must stop.
	pub async fn perform(&mut self, locator: &Locator, action: Action) -> Result<bool, FatalError> {
		self.execute(Operation::Element { locator, action: &action }).await
	}

	/// Runs a script in the page with the same retry rules as [`perform`](Self::perform).
	pub async fn run_script(&mut self, script: &str, args: Vec<Value>) -> Result<bool, FatalError> {
		self.execute(Operation::Script { source: script, args: &args }).await
	}

	async fn execute(&mut self, op: Operation<'_>) -> Result<bool, FatalError> {
		let mut ctx = RetryContext::new(&self.policy);

		loop {
			self.session.check_and_refresh().await?;

			let fault = match self.attempt(&op).await {
				Ok(()) => return Ok(true),
				Err(fault) => fault,
			};

			let verdict = self.classifier.classify(&fault);
			match verdict {
				FaultVerdict::Unrecoverable => {
					error!(target: "courier.exec", op = %op, error = %fault, "unrecoverable fault");
					self.notifier.notify("Unrecoverable fault", &fault.to_string(), Severity::Critical);
					return Err(FatalError::from_fault(verdict, &fault));
				}
				FaultVerdict::SessionFatal => {
					if ctx.session_restarts_remaining == 0 {
						error!(target: "courier.exec", op = %op, error = %fault, "session lost again after restart");
						self.notifier.notify("Session lost", &fault.to_string(), Severity::Critical);
						return Err(FatalError::from_fault(verdict, &fault));
					}
					ctx.session_restarts_remaining -= 1;
					warn!(target: "courier.exec", op = %op, error = %fault, "session-fatal fault; restarting");
					self.session.restart(&format!("{op} failed: {}", fault.message)).await?;
				}
				FaultVerdict::Transient => {
					ctx.attempts_remaining = ctx.attempts_remaining.saturating_sub(1);
					if ctx.attempts_remaining == 0 {
						warn!(
							target: "courier.exec",
							op = %op,
							attempts = self.policy.max_attempts,
							error = %fault,
							"retries exhausted"
						);
						self.notifier.notify(
							"Action failed",
							&format!("{op} failed after {} attempts: {fault}", self.policy.max_attempts),
							Severity::Warning,
						);
						return Ok(false);
					}
					debug!(
						target: "courier.exec",
						op = %op,
						remaining = ctx.attempts_remaining,
						error = %fault,
						"transient fault; retrying"
					);
					tokio::time::sleep(ctx.backoff_delay).await;
				}
			}
		}
	}

	async fn attempt(&self, op: &Operation<'_>) -> SurfaceResult<()> {
		let Some(surface) = self.session.surface() else {
			return Err(SurfaceError::new(SurfaceErrorKind::Connection, "no active session"));
		};

		match op {
			Operation::Element { locator, action } => {
				let element = surface
					.resolve(locator, self.element_timeout)
					.await?
					.ok_or_else(|| SurfaceError::not_found(locator))?;
				let outcome = match action {
					Action::Activate => surface.activate(&element).await,
					Action::Clear => surface.clear(&element).await,
					Action::Type(text) => surface.type_text(&element, text).await,
					Action::Press(key) => surface.press(&element, *key).await,
				};
				if let Err(e) = surface.release(element).await {
					trace!(target: "courier.exec", error = %e, "element release failed");
				}
				outcome
			}
			Operation::Script { source, args } => surface.execute_script(source, args.to_vec()).await.map(|_| ()),
		}
	}
}
