//! Scripted fake surface shared by the unit tests.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::fault::{FaultClassifier, SignatureClassifier};
use crate::notify::{Notifier, Severity};
use crate::session::{SessionController, SessionSettings};
use crate::surface::{
	ElementHandle, Key, Locator, RemoteSurface, SessionFactory, SurfaceError, SurfaceErrorKind, SurfaceResult,
};

pub const APP_URL: &str = "https://app.test/";

/// Everything the fake surface was asked to do. Element calls carry the label
/// of the locator the element was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
	Create(u32),
	Destroy(u32),
	Navigate(String),
	Resolve(String),
	Activate(String),
	Clear(String),
	Type(String, String),
	Press(String, Key),
	/// First script argument, if it was a string.
	Script(String),
}

struct Rule {
	remaining: Option<u32>,
	error: SurfaceError,
	matcher: Box<dyn Fn(&Call) -> bool + Send>,
}

#[derive(Default)]
struct HubState {
	calls: Vec<Call>,
	rules: Vec<Rule>,
	hidden: HashSet<String>,
	create_failures: VecDeque<SurfaceError>,
	next_session: u32,
	released: Vec<String>,
	notifications: Vec<(String, String, Severity)>,
}

/// Shared state behind every fake session a test creates.
#[derive(Clone, Default)]
pub struct FakeHub {
	state: Arc<Mutex<HubState>>,
}

impl FakeHub {
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> MutexGuard<'_, HubState> {
		self.state.lock().unwrap()
	}

	pub fn calls(&self) -> Vec<Call> {
		self.lock().calls.clone()
	}

	pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
		self.lock().calls.iter().filter(|c| pred(c)).count()
	}

	/// Session creation, destruction and navigation only.
	pub fn lifecycle(&self) -> Vec<Call> {
		self.lock()
			.calls
			.iter()
			.filter(|c| matches!(c, Call::Create(_) | Call::Destroy(_) | Call::Navigate(_)))
			.cloned()
			.collect()
	}

	/// Labels of released element handles, in release order.
	pub fn released(&self) -> Vec<String> {
		self.lock().released.clone()
	}

	/// Makes `locator` resolve to nothing.
	pub fn hide(&self, locator: &Locator) {
		self.lock().hidden.insert(locator.label.clone());
	}

	pub fn fail_times(
		&self,
		times: u32,
		kind: SurfaceErrorKind,
		message: &str,
		matcher: impl Fn(&Call) -> bool + Send + 'static,
	) {
		self.push_rule(Some(times), kind, message, matcher);
	}

	pub fn fail_always(&self, kind: SurfaceErrorKind, message: &str, matcher: impl Fn(&Call) -> bool + Send + 'static) {
		self.push_rule(None, kind, message, matcher);
	}

	fn push_rule(
		&self,
		remaining: Option<u32>,
		kind: SurfaceErrorKind,
		message: &str,
		matcher: impl Fn(&Call) -> bool + Send + 'static,
	) {
		self.lock().rules.push(Rule {
			remaining,
			error: SurfaceError::new(kind, message),
			matcher: Box::new(matcher),
		});
	}

	pub fn fail_next_create(&self, kind: SurfaceErrorKind, message: &str) {
		self.lock().create_failures.push_back(SurfaceError::new(kind, message));
	}

	pub fn notifications(&self) -> Vec<(String, String, Severity)> {
		self.lock().notifications.clone()
	}

	pub fn notifications_titled(&self, title: &str) -> usize {
		self.lock().notifications.iter().filter(|(t, ..)| t == title).count()
	}

	/// Logs `call` and applies the first live failure rule that matches it.
	fn record(&self, call: Call) -> SurfaceResult<()> {
		let mut state = self.lock();
		state.calls.push(call.clone());
		for rule in state.rules.iter_mut() {
			if rule.remaining == Some(0) || !(rule.matcher)(&call) {
				continue;
			}
			if let Some(n) = rule.remaining.as_mut() {
				*n -= 1;
			}
			return Err(rule.error.clone());
		}
		Ok(())
	}
}

pub struct FakeSurface {
	id: u32,
	hub: FakeHub,
}

#[async_trait]
impl RemoteSurface for FakeSurface {
	async fn navigate(&self, url: &str) -> SurfaceResult<()> {
		self.hub.record(Call::Navigate(url.to_string()))
	}

	async fn resolve(&self, locator: &Locator, _timeout: Duration) -> SurfaceResult<Option<ElementHandle>> {
		self.hub.record(Call::Resolve(locator.label.clone()))?;
		if self.hub.lock().hidden.contains(&locator.label) {
			return Ok(None);
		}
		Ok(Some(ElementHandle::new(locator.label.clone())))
	}

	async fn activate(&self, element: &ElementHandle) -> SurfaceResult<()> {
		self.hub.record(Call::Activate(element.id().to_string()))
	}

	async fn type_text(&self, element: &ElementHandle, text: &str) -> SurfaceResult<()> {
		self.hub.record(Call::Type(element.id().to_string(), text.to_string()))
	}

	async fn clear(&self, element: &ElementHandle) -> SurfaceResult<()> {
		self.hub.record(Call::Clear(element.id().to_string()))
	}

	async fn press(&self, element: &ElementHandle, key: Key) -> SurfaceResult<()> {
		self.hub.record(Call::Press(element.id().to_string(), key))
	}

	async fn execute_script(&self, _script: &str, args: Vec<Value>) -> SurfaceResult<Value> {
		let first = args.first().and_then(Value::as_str).unwrap_or_default().to_string();
		self.hub.record(Call::Script(first))?;
		Ok(Value::Bool(true))
	}

	async fn release(&self, element: ElementHandle) -> SurfaceResult<()> {
		self.hub.lock().released.push(element.id().to_string());
		Ok(())
	}
}

pub struct FakeFactory {
	hub: FakeHub,
}

impl FakeFactory {
	pub fn new(hub: &FakeHub) -> Self {
		Self { hub: hub.clone() }
	}
}

#[async_trait]
impl SessionFactory for FakeFactory {
	type Surface = FakeSurface;

	async fn create(&mut self) -> SurfaceResult<Self::Surface> {
		let mut state = self.hub.lock();
		if let Some(err) = state.create_failures.pop_front() {
			return Err(err);
		}
		state.next_session += 1;
		let id = state.next_session;
		state.calls.push(Call::Create(id));
		Ok(FakeSurface {
			id,
			hub: self.hub.clone(),
		})
	}

	async fn destroy(&mut self, surface: Self::Surface) -> SurfaceResult<()> {
		self.hub.record(Call::Destroy(surface.id))
	}
}

/// Notifier that records into the hub.
#[derive(Clone)]
pub struct RecordingNotifier {
	hub: FakeHub,
}

impl RecordingNotifier {
	pub fn new(hub: &FakeHub) -> Self {
		Self { hub: hub.clone() }
	}
}

impl Notifier for RecordingNotifier {
	fn notify(&self, title: &str, message: &str, severity: Severity) {
		self.hub
			.lock()
			.notifications
			.push((title.to_string(), message.to_string(), severity));
	}
}

pub fn ready_locator() -> Locator {
	Locator::css("ready", "#ready")
}

pub fn session_settings(restart_interval: Option<Duration>) -> SessionSettings {
	SessionSettings {
		app_url: APP_URL.to_string(),
		ready_locator: ready_locator(),
		ready_timeout: Duration::from_secs(5),
		restart_interval,
	}
}

pub fn controller(hub: &FakeHub, restart_interval: Option<Duration>) -> SessionController<FakeFactory> {
	let classifier: Arc<dyn FaultClassifier> = Arc::new(SignatureClassifier::default());
	let notifier: Arc<dyn Notifier> = Arc::new(RecordingNotifier::new(hub));
	SessionController::new(FakeFactory::new(hub), session_settings(restart_interval), classifier, notifier)
}

pub fn executor_parts(hub: &FakeHub) -> (SignatureClassifier, RecordingNotifier) {
	(SignatureClassifier::default(), RecordingNotifier::new(hub))
}
