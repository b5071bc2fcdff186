use std::io;
use std::path::{Path, PathBuf};

use super::*;
use crate::fault::{FaultVerdict, SignatureClassifier};
use crate::progress::MemoryBackend;
use crate::surface::{Key, SurfaceErrorKind};
use crate::testing::{APP_URL, Call, FakeFactory, FakeHub, RecordingNotifier, ready_locator};

const MESSAGE_BOX: &str = "message box";
const SEARCH_BOX: &str = "search box";

fn config() -> Config {
	let mut config = Config {
		app_url: APP_URL.to_string(),
		max_attempts: 2,
		retry_delay_ms: 10,
		restart_interval_secs: 0,
		settle_delay_ms: 0,
		search_settle_ms: 0,
		pacing: DeliveryPacing::IMMEDIATE,
		..Config::default()
	};
	config.locators.ready = ready_locator();
	config
}

fn orchestrator<B: CheckpointBackend>(
	hub: &FakeHub,
	store: ProgressStore<B>,
	config: &Config,
) -> WorkflowOrchestrator<FakeFactory, B> {
	WorkflowOrchestrator::new(
		FakeFactory::new(hub),
		store,
		config,
		Arc::new(SignatureClassifier::default()),
		Arc::new(RecordingNotifier::new(hub)),
	)
}

fn memory_store() -> ProgressStore<MemoryBackend> {
	ProgressStore::with_backend(MemoryBackend::new()).unwrap()
}

fn ava() -> WorkItem {
	WorkItem::new("+14155550001", "Ava", "Hi\nBye")
}

fn ben() -> WorkItem {
	WorkItem::new("+14155550002", "Ben", "Yo")
}

fn cleo() -> WorkItem {
	WorkItem::new("+14155550003", "Cleo", "Hey")
}

fn submits(hub: &FakeHub) -> usize {
	hub.count(|c| matches!(c, Call::Press(l, Key::Submit) if l == MESSAGE_BOX))
}

#[tokio::test(start_paused = true)]
async fn single_item_is_delivered_and_checkpointed() {
	let hub = FakeHub::new();
	let mut orch = orchestrator(&hub, memory_store(), &config());

	let report = orch.run(&[ava()]).await;

	assert!(report.fatal.is_none());
	let summary = &report.summary;
	assert_eq!((summary.delivered(), summary.failed(), summary.skipped()), (1, 0, 0));

	let press = |k| Call::Press(MESSAGE_BOX.into(), k);
	let message_calls: Vec<Call> = hub
		.calls()
		.into_iter()
		.skip_while(|c| *c != Call::Activate(MESSAGE_BOX.into()))
		.filter(|c| !matches!(c, Call::Resolve(_) | Call::Destroy(_)))
		.collect();
	assert_eq!(
		message_calls,
		vec![
			Call::Activate(MESSAGE_BOX.into()),
			Call::Activate(MESSAGE_BOX.into()),
			press(Key::SelectAll),
			press(Key::Delete),
			Call::Script("Hi".into()),
			press(Key::Paste),
			press(Key::LineBreak),
			Call::Script("Bye".into()),
			press(Key::Paste),
			press(Key::Submit),
		]
	);

	let record = orch.store().get("+14155550001").unwrap();
	assert_eq!(record.display_name, "Ava");
	assert_eq!(record.payload_snapshot, "Hi\nBye");
	assert_eq!(record.sequence_index, 0);
	assert_eq!(hub.count(|c| matches!(c, Call::Destroy(1))), 1);
}

#[tokio::test(start_paused = true)]
async fn conversation_is_opened_by_searching_for_the_key() {
	let hub = FakeHub::new();
	let mut orch = orchestrator(&hub, memory_store(), &config());

	orch.run(&[ben()]).await;

	let opening: Vec<Call> = hub
		.calls()
		.into_iter()
		.filter(|c| !matches!(c, Call::Resolve(_) | Call::Create(_) | Call::Navigate(_)))
		.take(8)
		.collect();
	assert_eq!(
		opening,
		vec![
			Call::Clear(SEARCH_BOX.into()),
			Call::Press(SEARCH_BOX.into(), Key::SelectAll),
			Call::Press(SEARCH_BOX.into(), Key::Delete),
			Call::Type(SEARCH_BOX.into(), "+14155550002".into()),
			Call::Press(SEARCH_BOX.into(), Key::Submit),
			Call::Activate("search results".into()),
			Call::Activate("search result item".into()),
			Call::Activate(MESSAGE_BOX.into()),
		]
	);
}

#[tokio::test(start_paused = true)]
async fn unchanged_checkpoint_skips_without_touching_the_surface() {
	let first_hub = FakeHub::new();
	let mut first = orchestrator(&first_hub, memory_store(), &config());
	first.run(&[ava()]).await;
	let saved = first.into_store().backend().content().unwrap().to_string();

	let hub = FakeHub::new();
	let store = ProgressStore::with_backend(MemoryBackend::with_content(saved)).unwrap();
	let mut orch = orchestrator(&hub, store, &config());
	let report = orch.run(&[ava()]).await;

	let summary = &report.summary;
	assert_eq!((summary.delivered(), summary.failed(), summary.skipped()), (0, 0, 1));
	assert_eq!(summary.items[0].outcome, RunOutcome::Skipped(ALREADY_PROCESSED.into()));
	assert!(hub.calls().is_empty(), "{:?}", hub.calls());
}

#[tokio::test(start_paused = true)]
async fn changed_content_is_delivered_again() {
	let first_hub = FakeHub::new();
	let mut first = orchestrator(&first_hub, memory_store(), &config());
	first.run(&[ava()]).await;
	let saved = first.into_store().backend().content().unwrap().to_string();

	let hub = FakeHub::new();
	let store = ProgressStore::with_backend(MemoryBackend::with_content(saved)).unwrap();
	let mut orch = orchestrator(&hub, store, &config());
	let report = orch.run(&[WorkItem::new("+14155550001", "Ava", "Changed")]).await;

	assert_eq!(report.summary.delivered(), 1);
	assert_eq!(orch.store().get("+14155550001").unwrap().payload_snapshot, "Changed");
}

#[tokio::test(start_paused = true)]
async fn duplicate_key_is_delivered_once_per_run() {
	let hub = FakeHub::new();
	let mut orch = orchestrator(&hub, memory_store(), &config());
	let items = [
		WorkItem::new("+1 415 555 0001", "Ava", "first"),
		WorkItem::new("001-415-555-0001", "Ava", "second"),
	];
	assert_eq!(items[0].key, items[1].key);

	let report = orch.run(&items).await;

	assert_eq!(report.summary.delivered(), 1);
	assert_eq!(report.summary.items[1].outcome, RunOutcome::Skipped(ALREADY_SENT.into()));
	assert_eq!(submits(&hub), 1);
}

#[tokio::test(start_paused = true)]
async fn elapsed_interval_restarts_once_before_next_item() {
	let hub = FakeHub::new();
	let config = Config {
		restart_interval_secs: 3,
		settle_delay_ms: 2_000,
		..config()
	};
	let mut orch = orchestrator(&hub, memory_store(), &config);

	let report = orch.run(&[ava(), ben(), cleo()]).await;

	assert_eq!(report.summary.delivered(), 3);
	assert_eq!(report.summary.restarts, 1);

	let calls = hub.calls();
	let restart = calls.iter().position(|c| *c == Call::Destroy(1)).unwrap();
	let created = calls.iter().position(|c| *c == Call::Create(2)).unwrap();
	let cleo_search = calls
		.iter()
		.position(|c| *c == Call::Type(SEARCH_BOX.into(), "+14155550003".into()))
		.unwrap();
	let ben_submit = calls
		.iter()
		.enumerate()
		.filter(|(_, c)| matches!(c, Call::Press(l, Key::Submit) if l == MESSAGE_BOX))
		.map(|(i, _)| i)
		.nth(1)
		.unwrap();
	assert!(ben_submit < restart && restart < created && created < cleo_search);
	assert_eq!(hub.notifications_titled("Session restart"), 1);
}

#[tokio::test(start_paused = true)]
async fn session_age_resets_after_boundary_restart() {
	let hub = FakeHub::new();
	let config = Config {
		restart_interval_secs: 3,
		..config()
	};
	let mut orch = orchestrator(&hub, memory_store(), &config);
	orch.session.create().await.unwrap();
	tokio::time::advance(std::time::Duration::from_secs(3)).await;

	let (outcome, _) = orch.process_item(0, &ava()).await.unwrap();

	assert_eq!(outcome, RunOutcome::Delivered);
	assert_eq!(orch.session().generation(), 2);
	assert_eq!(orch.session().age(), Some(std::time::Duration::ZERO));
}

#[tokio::test(start_paused = true)]
async fn failed_item_does_not_stop_the_run() {
	let hub = FakeHub::new();
	hub.fail_always(SurfaceErrorKind::NotInteractable, "element not interactable", |c| {
		matches!(c, Call::Type(l, t) if l == SEARCH_BOX && t == "+14155550001")
	});
	let mut orch = orchestrator(&hub, memory_store(), &config());

	let report = orch.run(&[ava(), ben()]).await;

	let summary = &report.summary;
	assert_eq!((summary.delivered(), summary.failed(), summary.skipped()), (1, 1, 0));
	assert_eq!(
		summary.items[0].outcome,
		RunOutcome::Failed("could not search for the recipient".into())
	);
	assert!(orch.store().get("+14155550001").is_none());
	assert!(orch.store().get("+14155550002").is_some());
}

#[tokio::test(start_paused = true)]
async fn item_interrupted_by_restart_is_retried_from_the_start() {
	let hub = FakeHub::new();
	hub.fail_times(1, SurfaceErrorKind::Other, "invalid session id", |c| {
		matches!(c, Call::Press(_, Key::LineBreak))
	});
	hub.fail_times(2, SurfaceErrorKind::NotInteractable, "element not interactable", |c| {
		matches!(c, Call::Press(l, Key::Submit) if l == MESSAGE_BOX)
	});
	let mut orch = orchestrator(&hub, memory_store(), &config());

	let report = orch.run(&[ava()]).await;

	assert_eq!(report.summary.delivered(), 1);
	assert_eq!(report.summary.restarts, 1);
	assert_eq!(hub.count(|c| matches!(c, Call::Type(l, _) if l == SEARCH_BOX)), 2);
	assert_eq!(submits(&hub), 3);
}

#[tokio::test(start_paused = true)]
async fn restart_with_no_item_retries_left_fails_the_item() {
	let hub = FakeHub::new();
	hub.fail_times(1, SurfaceErrorKind::Other, "invalid session id", |c| {
		matches!(c, Call::Press(_, Key::LineBreak))
	});
	hub.fail_times(2, SurfaceErrorKind::NotInteractable, "element not interactable", |c| {
		matches!(c, Call::Press(l, Key::Submit) if l == MESSAGE_BOX)
	});
	let config = Config {
		item_restart_retries: 0,
		..config()
	};
	let mut orch = orchestrator(&hub, memory_store(), &config);

	let report = orch.run(&[ava()]).await;

	assert_eq!(
		report.summary.items[0].outcome,
		RunOutcome::Failed(RESTARTED_DURING_DELIVERY.into())
	);
	assert!(orch.store().is_empty());
}

#[tokio::test(start_paused = true)]
async fn submitted_message_is_not_resent_after_mid_item_restart() {
	let hub = FakeHub::new();
	hub.fail_times(1, SurfaceErrorKind::Connection, "websocket closed", |c| {
		matches!(c, Call::Press(_, Key::Paste))
	});
	let mut orch = orchestrator(&hub, memory_store(), &config());

	let report = orch.run(&[ben()]).await;

	assert_eq!(report.summary.delivered(), 1);
	assert_eq!(submits(&hub), 1);
}

#[tokio::test(start_paused = true)]
async fn fatal_error_returns_partial_summary_and_tears_down() {
	let hub = FakeHub::new();
	hub.fail_always(SurfaceErrorKind::Connection, "websocket closed", |c| {
		matches!(c, Call::Type(l, t) if l == SEARCH_BOX && t == "+14155550002")
	});
	let mut orch = orchestrator(&hub, memory_store(), &config());

	let report = orch.run(&[ava(), ben(), cleo()]).await;

	let fatal = report.fatal.as_ref().unwrap();
	assert_eq!(fatal.verdict, FaultVerdict::SessionFatal);
	let summary = &report.summary;
	assert_eq!(summary.processed(), 1);
	assert_eq!(summary.delivered(), 1);
	assert!(summary.is_aborted());
	assert_eq!(summary.total_items, 3);
	assert_eq!(hub.count(|c| matches!(c, Call::Destroy(2))), 1);
	assert_eq!(hub.notifications_titled("Run aborted"), 1);
	assert!(orch.store().get("+14155550003").is_none());
}

#[tokio::test(start_paused = true)]
async fn session_creation_failure_aborts_before_any_item() {
	let hub = FakeHub::new();
	hub.fail_next_create(SurfaceErrorKind::SessionNotCreated, "user data directory is already in use");
	let mut orch = orchestrator(&hub, memory_store(), &config());

	let report = orch.run(&[ava()]).await;

	assert_eq!(report.fatal.unwrap().verdict, FaultVerdict::Unrecoverable);
	assert_eq!(report.summary.processed(), 0);
	assert!(hub.notifications().iter().any(|(_, _, s)| *s == Severity::Critical));
}

struct ReadOnlyBackend;

impl CheckpointBackend for ReadOnlyBackend {
	fn location(&self) -> &Path {
		Path::new("read-only")
	}

	fn load_raw(&self) -> crate::error::Result<Option<String>> {
		Ok(None)
	}

	fn save_raw(&mut self, _content: &str) -> crate::error::Result<()> {
		Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only").into())
	}

	fn archive(&mut self, _stamp: u64) -> crate::error::Result<Option<PathBuf>> {
		Ok(None)
	}
}

#[tokio::test(start_paused = true)]
async fn checkpoint_failure_keeps_item_delivered_and_still_dedupes() {
	let hub = FakeHub::new();
	let store = ProgressStore::with_backend(ReadOnlyBackend).unwrap();
	let mut orch = orchestrator(&hub, store, &config());

	let report = orch.run(&[ava(), ava()]).await;

	assert_eq!(report.summary.items[0].outcome, RunOutcome::Delivered);
	assert_eq!(report.summary.items[1].outcome, RunOutcome::Skipped(ALREADY_SENT.into()));
	assert_eq!(submits(&hub), 1);
	assert_eq!(hub.notifications_titled("Checkpoint not saved"), 1);
	assert!(orch.store().is_empty());
}
