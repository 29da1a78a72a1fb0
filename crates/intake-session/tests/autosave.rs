//! Autosave orchestrator behavior under a paused clock.
//!
//! Every test runs with `start_paused`, so debounce windows elapse instantly
//! and deterministically while the worker processes commands in order.

use intake_record::{Status, Step};
use intake_session::{
    open_session, RevertTarget, SessionBuilder, SessionConfig, SessionError, SessionEvent,
    SessionSource,
};
use intake_store::{MemoryStore, Store};
use intake_test_utils::{
    guest_path, jane_evaluated, jane_pitched, legacy_raw, mark_sold, queue_path,
    seed_queue_entry, seeded_store, stored, FlakyStore, RecordingStore, SaleRaceStore,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const EDITS: [(&str, &str); 5] = [
    ("customerName", "Jane"),
    ("customerPhone", "555-1234"),
    ("currentCarrier", "Verizon"),
    ("billPain", "overage fees"),
    ("solutionText", "Switch to unlimited plan"),
];

fn guest(store: &MemoryStore, id: &str) -> Value {
    store.get(&guest_path(id)).unwrap_or(Value::Null)
}

fn only_guest_id(store: &MemoryStore) -> String {
    let guests = store.snapshot()["guests"].as_object().cloned().unwrap_or_default();
    assert_eq!(guests.len(), 1, "expected exactly one guest record");
    guests.keys().next().unwrap().clone()
}

#[tokio::test(start_paused = true)]
async fn scenario_f_rapid_inputs_coalesce_into_one_create() {
    let store = Arc::new(RecordingStore::memory());
    let session = open_session(store.clone(), SessionSource::Blank).await.unwrap();

    for (field, value) in EDITS {
        session.input(field, json!(value)).await.unwrap();
        sleep(Duration::from_millis(100)).await;
    }
    assert!(store.pushes().is_empty());

    sleep(Duration::from_secs(5)).await;

    let pushes = store.pushes();
    assert_eq!(pushes.len(), 1);
    assert!(store.record_updates().is_empty());

    let created = &pushes[0];
    assert_eq!(created["customerName"], json!("Jane"));
    assert_eq!(created["customerPhone"], json!("555-1234"));
    assert_eq!(created["evaluation"]["currentCarrier"], json!("Verizon"));
    assert_eq!(created["evaluation"]["billPain"], json!("overage fees"));
    assert_eq!(created["solution"]["text"], json!("Switch to unlimited plan"));
    assert_eq!(created["status"], json!("proposal"));
    assert!(created.get("submittedAt").is_some());
}

#[tokio::test(start_paused = true)]
async fn scenario_f_input_blur_bursts_coalesce_into_one_create() {
    let store = Arc::new(RecordingStore::memory());
    let session = open_session(store.clone(), SessionSource::Blank).await.unwrap();

    for (field, value) in EDITS {
        session.input(field, json!(value)).await.unwrap();
        session.blur().await.unwrap();
        sleep(Duration::from_millis(400)).await;
    }
    assert!(store.pushes().is_empty());

    sleep(Duration::from_millis(300)).await;
    assert_eq!(store.pushes().len(), 1);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(store.pushes().len(), 1);
    assert!(store.record_updates().is_empty());
    assert_eq!(store.pushes()[0]["solution"]["text"], json!("Switch to unlimited plan"));
}

#[tokio::test(start_paused = true)]
async fn completion_snapshot_follows_commit() {
    let store = Arc::new(RecordingStore::memory());
    let session = open_session(store.clone(), SessionSource::Blank).await.unwrap();

    session.input("customerName", json!("Jane")).await.unwrap();
    session.input("customerPhone", json!("555-1234")).await.unwrap();
    session.input("currentCarrier", json!("Verizon")).await.unwrap();
    session.blur().await.unwrap();

    sleep(Duration::from_millis(700)).await;
    assert_eq!(store.pushes().len(), 1);
    assert!(store.completion_updates().is_empty());

    sleep(Duration::from_millis(1000)).await;
    assert_eq!(store.completion_updates().len(), 1);

    let id = only_guest_id(store.inner());
    let completion = &guest(store.inner(), &id)["completion"];
    assert_eq!(completion["pct"], json!(27));
    assert_eq!(completion["steps"]["step1"], json!({"earned": 15, "max": 15}));
    assert!(completion.get("fields").is_none());
}

#[tokio::test(start_paused = true)]
async fn snapshot_fields_when_configured() {
    let store = Arc::new(MemoryStore::new());
    let session = SessionBuilder::new(store.clone())
        .config(SessionConfig::new().with_snapshot_fields(true))
        .open(SessionSource::Blank)
        .await
        .unwrap();

    session.input("customerName", json!("Jane")).await.unwrap();
    session.flush().await.unwrap();

    let id = only_guest_id(&store);
    let fields = &guest(&store, &id)["completion"]["fields"];
    assert_eq!(fields["customerName"], json!({"ok": true, "weight": 8}));
    assert_eq!(fields["solutionText"], json!({"ok": false, "weight": 25}));
}

#[tokio::test(start_paused = true)]
async fn later_edits_patch_only_changed_sections() {
    let store = Arc::new(RecordingStore::new(seeded_store([("g1", stored(&jane_evaluated()))])));
    let session = open_session(store.clone(), SessionSource::Existing("g1".into()))
        .await
        .unwrap();
    assert_eq!(session.view().step, Step::Step2);

    session.input("lineCount", json!(3)).await.unwrap();
    session.blur().await.unwrap();
    sleep(Duration::from_secs(1)).await;

    let updates = store.record_updates();
    assert_eq!(updates.len(), 1);
    let mut paths: Vec<String> = updates[0].paths().map(ToString::to_string).collect();
    paths.sort();
    // Inferred status is backfilled on the first save.
    assert_eq!(
        paths,
        vec!["/guests/g1/evaluation", "/guests/g1/status", "/guests/g1/updatedAt"]
    );

    let record = guest(store.inner(), "g1");
    assert_eq!(record["evaluation"], json!({"currentCarrier": "Verizon", "lineCount": 3}));
    assert_eq!(record["customerName"], json!("Jane"));
    assert_eq!(record["status"], json!("working"));
}

#[tokio::test(start_paused = true)]
async fn save_failure_keeps_draft_and_retry_succeeds() {
    let store = Arc::new(FlakyStore::new(MemoryStore::new()));
    store.set_offline(true);
    let session = open_session(store.clone(), SessionSource::Blank).await.unwrap();
    let mut events = session.events();

    session.input("customerName", json!("Jane")).await.unwrap();
    session.input("currentCarrier", json!("Verizon")).await.unwrap();
    sleep(Duration::from_secs(4)).await;

    let view = session.view();
    assert!(view.dirty);
    assert!(view.record_id.is_none());
    assert!(view.last_error.is_some());
    assert_eq!(store.inner().snapshot(), json!({}));

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::SaveFailed { retryable, .. } = event {
            assert!(retryable);
            saw_failure = true;
        }
    }
    assert!(saw_failure);

    // No automatic retry.
    sleep(Duration::from_secs(10)).await;
    assert_eq!(store.failures(), 1);

    let err = session.retry().await.unwrap_err();
    assert!(matches!(err, SessionError::Store(_)));

    store.set_offline(false);
    session.retry().await.unwrap();

    let view = session.view();
    assert!(!view.dirty);
    assert!(view.last_error.is_none());
    let id = only_guest_id(store.inner());
    assert_eq!(view.record_id.map(|r| r.to_string()), Some(id.clone()));
    assert_eq!(guest(store.inner(), &id)["evaluation"]["currentCarrier"], json!("Verizon"));
}

#[tokio::test(start_paused = true)]
async fn commit_advances_but_never_regresses_step() {
    let store = Arc::new(MemoryStore::new());
    let session = open_session(store.clone(), SessionSource::Blank).await.unwrap();
    assert_eq!(session.view().step, Step::Step1);

    session.input("customerName", json!("Jane")).await.unwrap();
    session.input("currentCarrier", json!("Verizon")).await.unwrap();
    session.flush().await.unwrap();
    assert_eq!(session.view().step, Step::Step2);

    session.navigate(Step::Step3).await.unwrap();
    session.input("currentCarrier", json!("")).await.unwrap();
    session.flush().await.unwrap();

    let view = session.view();
    assert_eq!(view.status, Status::New);
    assert_eq!(view.step, Step::Step3);
}

#[tokio::test(start_paused = true)]
async fn manual_navigation_can_go_back() {
    let store = Arc::new(seeded_store([("g1", stored(&jane_pitched()))]));
    let session = open_session(store, SessionSource::Existing("g1".into()))
        .await
        .unwrap();
    assert_eq!(session.view().step, Step::Step3);

    session.navigate(Step::Step1).await.unwrap();
    sleep(Duration::from_millis(1)).await;
    assert_eq!(session.view().step, Step::Step1);
}

#[tokio::test(start_paused = true)]
async fn revert_to_step1_clears_and_pins_new() {
    let store = Arc::new(RecordingStore::new(seeded_store([("g1", stored(&jane_pitched()))])));
    let session = open_session(store.clone(), SessionSource::Existing("g1".into()))
        .await
        .unwrap();

    session.revert(RevertTarget::Step1).await.unwrap();

    let record = guest(store.inner(), "g1");
    assert!(record.get("evaluation").is_none());
    assert!(record.get("solution").is_none());
    assert_eq!(record["status"], json!("new"));
    assert_eq!(record["customerName"], json!("Jane"));
    assert_eq!(record["completion"]["pct"], json!(15));

    assert_eq!(store.record_updates().len(), 1);
    assert_eq!(store.completion_updates().len(), 1);

    let view = session.view();
    assert_eq!(view.step, Step::Step1);
    assert_eq!(view.status, Status::New);
    assert!(!view.dirty);
}

#[tokio::test(start_paused = true)]
async fn revert_to_step2_keeps_evaluation() {
    let store = Arc::new(seeded_store([("g1", stored(&jane_pitched()))]));
    let session = open_session(store.clone(), SessionSource::Existing("g1".into()))
        .await
        .unwrap();

    session.revert(RevertTarget::Step2).await.unwrap();

    let record = guest(&store, "g1");
    assert!(record.get("solution").is_none());
    assert_eq!(record["evaluation"]["currentCarrier"], json!("Verizon"));
    assert_eq!(record["status"], json!("working"));
    assert_eq!(session.view().step, Step::Step2);

    // The pin lasts until the next edit; then status follows the data again.
    session.input("solutionText", json!("Bundle two lines")).await.unwrap();
    session.flush().await.unwrap();
    assert_eq!(guest(&store, "g1")["status"], json!("proposal"));
    assert_eq!(session.view().step, Step::Step3);
}

#[tokio::test(start_paused = true)]
async fn revert_of_unsaved_draft_writes_nothing() {
    let store = Arc::new(RecordingStore::memory());
    let session = open_session(store.clone(), SessionSource::Blank).await.unwrap();

    session.input("solutionText", json!("Bundle")).await.unwrap();
    session.revert(RevertTarget::Step2).await.unwrap();

    assert!(store.calls().is_empty());
    assert_eq!(session.view().step, Step::Step2);
}

#[tokio::test(start_paused = true)]
async fn remote_sold_pins_status_without_touching_draft() {
    let store = Arc::new(seeded_store([("g1", stored(&jane_pitched()))]));
    let session = open_session(store.clone(), SessionSource::Existing("g1".into()))
        .await
        .unwrap();
    let mut events = session.events();

    session.input("billPain", json!("roaming charges")).await.unwrap();
    mark_sold(store.as_ref(), "g1").await.unwrap();
    sleep(Duration::from_millis(10)).await;

    let view = session.view();
    assert_eq!(view.status, Status::Sold);
    assert_eq!(view.step, Step::Step3);

    sleep(Duration::from_secs(5)).await;
    let record = guest(&store, "g1");
    assert_eq!(record["status"], json!("sold"));
    assert_eq!(record["sale"]["saleId"], json!("S-1001"));
    assert_eq!(record["evaluation"]["billPain"], json!("roaming charges"));

    let mut pinned = false;
    while let Ok(event) = events.try_recv() {
        pinned |= event == SessionEvent::StatusPinned(Status::Sold);
    }
    assert!(pinned);
}

#[tokio::test(start_paused = true)]
async fn sold_landing_between_status_read_and_write_is_restored() {
    let store = Arc::new(SaleRaceStore::new(seeded_store([(
        "g1",
        stored(&jane_evaluated()),
    )])));
    let session = open_session(store.clone(), SessionSource::Existing("g1".into()))
        .await
        .unwrap();

    session.input("lineCount", json!(3)).await.unwrap();
    session.flush().await.unwrap();
    assert!(store.fired());

    sleep(Duration::from_secs(5)).await;
    let record = guest(store.inner(), "g1");
    assert_eq!(record["status"], json!("sold"));
    assert_eq!(record["sale"]["saleId"], json!("S-1001"));
    assert_eq!(record["evaluation"]["lineCount"], json!(3));

    let view = session.view();
    assert_eq!(view.status, Status::Sold);
    assert!(!view.dirty);
}

const LEGACY_KEYS: [&str; 4] = ["guestName", "phone", "currentCarrier", "lineCount"];

#[tokio::test(start_paused = true)]
async fn legacy_record_is_rewritten_canonically_on_first_save() {
    let store = Arc::new(seeded_store([("g1", legacy_raw())]));
    let session = open_session(store.clone(), SessionSource::Existing("g1".into()))
        .await
        .unwrap();
    let view = session.view();
    assert_eq!(view.step, Step::Step3);
    assert_eq!(view.status, Status::Proposal);
    assert!(view.dirty);

    session.dispose().await.unwrap();

    let record = guest(&store, "g1");
    assert_eq!(record["customerName"], json!("Sam"));
    assert_eq!(record["customerPhone"], json!("555-9876"));
    assert_eq!(
        record["evaluation"],
        json!({"currentCarrier": "T-Mobile", "lineCount": "4"})
    );
    assert_eq!(record["solution"], json!({"text": "Family plan with two upgrades"}));
    assert_eq!(record["status"], json!("proposal"));
    assert_eq!(record["notes"], json!("prefers texts"));
    for key in LEGACY_KEYS {
        assert!(record.get(key).is_none(), "legacy key {key} left behind");
    }

    let reopened = open_session(store.clone(), SessionSource::Existing("g1".into()))
        .await
        .unwrap();
    assert!(!reopened.view().dirty);
}

#[tokio::test(start_paused = true)]
async fn legacy_record_revert_survives_reload() {
    let store = Arc::new(seeded_store([("g1", legacy_raw())]));
    let session = open_session(store.clone(), SessionSource::Existing("g1".into()))
        .await
        .unwrap();

    session.revert(RevertTarget::Step1).await.unwrap();
    session.dispose().await.unwrap();

    let record = guest(&store, "g1");
    assert!(record.get("evaluation").is_none());
    assert!(record.get("solution").is_none());
    assert_eq!(record["status"], json!("new"));
    assert_eq!(record["customerName"], json!("Sam"));
    assert_eq!(record["completion"]["pct"], json!(15));
    for key in LEGACY_KEYS {
        assert!(record.get(key).is_none(), "legacy key {key} left behind");
    }

    let reopened = open_session(store.clone(), SessionSource::Existing("g1".into()))
        .await
        .unwrap();
    let view = reopened.view();
    assert_eq!(view.status, Status::New);
    assert_eq!(view.preview_pct, 15);
    assert!(!view.dirty);
}

#[tokio::test(start_paused = true)]
async fn queue_entry_seeds_and_links() {
    let store = Arc::new(MemoryStore::new());
    seed_queue_entry(store.as_ref(), "q1", "Jane", "555-1234").await;

    let session = open_session(store.clone(), SessionSource::Queue("q1".into()))
        .await
        .unwrap();
    let view = session.view();
    assert_eq!(view.step, Step::Step2);
    assert_eq!(view.preview_pct, 15);

    session.input("currentCarrier", json!("Verizon")).await.unwrap();
    session.dispose().await.unwrap();

    let id = only_guest_id(&store);
    assert_eq!(
        store.get(&queue_path().child("q1").child("guestId")),
        Some(json!(id))
    );
    assert_eq!(guest(&store, &id)["customerName"], json!("Jane"));

    // Reopening the linked entry opens the record instead of a new draft.
    let reopened = open_session(store.clone(), SessionSource::Queue("q1".into()))
        .await
        .unwrap();
    assert_eq!(reopened.view().record_id.map(|r| r.to_string()), Some(id));
}

#[tokio::test(start_paused = true)]
async fn dispose_flushes_pending_edits() {
    let store = Arc::new(RecordingStore::memory());
    let session = open_session(store.clone(), SessionSource::Blank).await.unwrap();

    session.input("customerName", json!("Jane")).await.unwrap();
    session.dispose().await.unwrap();

    assert_eq!(store.pushes().len(), 1);
    assert_eq!(store.completion_updates().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_last_handle_flushes() {
    let store = Arc::new(RecordingStore::memory());
    let session = open_session(store.clone(), SessionSource::Blank).await.unwrap();
    let other = session.clone();

    session.input("customerName", json!("Jane")).await.unwrap();
    drop(session);
    sleep(Duration::from_millis(1)).await;
    assert!(store.pushes().is_empty());

    drop(other);
    sleep(Duration::from_millis(1)).await;
    assert_eq!(store.pushes().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn blank_session_never_writes_empty_record() {
    let store = Arc::new(RecordingStore::memory());
    let session = open_session(store.clone(), SessionSource::Blank).await.unwrap();

    session.input("customerName", json!("  ")).await.unwrap();
    session.blur().await.unwrap();
    sleep(Duration::from_secs(5)).await;
    session.dispose().await.unwrap();

    assert!(store.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_field_is_rejected() {
    let session = open_session(Arc::new(MemoryStore::new()), SessionSource::Blank)
        .await
        .unwrap();
    let err = session.input("shoeSize", json!(9)).await.unwrap_err();
    assert!(matches!(err, SessionError::UnknownField(name) if name == "shoeSize"));
}

#[tokio::test(start_paused = true)]
async fn missing_sources_fail_to_open() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    assert!(matches!(
        open_session(store.clone(), SessionSource::Existing("nope".into())).await,
        Err(SessionError::RecordNotFound(_))
    ));
    assert!(matches!(
        open_session(store.clone(), SessionSource::Queue("nope".into())).await,
        Err(SessionError::QueueEntryNotFound(_))
    ));
    assert!(matches!(
        open_session(store, SessionSource::Existing("a.b".into())).await,
        Err(SessionError::InvalidKey(_))
    ));
}
