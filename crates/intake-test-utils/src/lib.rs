//! Testing utilities for the guest intake workspace
//!
//! Shared fixtures, store wrappers that record or fail calls, and a stand-in
//! for the external "mark sold" actor.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use intake_record::{GuestRecord, Status, StatusMark};
use intake_store::{
    MemoryStore, Store, StoreError, StorePath, StoreResult, Subscription, UpdateBatch,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const GUESTS: &str = "guests";
pub const QUEUE: &str = "intakeQueue";

pub fn guests_path() -> StorePath {
    StorePath::root().child(GUESTS)
}

pub fn queue_path() -> StorePath {
    StorePath::root().child(QUEUE)
}

pub fn guest_path(id: &str) -> StorePath {
    guests_path().child(id)
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Scenario B: customer info only
pub fn jane() -> GuestRecord {
    GuestRecord::new()
        .with_customer_name("Jane")
        .with_customer_phone("555-1234")
}

/// Scenario C: carrier captured
pub fn jane_evaluated() -> GuestRecord {
    jane().with_evaluation("currentCarrier", json!("Verizon"))
}

/// Scenario D: solution pitched
pub fn jane_pitched() -> GuestRecord {
    jane_evaluated().with_solution_text("Switch to unlimited plan")
}

/// Scenario E: sold by an external actor
pub fn jane_sold() -> GuestRecord {
    jane_pitched().with_status(StatusMark::Explicit(Status::Sold))
}

/// Legacy flat record as older clients stored it
pub fn legacy_raw() -> Value {
    json!({
        "guestName": "Sam",
        "phone": "555-9876",
        "currentCarrier": "T-Mobile",
        "lineCount": "4",
        "solution": "Family plan with two upgrades",
        "status": "proposal",
        "notes": "prefers texts"
    })
}

/// Canonical wire form of a stored record
pub fn stored(record: &GuestRecord) -> Value {
    serde_json::to_value(record).unwrap()
}

/// Store seeded with `records` under `guests/<id>`
pub fn seeded_store<'a>(records: impl IntoIterator<Item = (&'a str, Value)>) -> MemoryStore {
    let guests: serde_json::Map<String, Value> = records
        .into_iter()
        .map(|(id, value)| (id.to_string(), value))
        .collect();
    MemoryStore::with_data(json!({ GUESTS: guests }))
}

/// Seed an intake-queue entry
pub async fn seed_queue_entry<S: Store + ?Sized>(store: &S, key: &str, name: &str, phone: &str) {
    store
        .update(UpdateBatch::new().set(
            queue_path().child(key),
            json!({
                "customerName": name,
                "customerPhone": phone,
                "createdAt": Utc.with_ymd_and_hms(2024, 5, 1, 15, 0, 0).unwrap(),
            }),
        ))
        .await
        .unwrap();
}

/// The external sale action: pins `sold` and records the sale
pub async fn mark_sold<S: Store + ?Sized>(store: &S, id: &str) -> StoreResult<()> {
    let record = guest_path(id);
    store
        .update(
            UpdateBatch::new()
                .set(record.child("status"), json!("sold"))
                .set(
                    record.child("sale"),
                    json!({"saleId": "S-1001", "storeNumber": "0042", "units": 2}),
                ),
        )
        .await
}

// ---------------------------------------------------------------------------
// RecordingStore
// ---------------------------------------------------------------------------

/// One call made against a [`RecordingStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Read(StorePath),
    Update(UpdateBatch),
    Push { parent: StorePath, value: Value },
}

/// Store wrapper that logs every call before delegating
#[derive(Debug, Default)]
pub struct RecordingStore<S = MemoryStore> {
    inner: S,
    calls: Mutex<Vec<StoreCall>>,
}

impl<S: Store> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn pushes(&self) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                StoreCall::Push { value, .. } => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<UpdateBatch> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                StoreCall::Update(batch) => Some(batch.clone()),
                _ => None,
            })
            .collect()
    }

    /// Updates other than completion snapshots and queue links
    pub fn record_updates(&self) -> Vec<UpdateBatch> {
        self.updates()
            .into_iter()
            .filter(|b| {
                b.paths().any(|p| {
                    p.segments().first().map(String::as_str) == Some(GUESTS)
                        && p.last() != Some("completion")
                })
            })
            .collect()
    }

    /// Updates writing a completion snapshot
    pub fn completion_updates(&self) -> Vec<UpdateBatch> {
        self.updates()
            .into_iter()
            .filter(|b| b.paths().any(|p| p.last() == Some("completion")))
            .collect()
    }

    fn log(&self, call: StoreCall) {
        self.calls.lock().push(call);
    }
}

impl RecordingStore<MemoryStore> {
    pub fn memory() -> Self {
        Self::new(MemoryStore::new())
    }

    pub fn snapshot(&self) -> Value {
        self.inner.snapshot()
    }
}

#[async_trait]
impl<S: Store> Store for RecordingStore<S> {
    async fn read(&self, path: &StorePath) -> StoreResult<Option<Value>> {
        self.log(StoreCall::Read(path.clone()));
        self.inner.read(path).await
    }

    async fn update(&self, batch: UpdateBatch) -> StoreResult<()> {
        self.log(StoreCall::Update(batch.clone()));
        self.inner.update(batch).await
    }

    async fn push(&self, parent: &StorePath, value: Value) -> StoreResult<String> {
        self.log(StoreCall::Push {
            parent: parent.clone(),
            value: value.clone(),
        });
        self.inner.push(parent, value).await
    }

    fn subscribe(&self, path: &StorePath) -> Subscription {
        self.inner.subscribe(path)
    }
}

// ---------------------------------------------------------------------------
// FlakyStore
// ---------------------------------------------------------------------------

/// Store wrapper whose writes fail while offline or for the next N calls
///
/// Reads and subscriptions always pass through.
#[derive(Debug, Default)]
pub struct FlakyStore<S = MemoryStore> {
    inner: S,
    offline: AtomicBool,
    fail_next: AtomicUsize,
    failures: AtomicUsize,
}

impl<S: Store> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            offline: AtomicBool::new(false),
            fail_next: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    fn check(&self) -> StoreResult<()> {
        let scheduled = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scheduled || self.offline.load(Ordering::SeqCst) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("simulated outage".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: Store> Store for FlakyStore<S> {
    async fn read(&self, path: &StorePath) -> StoreResult<Option<Value>> {
        self.inner.read(path).await
    }

    async fn update(&self, batch: UpdateBatch) -> StoreResult<()> {
        self.check()?;
        self.inner.update(batch).await
    }

    async fn push(&self, parent: &StorePath, value: Value) -> StoreResult<String> {
        self.check()?;
        self.inner.push(parent, value).await
    }

    fn subscribe(&self, path: &StorePath) -> Subscription {
        self.inner.subscribe(path)
    }
}

// ---------------------------------------------------------------------------
// SaleRaceStore
// ---------------------------------------------------------------------------

/// Store wrapper that lands the external sale right after the first read of
/// a record's status, so a status write that follows overwrites it
#[derive(Debug)]
pub struct SaleRaceStore<S = MemoryStore> {
    inner: S,
    armed: AtomicBool,
}

impl<S: Store> SaleRaceStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(true),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Whether the sale has landed
    pub fn fired(&self) -> bool {
        !self.armed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: Store> Store for SaleRaceStore<S> {
    async fn read(&self, path: &StorePath) -> StoreResult<Option<Value>> {
        let value = self.inner.read(path).await?;
        if path.last() == Some("status") && self.armed.swap(false, Ordering::SeqCst) {
            let record = path.parent();
            if let Some(id) = record.as_ref().and_then(StorePath::last) {
                mark_sold(&self.inner, id).await?;
            }
        }
        Ok(value)
    }

    async fn update(&self, batch: UpdateBatch) -> StoreResult<()> {
        self.inner.update(batch).await
    }

    async fn push(&self, parent: &StorePath, value: Value) -> StoreResult<String> {
        self.inner.push(parent, value).await
    }

    fn subscribe(&self, path: &StorePath) -> Subscription {
        self.inner.subscribe(path)
    }
}
