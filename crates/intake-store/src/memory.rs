//! In-process store
//!
//! [`MemoryStore`] keeps the whole tree as one JSON object behind a mutex.
//! Writes follow the hierarchical-store conventions: `null` deletes, empty
//! objects do not exist, and a deletion prunes parents left empty.

use crate::error::{StoreError, StoreResult};
use crate::path::StorePath;
use crate::store::{Change, Store, Subscription, UpdateBatch};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use ulid::Ulid;

/// Default change-feed capacity
const DEFAULT_FEED_CAPACITY: usize = 256;

/// Tree store held in memory
#[derive(Debug)]
pub struct MemoryStore {
    root: Mutex<Map<String, Value>>,
    changes: broadcast::Sender<Change>,
}

impl MemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// Empty store whose change feed buffers `capacity` changes per subscriber
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            root: Mutex::new(Map::new()),
            changes,
        }
    }

    /// Store seeded with `data`; non-object seeds yield an empty store
    #[must_use]
    pub fn with_data(data: Value) -> Self {
        let store = Self::new();
        if let Value::Object(map) = prune(data) {
            *store.root.lock() = map;
        }
        store
    }

    /// Copy of the whole tree
    #[must_use]
    pub fn snapshot(&self) -> Value {
        Value::Object(self.root.lock().clone())
    }

    /// Value at `path` without going through the async trait
    #[must_use]
    pub fn get(&self, path: &StorePath) -> Option<Value> {
        let root = self.root.lock();
        let (first, rest) = path.segments().split_first()?;
        let mut node = root.get(first)?;
        for segment in rest {
            node = node.get(segment)?;
        }
        Some(node.clone())
    }

    fn apply(&self, batch: UpdateBatch) -> StoreResult<Vec<Change>> {
        batch.validate()?;

        let mut root = self.root.lock();
        // Write into a copy so a failing entry leaves the tree untouched.
        let mut next = root.clone();
        let mut changes = Vec::with_capacity(batch.len());
        for (path, value) in batch {
            let value = prune(value);
            write(&mut next, path.segments(), value.clone(), &path, 0)?;
            changes.push(Change { path, value });
        }
        *root = next;
        Ok(changes)
    }

    fn publish(&self, changes: Vec<Change>) {
        for change in changes {
            tracing::trace!(path = %change.path, "store change");
            // No subscribers is fine.
            let _ = self.changes.send(change);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn read(&self, path: &StorePath) -> StoreResult<Option<Value>> {
        if path.is_root() {
            return Ok(Some(self.snapshot()));
        }
        Ok(self.get(path))
    }

    async fn update(&self, batch: UpdateBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let changes = self.apply(batch)?;
        self.publish(changes);
        Ok(())
    }

    async fn push(&self, parent: &StorePath, value: Value) -> StoreResult<String> {
        let key = Ulid::new().to_string();
        let changes = self.apply(UpdateBatch::new().set(parent.child(key.clone()), value))?;
        self.publish(changes);
        tracing::debug!(parent = %parent, key = %key, "pushed child");
        Ok(key)
    }

    fn subscribe(&self, path: &StorePath) -> Subscription {
        Subscription::new(path.clone(), self.changes.subscribe())
    }
}

/// Drop `null` members and empty objects, recursively
fn prune(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let pruned: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, prune(v)))
                .filter(|(_, v)| !is_void(v))
                .collect();
            if pruned.is_empty() {
                Value::Null
            } else {
                Value::Object(pruned)
            }
        }
        other => other,
    }
}

fn is_void(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn write(
    node: &mut Map<String, Value>,
    segments: &[String],
    value: Value,
    full: &StorePath,
    depth: usize,
) -> StoreResult<()> {
    let Some((head, rest)) = segments.split_first() else {
        return Err(StoreError::RootWrite);
    };

    if rest.is_empty() {
        if is_void(&value) {
            node.remove(head);
        } else {
            node.insert(head.clone(), value);
        }
        return Ok(());
    }

    if value.is_null() && !node.contains_key(head) {
        return Ok(());
    }

    let child = node
        .entry(head.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    let emptied = match child {
        Value::Object(map) => {
            write(map, rest, value, full, depth + 1)?;
            map.is_empty()
        }
        _ => {
            let blocked = full.segments()[..=depth].iter().cloned().fold(
                StorePath::root(),
                |path, segment| path.child(segment),
            );
            return Err(StoreError::NotAnObject(blocked));
        }
    };
    if emptied {
        node.remove(head);
    }
    Ok(())
}
