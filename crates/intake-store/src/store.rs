//! The persistence boundary
//!
//! The intake core depends on exactly four primitives of a hierarchical
//! key-value store: read-by-path, atomic multi-path update, append with a
//! generated key, and subscribe-to-path. It never replaces whole documents.

use crate::error::{StoreError, StoreResult};
use crate::path::StorePath;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Path-addressed hierarchical store
#[async_trait]
pub trait Store: Send + Sync {
    /// Value at `path`, `None` when nothing is stored there
    async fn read(&self, path: &StorePath) -> StoreResult<Option<Value>>;

    /// Apply every entry of `batch` atomically; a `null` value deletes
    async fn update(&self, batch: UpdateBatch) -> StoreResult<()>;

    /// Store `value` under a new generated key below `parent`; returns the key
    async fn push(&self, parent: &StorePath, value: Value) -> StoreResult<String>;

    /// Feed of writes overlapping `path`
    fn subscribe(&self, path: &StorePath) -> Subscription;
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn read(&self, path: &StorePath) -> StoreResult<Option<Value>> {
        (**self).read(path).await
    }

    async fn update(&self, batch: UpdateBatch) -> StoreResult<()> {
        (**self).update(batch).await
    }

    async fn push(&self, parent: &StorePath, value: Value) -> StoreResult<String> {
        (**self).push(parent, value).await
    }

    fn subscribe(&self, path: &StorePath) -> Subscription {
        (**self).subscribe(path)
    }
}

/// Typed conveniences over [`Store`]
#[async_trait]
pub trait StoreExt: Store {
    /// Read and deserialize
    async fn read_as<T>(&self, path: &StorePath) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        match self.read(path).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Single-path update
    async fn set(&self, path: StorePath, value: Value) -> StoreResult<()> {
        self.update(UpdateBatch::new().set(path, value)).await
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

/// Multi-path partial update, applied atomically
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateBatch {
    entries: Vec<(StorePath, Value)>,
}

impl UpdateBatch {
    /// Empty batch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry
    #[inline]
    #[must_use]
    pub fn set(mut self, path: StorePath, value: Value) -> Self {
        self.insert(path, value);
        self
    }

    /// Add a deletion
    #[inline]
    #[must_use]
    pub fn delete(self, path: StorePath) -> Self {
        self.set(path, Value::Null)
    }

    /// Add a serializable entry
    ///
    /// # Errors
    /// `StoreError::Serialization` if `value` cannot be represented as JSON
    pub fn set_json<T: Serialize + ?Sized>(self, path: StorePath, value: &T) -> StoreResult<Self> {
        Ok(self.set(path, serde_json::to_value(value)?))
    }

    /// Add an entry in place
    #[inline]
    pub fn insert(&mut self, path: StorePath, value: Value) {
        self.entries.push((path, value));
    }

    /// Entries in insertion order
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[(StorePath, Value)] {
        &self.entries
    }

    /// Paths written by this batch
    #[inline]
    pub fn paths(&self) -> impl Iterator<Item = &StorePath> {
        self.entries.iter().map(|(p, _)| p)
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No entries
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check that no entry targets the root and no two entries overlap
    ///
    /// # Errors
    /// `StoreError::RootWrite` or `StoreError::OverlappingPaths`
    pub fn validate(&self) -> StoreResult<()> {
        for (i, (path, _)) in self.entries.iter().enumerate() {
            if path.is_root() {
                return Err(StoreError::RootWrite);
            }
            if let Some((other, _)) = self.entries[i + 1..].iter().find(|(o, _)| o.overlaps(path)) {
                return Err(StoreError::OverlappingPaths {
                    first: path.clone(),
                    second: other.clone(),
                });
            }
        }
        Ok(())
    }
}

impl IntoIterator for UpdateBatch {
    type Item = (StorePath, Value);
    type IntoIter = std::vec::IntoIter<(StorePath, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// One written path and the value written there
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Written path
    pub path: StorePath,
    /// New value (`null` for a deletion)
    pub value: Value,
}

impl Change {
    /// Value this change implies at `target`
    ///
    /// Known when the write covers `target` (same path or an ancestor);
    /// `None` when the write only touched part of `target`'s subtree.
    #[must_use]
    pub fn value_at(&self, target: &StorePath) -> Option<Value> {
        let relative = target.relative_to(&self.path).ok()?;
        let mut node = &self.value;
        for segment in relative.iter() {
            match node.get(segment) {
                Some(child) => node = child,
                None => return Some(Value::Null),
            }
        }
        Some(node.clone())
    }
}

/// Change feed filtered to one subtree
#[derive(Debug)]
pub struct Subscription {
    path: StorePath,
    rx: broadcast::Receiver<Change>,
}

impl Subscription {
    /// Filter `rx` down to changes overlapping `path`
    #[inline]
    #[must_use]
    pub fn new(path: StorePath, rx: broadcast::Receiver<Change>) -> Self {
        Self { path, rx }
    }

    /// Subscribed path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &StorePath {
        &self.path
    }

    /// Next overlapping change; `None` once the store is gone
    pub async fn recv(&mut self) -> Option<Change> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.path.overlaps(&self.path) => return Some(change),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(path = %self.path, missed, "subscription lagged; changes dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
