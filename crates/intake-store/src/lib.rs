//! Intake Store
//!
//! The persistence boundary for guest intake: a path-addressed hierarchical
//! store with four primitives (read, atomic multi-path update, push,
//! subscribe), plus [`MemoryStore`], an in-process implementation used by
//! tests and the simulator.
//!
//! # Example
//!
//! ```rust
//! use intake_store::{MemoryStore, Store, StorePath, UpdateBatch};
//! use serde_json::json;
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! rt.block_on(async {
//!     let store = MemoryStore::new();
//!     let guests = StorePath::parse("guests").unwrap();
//!     let key = store.push(&guests, json!({"customerName": "Jane"})).await.unwrap();
//!
//!     let status = guests.child(key.as_str()).child("status");
//!     store.update(UpdateBatch::new().set(status.clone(), json!("working"))).await.unwrap();
//!     assert_eq!(store.read(&status).await.unwrap(), Some(json!("working")));
//! });
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod memory;
pub mod path;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use path::{PathError, StorePath};
pub use store::{Change, Store, StoreExt, Subscription, UpdateBatch};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for store users
    pub use crate::{Store, StoreError, StoreExt, StorePath, StoreResult, UpdateBatch};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
