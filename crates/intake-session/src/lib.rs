//! Intake Session
//!
//! Drives one guided intake conversation against the store:
//! - [`StepNavigator`]: which of the three steps is showing; automatic moves
//!   never go backward
//! - [`plan_revert`]: explicit, confirmed step reverts
//! - autosave: a per-session worker that turns bursts of edits into a few
//!   partial-path writes, with idle, commit and completion debounces
//!
//! # Example
//!
//! ```rust
//! use intake_session::{open_session, SessionSource};
//! use intake_store::MemoryStore;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! let session = open_session(store.clone(), SessionSource::Blank).await.unwrap();
//!
//! session.input("customerName", json!("Jane")).await.unwrap();
//! session.input("currentCarrier", json!("Verizon")).await.unwrap();
//! session.dispose().await.unwrap();
//!
//! let guests = store.snapshot()["guests"].as_object().unwrap().len();
//! assert_eq!(guests, 1);
//! # });
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod autosave;
pub mod config;
mod draft;
pub mod error;
pub mod navigator;
pub mod revert;
pub mod session;

pub use config::SessionConfig;
pub use error::{ConfigError, SessionError, SessionResult};
pub use navigator::{minimum_step_for, StepNavigator};
pub use revert::{plan_revert, RevertPlan, RevertTarget};
pub use session::{
    open_session, SessionBuilder, SessionEvent, SessionHandle, SessionSource, SessionView,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving intake sessions
    pub use crate::{
        open_session, RevertTarget, SessionBuilder, SessionConfig, SessionError, SessionEvent,
        SessionHandle, SessionSource, SessionView, StepNavigator,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
