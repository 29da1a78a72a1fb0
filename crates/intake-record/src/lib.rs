//! Guest Intake Record Model
//!
//! The pure, synchronous core of guided guest intake:
//! - [`FieldRegistry`]: weighted fields, their steps and format checks
//! - [`is_present`]: whether a value counts as answered
//! - [`normalize`]: legacy/nested record shapes into one canonical [`GuestRecord`]
//! - [`detect_status`]: lifecycle status from data or an explicit mark
//! - [`compute_quality`]: weighted 0–100 completeness, per step and overall
//!
//! Everything here is cheap enough to run on every keystroke.
//!
//! # Example
//!
//! ```rust
//! use intake_record::{compute_quality, detect_status, GuestRecord, Status};
//! use serde_json::json;
//!
//! let record = GuestRecord::new()
//!     .with_customer_name("Jane")
//!     .with_customer_phone("555-1234")
//!     .with_evaluation("currentCarrier", json!("Verizon"));
//!
//! assert_eq!(detect_status(&record), Status::Working);
//! assert_eq!(compute_quality(&record).pct, 27);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod error;
pub mod field;
pub mod normalize;
pub mod quality;
pub mod record;
pub mod status;

pub use error::{RegistryError, StatusParseError};
pub use field::{is_present, FieldFormat, FieldRegistry, FieldSlot, FieldSpec, RegistryBuilder, Step};
pub use normalize::{legacy_keys, normalize, normalize_record, Normalized};
pub use quality::{
    compute_quality, compute_quality_with, effective_pct, effective_pct_with, percentage,
    CompletionSnapshot, FieldScore, QualityReport, StepScore, StepScores,
};
pub use record::{Evaluation, GuestRecord, IntakeQueueEntry, RecordId, Sale, Section, Solution};
pub use status::{detect_status, infer_status, Status, StatusMark};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with guest records
    pub use crate::{
        compute_quality, detect_status, is_present, normalize, FieldRegistry, GuestRecord,
        QualityReport, RecordId, Section, Status, StatusMark, Step,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
