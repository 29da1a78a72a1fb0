//! Error types for the record model

/// Errors building a custom field registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Blank field name
    #[error("field name must not be empty")]
    EmptyName,

    /// Name registered twice
    #[error("field registered twice: {0}")]
    DuplicateField(String),

    /// Two names share one value slot, which would count it twice
    #[error("slot {slot} claimed by both '{first}' and '{second}'")]
    DuplicateSlot {
        /// Slot both fields read
        slot: String,
        /// Field registered first
        first: String,
        /// Field registered second
        second: String,
    },
}

/// Unrecognised status string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: '{0}' (expected new, working, proposal or sold)")]
pub struct StatusParseError(pub String);
