//! Session configuration

use crate::error::ConfigError;
use intake_store::StorePath;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Debounce windows, store layout and channel sizes for intake sessions
///
/// Every key is optional in TOML; missing keys take the defaults below.
///
/// ```toml
/// idle_delay_ms = 3000
/// commit_delay_ms = 600
/// completion_delay_ms = 900
/// guests_root = "guests"
/// queue_root = "intakeQueue"
/// snapshot_fields = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Quiet period after the last input before a commit
    pub idle_delay_ms: u64,
    /// Debounce after a blur before a commit
    pub commit_delay_ms: u64,
    /// Delay after a commit before the completion snapshot is written
    pub completion_delay_ms: u64,
    /// Store path holding guest records
    pub guests_root: String,
    /// Store path holding intake-queue entries
    pub queue_root: String,
    /// Persist per-field diagnostics in the completion snapshot
    pub snapshot_fields: bool,
    /// Buffered session events per subscriber
    pub event_capacity: usize,
    /// Buffered commands between handle and worker
    pub command_capacity: usize,
}

impl SessionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML and validate
    ///
    /// # Errors
    /// `ConfigError::Parse` for malformed TOML, or any validation error
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject zero delays, zero capacities and unusable root paths
    ///
    /// # Errors
    /// The first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("idle_delay_ms", self.idle_delay_ms),
            ("commit_delay_ms", self.commit_delay_ms),
            ("completion_delay_ms", self.completion_delay_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDelay(key));
            }
        }
        for (key, value) in [
            ("event_capacity", self.event_capacity),
            ("command_capacity", self.command_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroCapacity(key));
            }
        }
        self.guests_path()?;
        self.queue_path()?;
        Ok(())
    }

    /// Parsed guest-record root
    ///
    /// # Errors
    /// `ConfigError::InvalidRoot`
    pub fn guests_path(&self) -> Result<StorePath, ConfigError> {
        root_path("guests_root", &self.guests_root)
    }

    /// Parsed intake-queue root
    ///
    /// # Errors
    /// `ConfigError::InvalidRoot`
    pub fn queue_path(&self) -> Result<StorePath, ConfigError> {
        root_path("queue_root", &self.queue_root)
    }

    /// Idle delay as a duration
    #[inline]
    #[must_use]
    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    /// Commit debounce as a duration
    #[inline]
    #[must_use]
    pub fn commit_delay(&self) -> Duration {
        Duration::from_millis(self.commit_delay_ms)
    }

    /// Completion delay as a duration
    #[inline]
    #[must_use]
    pub fn completion_delay(&self) -> Duration {
        Duration::from_millis(self.completion_delay_ms)
    }

    /// With idle delay
    #[inline]
    #[must_use]
    pub fn with_idle_delay_ms(mut self, ms: u64) -> Self {
        self.idle_delay_ms = ms;
        self
    }

    /// With commit debounce
    #[inline]
    #[must_use]
    pub fn with_commit_delay_ms(mut self, ms: u64) -> Self {
        self.commit_delay_ms = ms;
        self
    }

    /// With completion delay
    #[inline]
    #[must_use]
    pub fn with_completion_delay_ms(mut self, ms: u64) -> Self {
        self.completion_delay_ms = ms;
        self
    }

    /// With guest-record root
    #[inline]
    #[must_use]
    pub fn with_guests_root(mut self, root: impl Into<String>) -> Self {
        self.guests_root = root.into();
        self
    }

    /// With intake-queue root
    #[inline]
    #[must_use]
    pub fn with_queue_root(mut self, root: impl Into<String>) -> Self {
        self.queue_root = root.into();
        self
    }

    /// With per-field snapshot diagnostics
    #[inline]
    #[must_use]
    pub fn with_snapshot_fields(mut self, enabled: bool) -> Self {
        self.snapshot_fields = enabled;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_delay_ms: 3000,
            commit_delay_ms: 600,
            completion_delay_ms: 900,
            guests_root: "guests".to_string(),
            queue_root: "intakeQueue".to_string(),
            snapshot_fields: false,
            event_capacity: 64,
            command_capacity: 64,
        }
    }
}

fn root_path(key: &'static str, value: &str) -> Result<StorePath, ConfigError> {
    match StorePath::parse(value) {
        Ok(path) if !path.is_root() => Ok(path),
        _ => Err(ConfigError::InvalidRoot {
            key,
            value: value.to_string(),
        }),
    }
}
