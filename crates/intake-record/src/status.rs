//! Lifecycle status and its detection
//!
//! Status is either pinned explicitly (an external "mark sold" action, or a
//! revert) or inferred from which fields are populated. Modelling the two as
//! [`StatusMark`] variants keeps the precedence rule structural: the detector
//! only looks at field contents in the `Inferred` case.

use crate::error::StatusParseError;
use crate::record::GuestRecord;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Lifecycle stage of a guest record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Nothing beyond customer info
    New,
    /// Evaluation under way
    Working,
    /// A solution has been pitched
    Proposal,
    /// Closed by an external sale action
    Sold,
}

impl Status {
    /// All statuses in lifecycle order
    pub const ALL: [Status; 4] = [Status::New, Status::Working, Status::Proposal, Status::Sold];

    /// Position in the lifecycle
    #[inline]
    #[must_use]
    pub fn rank(self) -> usize {
        match self {
            Status::New => 0,
            Status::Working => 1,
            Status::Proposal => 2,
            Status::Sold => 3,
        }
    }

    /// Terminal statuses are only ever set from outside this crate
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Sold)
    }

    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Status::New => "new",
            Status::Working => "working",
            Status::Proposal => "proposal",
            Status::Sold => "sold",
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Status::New),
            "working" => Ok(Status::Working),
            "proposal" => Ok(Status::Proposal),
            "sold" => Ok(Status::Sold),
            _ => Err(StatusParseError(s.to_string())),
        }
    }
}

/// How a record's status is determined
///
/// On the wire an explicit mark is the status string; an inferred mark is
/// an absent (or empty) `status` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatusMark {
    /// Pinned; returned verbatim by [`detect_status`]
    Explicit(Status),
    /// Derived from field contents
    #[default]
    Inferred,
}

impl StatusMark {
    /// Whether the status is derived
    #[inline]
    #[must_use]
    pub fn is_inferred(&self) -> bool {
        matches!(self, StatusMark::Inferred)
    }

    /// Pinned status, if any
    #[inline]
    #[must_use]
    pub fn explicit(&self) -> Option<Status> {
        match self {
            StatusMark::Explicit(status) => Some(*status),
            StatusMark::Inferred => None,
        }
    }

    /// Pinned to a terminal status
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.explicit().is_some_and(Status::is_terminal)
    }
}

impl From<Status> for StatusMark {
    fn from(status: Status) -> Self {
        StatusMark::Explicit(status)
    }
}

impl Serialize for StatusMark {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StatusMark::Explicit(status) => status.serialize(serializer),
            StatusMark::Inferred => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for StatusMark {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) if !s.trim().is_empty() => s
                .parse()
                .map(StatusMark::Explicit)
                .map_err(serde::de::Error::custom),
            _ => Ok(StatusMark::Inferred),
        }
    }
}

/// Status implied by field contents alone
///
/// Solution text means `proposal` even without any evaluation data, so a
/// pitch can be entered straight away.
#[must_use]
pub fn infer_status(record: &GuestRecord) -> Status {
    let has_solution = record
        .solution
        .text
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty());

    if has_solution {
        Status::Proposal
    } else if record.evaluation.has_any_present() {
        Status::Working
    } else {
        Status::New
    }
}

/// Effective status of a record: the explicit mark if set, else inferred
#[must_use]
pub fn detect_status(record: &GuestRecord) -> Status {
    match record.status {
        StatusMark::Explicit(status) => status,
        StatusMark::Inferred => infer_status(record),
    }
}
