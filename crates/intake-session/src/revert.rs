//! Revert controller
//!
//! A revert is an explicit, caller-confirmed action that throws away later
//! steps' data and pins the status that matches what is left. Planning is
//! pure; [`SessionHandle::revert`](crate::SessionHandle::revert) applies the
//! plan as one patch write.

use intake_record::{GuestRecord, Section, Solution, Status, StatusMark, Step};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Step to revert to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevertTarget {
    /// Clear evaluation and solution; status `new`
    Step1,
    /// Clear solution; status `working`
    Step2,
}

impl RevertTarget {
    /// Step the navigator is forced to
    #[must_use]
    pub fn step(self) -> Step {
        match self {
            Self::Step1 => Step::Step1,
            Self::Step2 => Step::Step2,
        }
    }

    /// Status pinned by the revert
    #[must_use]
    pub fn status(self) -> Status {
        match self {
            Self::Step1 => Status::New,
            Self::Step2 => Status::Working,
        }
    }

    /// Sections emptied by the revert
    #[must_use]
    pub fn cleared_sections(self) -> &'static [Section] {
        match self {
            Self::Step1 => &[Section::Evaluation, Section::Solution],
            Self::Step2 => &[Section::Solution],
        }
    }
}

impl Display for RevertTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Step1 => "step1",
            Self::Step2 => "step2",
        })
    }
}

/// Outcome of planning a revert
#[derive(Debug, Clone, PartialEq)]
pub struct RevertPlan {
    /// Target
    pub target: RevertTarget,
    /// Record after the revert
    pub record: GuestRecord,
    /// Sections written by the revert, status included
    pub sections: Vec<Section>,
}

impl RevertPlan {
    /// Step the navigator is forced to
    #[inline]
    #[must_use]
    pub fn step(&self) -> Step {
        self.target.step()
    }
}

/// Plan a revert of `record` to `target`
///
/// The pinned status holds until the next edit. Reverting a sold record
/// drops the sold pin.
#[must_use]
pub fn plan_revert(record: &GuestRecord, target: RevertTarget) -> RevertPlan {
    if record.status.is_terminal() {
        tracing::warn!(%target, "reverting a sold record; sold status will be cleared");
    }

    let mut reverted = record.clone();
    for section in target.cleared_sections() {
        match section {
            Section::Evaluation => reverted.evaluation.clear(),
            Section::Solution => reverted.solution = Solution::default(),
            _ => {}
        }
    }
    reverted.status = StatusMark::Explicit(target.status());

    let mut sections = target.cleared_sections().to_vec();
    sections.push(Section::Status);

    RevertPlan {
        target,
        record: reverted,
        sections,
    }
}
