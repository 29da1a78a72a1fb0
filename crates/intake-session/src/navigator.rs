//! Step navigator
//!
//! Tracks which of the three intake steps is showing. Automatic moves only
//! go forward; manual navigation and reverts may go anywhere.

use intake_record::{detect_status, GuestRecord, Status, Step};

/// Earliest step consistent with a status
#[must_use]
pub fn minimum_step_for(status: Status) -> Step {
    match status {
        Status::New => Step::Step1,
        Status::Working => Step::Step2,
        Status::Proposal | Status::Sold => Step::Step3,
    }
}

/// Current step of one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepNavigator {
    current: Step,
}

impl StepNavigator {
    /// Navigator at step 1
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Navigator at `step`
    #[inline]
    #[must_use]
    pub fn starting_at(step: Step) -> Self {
        Self { current: step }
    }

    /// Opening position for a record
    ///
    /// The step its status implies, or step 2 when customer info is already
    /// captured and the status implies less.
    #[must_use]
    pub fn for_record(record: &GuestRecord, prefilled_step1: bool) -> Self {
        let by_status = minimum_step_for(detect_status(record));
        let by_prefill = if prefilled_step1 { Step::Step2 } else { Step::Step1 };
        Self::starting_at(by_status.max(by_prefill))
    }

    /// Current step
    #[inline]
    #[must_use]
    pub fn current(&self) -> Step {
        self.current
    }

    /// Move forward to the step `status` implies, never backward
    ///
    /// Returns whether the step changed.
    pub fn advance_if_needed(&mut self, status: Status) -> bool {
        let minimum = minimum_step_for(status);
        if minimum.rank() > self.current.rank() {
            tracing::debug!(from = %self.current, to = %minimum, %status, "advancing step");
            self.current = minimum;
            true
        } else {
            false
        }
    }

    /// Manual navigation; may move backward
    pub fn navigate_to(&mut self, step: Step) -> bool {
        let changed = self.current != step;
        self.current = step;
        changed
    }

    /// Set the step unconditionally (revert)
    pub fn force(&mut self, step: Step) -> bool {
        let changed = self.current != step;
        if changed {
            tracing::debug!(from = %self.current, to = %step, "forcing step");
        }
        self.current = step;
        changed
    }
}
