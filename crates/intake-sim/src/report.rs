//! Per-session simulation report

use intake_record::{effective_pct, normalize, Status, Step};
use intake_session::{SessionEvent, SessionView};
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;

/// Write and notification counts gathered from session events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct Tally {
    pub(crate) creates: usize,
    pub(crate) patches: usize,
    pub(crate) completions: usize,
    pub(crate) failures: usize,
    pub(crate) reverts: usize,
    pub(crate) pins: usize,
}

impl Tally {
    pub(crate) fn observe(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Created(_) => self.creates += 1,
            SessionEvent::Saved { .. } => self.patches += 1,
            SessionEvent::CompletionWritten { .. } => self.completions += 1,
            SessionEvent::SaveFailed { .. } | SessionEvent::CompletionFailed { .. } => {
                self.failures += 1;
            }
            SessionEvent::Reverted(_) => self.reverts += 1,
            SessionEvent::StatusPinned(_) => self.pins += 1,
            _ => {}
        }
    }
}

/// Outcome of one simulated session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Report {
    pub(crate) session: usize,
    pub(crate) record_id: Option<String>,
    pub(crate) step: Step,
    pub(crate) status: Status,
    pub(crate) preview_pct: u8,
    /// What a list view would badge, from the stored record
    pub(crate) stored_pct: Option<u8>,
    pub(crate) writes: Tally,
    pub(crate) last_error: Option<String>,
}

impl Report {
    pub(crate) fn new(session: usize, view: &SessionView, stored: Option<&Value>, writes: Tally) -> Self {
        Self {
            session,
            record_id: view.record_id.as_ref().map(ToString::to_string),
            step: view.step,
            status: view.status,
            preview_pct: view.preview_pct,
            stored_pct: stored.map(|raw| effective_pct(&normalize(raw).record)),
            writes,
            last_error: view.last_error.clone(),
        }
    }

    /// Nothing left unsaved and no write failed along the way
    pub(crate) fn passed(&self) -> bool {
        self.last_error.is_none() && self.writes.failures == 0
    }

    pub(crate) fn generate_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Session {}", self.session);
        let _ = writeln!(
            out,
            "  record:      {}",
            self.record_id.as_deref().unwrap_or("(not saved)")
        );
        let _ = writeln!(out, "  step:        {}", self.step);
        let _ = writeln!(out, "  status:      {}", self.status);
        let _ = writeln!(out, "  preview:     {}%", self.preview_pct);
        match self.stored_pct {
            Some(pct) => {
                let _ = writeln!(out, "  stored:      {pct}%");
            }
            None => {
                let _ = writeln!(out, "  stored:      -");
            }
        }
        let w = &self.writes;
        let _ = writeln!(
            out,
            "  writes:      {} create, {} patch, {} completion, {} failed",
            w.creates, w.patches, w.completions, w.failures
        );
        if w.reverts > 0 || w.pins > 0 {
            let _ = writeln!(out, "  reverts:     {}  remote pins: {}", w.reverts, w.pins);
        }
        if let Some(err) = &self.last_error {
            let _ = writeln!(out, "  last error:  {err}");
        }
        out
    }
}
