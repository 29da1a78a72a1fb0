//! Pitch-quality scorer
//!
//! Aggregates weighted field presence into a 0–100 completeness score, per
//! step and overall. Scoring is a pure function of the record and the
//! registry; the persisted [`CompletionSnapshot`] is only a cache of it.

use crate::field::{FieldRegistry, Step};
use crate::record::GuestRecord;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Points earned out of points available
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepScore {
    /// Points from answered fields
    pub earned: u32,
    /// Points available
    pub max: u32,
}

impl StepScore {
    /// Rounded percentage of this step
    #[inline]
    #[must_use]
    pub fn pct(&self) -> u8 {
        percentage(self.earned, self.max)
    }
}

/// Per-step scores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepScores {
    /// Customer info
    pub step1: StepScore,
    /// Evaluation
    pub step2: StepScore,
    /// Solution
    pub step3: StepScore,
}

impl StepScores {
    /// Score of one step
    #[inline]
    #[must_use]
    pub fn get(&self, step: Step) -> &StepScore {
        match step {
            Step::Step1 => &self.step1,
            Step::Step2 => &self.step2,
            Step::Step3 => &self.step3,
        }
    }

    fn get_mut(&mut self, step: Step) -> &mut StepScore {
        match step {
            Step::Step1 => &mut self.step1,
            Step::Step2 => &mut self.step2,
            Step::Step3 => &mut self.step3,
        }
    }

    /// Sum over all steps
    #[must_use]
    pub fn total(&self) -> StepScore {
        Step::ALL.iter().fold(StepScore::default(), |acc, step| {
            let s = self.get(*step);
            StepScore {
                earned: acc.earned + s.earned,
                max: acc.max + s.max,
            }
        })
    }
}

/// Diagnostic for one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldScore {
    /// Answered and well-formed
    pub ok: bool,
    /// Registry weight
    pub weight: u32,
}

/// Scorer output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Overall percentage, 0–100
    pub pct: u8,
    /// Per-step points
    pub steps: StepScores,
    /// Per-field diagnostics in registry order
    pub fields: IndexMap<String, FieldScore>,
}

impl QualityReport {
    /// Highest-weight unanswered field; earlier registration breaks ties
    #[must_use]
    pub fn next_missing(&self) -> Option<&str> {
        self.fields
            .iter()
            .filter(|(_, f)| !f.ok && f.weight > 0)
            .fold(None, |best: Option<(&String, &FieldScore)>, cur| match best {
                Some(b) if b.1.weight >= cur.1.weight => Some(b),
                _ => Some(cur),
            })
            .map(|(name, _)| name.as_str())
    }

    /// Unanswered fields of one step, in registry order
    pub fn missing_in<'a>(
        &'a self,
        registry: &'a FieldRegistry,
        step: Step,
    ) -> impl Iterator<Item = &'a str> + 'a {
        registry
            .fields_in(step)
            .filter(move |spec| self.fields.get(&spec.name).is_some_and(|f| !f.ok))
            .map(|spec| spec.name.as_str())
    }
}

/// Score a record against the standard registry
#[must_use]
pub fn compute_quality(record: &GuestRecord) -> QualityReport {
    compute_quality_with(FieldRegistry::standard(), record)
}

/// Score a record against `registry`
#[must_use]
pub fn compute_quality_with(registry: &FieldRegistry, record: &GuestRecord) -> QualityReport {
    let mut steps = StepScores::default();
    let mut fields = IndexMap::with_capacity(registry.len());

    for spec in registry.iter() {
        let ok = spec.is_answered(record);
        let step = steps.get_mut(spec.step);
        step.max += spec.weight;
        if ok {
            step.earned += spec.weight;
        }
        fields.insert(
            spec.name.clone(),
            FieldScore {
                ok,
                weight: spec.weight,
            },
        );
    }

    let total = steps.total();
    QualityReport {
        pct: percentage(total.earned, total.max),
        steps,
        fields,
    }
}

/// `round(100 * earned / max)` clamped to 0–100; 0 when `max` is 0
#[must_use]
pub fn percentage(earned: u32, max: u32) -> u8 {
    if max == 0 {
        return 0;
    }
    let earned = u64::from(earned.min(max));
    let max = u64::from(max);
    let pct = (200 * earned + max) / (2 * max);
    u8::try_from(pct.min(100)).unwrap_or(100)
}

/// Persisted copy of a [`QualityReport`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompletionSnapshot {
    /// Overall percentage
    pub pct: u8,
    /// Per-step points
    pub steps: StepScores,
    /// Per-field diagnostics; only persisted on request
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub fields: IndexMap<String, FieldScore>,
    /// When the snapshot was taken
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CompletionSnapshot {
    /// Snapshot a report
    #[must_use]
    pub fn from_report(report: &QualityReport, at: DateTime<Utc>, include_fields: bool) -> Self {
        Self {
            pct: report.pct,
            steps: report.steps,
            fields: if include_fields {
                report.fields.clone()
            } else {
                IndexMap::new()
            },
            updated_at: Some(at),
        }
    }

    /// Whether this snapshot predates the record's last write
    #[must_use]
    pub fn is_stale_for(&self, record: &GuestRecord) -> bool {
        match (self.updated_at, record.updated_at) {
            (Some(snapshot), Some(record)) => snapshot < record,
            (None, _) => true,
            (Some(_), None) => false,
        }
    }
}

/// Completion percentage for list views
///
/// Trusts the cached snapshot when it is present and fresh, otherwise
/// rescoring against the standard registry.
#[must_use]
pub fn effective_pct(record: &GuestRecord) -> u8 {
    effective_pct_with(FieldRegistry::standard(), record)
}

/// [`effective_pct`] against a custom registry
#[must_use]
pub fn effective_pct_with(registry: &FieldRegistry, record: &GuestRecord) -> u8 {
    match &record.completion {
        Some(snapshot) if !snapshot.is_stale_for(record) => snapshot.pct,
        _ => compute_quality_with(registry, record).pct,
    }
}
