//! Record normalizer
//!
//! Reconciles legacy flat records (`currentCarrier` at the top level, a bare
//! string `solution`, `name`/`phone` aliases) and nested records into one
//! canonical [`GuestRecord`]. Nested values win; a legacy value only fills a
//! gap. Legacy keys are consumed, so normalizing a canonical record is a
//! no-op.
//!
//! Malformed sections never fail normalization: they are logged and
//! replaced by an empty default.

use crate::field::{is_present, FieldRegistry};
use crate::record::{Evaluation, GuestRecord, RecordId, Solution};
use crate::status::StatusMark;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

const NAME_ALIASES: [&str; 2] = ["name", "guestName"];
const PHONE_ALIASES: [&str; 2] = ["phone", "guestPhone"];
const SOLUTION_TEXT_ALIASES: [&str; 2] = ["solutionText", "pitch"];

/// Normalizer output
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Canonical record
    pub record: GuestRecord,
    /// Name or phone already captured; a fresh intake may skip to step 2
    pub prefilled_step1: bool,
}

/// Normalize a raw stored record
#[must_use]
pub fn normalize(raw: &Value) -> Normalized {
    let Some(object) = raw.as_object() else {
        if !raw.is_null() {
            tracing::warn!(kind = json_kind(raw), "guest record is not an object; using empty record");
        }
        return finish(GuestRecord::default());
    };

    let mut map = object.clone();
    let mut record = GuestRecord {
        id: take_typed::<RecordId>(&mut map, "id"),
        customer_name: take_text(&mut map, "customerName", &NAME_ALIASES),
        customer_phone: take_text(&mut map, "customerPhone", &PHONE_ALIASES),
        ..GuestRecord::default()
    };

    record.evaluation = take_evaluation(&mut map);
    record.solution = take_solution(&mut map);
    record.status = take_status(&mut map);
    record.sale = take_typed(&mut map, "sale");
    record.completion = take_typed(&mut map, "completion");
    record.submitted_at = take_typed::<DateTime<Utc>>(&mut map, "submittedAt");
    record.updated_at = take_typed::<DateTime<Utc>>(&mut map, "updatedAt");
    record.extra = map.into_iter().filter(|(_, v)| !v.is_null()).collect();

    finish(record)
}

/// Legacy keys present in a raw stored record
///
/// These are the flat keys [`normalize`] folds into canonical sections. A
/// writer that rewrites the record in canonical shape should delete them, or
/// the next normalization would read them again.
#[must_use]
pub fn legacy_keys(raw: &Value) -> Vec<String> {
    let Some(object) = raw.as_object() else {
        return Vec::new();
    };
    NAME_ALIASES
        .iter()
        .chain(&PHONE_ALIASES)
        .chain(&SOLUTION_TEXT_ALIASES)
        .copied()
        .chain(FieldRegistry::standard().evaluation_keys())
        .filter(|key| object.contains_key(*key))
        .map(str::to_string)
        .collect()
}

/// Normalize an in-memory record
///
/// Equivalent to normalizing its wire form.
#[must_use]
pub fn normalize_record(record: &GuestRecord) -> Normalized {
    match serde_json::to_value(record) {
        Ok(raw) => normalize(&raw),
        Err(err) => {
            tracing::warn!(error = %err, "guest record failed to serialize; keeping as-is");
            finish(record.clone())
        }
    }
}

fn finish(record: GuestRecord) -> Normalized {
    let prefilled_step1 = record.has_customer_info();
    Normalized {
        record,
        prefilled_step1,
    }
}

fn take_text(map: &mut Map<String, Value>, key: &str, aliases: &[&str]) -> Option<String> {
    let primary = map.remove(key).and_then(|v| as_text(key, v));
    let mut fallback = None;
    for alias in aliases {
        if let Some(value) = map.remove(*alias) {
            if fallback.is_none() {
                fallback = as_text(alias, value);
            }
        }
    }
    primary.or(fallback)
}

fn as_text(key: &str, value: Value) -> Option<String> {
    match value {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => None,
        other => {
            tracing::warn!(key, kind = json_kind(&other), "expected text; dropping value");
            None
        }
    }
}

fn take_evaluation(map: &mut Map<String, Value>) -> Evaluation {
    let mut evaluation = match map.remove("evaluation") {
        Some(Value::Object(nested)) => nested.into_iter().collect::<Evaluation>(),
        Some(Value::Null) | None => Evaluation::new(),
        Some(other) => {
            tracing::warn!(kind = json_kind(&other), "evaluation is not an object; starting empty");
            Evaluation::new()
        }
    };

    for key in FieldRegistry::standard().evaluation_keys() {
        let Some(legacy) = map.remove(key) else {
            continue;
        };
        let nested_present = evaluation.get(key).is_some_and(is_present);
        if !nested_present && !legacy.is_null() {
            evaluation.set(key, legacy);
        }
    }

    evaluation
}

fn take_solution(map: &mut Map<String, Value>) -> Solution {
    let mut solution = match map.remove("solution") {
        Some(Value::Object(mut nested)) => Solution {
            text: nested.remove("text").and_then(|v| as_text("solution.text", v)),
            completed_at: take_typed(&mut nested, "completedAt"),
        },
        Some(Value::String(text)) => Solution {
            text: as_text("solution", Value::String(text)),
            completed_at: None,
        },
        Some(Value::Null) | None => Solution::default(),
        Some(other) => {
            tracing::warn!(kind = json_kind(&other), "solution has unexpected shape; starting empty");
            Solution::default()
        }
    };

    for alias in SOLUTION_TEXT_ALIASES {
        if let Some(value) = map.remove(alias) {
            if solution.text.is_none() {
                solution.text = as_text(alias, value);
            }
        }
    }

    solution
}

fn take_status(map: &mut Map<String, Value>) -> StatusMark {
    match map.remove("status") {
        Some(Value::String(s)) if !s.trim().is_empty() => match s.parse() {
            Ok(status) => StatusMark::Explicit(status),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unrecognised status; inferring instead");
                StatusMark::Inferred
            }
        },
        _ => StatusMark::Inferred,
    }
}

fn take_typed<T: DeserializeOwned>(map: &mut Map<String, Value>, key: &str) -> Option<T> {
    match map.remove(key)? {
        Value::Null => None,
        value => match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::warn!(key, error = %err, "dropping malformed value");
                None
            }
        },
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
