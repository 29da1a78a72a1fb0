//! Canonical guest record shape
//!
//! One [`GuestRecord`] exists per intake conversation. Wire names are
//! camelCase; keys this crate does not model are kept in
//! [`GuestRecord::extra`] so a round trip never drops another actor's data.

use crate::field::is_present;
use crate::quality::CompletionSnapshot;
use crate::status::StatusMark;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Identifier assigned to a guest record on its first persisted write
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap a store-generated key
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Step-2 evaluation attributes (carrier, line count, coverage zip, ...)
///
/// Null values are never stored; setting an attribute to null removes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Evaluation(BTreeMap<String, Value>);

impl Evaluation {
    /// Empty evaluation
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute value
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set an attribute; `null` removes it
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if value.is_null() {
            self.0.remove(&key);
        } else {
            self.0.insert(key, value);
        }
    }

    /// Builder-style [`Evaluation::set`]
    #[inline]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.set(key, value);
        self
    }

    /// Remove an attribute
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Whether any attribute is present in the [`is_present`] sense
    #[must_use]
    pub fn has_any_present(&self) -> bool {
        self.0.values().any(is_present)
    }

    /// Iterate attributes in key order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of stored attributes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// No stored attributes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Remove every attribute
    #[inline]
    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub(crate) fn into_value(self) -> Value {
        Value::Object(self.0.into_iter().collect::<Map<String, Value>>())
    }
}

impl FromIterator<(String, Value)> for Evaluation {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut evaluation = Self::new();
        for (key, value) in iter {
            evaluation.set(key, value);
        }
        evaluation
    }
}

/// Step-3 pitch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    /// Proposed solution text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// When the text was first entered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Solution {
    /// Solution with text only
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            completed_at: None,
        }
    }

    /// Nothing recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.completed_at.is_none()
    }
}

/// Sale details, written only by an external "mark sold" action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Sale {
    /// External sale identifier
    pub sale_id: String,
    /// Time of sale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sold_at: Option<DateTime<Utc>>,
    /// Store the sale was booked in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_number: Option<String>,
    /// Lines / units sold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<u32>,
}

/// A guest record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GuestRecord {
    /// Absent for an in-memory draft
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    /// Step 1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    /// Step 1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    /// Step 2
    #[serde(skip_serializing_if = "Evaluation::is_empty")]
    pub evaluation: Evaluation,
    /// Step 3
    #[serde(skip_serializing_if = "Solution::is_empty")]
    pub solution: Solution,
    /// Set only by an external action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale: Option<Sale>,
    /// Explicit or inferred lifecycle status
    #[serde(skip_serializing_if = "StatusMark::is_inferred")]
    pub status: StatusMark,
    /// Last persisted scorer output (a cache)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionSnapshot>,
    /// First persisted write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    /// Last persisted write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Keys owned by other actors
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl GuestRecord {
    /// Empty draft
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With customer name
    #[inline]
    #[must_use]
    pub fn with_customer_name(mut self, name: impl Into<String>) -> Self {
        self.customer_name = Some(name.into());
        self
    }

    /// With customer phone
    #[inline]
    #[must_use]
    pub fn with_customer_phone(mut self, phone: impl Into<String>) -> Self {
        self.customer_phone = Some(phone.into());
        self
    }

    /// With an evaluation attribute
    #[inline]
    #[must_use]
    pub fn with_evaluation(mut self, key: impl Into<String>, value: Value) -> Self {
        self.evaluation.set(key, value);
        self
    }

    /// With solution text
    #[inline]
    #[must_use]
    pub fn with_solution_text(mut self, text: impl Into<String>) -> Self {
        self.solution.text = Some(text.into());
        self
    }

    /// With a status mark
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: StatusMark) -> Self {
        self.status = status;
        self
    }

    /// Name or phone is present
    #[must_use]
    pub fn has_customer_info(&self) -> bool {
        [&self.customer_name, &self.customer_phone]
            .into_iter()
            .flatten()
            .any(|s| !s.trim().is_empty())
    }

    /// Wire value of one top-level section; `null` when absent or empty
    #[must_use]
    pub fn section_value(&self, section: Section) -> Value {
        fn opt<T: Serialize + ?Sized>(value: Option<&T>) -> Value {
            value
                .and_then(|v| serde_json::to_value(v).ok())
                .unwrap_or(Value::Null)
        }

        match section {
            Section::CustomerName => opt(self.customer_name.as_ref()),
            Section::CustomerPhone => opt(self.customer_phone.as_ref()),
            Section::Evaluation if self.evaluation.is_empty() => Value::Null,
            Section::Evaluation => self.evaluation.clone().into_value(),
            Section::Solution if self.solution.is_empty() => Value::Null,
            Section::Solution => opt(Some(&self.solution)),
            Section::Status => opt(self.status.explicit().map(|s| s.as_str())),
            Section::Sale => opt(self.sale.as_ref()),
            Section::Completion => opt(self.completion.as_ref()),
            Section::SubmittedAt => opt(self.submitted_at.as_ref()),
            Section::UpdatedAt => opt(self.updated_at.as_ref()),
        }
    }
}

/// Top-level sections of a guest record, the unit of a partial patch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    /// `customerName`
    CustomerName,
    /// `customerPhone`
    CustomerPhone,
    /// `evaluation`
    Evaluation,
    /// `solution`
    Solution,
    /// `status`
    Status,
    /// `sale`
    Sale,
    /// `completion`
    Completion,
    /// `submittedAt`
    SubmittedAt,
    /// `updatedAt`
    UpdatedAt,
}

impl Section {
    /// Sections an editing session owns and may patch
    pub const EDITABLE: [Section; 5] = [
        Section::CustomerName,
        Section::CustomerPhone,
        Section::Evaluation,
        Section::Solution,
        Section::Status,
    ];

    /// Wire key
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Section::CustomerName => "customerName",
            Section::CustomerPhone => "customerPhone",
            Section::Evaluation => "evaluation",
            Section::Solution => "solution",
            Section::Status => "status",
            Section::Sale => "sale",
            Section::Completion => "completion",
            Section::SubmittedAt => "submittedAt",
            Section::UpdatedAt => "updatedAt",
        }
    }
}

impl Display for Section {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Upstream intake-queue entry that may seed a guest record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IntakeQueueEntry {
    /// Seeded name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    /// Seeded phone
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    /// Linked guest record, once one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<RecordId>,
    /// When the entry was captured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Other queue keys
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}
