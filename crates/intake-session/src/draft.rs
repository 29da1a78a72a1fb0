//! In-memory draft of one guest record
//!
//! The draft is the source of truth until a commit succeeds. Alongside it we
//! keep the last persisted value of every editable section, so a commit can
//! patch exactly the sections that differ. The baseline is what the store
//! actually holds, so a record stored in a legacy shape reads as dirty until
//! it has been rewritten canonically.

use chrono::{DateTime, Utc};
use intake_record::{
    detect_status, legacy_keys, normalize_record, FieldSlot, GuestRecord, RecordId, Section,
    Status, StatusMark,
};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub(crate) struct Draft {
    pub(crate) record: GuestRecord,
    persisted: BTreeMap<Section, Value>,
    /// Flat legacy keys still stored next to the canonical sections
    legacy_keys: Vec<String>,
}

impl Draft {
    /// Draft not yet stored anywhere
    pub(crate) fn unsaved(record: GuestRecord) -> Self {
        Self {
            record,
            persisted: BTreeMap::new(),
            legacy_keys: Vec::new(),
        }
    }

    /// Draft of a record read from the store; `raw` is the stored value
    pub(crate) fn loaded(record: GuestRecord, raw: &Value) -> Self {
        let persisted = Section::EDITABLE
            .iter()
            .map(|s| (*s, raw.get(s.key()).cloned().unwrap_or(Value::Null)))
            .collect();
        Self {
            record,
            persisted,
            legacy_keys: legacy_keys(raw),
        }
    }

    pub(crate) fn id(&self) -> Option<&RecordId> {
        self.record.id.as_ref()
    }

    pub(crate) fn status(&self) -> Status {
        detect_status(&self.record)
    }

    /// Apply one field edit
    ///
    /// An edit releases a non-terminal status pin so the status follows the
    /// data again. A sold pin survives.
    pub(crate) fn apply_input(&mut self, slot: &FieldSlot, value: Value) {
        match slot {
            FieldSlot::CustomerName => self.record.customer_name = text_of(value),
            FieldSlot::CustomerPhone => self.record.customer_phone = text_of(value),
            FieldSlot::Evaluation(key) => self.record.evaluation.set(key.clone(), value),
            FieldSlot::SolutionText => self.record.solution.text = text_of(value),
        }
        if !self.record.status.is_terminal() {
            self.record.status = StatusMark::Inferred;
        }
    }

    /// Re-run the normalizer over the draft
    pub(crate) fn normalize(&mut self) {
        self.record = normalize_record(&self.record).record;
    }

    /// Anything worth creating a record for
    pub(crate) fn has_content(&self) -> bool {
        self.record.has_customer_info()
            || self.record.evaluation.has_any_present()
            || self
                .record
                .solution
                .text
                .as_deref()
                .is_some_and(|t| !t.trim().is_empty())
    }

    /// Wire value of a section as the next commit would write it
    ///
    /// Status is always written as the detected status string.
    pub(crate) fn section_value(&self, section: Section) -> Value {
        match section {
            Section::Status => Value::String(self.status().as_str().to_string()),
            other => self.record.section_value(other),
        }
    }

    /// Editable sections whose draft value differs from the persisted one
    pub(crate) fn changed_sections(&self) -> Vec<Section> {
        Section::EDITABLE
            .iter()
            .copied()
            .filter(|s| {
                let persisted = self.persisted.get(s).unwrap_or(&Value::Null);
                &self.section_value(*s) != persisted
            })
            .collect()
    }

    /// Legacy keys the next write must delete
    pub(crate) fn legacy_keys(&self) -> &[String] {
        &self.legacy_keys
    }

    /// Unsaved edits exist
    pub(crate) fn is_dirty(&self) -> bool {
        match self.id() {
            None => self.has_content(),
            Some(_) => !self.legacy_keys.is_empty() || !self.changed_sections().is_empty(),
        }
    }

    /// Record the result of a create
    pub(crate) fn mark_created(&mut self, id: RecordId, at: DateTime<Utc>) {
        self.record.id = Some(id);
        self.record.submitted_at = Some(at);
        self.record.updated_at = Some(at);
        for section in Section::EDITABLE {
            self.persisted.insert(section, self.section_value(section));
        }
    }

    /// Record the result of a patch that also deleted the legacy keys
    pub(crate) fn mark_saved(&mut self, sections: &[Section], at: DateTime<Utc>) {
        self.record.updated_at = Some(at);
        self.legacy_keys.clear();
        for section in sections {
            self.persisted.insert(*section, self.section_value(*section));
        }
    }

    /// Pin a status that is already stored remotely
    pub(crate) fn pin_remote(&mut self, status: Status) {
        self.record.status = StatusMark::Explicit(status);
        self.persisted
            .insert(Section::Status, Value::String(status.as_str().to_string()));
    }

    /// Pin a status the store no longer holds; the next commit writes it back
    pub(crate) fn pin_unstored(&mut self, status: Status) {
        self.record.status = StatusMark::Explicit(status);
    }
}

fn text_of(value: Value) -> Option<String> {
    match value {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_record::normalize;
    use serde_json::json;

    fn load(record: GuestRecord) -> Draft {
        let raw = serde_json::to_value(&record).unwrap();
        Draft::loaded(record, &raw)
    }

    fn stored() -> GuestRecord {
        GuestRecord::new()
            .with_customer_name("Jane")
            .with_customer_phone("555-1234")
            .with_evaluation("currentCarrier", json!("Verizon"))
            .with_status(StatusMark::Explicit(Status::Working))
    }

    #[test]
    fn blank_draft_is_clean() {
        let draft = Draft::unsaved(GuestRecord::new());
        assert!(!draft.has_content());
        assert!(!draft.is_dirty());
    }

    #[test]
    fn loaded_draft_has_no_changes() {
        let mut record = stored();
        record.id = Some(RecordId::new("g1"));
        let draft = load(record);
        assert!(draft.changed_sections().is_empty());
        assert!(!draft.is_dirty());
    }

    #[test]
    fn edit_marks_only_its_section() {
        let mut record = stored();
        record.id = Some(RecordId::new("g1"));
        let mut draft = load(record);

        draft.apply_input(&FieldSlot::evaluation("lineCount"), json!(2));
        assert_eq!(draft.changed_sections(), vec![Section::Evaluation]);
    }

    #[test]
    fn edit_releases_non_terminal_pin() {
        let mut draft = load(stored());
        draft.apply_input(&FieldSlot::SolutionText, json!("Bundle"));
        assert_eq!(draft.record.status, StatusMark::Inferred);
        assert_eq!(draft.status(), Status::Proposal);
        assert!(draft.changed_sections().contains(&Section::Status));
    }

    #[test]
    fn edit_keeps_sold_pin() {
        let mut draft = load(stored().with_status(StatusMark::Explicit(Status::Sold)));
        draft.apply_input(&FieldSlot::SolutionText, json!("Bundle"));
        assert_eq!(draft.status(), Status::Sold);
        assert!(!draft.changed_sections().contains(&Section::Status));
    }

    #[test]
    fn blank_text_clears_field() {
        let mut draft = Draft::unsaved(GuestRecord::new());
        draft.apply_input(&FieldSlot::CustomerName, json!("Jane"));
        assert!(draft.has_content());
        draft.apply_input(&FieldSlot::CustomerName, json!("   "));
        assert_eq!(draft.record.customer_name, None);
        assert!(!draft.has_content());
    }

    #[test]
    fn saved_sections_stop_differing() {
        let mut draft = Draft::unsaved(GuestRecord::new());
        draft.apply_input(&FieldSlot::CustomerName, json!("Jane"));
        draft.mark_created(RecordId::new("g1"), Utc::now());
        assert!(!draft.is_dirty());

        draft.apply_input(&FieldSlot::CustomerPhone, json!("555-1234"));
        let changed = draft.changed_sections();
        assert_eq!(changed, vec![Section::CustomerPhone]);
        draft.mark_saved(&changed, Utc::now());
        assert!(!draft.is_dirty());
    }

    #[test]
    fn remote_pin_is_not_a_change() {
        let mut record = stored();
        record.id = Some(RecordId::new("g1"));
        let mut draft = load(record);
        draft.pin_remote(Status::Sold);
        assert!(!draft.is_dirty());
        assert_eq!(draft.status(), Status::Sold);
    }

    #[test]
    fn legacy_shape_is_dirty_until_rewritten() {
        let raw = json!({
            "guestName": "Sam",
            "currentCarrier": "T-Mobile",
            "evaluation": {"lineCount": 4},
            "status": "working"
        });
        let mut record = normalize(&raw).record;
        record.id = Some(RecordId::new("g1"));
        let mut draft = Draft::loaded(record, &raw);

        assert!(draft.is_dirty());
        assert_eq!(draft.legacy_keys(), ["guestName", "currentCarrier"]);
        let changed = draft.changed_sections();
        assert_eq!(changed, vec![Section::CustomerName, Section::Evaluation]);

        draft.mark_saved(&changed, Utc::now());
        assert!(draft.legacy_keys().is_empty());
        assert!(!draft.is_dirty());
    }

    #[test]
    fn unstored_pin_stays_dirty() {
        let mut record = stored();
        record.id = Some(RecordId::new("g1"));
        let mut draft = load(record);
        draft.pin_unstored(Status::Sold);
        assert_eq!(draft.status(), Status::Sold);
        assert_eq!(draft.changed_sections(), vec![Section::Status]);
    }
}
