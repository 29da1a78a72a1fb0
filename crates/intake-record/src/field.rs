//! Field registry and presence predicate
//!
//! Declares every capturable intake field: its point weight, the step that
//! owns it, where its value lives inside a [`GuestRecord`], and the light
//! format check a value must pass before it earns points.

use crate::error::RegistryError;
use crate::record::GuestRecord;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// One of the three sequential sections of the intake form
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    /// Customer info
    #[default]
    Step1,
    /// Evaluation
    Step2,
    /// Solution
    Step3,
}

impl Step {
    /// All steps in navigation order
    pub const ALL: [Step; 3] = [Step::Step1, Step::Step2, Step::Step3];

    /// Position in [`Step::ALL`]
    #[inline]
    #[must_use]
    pub fn rank(self) -> usize {
        match self {
            Step::Step1 => 0,
            Step::Step2 => 1,
            Step::Step3 => 2,
        }
    }

    /// Wire name (`step1`, `step2`, `step3`)
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Step1 => "step1",
            Step::Step2 => "step2",
            Step::Step3 => "step3",
        }
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location of a field's value inside a guest record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldSlot {
    /// `customerName`
    CustomerName,
    /// `customerPhone`
    CustomerPhone,
    /// `evaluation.<key>`
    Evaluation(String),
    /// `solution.text`
    SolutionText,
}

impl FieldSlot {
    /// Evaluation attribute slot
    #[inline]
    #[must_use]
    pub fn evaluation(key: impl Into<String>) -> Self {
        Self::Evaluation(key.into())
    }

    /// The step a slot belongs to. Slots cannot move between steps.
    #[inline]
    #[must_use]
    pub fn step(&self) -> Step {
        match self {
            FieldSlot::CustomerName | FieldSlot::CustomerPhone => Step::Step1,
            FieldSlot::Evaluation(_) => Step::Step2,
            FieldSlot::SolutionText => Step::Step3,
        }
    }

    /// Current value of this slot in `record`, if any
    #[must_use]
    pub fn read(&self, record: &GuestRecord) -> Option<Value> {
        match self {
            FieldSlot::CustomerName => record.customer_name.clone().map(Value::String),
            FieldSlot::CustomerPhone => record.customer_phone.clone().map(Value::String),
            FieldSlot::Evaluation(key) => record.evaluation.get(key).cloned(),
            FieldSlot::SolutionText => record.solution.text.clone().map(Value::String),
        }
    }
}

impl Display for FieldSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FieldSlot::CustomerName => f.write_str("customerName"),
            FieldSlot::CustomerPhone => f.write_str("customerPhone"),
            FieldSlot::Evaluation(key) => write!(f, "evaluation.{key}"),
            FieldSlot::SolutionText => f.write_str("solution.text"),
        }
    }
}

/// Lightweight format check applied before a present value earns points
///
/// A failing value is never rejected from the record; it simply scores as
/// not answered until it is corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldFormat {
    /// Anything present
    #[default]
    Text,
    /// At least seven digits, separated only by `+-(). `
    Phone,
    /// Non-negative integer, as a number or a numeric string
    Count,
    /// US ZIP (`12345`) or ZIP+4 (`12345-6789`)
    PostalCode,
}

impl FieldFormat {
    /// Whether a present value satisfies this format
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            FieldFormat::Text => true,
            FieldFormat::Phone => match value {
                Value::String(s) => is_phone(s),
                Value::Number(n) => n.as_u64().is_some_and(|digits| digits >= 1_000_000),
                _ => false,
            },
            FieldFormat::Count => match value {
                Value::Number(n) => n.as_u64().is_some(),
                Value::String(s) => s.trim().parse::<u32>().is_ok(),
                _ => false,
            },
            FieldFormat::PostalCode => match value {
                Value::String(s) => is_postal_code(s.trim()),
                Value::Number(n) => n.as_u64().is_some_and(|z| z.to_string().len() == 5),
                _ => false,
            },
        }
    }
}

fn is_phone(s: &str) -> bool {
    let mut digits = 0;
    for c in s.chars() {
        if c.is_ascii_digit() {
            digits += 1;
        } else if !matches!(c, '+' | '-' | '(' | ')' | '.' | ' ') {
            return false;
        }
    }
    digits >= 7
}

fn is_postal_code(s: &str) -> bool {
    let all_digits = |p: &str, len: usize| p.len() == len && p.bytes().all(|b| b.is_ascii_digit());
    match s.split_once('-') {
        Some((zip, plus4)) => all_digits(zip, 5) && all_digits(plus4, 4),
        None => all_digits(s, 5),
    }
}

/// A registered, weighted field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Registry name (e.g. `currentCarrier`)
    pub name: String,
    /// Where the value lives
    pub slot: FieldSlot,
    /// Owning step
    pub step: Step,
    /// Point weight
    pub weight: u32,
    /// Format check
    pub format: FieldFormat,
}

impl FieldSpec {
    /// Create a field spec; the step is taken from the slot
    #[must_use]
    pub fn new(name: impl Into<String>, slot: FieldSlot, weight: u32) -> Self {
        let step = slot.step();
        Self {
            name: name.into(),
            slot,
            step,
            weight,
            format: FieldFormat::Text,
        }
    }

    /// With a format check
    #[inline]
    #[must_use]
    pub fn with_format(mut self, format: FieldFormat) -> Self {
        self.format = format;
        self
    }

    /// Whether this field is answered in `record`: present and well-formed
    #[must_use]
    pub fn is_answered(&self, record: &GuestRecord) -> bool {
        self.slot
            .read(record)
            .is_some_and(|v| is_present(&v) && self.format.accepts(&v))
    }
}

static STANDARD: Lazy<FieldRegistry> = Lazy::new(|| {
    use FieldFormat::{Count, Phone, PostalCode};

    FieldRegistry::from_specs(vec![
        FieldSpec::new("customerName", FieldSlot::CustomerName, 8),
        FieldSpec::new("customerPhone", FieldSlot::CustomerPhone, 7).with_format(Phone),
        FieldSpec::new("currentCarrier", FieldSlot::evaluation("currentCarrier"), 12),
        FieldSpec::new("lineCount", FieldSlot::evaluation("lineCount"), 8).with_format(Count),
        FieldSpec::new("coverageZip", FieldSlot::evaluation("coverageZip"), 5)
            .with_format(PostalCode),
        FieldSpec::new("devicePayoff", FieldSlot::evaluation("devicePayoff"), 7),
        FieldSpec::new("financingPath", FieldSlot::evaluation("financingPath"), 6),
        FieldSpec::new("billPain", FieldSlot::evaluation("billPain"), 8),
        FieldSpec::new("dataNeed", FieldSlot::evaluation("dataNeed"), 6),
        FieldSpec::new("hotspotNeed", FieldSlot::evaluation("hotspotNeed"), 4),
        FieldSpec::new("internationalNeed", FieldSlot::evaluation("internationalNeed"), 4),
        FieldSpec::new("solutionText", FieldSlot::SolutionText, 25),
    ])
});

/// Registry of weighted intake fields
///
/// Iteration follows registration order. Callers must never assume a
/// particular weight total; use [`FieldRegistry::total_weight`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRegistry {
    fields: IndexMap<String, FieldSpec>,
}

impl FieldRegistry {
    /// The standard intake registry (weights total 100)
    #[inline]
    #[must_use]
    pub fn standard() -> &'static FieldRegistry {
        &STANDARD
    }

    /// Start building a custom registry
    #[inline]
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    fn from_specs(specs: Vec<FieldSpec>) -> Self {
        Self {
            fields: specs.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    /// Look up a field by name
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    /// Weight of a field
    #[inline]
    #[must_use]
    pub fn weight(&self, name: &str) -> Option<u32> {
        self.get(name).map(|f| f.weight)
    }

    /// Owning step of a field
    #[inline]
    #[must_use]
    pub fn step_of(&self, name: &str) -> Option<Step> {
        self.get(name).map(|f| f.step)
    }

    /// All fields in registration order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }

    /// Fields owned by `step`
    #[inline]
    pub fn fields_in(&self, step: Step) -> impl Iterator<Item = &FieldSpec> {
        self.iter().filter(move |f| f.step == step)
    }

    /// Evaluation attribute keys known to this registry
    pub fn evaluation_keys(&self) -> impl Iterator<Item = &str> {
        self.iter().filter_map(|f| match &f.slot {
            FieldSlot::Evaluation(key) => Some(key.as_str()),
            _ => None,
        })
    }

    /// Sum of all weights
    #[must_use]
    pub fn total_weight(&self) -> u32 {
        self.iter().map(|f| f.weight).sum()
    }

    /// Sum of weights owned by `step`
    #[must_use]
    pub fn step_max(&self, step: Step) -> u32 {
        self.fields_in(step).map(|f| f.weight).sum()
    }

    /// Number of registered fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields are registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::standard().clone()
    }
}

/// Builder for custom registries
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    specs: Vec<FieldSpec>,
}

impl RegistryBuilder {
    /// Add a field
    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Validate and build
    ///
    /// # Errors
    /// - `RegistryError::EmptyName` for a blank field name
    /// - `RegistryError::DuplicateField` when a name is registered twice
    /// - `RegistryError::DuplicateSlot` when two names point at one value
    pub fn build(self) -> Result<FieldRegistry, RegistryError> {
        let mut fields: IndexMap<String, FieldSpec> = IndexMap::with_capacity(self.specs.len());
        for spec in self.specs {
            if spec.name.trim().is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if fields.contains_key(&spec.name) {
                return Err(RegistryError::DuplicateField(spec.name));
            }
            if let Some(existing) = fields.values().find(|f| f.slot == spec.slot) {
                return Err(RegistryError::DuplicateSlot {
                    slot: spec.slot.to_string(),
                    first: existing.name.clone(),
                    second: spec.name,
                });
            }
            fields.insert(spec.name.clone(), spec);
        }
        Ok(FieldRegistry { fields })
    }
}

/// Whether a value counts as answered
///
/// `null`, blank strings, empty arrays and empty objects are unanswered.
/// Any number (including 0) and `true` are answered. A boolean `false` is
/// also unanswered: "explicitly no" and "unknown" are not distinguished.
#[must_use]
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(_) => true,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn presence_rules() {
        assert!(!is_present(&Value::Null));
        assert!(!is_present(&json!("")));
        assert!(!is_present(&json!("   \t")));
        assert!(!is_present(&json!([])));
        assert!(!is_present(&json!({})));
        assert!(!is_present(&json!(false)));

        assert!(is_present(&json!(0)));
        assert!(is_present(&json!(-1.5)));
        assert!(is_present(&json!(true)));
        assert!(is_present(&json!("x")));
        assert!(is_present(&json!([null])));
        assert!(is_present(&json!({"a": null})));
    }

    #[test]
    fn standard_registry_totals_100() {
        let registry = FieldRegistry::standard();
        assert_eq!(registry.total_weight(), 100);
        assert_eq!(registry.step_max(Step::Step1), 15);
        assert_eq!(registry.step_max(Step::Step2), 60);
        assert_eq!(registry.step_max(Step::Step3), 25);
        assert_eq!(registry.weight("currentCarrier"), Some(12));
        assert_eq!(registry.step_of("solutionText"), Some(Step::Step3));
        assert_eq!(registry.weight("nope"), None);
    }

    #[test]
    fn standard_registry_passes_builder_validation() {
        let rebuilt = FieldRegistry::standard()
            .iter()
            .cloned()
            .fold(FieldRegistry::builder(), RegistryBuilder::field)
            .build()
            .unwrap();
        assert_eq!(&rebuilt, FieldRegistry::standard());
    }

    #[test]
    fn builder_rejects_duplicates() {
        let err = FieldRegistry::builder()
            .field(FieldSpec::new("a", FieldSlot::CustomerName, 1))
            .field(FieldSpec::new("a", FieldSlot::CustomerPhone, 1))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateField(name) if name == "a"));

        let err = FieldRegistry::builder()
            .field(FieldSpec::new("carrier", FieldSlot::evaluation("carrier"), 1))
            .field(FieldSpec::new("provider", FieldSlot::evaluation("carrier"), 1))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateSlot { .. }));

        let err = FieldRegistry::builder()
            .field(FieldSpec::new("  ", FieldSlot::SolutionText, 1))
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::EmptyName));
    }

    #[test]
    fn slot_determines_step() {
        let spec = FieldSpec::new("zip", FieldSlot::evaluation("coverageZip"), 3);
        assert_eq!(spec.step, Step::Step2);
        assert_eq!(FieldSlot::SolutionText.step(), Step::Step3);
    }

    #[test]
    fn formats() {
        assert!(FieldFormat::Phone.accepts(&json!("555-1234")));
        assert!(FieldFormat::Phone.accepts(&json!("+1 (555) 123.4567")));
        assert!(!FieldFormat::Phone.accepts(&json!("555-12")));
        assert!(!FieldFormat::Phone.accepts(&json!("call me")));
        assert!(FieldFormat::Phone.accepts(&json!(5551234)));
        assert!(!FieldFormat::Phone.accepts(&json!(555123)));
        assert!(!FieldFormat::Phone.accepts(&json!(-123456)));
        assert!(!FieldFormat::Phone.accepts(&json!(12345.6)));

        assert!(FieldFormat::Count.accepts(&json!(0)));
        assert!(FieldFormat::Count.accepts(&json!(" 4 ")));
        assert!(!FieldFormat::Count.accepts(&json!("four")));
        assert!(!FieldFormat::Count.accepts(&json!(-2)));
        assert!(!FieldFormat::Count.accepts(&json!(2.5)));

        assert!(FieldFormat::PostalCode.accepts(&json!("94110")));
        assert!(FieldFormat::PostalCode.accepts(&json!("94110-1234")));
        assert!(FieldFormat::PostalCode.accepts(&json!(94110)));
        assert!(!FieldFormat::PostalCode.accepts(&json!("9411")));
        assert!(!FieldFormat::PostalCode.accepts(&json!("94110-12")));
    }

    #[test]
    fn step_order() {
        assert!(Step::Step1 < Step::Step3);
        assert_eq!(Step::ALL.map(Step::rank), [0, 1, 2]);
        assert_eq!(serde_json::to_value(Step::Step2).unwrap(), json!("step2"));
    }
}
