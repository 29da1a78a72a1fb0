//! Scoring, status and normalization properties.
//!
//! Scenario tests walk one guest through the interview; the proptest blocks
//! check the invariants that must hold for every record shape.

use intake_record::{
    compute_quality, detect_status, normalize, normalize_record, FieldRegistry, GuestRecord,
    Status, Step,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};

#[test]
fn scenario_a_empty_record() {
    let record = GuestRecord::new();
    assert_eq!(detect_status(&record), Status::New);
    assert_eq!(compute_quality(&record).pct, 0);
}

#[test]
fn scenario_b_customer_info_only() {
    let record = GuestRecord::new()
        .with_customer_name("Jane")
        .with_customer_phone("555-1234");
    assert_eq!(detect_status(&record), Status::New);
    assert_eq!(compute_quality(&record).pct, 15);
}

#[test]
fn scenario_c_carrier_captured() {
    let record = GuestRecord::new()
        .with_customer_name("Jane")
        .with_customer_phone("555-1234")
        .with_evaluation("currentCarrier", json!("Verizon"));
    assert_eq!(detect_status(&record), Status::Working);
    assert_eq!(compute_quality(&record).pct, 27);
}

#[test]
fn scenario_d_solution_pitched() {
    let record = GuestRecord::new()
        .with_customer_name("Jane")
        .with_customer_phone("555-1234")
        .with_evaluation("currentCarrier", json!("Verizon"))
        .with_solution_text("Switch to unlimited plan");
    assert_eq!(detect_status(&record), Status::Proposal);

    let report = compute_quality(&record);
    assert_eq!(report.pct, 52);
    assert_eq!(report.steps.get(Step::Step3).earned, 25);
}

#[test]
fn scenario_e_external_sold_wins() {
    let raw = json!({
        "customerName": "Jane",
        "customerPhone": "555-1234",
        "evaluation": {"currentCarrier": "Verizon"},
        "solution": {"text": "Switch to unlimited plan"},
        "status": "sold"
    });
    let record = normalize(&raw).record;
    assert_eq!(detect_status(&record), Status::Sold);
}

const EVALUATION_KEYS: [&str; 9] = [
    "currentCarrier",
    "lineCount",
    "coverageZip",
    "devicePayoff",
    "financingPath",
    "billPain",
    "dataNeed",
    "hotspotNeed",
    "internationalNeed",
];

fn any_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (0u32..20).prop_map(|n| json!(n)),
        "[a-zA-Z0-9 -]{0,12}".prop_map(Value::String),
        Just(json!([])),
        Just(json!(["x"])),
        Just(json!({})),
    ]
}

fn present_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!(true)),
        (0u32..20).prop_map(|n| json!(n)),
        "[a-z]{1,8}".prop_map(Value::String),
    ]
}

const EXTRA_KEYS: [&str; 3] = ["notes", "region", "assignedTo"];

fn timestamp() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!("2026-01-01T00:00:00Z")),
        Just(json!("2026-03-15T09:30:00.250Z")),
        Just(json!("2026-03-15T11:30:00+02:00")),
        Just(json!("yesterday")),
        (0u32..5).prop_map(|n| json!(n)),
    ]
}

fn sale() -> impl Strategy<Value = Value> {
    prop_oneof![
        (
            "S-[0-9]{1,4}",
            proptest::option::of(timestamp()),
            proptest::option::of(0u32..6)
        )
            .prop_map(|(id, sold_at, units)| {
                let mut sale = json!({"saleId": id});
                if let Some(at) = sold_at {
                    sale["soldAt"] = at;
                }
                if let Some(units) = units {
                    sale["units"] = json!(units);
                }
                sale
            }),
        Just(json!("sold")),
        Just(json!({})),
    ]
}

fn completion() -> impl Strategy<Value = Value> {
    prop_oneof![
        (0u8..=100, proptest::collection::vec((0u32..40, 0u32..40), 3), proptest::option::of(timestamp()))
            .prop_map(|(pct, steps, at)| {
                let mut snapshot = json!({
                    "pct": pct,
                    "steps": {
                        "step1": {"earned": steps[0].0, "max": steps[0].1},
                        "step2": {"earned": steps[1].0, "max": steps[1].1},
                        "step3": {"earned": steps[2].0, "max": steps[2].1},
                    }
                });
                if let Some(at) = at {
                    snapshot["updatedAt"] = at;
                }
                snapshot
            }),
        Just(json!({"pct": "high"})),
    ]
}

/// Keys the interview never edits: identity, sale, cached score, timestamps, foreign keys
fn bookkeeping() -> impl Strategy<Value = Vec<(String, Value)>> {
    (
        proptest::option::of(prop_oneof!["[0-9A-Z]{4,26}".prop_map(Value::String), Just(json!(7))]),
        proptest::option::of(sale()),
        proptest::option::of(completion()),
        proptest::option::of(timestamp()),
        proptest::option::of(timestamp()),
        proptest::collection::btree_map(proptest::sample::select(EXTRA_KEYS.to_vec()), any_value(), 0..3),
    )
        .prop_map(|(id, sale, completion, submitted, updated, extra)| {
            let mut keys = Vec::new();
            let named = [
                ("id", id),
                ("sale", sale),
                ("completion", completion),
                ("submittedAt", submitted),
                ("updatedAt", updated),
            ];
            for (key, value) in named {
                if let Some(value) = value {
                    keys.push((key.to_string(), value));
                }
            }
            keys.extend(extra.into_iter().map(|(k, v)| (k.to_string(), v)));
            keys
        })
}

/// Raw records mixing canonical, legacy flat and malformed shapes
fn raw_record() -> impl Strategy<Value = Value> {
    (
        proptest::option::of("[A-Za-z ]{0,10}"),
        proptest::option::of("[0-9-]{0,10}"),
        proptest::collection::btree_map(proptest::sample::select(EVALUATION_KEYS.to_vec()), any_value(), 0..5),
        proptest::collection::btree_map(proptest::sample::select(EVALUATION_KEYS.to_vec()), any_value(), 0..3),
        proptest::option::of("[A-Za-z ]{0,16}"),
        any::<bool>(),
        proptest::option::of(prop_oneof![
            Just("new"),
            Just("working"),
            Just("sold"),
            Just("bogus"),
            Just("")
        ]),
        bookkeeping(),
    )
        .prop_map(|(name, phone, nested, legacy, solution, flat_solution, status, bookkeeping)| {
            let mut map = serde_json::Map::new();
            if let Some(name) = name {
                map.insert("guestName".into(), json!(name));
            }
            if let Some(phone) = phone {
                map.insert("customerPhone".into(), json!(phone));
            }
            let nested: serde_json::Map<String, Value> =
                nested.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
            map.insert("evaluation".into(), Value::Object(nested));
            for (k, v) in legacy {
                map.insert(k.to_string(), v);
            }
            if let Some(text) = solution {
                if flat_solution {
                    map.insert("solution".into(), json!(text));
                } else {
                    map.insert("solution".into(), json!({"text": text}));
                }
            }
            if let Some(status) = status {
                map.insert("status".into(), json!(status));
            }
            map.extend(bookkeeping);
            Value::Object(map)
        })
}

/// Canonical records with an inferred status
fn inferred_record() -> impl Strategy<Value = GuestRecord> {
    raw_record().prop_map(|raw| {
        let mut record = normalize(&raw).record;
        record.status = intake_record::StatusMark::Inferred;
        record
    })
}

proptest! {
    #[test]
    fn prop_normalize_is_idempotent(raw in raw_record()) {
        let once = normalize(&raw);
        let twice = normalize_record(&once.record);
        prop_assert_eq!(&once, &twice);
        for key in EXTRA_KEYS {
            let kept = raw.get(key).is_some_and(|v| !v.is_null());
            prop_assert_eq!(once.record.extra.contains_key(key), kept);
        }
    }

    #[test]
    fn prop_scoring_is_deterministic(record in inferred_record()) {
        prop_assert_eq!(compute_quality(&record), compute_quality(&record));
    }

    #[test]
    fn prop_step_maxima_partition_total(record in inferred_record()) {
        let report = compute_quality(&record);
        let max_sum: u32 = Step::ALL.iter().map(|s| report.steps.get(*s).max).sum();
        prop_assert_eq!(max_sum, FieldRegistry::standard().total_weight());
        prop_assert!(report.pct <= 100);
        for step in Step::ALL {
            let score = report.steps.get(step);
            prop_assert!(score.earned <= score.max);
        }
    }

    #[test]
    fn prop_more_data_never_lowers_status(
        record in inferred_record(),
        additions in proptest::collection::btree_map(
            proptest::sample::select(EVALUATION_KEYS.to_vec()),
            present_value(),
            0..4,
        ),
        add_solution in any::<bool>(),
    ) {
        let before = detect_status(&record);

        let mut richer = record.clone();
        for (key, value) in additions {
            let already = richer.evaluation.get(key).is_some_and(intake_record::is_present);
            if !already {
                richer.evaluation.set(key, value);
            }
        }
        if add_solution && richer.solution.text.as_deref().map_or(true, |t| t.trim().is_empty()) {
            richer.solution.text = Some("Bundle".to_string());
        }

        prop_assert!(detect_status(&richer).rank() >= before.rank());
    }
}
