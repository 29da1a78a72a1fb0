//! Scripted editing sessions
//!
//! A script is a JSON array of actions, e.g.
//!
//! ```json
//! [
//!   {"input": {"field": "customerName", "value": "Jane"}},
//!   "blur",
//!   {"wait": {"ms": 700}},
//!   {"revert": {"target": "step2"}},
//!   "mark_sold",
//!   "flush"
//! ]
//! ```

use anyhow::{Context, Result};
use intake_record::Step;
use intake_session::{RevertTarget, SessionHandle};
use intake_store::{Store, StorePath, UpdateBatch};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

/// One scripted action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Action {
    /// Edit a field
    Input { field: String, value: Value },
    /// Focus leaves the field
    Blur,
    /// Let time pass
    Wait { ms: u64 },
    /// Manual step change
    Navigate { step: Step },
    /// Confirmed revert
    Revert { target: RevertTarget },
    /// External actor marks the record sold
    MarkSold,
    /// Commit now
    Flush,
}

/// Read a script file
pub(crate) fn load(path: &Path) -> Result<Vec<Action>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing script {}", path.display()))
}

/// Built-in walk through all three steps
pub(crate) fn default_script() -> Vec<Action> {
    let input = |field: &str, value: Value| Action::Input {
        field: field.to_string(),
        value,
    };
    vec![
        input("customerName", json!("Jane")),
        input("customerPhone", json!("555-1234")),
        Action::Blur,
        input("currentCarrier", json!("Verizon")),
        input("lineCount", json!(3)),
        input("coverageZip", json!("94107")),
        input("billPain", json!("overage fees")),
        Action::Blur,
        Action::Wait { ms: 1_000 },
        input("solutionText", json!("Switch to unlimited plan")),
        Action::Blur,
        Action::Wait { ms: 1_000 },
        Action::MarkSold,
        Action::Wait { ms: 100 },
    ]
}

/// Play `actions` against an open session
pub(crate) async fn play(
    session: &SessionHandle,
    store: &dyn Store,
    guests: &StorePath,
    actions: &[Action],
) -> Result<()> {
    for action in actions {
        tracing::debug!(?action, "script action");
        match action {
            Action::Input { field, value } => session.input(field, value.clone()).await?,
            Action::Blur => session.blur().await?,
            Action::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
            Action::Navigate { step } => session.navigate(*step).await?,
            Action::Revert { target } => {
                if let Err(err) = session.revert(*target).await {
                    tracing::warn!(error = %err, "revert failed");
                }
            }
            Action::MarkSold => mark_sold(session, store, guests).await?,
            Action::Flush => {
                if let Err(err) = session.flush().await {
                    tracing::warn!(error = %err, "flush failed");
                }
            }
        }
    }
    Ok(())
}

async fn mark_sold(session: &SessionHandle, store: &dyn Store, guests: &StorePath) -> Result<()> {
    let Some(id) = session.view().record_id else {
        tracing::warn!("mark_sold before the record exists; skipped");
        return Ok(());
    };
    let record = guests.child(id.as_str());
    store
        .update(
            UpdateBatch::new()
                .set(record.child("status"), json!("sold"))
                .set(record.child("sale"), json!({"saleId": format!("SIM-{id}"), "units": 1})),
        )
        .await
        .context("marking record sold")?;
    tracing::info!(record_id = %id, "external sale recorded");
    Ok(())
}
