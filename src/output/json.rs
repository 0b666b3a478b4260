use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::Camp;
use crate::engine::SolveOutcome;

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Outcome plus the derived views, as the CLI prints it with `--output json`.
pub fn outcome_report(outcome: &SolveOutcome, camp: &Camp) -> Value {
    let (summary, by_cabin, by_seatrade) = match &outcome.table {
        Some(table) => (
            json!(table.summary(camp)),
            json!(table.by_cabin()),
            json!(table.by_seatrade()),
        ),
        None => (Value::Null, Value::Null, Value::Null),
    };
    json!({
        "status": outcome.code,
        "solver_status": outcome.status,
        "certified_optimal": outcome.certified_optimal,
        "objective": outcome.objective,
        "backend": outcome.backend,
        "model": outcome.model_stats,
        "started_at": outcome.started_at,
        "finished_at": outcome.finished_at,
        "summary": summary,
        "by_cabin": by_cabin,
        "by_seatrade": by_seatrade,
        "assignments": outcome
            .table
            .as_ref()
            .map(|t| t.assigned().cloned().collect::<Vec<_>>()),
    })
}
