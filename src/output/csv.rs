use anyhow::Result;

use crate::results::{AssignmentSummary, AssignmentTable};

/// Assigned records only, or the full long form when `all` is set.
pub fn assignments_to_csv(table: &AssignmentTable, all: bool) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "camper",
        "cabin",
        "block",
        "fleet",
        "seatrade",
        "assigned",
        "preference_rank",
    ])?;
    for r in table.records().iter().filter(|r| all || r.assigned) {
        writer.write_record([
            r.camper.clone(),
            r.cabin.clone(),
            r.block.to_string(),
            r.fleet.to_string(),
            r.seatrade.clone(),
            r.assigned.to_string(),
            r.preference_rank.to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn summary_to_csv(summary: &AssignmentSummary) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["instance", "assigned", "min_capacity", "max_capacity"])?;
    for fill in &summary.instances {
        writer.write_record([
            fill.label.clone(),
            fill.assigned.to_string(),
            fill.min_capacity.to_string(),
            fill.max_capacity.to_string(),
        ])?;
    }
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}
