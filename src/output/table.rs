use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::domain::ValidationErrors;
use crate::results::{AssignmentSummary, AssignmentTable, UNRANKED_SENTINEL};

pub fn render_assignments_table(assignments: &AssignmentTable) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Camper", "Cabin", "Block", "Fleet", "Seatrade", "Rank"]);

    for r in assignments.assigned() {
        let rank_cell = match r.preference_rank {
            1 => Cell::new("1").fg(Color::Green),
            2 => Cell::new("2").fg(Color::Yellow),
            UNRANKED_SENTINEL => Cell::new("unlisted").fg(Color::Red),
            other => Cell::new(other.to_string()).fg(Color::DarkYellow),
        };
        table.add_row(Row::from(vec![
            Cell::new(&r.camper),
            Cell::new(&r.cabin),
            Cell::new(r.block.to_string()),
            Cell::new(r.fleet.to_string()),
            Cell::new(&r.seatrade),
            rank_cell,
        ]));
    }
    table.to_string()
}

pub fn render_summary_table(summary: &AssignmentSummary) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Instance", "Assigned", "Capacity", "Fill"]);
    for fill in &summary.instances {
        let fill_cell = if fill.assigned == 0 {
            Cell::new("idle").fg(Color::DarkGrey)
        } else if fill.within_capacity() {
            Cell::new("OK").fg(Color::Green)
        } else {
            Cell::new("OUT OF RANGE").fg(Color::Red)
        };
        table.add_row(Row::from(vec![
            Cell::new(&fill.label),
            Cell::new(fill.assigned.to_string()),
            Cell::new(format!("{}-{}", fill.min_capacity, fill.max_capacity)),
            fill_cell,
        ]));
    }

    let ranks = summary
        .rank_histogram
        .iter()
        .map(|(rank, count)| format!("#{rank}: {count}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut out = table.to_string();
    out.push_str(&format!(
        "\nCampers: {}  Assignments: {}  Cabin activations: {}\nRanks: {}",
        summary.campers, summary.assignments, summary.cabin_activations, ranks
    ));
    if summary.unranked > 0 {
        out.push_str(&format!("\nUnlisted assignments: {}", summary.unranked));
    }
    out
}

pub fn render_validation_table(errors: &ValidationErrors) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Problem"]);
    for (idx, err) in errors.iter().enumerate() {
        table.add_row(vec![(idx + 1).to_string(), err.to_string()]);
    }
    table.to_string()
}
