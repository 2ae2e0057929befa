use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, Color as TableColor, ContentArrangement, Table};

use super::styling::COVERAGE_WARNING_THRESHOLD;
use crate::store::CalculationStatus;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn minutes_cell(minutes: f64) -> Cell {
    Cell::new(format!("{minutes:.1}")).set_alignment(CellAlignment::Right)
}

pub fn cost_cell(cost: f64) -> Cell {
    Cell::new(format_usd(cost)).set_alignment(CellAlignment::Right)
}

/// Share of runs that could be priced; low coverage means the totals undercount.
pub fn color_coded_coverage_cell(coverage: f64) -> Cell {
    let text = format!("{coverage:.1}%");
    if coverage >= 95.0 {
        Cell::new(text).fg(TableColor::Green)
    } else if coverage >= COVERAGE_WARNING_THRESHOLD {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::Red)
    }
}

pub fn status_cell(status: CalculationStatus) -> Cell {
    let color = match status {
        CalculationStatus::Completed => TableColor::Green,
        CalculationStatus::Failed => TableColor::Red,
        CalculationStatus::Pending | CalculationStatus::Running => TableColor::Yellow,
    };
    Cell::new(status).fg(color)
}

pub fn format_usd(amount: f64) -> String {
    format!("${amount:.2}")
}
