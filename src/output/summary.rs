use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor};

use crate::cost::{AggregateResult, Horizon, OsClass};
use crate::store::CalculationRecord;

use super::styling::{
    bright, bright_red, bright_yellow, cyan, dim, runs_analyzed, status, warning,
};
use super::tables::{
    color_coded_coverage_cell, cost_cell, create_table, cyan_header, format_usd, minutes_cell,
    status_cell,
};

/// Prints a human-readable cost estimate to stdout.
///
/// Displays:
/// - Overview: repository, sampling window, runs analyzed vs discovered,
///   and where the minutes came from
/// - Cost by OS: minutes and cost per OS class, actual and projected
/// - Projection: monthly and yearly totals
pub fn print_summary(result: &AggregateResult) {
    println!("{}", render_summary(result));
}

/// Prints a stored calculation, including its status.
pub fn print_record(record: &CalculationRecord) {
    println!("{}", render_record(record));
}

/// Prints every stored calculation as one table.
pub fn print_records<'a>(records: impl IntoIterator<Item = &'a CalculationRecord>) {
    println!("{}", render_records(records));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn render_summary(result: &AggregateResult) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Overview");


    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {} billing data, {} job timestamps\n",
        dim("Repository:"),
        cyan(&result.repository),
        dim("Sampling window:"),
        bright_yellow(format!("{} days", result.days)),
        dim("Runs analyzed:"),
        runs_analyzed(result.analyzed_runs, result.total_runs, result.coverage()),
        dim("Minutes from:"),
        bright_yellow(result.authoritative_runs),
        bright_yellow(result.estimated_runs),
    );

    if result.total_runs == 0 {
        let _ = writeln!(
            output,
            "{}",
            bright_yellow("No workflow runs found in the sampling window.")
        );
        return output;
    }

    add_section_header(&mut output, "💻", "Cost by OS");

    let mut os_table = create_table();
    os_table.set_header(cyan_header(&[
        "OS",
        "Rate/min",
        "Minutes",
        "Cost",
        "Monthly Minutes",
        "Monthly Cost",
        "Yearly Cost",
    ]));

    for class in OsClass::ALL {
        os_table.add_row(vec![
            Cell::new(class),
            Cell::new(format!("${:.3}", class.rate_per_minute())),
            minutes_cell(result.minutes(class)),
            cost_cell(result.projected_class_cost(class, Horizon::Actual)),
            minutes_cell(result.projected_minutes(class, Horizon::Monthly)),
            cost_cell(result.projected_class_cost(class, Horizon::Monthly)),
            cost_cell(result.projected_class_cost(class, Horizon::Yearly)),
        ]);
    }

    os_table.add_row(vec![
        Cell::new("Total").fg(TableColor::Cyan),
        Cell::new(""),
        minutes_cell(result.total_minutes()),
        cost_cell(result.actual_cost),
        minutes_cell(result.total_minutes() * Horizon::Monthly.multiplier(result.days)),
        cost_cell(result.monthly_cost),
        cost_cell(result.yearly_cost),
    ]);

    let _ = writeln!(output, "{os_table}\n");

    add_section_header(&mut output, "💰", "Projection");

    let mut projection_table = create_table();
    projection_table.set_header(cyan_header(&["Horizon", "Cost", "Coverage"]));
    for horizon in Horizon::ALL {
        projection_table.add_row(vec![
            Cell::new(horizon.label()),
            cost_cell(result.projected_cost(horizon)),
            color_coded_coverage_cell(result.coverage()),
        ]);
    }

    let _ = writeln!(output, "{projection_table}\n");

    if result.analyzed_runs < result.total_runs {
        let _ = writeln!(
            output,
            "{}",
            warning(format!(
                "{} runs could not be priced; totals undercount actual usage.",
                result.total_runs - result.analyzed_runs
            ))
        );
    }

    let _ = writeln!(
        output,
        "  {} Estimates ignore free-tier minutes and per-job rounding.",
        cyan("•")
    );

    output
}

fn render_record(record: &CalculationRecord) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n",
        dim("Repository:"),
        cyan(&record.repository),
        dim("Status:"),
        status(record.status),
        dim("Updated:"),
        dim(record.updated_at.format("%Y-%m-%d %H:%M UTC")),
    );

    if let Some(error) = &record.error {
        let _ = writeln!(output, "  {} {}\n", dim("Last error:"), bright_red(error));
    }

    match &record.result {
        Some(result) => output.push_str(&render_summary(result)),
        None => {
            let _ = writeln!(output, "{}", bright_yellow("No completed calculation yet."));
        }
    }

    output
}

fn render_records<'a>(records: impl IntoIterator<Item = &'a CalculationRecord>) -> String {
    let mut output = String::new();
    add_section_header(&mut output, "🗂", "Calculations");

    let mut table = create_table();
    table.set_header(cyan_header(&[
        "Repository",
        "Status",
        "Window",
        "Runs",
        "Monthly Cost",
        "Yearly Cost",
        "Updated",
    ]));

    let mut count = 0;
    for record in records {
        count += 1;
        let (window, runs, monthly, yearly) = match &record.result {
            Some(result) => (
                format!("{} days", result.days),
                format!("{}/{}", result.analyzed_runs, result.total_runs),
                format_usd(result.monthly_cost),
                format_usd(result.yearly_cost),
            ),
            None => Default::default(),
        };

        table.add_row(vec![
            Cell::new(&record.repository),
            status_cell(record.status),
            Cell::new(window),
            Cell::new(runs),
            Cell::new(monthly),
            Cell::new(yearly),
            Cell::new(record.updated_at.format("%Y-%m-%d %H:%M")),
        ]);
    }

    if count == 0 {
        let _ = writeln!(output, "{}", bright_yellow("No stored calculations."));
    } else {
        let _ = writeln!(output, "{table}");
    }

    output
}
