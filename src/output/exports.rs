use anyhow::Result;
use serde::Serialize;
use std::io::Write;

use crate::config::OutputFormat;
use crate::cost::{AggregateResult, Horizon, OsClass};

/// Writes a value as JSON, optionally pretty-printed.
pub fn export_json<T: Serialize>(value: &T, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

/// Exports a cost estimate in a machine-readable format.
///
/// - JSON: the aggregate as stored
/// - CSV: one row per OS class plus a total row, with actual and projected
///   minutes and costs
pub fn export_result(
    result: &AggregateResult,
    format: OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Summary => {
            anyhow::bail!("Summary format is rendered by the terminal printer, not exported")
        }
        OutputFormat::Json => export_json(result, pretty, output),
        OutputFormat::Csv => export_csv(result, output),
    }
}

fn export_csv(result: &AggregateResult, output: &mut dyn Write) -> Result<()> {
    writeln!(output, "Repository,Days,Total Runs,Analyzed Runs,OS,Minutes,Cost,Monthly Minutes,Monthly Cost,Yearly Minutes,Yearly Cost")?;

    for class in OsClass::ALL {
        writeln!(
            output,
            "\"{}\",{},{},{},{},{:.2},{:.4},{:.2},{:.4},{:.2},{:.4}",
            result.repository,
            result.days,
            result.total_runs,
            result.analyzed_runs,
            class,
            result.minutes(class),
            result.projected_class_cost(class, Horizon::Actual),
            result.projected_minutes(class, Horizon::Monthly),
            result.projected_class_cost(class, Horizon::Monthly),
            result.projected_minutes(class, Horizon::Yearly),
            result.projected_class_cost(class, Horizon::Yearly),
        )?;
    }

    writeln!(
        output,
        "\"{}\",{},{},{},Total,{:.2},{:.4},{:.2},{:.4},{:.2},{:.4}",
        result.repository,
        result.days,
        result.total_runs,
        result.analyzed_runs,
        result.total_minutes(),
        result.actual_cost,
        result.total_minutes() * Horizon::Monthly.multiplier(result.days),
        result.monthly_cost,
        result.total_minutes() * Horizon::Yearly.multiplier(result.days),
        result.yearly_cost,
    )?;

    Ok(())
}
