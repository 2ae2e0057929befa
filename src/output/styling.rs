use std::fmt::Display;

use console::{style, StyledObject};

use crate::store::CalculationStatus;

/// Coverage at or above which partially analyzed samples are shown as a warning
/// rather than an error.
pub const COVERAGE_WARNING_THRESHOLD: f64 = 75.0;

pub fn bright_yellow(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn bright_green(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn bright_red(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn cyan(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn dim(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn bright(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright()
}

pub fn magenta_bold(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

/// "analyzed/total", green when every run was priced.
pub fn runs_analyzed(analyzed: usize, total: usize, coverage: f64) -> StyledObject<String> {
    let text = format!("{analyzed}/{total}");
    if analyzed == total {
        bright_green(text)
    } else if coverage >= COVERAGE_WARNING_THRESHOLD {
        bright_yellow(text)
    } else {
        bright_red(text)
    }
}

pub fn status(status: CalculationStatus) -> StyledObject<String> {
    match status {
        CalculationStatus::Completed => bright_green(status),
        CalculationStatus::Failed => bright_red(status),
        CalculationStatus::Pending | CalculationStatus::Running => bright_yellow(status),
    }
}

pub fn warning(text: impl Display) -> String {
    format!("  {} {text}", bright_yellow("⚠"))
}
