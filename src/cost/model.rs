use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pricing::OsClass;

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Billable time reported by GitHub for a single OS class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub total_ms: i64,
}

/// Provider-reported billable time of a run, keyed by OS class.
pub type AuthoritativeUsage = BTreeMap<OsClass, UsageRecord>;

/// A completed GitHub Actions workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub name: String,
    pub run_number: u64,
    pub status: String,
    pub conclusion: Option<String>,
    pub created_at: DateTime<Utc>,
    pub html_url: String,
}

/// A job of a workflow run, reduced to what cost estimation needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
}

/// Minutes and cost accumulated for one OS class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassCost {
    pub minutes: f64,
    pub cost: f64,
}

/// Cost of a single run split by OS class.
///
/// Cost is always derived from minutes, so `cost == minutes * rate` holds
/// for every class and the total is the sum of the class costs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostBreakdown {
    pub linux: ClassCost,
    pub windows: ClassCost,
    pub macos: ClassCost,
}

impl CostBreakdown {
    pub fn get(&self, class: OsClass) -> ClassCost {
        match class {
            OsClass::Linux => self.linux,
            OsClass::Windows => self.windows,
            OsClass::MacOs => self.macos,
        }
    }

    fn get_mut(&mut self, class: OsClass) -> &mut ClassCost {
        match class {
            OsClass::Linux => &mut self.linux,
            OsClass::Windows => &mut self.windows,
            OsClass::MacOs => &mut self.macos,
        }
    }

    /// Adds `minutes` of runner time to `class`, pricing them at the class rate.
    pub fn add_minutes(&mut self, class: OsClass, minutes: f64) {
        let bucket = self.get_mut(class);
        bucket.minutes += minutes;
        bucket.cost = bucket.minutes * class.rate_per_minute();
    }

    pub fn total_minutes(&self) -> f64 {
        OsClass::ALL.iter().map(|class| self.get(*class).minutes).sum()
    }

    pub fn total_cost(&self) -> f64 {
        OsClass::ALL.iter().map(|class| self.get(*class).cost).sum()
    }
}

/// Result of pricing a run from provider billing data.
#[derive(Debug, Clone, PartialEq)]
pub enum UsageOutcome {
    Authoritative(CostBreakdown),
    /// No billable signal: the caller should estimate from job timestamps.
    Insufficient,
}

/// Prices a run from GitHub's billable timing data.
///
/// Classes with a non-positive duration contribute nothing. Returns
/// [`UsageOutcome::Insufficient`] when the usage is absent or carries no
/// positive duration at all, which is what public repositories report.
pub fn compute_from_authoritative(usage: Option<&AuthoritativeUsage>) -> UsageOutcome {
    let Some(usage) = usage else {
        return UsageOutcome::Insufficient;
    };

    let mut breakdown = CostBreakdown::default();
    let mut has_signal = false;

    for (class, record) in usage {
        if record.total_ms > 0 {
            #[allow(clippy::cast_precision_loss)]
            breakdown.add_minutes(*class, record.total_ms as f64 / MILLIS_PER_MINUTE);
            has_signal = true;
        }
    }

    if has_signal {
        UsageOutcome::Authoritative(breakdown)
    } else {
        UsageOutcome::Insufficient
    }
}

/// Estimates the cost of a run from its job timestamps.
///
/// Jobs that never started or never completed are skipped. A job whose
/// completion precedes its start counts as zero minutes.
pub fn compute_from_jobs(jobs: &[JobRecord]) -> CostBreakdown {
    let mut breakdown = CostBreakdown::default();

    for job in jobs {
        let (Some(started_at), Some(completed_at)) = (job.started_at, job.completed_at) else {
            continue;
        };

        let elapsed_ms = (completed_at - started_at).num_milliseconds().max(0);

        #[allow(clippy::cast_precision_loss)]
        let minutes = elapsed_ms as f64 / MILLIS_PER_MINUTE;

        breakdown.add_minutes(classify_runner_os(&job.labels), minutes);
    }

    breakdown
}

/// Classifies runner labels into an OS class.
///
/// macOS wins over Windows when both appear; anything unrecognised is Linux.
pub fn classify_runner_os<S: AsRef<str>>(labels: &[S]) -> OsClass {
    let labels: Vec<String> = labels
        .iter()
        .map(|label| label.as_ref().to_lowercase())
        .collect();

    if labels
        .iter()
        .any(|label| label.contains("macos") || label.contains("mac-os"))
    {
        OsClass::MacOs
    } else if labels.iter().any(|label| label.contains("windows")) {
        OsClass::Windows
    } else {
        OsClass::Linux
    }
}
