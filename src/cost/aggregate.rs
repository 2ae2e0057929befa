use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::model::{
    compute_from_authoritative, compute_from_jobs, AuthoritativeUsage, CostBreakdown, JobRecord,
    UsageOutcome, WorkflowRun,
};
use super::pricing::OsClass;
use crate::error::{CostError, Result};

const DAYS_PER_MONTH: f64 = 30.0;
const DAYS_PER_YEAR: f64 = 365.0;

/// Per-run data a calculation pass needs from the hosting provider.
///
/// Either call may fail; the aggregator treats failures as missing data for
/// that run only.
#[allow(async_fn_in_trait)]
pub trait RunDataSource {
    async fn fetch_usage(&self, run: &WorkflowRun) -> Result<AuthoritativeUsage>;

    async fn fetch_jobs(&self, run: &WorkflowRun) -> Result<Vec<JobRecord>>;
}

/// Where the cost of a run came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostSource {
    Authoritative,
    Jobs,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RunCost {
    breakdown: CostBreakdown,
    source: CostSource,
}

/// Time horizon a sampled total is projected onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    Actual,
    Monthly,
    Yearly,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::Actual, Horizon::Monthly, Horizon::Yearly];

    #[allow(clippy::cast_precision_loss)]
    pub fn multiplier(self, days: i64) -> f64 {
        match self {
            Horizon::Actual => 1.0,
            Horizon::Monthly => DAYS_PER_MONTH / days as f64,
            Horizon::Yearly => DAYS_PER_YEAR / days as f64,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Horizon::Actual => "Actual",
            Horizon::Monthly => "Monthly",
            Horizon::Yearly => "Yearly",
        }
    }
}

/// Totals of one calculation pass over a sampling window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub repository: String,
    pub days: i64,
    pub total_runs: usize,
    pub analyzed_runs: usize,
    /// Analyzed runs priced from GitHub's billing data.
    pub authoritative_runs: usize,
    /// Analyzed runs priced from job timestamps.
    pub estimated_runs: usize,
    pub linux_minutes: f64,
    pub windows_minutes: f64,
    pub macos_minutes: f64,
    pub actual_cost: f64,
    pub monthly_cost: f64,
    pub yearly_cost: f64,
}

impl AggregateResult {
    pub fn minutes(&self, class: OsClass) -> f64 {
        match class {
            OsClass::Linux => self.linux_minutes,
            OsClass::Windows => self.windows_minutes,
            OsClass::MacOs => self.macos_minutes,
        }
    }

    pub fn total_minutes(&self) -> f64 {
        OsClass::ALL.iter().map(|class| self.minutes(*class)).sum()
    }

    pub fn projected_minutes(&self, class: OsClass, horizon: Horizon) -> f64 {
        self.minutes(class) * horizon.multiplier(self.days)
    }

    pub fn projected_cost(&self, horizon: Horizon) -> f64 {
        match horizon {
            Horizon::Actual => self.actual_cost,
            Horizon::Monthly => self.monthly_cost,
            Horizon::Yearly => self.yearly_cost,
        }
    }

    /// Cost of one OS class over `horizon`, at that class's rate.
    pub fn projected_class_cost(&self, class: OsClass, horizon: Horizon) -> f64 {
        self.projected_minutes(class, horizon) * class.rate_per_minute()
    }

    /// Share of discovered runs that could be analyzed, in percent.
    #[allow(clippy::cast_precision_loss)]
    pub fn coverage(&self) -> f64 {
        if self.total_runs == 0 {
            return 100.0;
        }
        self.analyzed_runs as f64 / self.total_runs as f64 * 100.0
    }
}

#[derive(Debug, Default)]
struct Totals {
    analyzed_runs: usize,
    authoritative_runs: usize,
    estimated_runs: usize,
    minutes: CostBreakdown,
    actual_cost: f64,
}

impl Totals {
    fn add(mut self, run: RunCost) -> Self {
        for class in OsClass::ALL {
            self.minutes.add_minutes(class, run.breakdown.get(class).minutes);
        }
        self.actual_cost += run.breakdown.total_cost();
        self.analyzed_runs += 1;
        match run.source {
            CostSource::Authoritative => self.authoritative_runs += 1,
            CostSource::Jobs => self.estimated_runs += 1,
        }
        self
    }
}

/// Prices every run of a sampling window and projects the total.
///
/// Each run is priced from GitHub's billing data when it carries a billable
/// signal, and from job timestamps otherwise. A run whose jobs cannot be
/// fetched either is left out of `analyzed_runs`; it never fails the pass.
///
/// Up to `max_concurrent` runs are fetched at once. Results are folded in
/// run order, so the outcome does not depend on fetch completion order.
///
/// # Errors
///
/// Returns [`CostError::InvalidWindow`] when `days` is not positive.
pub async fn aggregate<S: RunDataSource>(
    repository: &str,
    runs: &[WorkflowRun],
    source: &S,
    days: i64,
    max_concurrent: usize,
) -> Result<AggregateResult> {
    if days <= 0 {
        return Err(CostError::InvalidWindow(days));
    }

    info!("Analyzing {} runs over {days} days", runs.len());

    let run_costs: Vec<Option<RunCost>> = stream::iter(runs)
        .map(|run| analyze_run(source, run))
        .buffered(max_concurrent.max(1))
        .collect()
        .await;

    let totals = run_costs
        .into_iter()
        .flatten()
        .fold(Totals::default(), Totals::add);

    let result = AggregateResult {
        repository: repository.to_string(),
        days,
        total_runs: runs.len(),
        analyzed_runs: totals.analyzed_runs,
        authoritative_runs: totals.authoritative_runs,
        estimated_runs: totals.estimated_runs,
        linux_minutes: totals.minutes.linux.minutes,
        windows_minutes: totals.minutes.windows.minutes,
        macos_minutes: totals.minutes.macos.minutes,
        actual_cost: totals.actual_cost,
        monthly_cost: totals.actual_cost * Horizon::Monthly.multiplier(days),
        yearly_cost: totals.actual_cost * Horizon::Yearly.multiplier(days),
    };

    info!(
        "Analyzed {}/{} runs ({} from billing data, {} estimated from jobs)",
        result.analyzed_runs, result.total_runs, result.authoritative_runs, result.estimated_runs
    );

    Ok(result)
}

async fn analyze_run<S: RunDataSource>(source: &S, run: &WorkflowRun) -> Option<RunCost> {
    match source.fetch_usage(run).await {
        Ok(usage) => match compute_from_authoritative(Some(&usage)) {
            UsageOutcome::Authoritative(breakdown) => {
                return Some(RunCost {
                    breakdown,
                    source: CostSource::Authoritative,
                });
            }
            UsageOutcome::Insufficient => {
                debug!("Run {} has no billable time, estimating from jobs", run.id);
            }
        },
        Err(e) => debug!("Billing data unavailable for run {}: {e}", run.id),
    }

    match source.fetch_jobs(run).await {
        Ok(jobs) => {
            let breakdown = compute_from_jobs(&jobs);
            debug!(
                "Estimated {:.2} minutes for run {} from {} jobs",
                breakdown.total_minutes(),
                run.id,
                jobs.len()
            );
            Some(RunCost {
                breakdown,
                source: CostSource::Jobs,
            })
        }
        Err(e) => {
            warn!(
                "Skipping run {} ({}, {}): failed to fetch jobs: {e}",
                run.id, run.name, run.html_url
            );
            None
        }
    }
}
