use chrono::{Duration, Utc};
use log::{info, warn};

use crate::auth::Token;
use crate::cost::{aggregate, AggregateResult};
use crate::error::{CostError, Result};
use crate::output::PhaseProgress;
use crate::store::CalculationStore;

use super::client::GitHubClient;

/// Estimates the GitHub Actions bill of one repository.
///
/// Lists the runs of a sampling window, prices them through the cost model
/// and records the outcome in the calculation store.
pub struct CostCalculator {
    client: GitHubClient,
    max_concurrent_runs: usize,
}

impl CostCalculator {
    /// Creates a calculator for `repo_path` ("owner/repo").
    ///
    /// # Errors
    ///
    /// Returns an error if the repository path or base URL is malformed.
    pub fn new(
        base_url: &str,
        repo_path: &str,
        token: Option<Token>,
        max_concurrent_runs: usize,
    ) -> Result<Self> {
        let client = GitHubClient::new(base_url, repo_path, token)?;
        Ok(Self::with_client(client, max_concurrent_runs))
    }

    pub fn with_client(client: GitHubClient, max_concurrent_runs: usize) -> Self {
        Self {
            client,
            max_concurrent_runs,
        }
    }

    pub fn repo_path(&self) -> String {
        self.client.repo_path()
    }

    /// Runs one calculation pass over the last `days` days.
    ///
    /// The store record moves to `running` before any request is made, then
    /// to `completed` with the result or to `failed` with the error.
    /// Individual runs that cannot be fetched are skipped rather than failing
    /// the pass.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `days` is not positive or reaches back past the representable range
    /// - the repository does not exist or runs cannot be listed
    /// - the store cannot be written
    pub async fn calculate(
        &self,
        store: &mut CalculationStore,
        days: i64,
    ) -> Result<AggregateResult> {
        let since = Duration::try_days(days)
            .filter(|_| days > 0)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or(CostError::InvalidWindow(days))?;

        let repository = self.repo_path();
        info!("Starting cost calculation for {repository} over {days} days");

        store.start(&repository)?;

        let progress = PhaseProgress::start_phase_1(days);

        let outcome = async {
            let repo = self.client.fetch_repository().await?;
            if repo.private {
                warn!(
                    "{} is private; GitHub already bills it, so its billing data is used where reported",
                    repo.html_url
                );
            }

            let runs = self.client.list_runs(since).await?;
            if runs.is_empty() {
                warn!("No completed workflow runs found for {}", repo.full_name);
            }

            Ok::<_, CostError>(runs)
        }
        .await;

        let runs = match outcome {
            Ok(runs) => runs,
            Err(e) => {
                progress.abandon(&e.to_string());
                record_failure(store, &repository, &e);
                return Err(e);
            }
        };

        let progress = progress.finish_phase_1_start_phase_2(runs.len());

        let result = match aggregate(
            &repository,
            &runs,
            &self.client,
            days,
            self.max_concurrent_runs,
        )
        .await
        {
            Ok(result) => result,
            Err(e) => {
                progress.abandon(&e.to_string());
                record_failure(store, &repository, &e);
                return Err(e);
            }
        };

        let progress =
            progress.finish_phase_2_start_phase_3(result.analyzed_runs, result.total_runs);

        if let Err(e) = store.complete(&repository, result.clone()) {
            progress.abandon(&e.to_string());
            record_failure(store, &repository, &e);
            return Err(e);
        }

        progress.finish_phase_3();

        Ok(result)
    }
}

fn record_failure(store: &mut CalculationStore, repository: &str, error: &CostError) {
    if let Err(store_error) = store.fail(repository, &error.to_string()) {
        warn!("Failed to record calculation failure for {repository}: {store_error}");
    }
}
