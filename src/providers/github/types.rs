use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::cost::{classify_runner_os, AuthoritativeUsage, JobRecord, UsageRecord, WorkflowRun};

/// Repository metadata from `GET /repos/{owner}/{repo}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRepository {
    pub full_name: String,
    pub private: bool,
    pub html_url: String,
}

/// Response from GitHub API for workflow runs.
#[derive(Debug, Deserialize)]
pub(super) struct WorkflowRunsResponse {
    pub total_count: usize,
    pub workflow_runs: Vec<GitHubWorkflowRun>,
}

/// GitHub Actions workflow run.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct GitHubWorkflowRun {
    /// Unique identifier for the workflow run
    pub id: u64,
    /// Name of the workflow
    pub name: Option<String>,
    /// Display title for the run
    #[serde(default)]
    pub display_title: Option<String>,
    /// Run number
    pub run_number: u64,
    /// Status of the run
    pub status: Option<String>,
    /// Conclusion of the run (success, failure, etc.)
    pub conclusion: Option<String>,
    /// When the run was created
    pub created_at: DateTime<Utc>,
    /// Link to the run on github.com
    #[serde(default)]
    pub html_url: String,
}

impl From<GitHubWorkflowRun> for WorkflowRun {
    fn from(run: GitHubWorkflowRun) -> Self {
        let name = run
            .name
            .or(run.display_title)
            .unwrap_or_else(|| format!("run {}", run.id));

        Self {
            id: run.id,
            name,
            run_number: run.run_number,
            status: run.status.unwrap_or_default(),
            conclusion: run.conclusion,
            created_at: run.created_at,
            html_url: run.html_url,
        }
    }
}

/// Response from GitHub API for workflow jobs.
#[derive(Debug, Deserialize)]
pub(super) struct WorkflowJobsResponse {
    pub total_count: usize,
    pub jobs: Vec<GitHubJob>,
}

/// Job within a GitHub Actions workflow run.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct GitHubJob {
    pub name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub labels: Vec<String>,
}

impl From<GitHubJob> for JobRecord {
    fn from(job: GitHubJob) -> Self {
        Self {
            name: job.name,
            started_at: job.started_at,
            completed_at: job.completed_at,
            labels: job.labels,
        }
    }
}

/// Response from `GET /repos/{owner}/{repo}/actions/runs/{run_id}/timing`.
#[derive(Debug, Deserialize)]
pub(super) struct RunTimingResponse {
    pub billable: Option<HashMap<String, BillablePlatform>>,
}

/// Billable time of one runner platform (e.g. `UBUNTU`, `MACOS_XLARGE`).
#[derive(Debug, Deserialize)]
pub(super) struct BillablePlatform {
    #[serde(default)]
    pub total_ms: i64,
}

impl RunTimingResponse {
    /// Folds GitHub's platform keys into OS classes.
    ///
    /// Several platforms can map to one class (`UBUNTU` and `UBUNTU_4_CORE`);
    /// their durations are summed.
    pub fn into_usage(self) -> Option<AuthoritativeUsage> {
        let billable = self.billable?;
        let mut usage = AuthoritativeUsage::new();

        for (platform, info) in billable {
            let class = classify_runner_os(&[platform.as_str()]);
            usage.entry(class).or_insert_with(UsageRecord::default).total_ms += info.total_ms;
        }

        Some(usage)
    }
}
