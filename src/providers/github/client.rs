use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

use crate::auth::Token;
use crate::cost::{AuthoritativeUsage, JobRecord, RunDataSource, WorkflowRun};
use crate::error::{CostError, Result};

use super::types::{
    GitHubRepository, RunTimingResponse, WorkflowJobsResponse, WorkflowRunsResponse,
};

const MAX_RETRIES: u32 = 5;
const RETRY_DELAY_SECONDS: u64 = 10;
const MAX_CONCURRENT_REQUESTS: usize = 16;
const PAGE_SIZE: usize = 100;

/// GitHub REST API client scoped to a single repository.
pub struct GitHubClient {
    client: Client,
    repo_url: Url,
    owner: String,
    repo: String,
    token: Option<Token>,
    semaphore: Arc<Semaphore>,
    max_retries: u32,
    retry_delay: Duration,
}

impl GitHubClient {
    /// Create a new GitHub API client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - GitHub API base URL (e.g., "https://api.github.com")
    /// * `repo_path` - Repository path in format "owner/repo"
    /// * `token` - Optional GitHub personal access token
    ///
    /// # Errors
    ///
    /// Returns an error if the repository path or base URL is malformed.
    pub fn new(base_url: &str, repo_path: &str, token: Option<Token>) -> Result<Self> {
        let (owner, repo) = parse_repo_path(repo_path)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );

        let client = Client::builder()
            .user_agent(concat!("actions-cost/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| CostError::Config(format!("Failed to create HTTP client: {e}")))?;

        let mut api_url =
            Url::parse(base_url).map_err(|e| CostError::Config(format!("Invalid base URL: {e}")))?;
        if !api_url.path().ends_with('/') {
            let path = format!("{}/", api_url.path());
            api_url.set_path(&path);
        }

        let repo_url = api_url
            .join(&format!("repos/{owner}/{repo}/"))
            .map_err(|e| CostError::Config(format!("Invalid repository URL: {e}")))?;

        Ok(Self {
            client,
            repo_url,
            owner,
            repo,
            token,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS)),
            max_retries: MAX_RETRIES,
            retry_delay: Duration::from_secs(RETRY_DELAY_SECONDS),
        })
    }

    /// Overrides how often and how long to wait before retrying throttled requests.
    #[cfg(test)]
    #[must_use]
    pub fn with_retry_policy(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    pub fn repo_path(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.repo_url
            .join(path)
            .map_err(|e| CostError::Config(format!("Invalid endpoint {path}: {e}")))
    }

    /// Execute a GET request with automatic retry on network errors and rate limits
    async fn get_json<T>(&self, url: Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| CostError::Config(format!("Request limiter closed: {e}")))?;

        let mut retry_count = 0;
        loop {
            let request = self.auth_request(self.client.get(url.clone()));

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    if retry_count >= self.max_retries {
                        return Err(e.into());
                    }
                    warn!(
                        "Network error ({e}), retrying in {}s ({}/{})...",
                        self.retry_delay.as_secs(),
                        retry_count + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if is_retryable(status, response.headers()) {
                if retry_count >= self.max_retries {
                    return Err(CostError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: self.max_retries,
                    });
                }

                warn!(
                    "GitHub API error (status {status}). Waiting {} seconds before retry {}/{}...",
                    self.retry_delay.as_secs(),
                    retry_count + 1,
                    self.max_retries
                );

                tokio::time::sleep(self.retry_delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(CostError::ApiError {
                    status: status.as_u16(),
                    message: error_text,
                });
            }

            return Ok(response.json().await?);
        }
    }

    /// Fetch repository metadata.
    ///
    /// # Errors
    ///
    /// Returns [`CostError::RepositoryNotFound`] if GitHub answers 404.
    pub async fn fetch_repository(&self) -> Result<GitHubRepository> {
        let mut url = self.repo_url.clone();
        let path = url.path().trim_end_matches('/').to_string();
        url.set_path(&path);

        match self.get_json(url).await {
            Err(CostError::ApiError { status: 404, .. }) => {
                Err(CostError::RepositoryNotFound(self.repo_path()))
            }
            other => other,
        }
    }

    /// Fetch completed workflow runs created at or after `since`.
    pub async fn list_runs(&self, since: DateTime<Utc>) -> Result<Vec<WorkflowRun>> {
        let created = format!(">={}", since.to_rfc3339_opts(SecondsFormat::Secs, true));
        let mut all_runs = Vec::new();
        let mut page = 1;

        loop {
            let mut url = self.endpoint("actions/runs")?;
            url.query_pairs_mut()
                .append_pair("status", "completed")
                .append_pair("created", &created)
                .append_pair("per_page", &PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());

            let response: WorkflowRunsResponse = self.get_json(url).await?;
            let response_len = response.workflow_runs.len();

            all_runs.extend(response.workflow_runs.into_iter().map(WorkflowRun::from));

            debug!(
                "Fetched page {page} of workflow runs ({}/{})",
                all_runs.len(),
                response.total_count
            );

            if response_len < PAGE_SIZE || all_runs.len() >= response.total_count {
                break;
            }

            page += 1;
        }

        Ok(all_runs)
    }

    /// Fetch GitHub's billable timing for a run.
    ///
    /// # Errors
    ///
    /// Returns [`CostError::UsageNotAvailable`] when GitHub does not track
    /// billing for the run, which is the norm for public repositories.
    pub async fn fetch_run_usage(&self, run_id: u64) -> Result<AuthoritativeUsage> {
        let url = self.endpoint(&format!("actions/runs/{run_id}/timing"))?;

        let response: RunTimingResponse = match self.get_json(url).await {
            Err(CostError::ApiError {
                status: 403 | 404, ..
            }) => return Err(CostError::UsageNotAvailable { run_id }),
            other => other?,
        };

        response
            .into_usage()
            .ok_or(CostError::UsageNotAvailable { run_id })
    }

    /// Fetch all jobs of a run, including those of earlier attempts.
    pub async fn fetch_run_jobs(&self, run_id: u64) -> Result<Vec<JobRecord>> {
        let mut all_jobs = Vec::new();
        let mut page = 1;

        loop {
            let mut url = self.endpoint(&format!("actions/runs/{run_id}/jobs"))?;
            url.query_pairs_mut()
                .append_pair("filter", "all")
                .append_pair("per_page", &PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());

            let response: WorkflowJobsResponse = self.get_json(url).await?;
            let response_len = response.jobs.len();

            all_jobs.extend(response.jobs.into_iter().map(JobRecord::from));

            if response_len < PAGE_SIZE || all_jobs.len() >= response.total_count {
                break;
            }

            page += 1;
        }

        Ok(all_jobs)
    }
}

impl RunDataSource for GitHubClient {
    async fn fetch_usage(&self, run: &WorkflowRun) -> Result<AuthoritativeUsage> {
        self.fetch_run_usage(run.id).await
    }

    async fn fetch_jobs(&self, run: &WorkflowRun) -> Result<Vec<JobRecord>> {
        self.fetch_run_jobs(run.id).await
    }
}

/// Splits "owner/repo" into its two parts.
fn parse_repo_path(repo_path: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = repo_path.trim().split('/').collect();
    match parts.as_slice() {
        [owner, repo] if !owner.is_empty() && !repo.is_empty() => {
            Ok(((*owner).to_string(), (*repo).to_string()))
        }
        _ => Err(CostError::Config(format!(
            "Repository must be in format 'owner/repo', got '{repo_path}'"
        ))),
    }
}

/// Rate limits surface as 429, or as 403 with an exhausted quota.
fn is_retryable(status: StatusCode, headers: &HeaderMap) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return true;
    }

    status == StatusCode::FORBIDDEN
        && headers
            .get("x-ratelimit-remaining")
            .and_then(|value| value.to_str().ok())
            == Some("0")
}
