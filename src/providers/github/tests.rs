use std::time::Duration;

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

use super::client::GitHubClient;
use super::*;
use crate::auth::Token;
use crate::cost::OsClass;
use crate::error::CostError;
use crate::store::{CalculationStatus, CalculationStore};

const REPO: &str = "octo/hello-world";

fn client_for(server: &ServerGuard) -> GitHubClient {
    GitHubClient::new(&server.url(), REPO, Some(Token::from("ghp_test")))
        .unwrap()
        .with_retry_policy(0, Duration::ZERO)
}

fn run_json(id: u64) -> serde_json::Value {
    json!({
        "id": id,
        "name": "CI",
        "display_title": "Update README",
        "run_number": id,
        "status": "completed",
        "conclusion": "success",
        "created_at": "2024-03-01T12:00:00Z",
        "html_url": format!("https://github.com/octo/hello-world/actions/runs/{id}")
    })
}

fn job_json(name: &str, started_at: &str, completed_at: &str, labels: &[&str]) -> serde_json::Value {
    json!({
        "id": 1,
        "name": name,
        "status": "completed",
        "conclusion": "success",
        "started_at": started_at,
        "completed_at": completed_at,
        "labels": labels
    })
}

async fn mock_json(
    server: &mut ServerGuard,
    path: &str,
    status: usize,
    body: serde_json::Value,
) -> mockito::Mock {
    server
        .mock("GET", path)
        .match_query(Matcher::Any)
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await
}

#[test]
fn test_new_rejects_invalid_repo_path() {
    for path in ["invalid-path", "owner/repo/extra", "/repo", "owner/"] {
        let result = GitHubClient::new("https://api.github.com", path, None);
        let Err(err) = result else {
            panic!("expected {path} to be rejected");
        };
        assert!(err.to_string().contains("owner/repo"));
    }
}

#[test]
fn test_new_accepts_repo_path() {
    let client = GitHubClient::new("https://api.github.com", " octo/hello-world ", None).unwrap();
    assert_eq!(client.repo_path(), REPO);
}

#[tokio::test]
async fn test_list_runs_paginates() {
    let mut server = Server::new_async().await;

    let first_page: Vec<_> = (1..=100).map(run_json).collect();
    let page_1 = server
        .mock("GET", "/repos/octo/hello-world/actions/runs")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), "1".into()),
            Matcher::UrlEncoded("status".into(), "completed".into()),
            Matcher::UrlEncoded("per_page".into(), "100".into()),
            Matcher::UrlEncoded("created".into(), ">=2024-03-01T00:00:00Z".into()),
        ]))
        .with_status(200)
        .with_body(json!({"total_count": 101, "workflow_runs": first_page}).to_string())
        .create_async()
        .await;
    let page_2 = server
        .mock("GET", "/repos/octo/hello-world/actions/runs")
        .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
        .with_status(200)
        .with_body(json!({"total_count": 101, "workflow_runs": [run_json(101)]}).to_string())
        .create_async()
        .await;

    let since = "2024-03-01T00:00:00Z".parse().unwrap();
    let runs = client_for(&server).list_runs(since).await.unwrap();

    assert_eq!(runs.len(), 101);
    assert_eq!(runs[0].id, 1);
    assert_eq!(runs[100].id, 101);
    assert_eq!(runs[0].name, "CI");
    assert_eq!(
        runs[100].html_url,
        "https://github.com/octo/hello-world/actions/runs/101"
    );
    page_1.assert_async().await;
    page_2.assert_async().await;
}

#[tokio::test]
async fn test_fetch_run_usage_parses_billable() {
    let mut server = Server::new_async().await;
    let mock = mock_json(
        &mut server,
        "/repos/octo/hello-world/actions/runs/7/timing",
        200,
        json!({
            "billable": {
                "UBUNTU": {"total_ms": 120000, "jobs": 2},
                "WINDOWS": {"total_ms": 60000, "jobs": 1}
            },
            "run_duration_ms": 200000
        }),
    )
    .await;

    let usage = client_for(&server).fetch_run_usage(7).await.unwrap();

    assert_eq!(usage[&OsClass::Linux].total_ms, 120_000);
    assert_eq!(usage[&OsClass::Windows].total_ms, 60_000);
    assert!(!usage.contains_key(&OsClass::MacOs));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_run_usage_not_available() {
    let mut server = Server::new_async().await;
    let _missing_timing = mock_json(
        &mut server,
        "/repos/octo/hello-world/actions/runs/7/timing",
        404,
        json!({"message": "Not Found"}),
    )
    .await;
    let _timing_without_billable = mock_json(
        &mut server,
        "/repos/octo/hello-world/actions/runs/8/timing",
        200,
        json!({"run_duration_ms": 1000}),
    )
    .await;

    let client = client_for(&server);

    let err = client.fetch_run_usage(7).await.unwrap_err();
    assert!(matches!(err, CostError::UsageNotAvailable { run_id: 7 }));

    let err = client.fetch_run_usage(8).await.unwrap_err();
    assert!(matches!(err, CostError::UsageNotAvailable { run_id: 8 }));
}

#[tokio::test]
async fn test_fetch_run_jobs() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/repos/octo/hello-world/actions/runs/7/jobs")
        .match_query(Matcher::UrlEncoded("filter".into(), "all".into()))
        .with_status(200)
        .with_body(
            json!({
                "total_count": 2,
                "jobs": [
                    job_json("build", "2024-03-01T12:00:00Z", "2024-03-01T12:02:00Z", &["ubuntu-latest"]),
                    {
                        "id": 2,
                        "name": "queued",
                        "status": "queued",
                        "conclusion": null,
                        "started_at": null,
                        "completed_at": null,
                        "labels": ["macos-14"]
                    }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let jobs = client_for(&server).fetch_run_jobs(7).await.unwrap();

    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].name, "build");
    assert_eq!(jobs[0].labels, vec!["ubuntu-latest".to_string()]);
    assert!(jobs[0].started_at.is_some());
    assert!(jobs[1].started_at.is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_errors_are_retried_then_reported() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/repos/octo/hello-world/actions/runs/7/jobs")
        .match_query(Matcher::Any)
        .with_status(502)
        .expect(3)
        .create_async()
        .await;

    let client = client_for(&server).with_retry_policy(2, Duration::ZERO);
    let err = client.fetch_run_jobs(7).await.unwrap_err();

    assert!(matches!(
        err,
        CostError::ApiErrorAfterRetries {
            status: 502,
            retries: 2
        }
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_exhausted_rate_limit_is_retried() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/repos/octo/hello-world/actions/runs/7/timing")
        .with_status(403)
        .with_header("x-ratelimit-remaining", "0")
        .expect(2)
        .create_async()
        .await;

    let client = client_for(&server).with_retry_policy(1, Duration::ZERO);
    let err = client.fetch_run_usage(7).await.unwrap_err();

    assert!(matches!(
        err,
        CostError::ApiErrorAfterRetries { status: 403, .. }
    ));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_repository_not_found() {
    let mut server = Server::new_async().await;
    let _repo = mock_json(
        &mut server,
        "/repos/octo/hello-world",
        404,
        json!({"message": "Not Found"}),
    )
    .await;

    let err = client_for(&server).fetch_repository().await.unwrap_err();
    assert!(matches!(err, CostError::RepositoryNotFound(ref repo) if repo == REPO));
}

#[tokio::test]
async fn test_calculate_end_to_end() {
    let mut server = Server::new_async().await;
    let _repo = mock_json(
        &mut server,
        "/repos/octo/hello-world",
        200,
        json!({
            "full_name": REPO,
            "private": false,
            "html_url": "https://github.com/octo/hello-world"
        }),
    )
    .await;
    let _runs = mock_json(
        &mut server,
        "/repos/octo/hello-world/actions/runs",
        200,
        json!({"total_count": 3, "workflow_runs": [run_json(1), run_json(2), run_json(3)]}),
    )
    .await;

    // Run 1 carries billing data
    let _timing_1 = mock_json(
        &mut server,
        "/repos/octo/hello-world/actions/runs/1/timing",
        200,
        json!({"billable": {"UBUNTU": {"total_ms": 120000}}}),
    )
    .await;

    // Run 2 falls back to its jobs
    let _timing_2 = mock_json(
        &mut server,
        "/repos/octo/hello-world/actions/runs/2/timing",
        200,
        json!({"billable": {"UBUNTU": {"total_ms": 0}}}),
    )
    .await;
    let _jobs_2 = mock_json(
        &mut server,
        "/repos/octo/hello-world/actions/runs/2/jobs",
        200,
        json!({
            "total_count": 1,
            "jobs": [job_json("test", "2024-03-01T12:00:00Z", "2024-03-01T12:03:00Z", &["windows-2022"])]
        }),
    )
    .await;

    // Run 3 cannot be fetched at all
    let _timing_3 = mock_json(
        &mut server,
        "/repos/octo/hello-world/actions/runs/3/timing",
        404,
        json!({"message": "Not Found"}),
    )
    .await;
    let _jobs_3 = mock_json(
        &mut server,
        "/repos/octo/hello-world/actions/runs/3/jobs",
        500,
        json!({"message": "Server Error"}),
    )
    .await;

    let calculator = CostCalculator::with_client(client_for(&server), 2);
    let mut store = CalculationStore::in_memory();

    let result = calculator.calculate(&mut store, 7).await.unwrap();

    assert_eq!(result.repository, REPO);
    assert_eq!(result.total_runs, 3);
    assert_eq!(result.analyzed_runs, 2);
    assert_eq!(result.authoritative_runs, 1);
    assert_eq!(result.estimated_runs, 1);
    assert_eq!(result.linux_minutes, 2.0);
    assert_eq!(result.windows_minutes, 3.0);
    assert!((result.actual_cost - 0.064).abs() < 1e-12);
    assert!((result.monthly_cost - 0.064 * 30.0 / 7.0).abs() < 1e-12);

    let record = store.get(REPO).unwrap();
    assert_eq!(record.status, CalculationStatus::Completed);
    assert_eq!(record.result.as_ref(), Some(&result));
}

#[tokio::test]
async fn test_calculate_missing_repository_marks_record_failed() {
    let mut server = Server::new_async().await;
    let _repo = mock_json(
        &mut server,
        "/repos/octo/hello-world",
        404,
        json!({"message": "Not Found"}),
    )
    .await;

    let calculator = CostCalculator::with_client(client_for(&server), 2);
    let mut store = CalculationStore::in_memory();

    let err = calculator.calculate(&mut store, 7).await.unwrap_err();
    assert!(matches!(err, CostError::RepositoryNotFound(_)));

    let record = store.get(REPO).unwrap();
    assert_eq!(record.status, CalculationStatus::Failed);
    assert!(record.error.as_deref().unwrap().contains("Repository not found"));
}

#[tokio::test]
async fn test_calculate_rejects_invalid_window_before_fetching() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let calculator = CostCalculator::with_client(client_for(&server), 2);
    let mut store = CalculationStore::in_memory();

    let err = calculator.calculate(&mut store, 0).await.unwrap_err();

    assert!(matches!(err, CostError::InvalidWindow(0)));
    assert!(store.get(REPO).is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_calculate_rejects_window_beyond_date_range() {
    let mut server = Server::new_async().await;
    let _repo = mock_json(
        &mut server,
        "/repos/octo/hello-world",
        200,
        json!({
            "full_name": REPO,
            "private": false,
            "html_url": "https://github.com/octo/hello-world"
        }),
    )
    .await;

    let calculator = CostCalculator::with_client(client_for(&server), 2);
    let mut store = CalculationStore::in_memory();

    let err = calculator
        .calculate(&mut store, 100_000_000)
        .await
        .unwrap_err();

    assert!(matches!(err, CostError::InvalidWindow(100_000_000)));
    assert!(store.get(REPO).is_none());
}

#[tokio::test]
async fn test_calculate_reports_store_write_failure() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let store_path = temp_dir.path().join("calculations.json");

    let mut server = Server::new_async().await;
    let _repo = mock_json(
        &mut server,
        "/repos/octo/hello-world",
        200,
        json!({
            "full_name": REPO,
            "private": false,
            "html_url": "https://github.com/octo/hello-world"
        }),
    )
    .await;

    // Replaces the store file with a directory once the run is underway
    let blocked_path = store_path.clone();
    let _runs = server
        .mock("GET", "/repos/octo/hello-world/actions/runs")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body_from_request(move |_| {
            let _ = std::fs::remove_file(&blocked_path);
            let _ = std::fs::create_dir(&blocked_path);
            json!({"total_count": 0, "workflow_runs": []})
                .to_string()
                .into_bytes()
        })
        .create_async()
        .await;

    let calculator = CostCalculator::with_client(client_for(&server), 2);
    let mut store = CalculationStore::new(Some(store_path), true).unwrap();

    let err = calculator.calculate(&mut store, 7).await.unwrap_err();
    assert!(matches!(err, CostError::Io(_)));

    let record = store.get(REPO).unwrap();
    assert_ne!(record.status, CalculationStatus::Completed);
    assert!(record.result.is_none());
}
