use thiserror::Error;

use crate::store::CalculationStatus;

#[derive(Error, Debug)]
pub enum CostError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid sampling window: {0} days (must be positive)")]
    InvalidWindow(i64),

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Billing data not available for run {run_id}")]
    UsageNotAvailable { run_id: u64 },

    #[error("API request failed with status {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("API request failed with status {status} after {retries} retries")]
    ApiErrorAfterRetries { status: u16, retries: u32 },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid status transition for {key}: {from} -> {to}")]
    InvalidTransition {
        key: String,
        from: CalculationStatus,
        to: CalculationStatus,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CostError>;
