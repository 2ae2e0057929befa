use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::cost::AggregateResult;
use crate::error::{CostError, Result};

/// Lifecycle of a stored calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl CalculationStatus {
    /// Whether a record in this state may move to `next`.
    pub fn can_transition_to(self, next: CalculationStatus) -> bool {
        use CalculationStatus::{Completed, Failed, Pending, Running};

        matches!(
            (self, next),
            (Pending, Running) | (Running, Completed | Failed) | (Completed | Failed, Pending)
        )
    }
}

impl fmt::Display for CalculationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CalculationStatus::Pending => "pending",
            CalculationStatus::Running => "running",
            CalculationStatus::Completed => "completed",
            CalculationStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A repository's latest calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationRecord {
    pub repository: String,
    pub status: CalculationStatus,
    pub result: Option<AggregateResult>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CalculationRecord {
    pub fn pending(repository: &str) -> Self {
        Self {
            repository: repository.to_string(),
            status: CalculationStatus::Pending,
            result: None,
            error: None,
            updated_at: Utc::now(),
        }
    }
}

/// Calculation records keyed by repository.
///
/// Records live in a single JSON file under the platform data directory:
/// - Linux: `~/.local/share/actions-cost/calculations.json`
/// - macOS: `~/Library/Application Support/actions-cost/calculations.json`
///
/// Every mutation is written back to disk. A disabled store keeps records in
/// memory only.
pub struct CalculationStore {
    path: PathBuf,
    records: BTreeMap<String, CalculationRecord>,
    enabled: bool,
}

impl CalculationStore {
    /// Opens the store at `path`, or at the default location when `None`.
    ///
    /// # Errors
    ///
    /// Returns error if the data directory cannot be determined or created.
    pub fn new(path: Option<PathBuf>, enabled: bool) -> Result<Self> {
        if !enabled {
            debug!("Calculation store disabled");
            return Ok(Self::in_memory());
        }

        let path = match path {
            Some(path) => path,
            None => default_store_path()?,
        };

        Self::open(&path)
    }

    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            records: BTreeMap::new(),
            enabled: false,
        }
    }

    fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let records = if path.exists() {
            fs::read_to_string(path)
                .ok()
                .and_then(|content| serde_json::from_str(&content).ok())
                .inspect(|_| debug!("Loaded calculations from: {}", path.display()))
                .unwrap_or_else(|| {
                    warn!("Failed to load calculation store, starting empty");
                    BTreeMap::new()
                })
        } else {
            BTreeMap::new()
        };

        info!("Calculation store at: {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            records,
            enabled: true,
        })
    }

    fn key(repository: &str) -> String {
        repository.trim().to_lowercase()
    }

    pub fn get(&self, repository: &str) -> Option<&CalculationRecord> {
        self.records.get(&Self::key(repository))
    }

    pub fn records(&self) -> impl Iterator<Item = &CalculationRecord> {
        self.records.values()
    }

    /// Adds a new record.
    ///
    /// # Errors
    ///
    /// Fails if a record for the same repository already exists.
    pub fn insert(&mut self, record: CalculationRecord) -> Result<()> {
        let key = Self::key(&record.repository);
        if self.records.contains_key(&key) {
            return Err(CostError::Store(format!("Record already exists: {key}")));
        }

        self.records.insert(key.clone(), record);
        self.save().inspect_err(|_| {
            self.records.remove(&key);
        })
    }

    /// Applies `change` to an existing record and refreshes its timestamp.
    ///
    /// The record is left untouched if the store file cannot be written.
    ///
    /// # Errors
    ///
    /// Fails if no record exists for `repository`.
    pub fn update<F>(&mut self, repository: &str, change: F) -> Result<()>
    where
        F: FnOnce(&mut CalculationRecord),
    {
        let key = Self::key(repository);
        let record = self
            .records
            .get_mut(&key)
            .ok_or_else(|| CostError::Store(format!("No record for {key}")))?;

        let previous = record.clone();
        change(record);
        record.updated_at = Utc::now();

        self.save().inspect_err(|_| {
            self.records.insert(key, previous);
        })
    }

    /// Moves a record to `status`, rejecting transitions the lifecycle forbids.
    pub fn transition(&mut self, repository: &str, status: CalculationStatus) -> Result<()> {
        let key = Self::key(repository);
        let current = self
            .records
            .get(&key)
            .map(|record| record.status)
            .ok_or_else(|| CostError::Store(format!("No record for {key}")))?;

        if !current.can_transition_to(status) {
            return Err(CostError::InvalidTransition {
                key,
                from: current,
                to: status,
            });
        }

        self.update(repository, |record| record.status = status)
    }

    /// Marks a repository's calculation as running, creating the record if needed.
    pub fn start(&mut self, repository: &str) -> Result<()> {
        match self.get(repository).map(|record| record.status) {
            None => self.insert(CalculationRecord::pending(repository))?,
            Some(CalculationStatus::Pending) => {}
            Some(CalculationStatus::Running) => {
                warn!("Previous calculation for {repository} never finished");
                self.fail(repository, "Calculation interrupted")?;
                self.transition(repository, CalculationStatus::Pending)?;
            }
            Some(_) => self.transition(repository, CalculationStatus::Pending)?,
        }

        self.transition(repository, CalculationStatus::Running)
    }

    pub fn complete(&mut self, repository: &str, result: AggregateResult) -> Result<()> {
        self.transition(repository, CalculationStatus::Completed)?;
        self.update(repository, |record| {
            record.result = Some(result);
            record.error = None;
        })
    }

    /// Marks a calculation as failed. A previous result is kept.
    pub fn fail(&mut self, repository: &str, error: &str) -> Result<()> {
        self.transition(repository, CalculationStatus::Failed)?;
        self.update(repository, |record| record.error = Some(error.to_string()))
    }

    /// Removes a repository's record. Returns whether one existed.
    pub fn remove(&mut self, repository: &str) -> Result<bool> {
        let removed = self.records.remove(&Self::key(repository)).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    fn save(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let content = serde_json::to_string_pretty(&self.records)?;
        fs::write(&self.path, content)?;

        debug!(
            "Saved {} calculations to: {}",
            self.records.len(),
            self.path.display()
        );

        Ok(())
    }
}

fn default_store_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| CostError::Store("No data directory found".into()))?;

    Ok(data_dir.join("actions-cost").join("calculations.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_result(repository: &str) -> AggregateResult {
        AggregateResult {
            repository: repository.to_string(),
            days: 7,
            total_runs: 10,
            analyzed_runs: 9,
            authoritative_runs: 0,
            estimated_runs: 9,
            linux_minutes: 120.0,
            windows_minutes: 30.0,
            macos_minutes: 5.0,
            actual_cost: 1.75,
            monthly_cost: 7.5,
            yearly_cost: 91.25,
        }
    }

    fn store_in(dir: &TempDir) -> CalculationStore {
        CalculationStore::new(Some(dir.path().join("calculations.json")), true).unwrap()
    }

    #[test]
    fn test_status_transitions() {
        use CalculationStatus::{Completed, Failed, Pending, Running};

        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(Completed.can_transition_to(Pending));
        assert!(Failed.can_transition_to(Pending));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Running.can_transition_to(Pending));
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let mut store = CalculationStore::in_memory();
        store.insert(CalculationRecord::pending("octo/repo")).unwrap();

        let err = store
            .insert(CalculationRecord::pending("Octo/Repo"))
            .unwrap_err();
        assert!(matches!(err, CostError::Store(_)));
    }

    #[test]
    fn test_update_missing_record_fails() {
        let mut store = CalculationStore::in_memory();
        assert!(store.update("octo/missing", |_| {}).is_err());
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut store = CalculationStore::in_memory();
        store.insert(CalculationRecord::pending("octo/repo")).unwrap();

        let err = store
            .transition("octo/repo", CalculationStatus::Completed)
            .unwrap_err();
        assert!(matches!(
            err,
            CostError::InvalidTransition {
                from: CalculationStatus::Pending,
                to: CalculationStatus::Completed,
                ..
            }
        ));
    }

    #[test]
    fn test_full_lifecycle_persists() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir);

        store.start("octo/repo").unwrap();
        assert_eq!(
            store.get("octo/repo").unwrap().status,
            CalculationStatus::Running
        );

        store
            .complete("octo/repo", create_test_result("octo/repo"))
            .unwrap();

        let reloaded = store_in(&temp_dir);
        let record = reloaded.get("OCTO/repo").unwrap();
        assert_eq!(record.status, CalculationStatus::Completed);
        assert_eq!(record.result, Some(create_test_result("octo/repo")));
        assert!(record.error.is_none());
    }

    #[test]
    fn test_recalculation_after_failure_keeps_previous_result() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir);

        store.start("octo/repo").unwrap();
        store
            .complete("octo/repo", create_test_result("octo/repo"))
            .unwrap();

        store.start("octo/repo").unwrap();
        store.fail("octo/repo", "rate limited").unwrap();

        let record = store.get("octo/repo").unwrap();
        assert_eq!(record.status, CalculationStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("rate limited"));
        assert!(record.result.is_some());

        store.start("octo/repo").unwrap();
        assert_eq!(
            store.get("octo/repo").unwrap().status,
            CalculationStatus::Running
        );
    }

    #[test]
    fn test_start_recovers_interrupted_calculation() {
        let mut store = CalculationStore::in_memory();
        store.start("octo/repo").unwrap();

        store.start("octo/repo").unwrap();

        let record = store.get("octo/repo").unwrap();
        assert_eq!(record.status, CalculationStatus::Running);
        assert_eq!(record.error.as_deref(), Some("Calculation interrupted"));
    }

    #[test]
    fn test_failed_write_leaves_record_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("calculations.json");
        let mut store = store_in(&temp_dir);
        store.start("octo/repo").unwrap();

        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let err = store
            .complete("octo/repo", create_test_result("octo/repo"))
            .unwrap_err();
        assert!(matches!(err, CostError::Io(_)));

        let record = store.get("octo/repo").unwrap();
        assert_eq!(record.status, CalculationStatus::Running);
        assert!(record.result.is_none());

        assert!(store.insert(CalculationRecord::pending("octo/other")).is_err());
        assert!(store.get("octo/other").is_none());
    }

    #[test]
    fn test_remove() {
        let temp_dir = TempDir::new().unwrap();
        let mut store = store_in(&temp_dir);
        store.insert(CalculationRecord::pending("octo/repo")).unwrap();

        assert!(store.remove("octo/repo").unwrap());
        assert!(!store.remove("octo/repo").unwrap());

        let reloaded = store_in(&temp_dir);
        assert!(reloaded.get("octo/repo").is_none());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("calculations.json"), "not json").unwrap();

        let store = store_in(&temp_dir);
        assert_eq!(store.records().count(), 0);
    }

    #[test]
    fn test_disabled_store_does_not_write() {
        let mut store = CalculationStore::new(None, false).unwrap();
        store.start("octo/repo").unwrap();

        assert!(!store.enabled);
        assert_eq!(store.path, PathBuf::new());
        assert_eq!(
            store.get("octo/repo").unwrap().status,
            CalculationStatus::Running
        );
    }
}
