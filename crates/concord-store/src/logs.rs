//! YAML logs: per-run reports, append-only logs, batch records

use crate::error::{Result, StoreError};
use crate::fsutil::write_atomic;
use chrono::{DateTime, NaiveDate, Utc};
use concord_domain::{BatchRecord, RollbackRecord, RunId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Read a YAML document
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)?;
    serde_yaml::from_str(&text).map_err(|e| StoreError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Write a YAML document atomically
pub fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_yaml::to_string(value)?;
    write_atomic(path, text.as_bytes())
}

/// Write a per-run report as `<dir>/<prefix>-<timestamp>.yaml`
///
/// A numeric suffix is added when two runs land on the same second.
pub fn write_run_log<T: Serialize>(
    dir: &Path,
    prefix: &str,
    at: DateTime<Utc>,
    value: &T,
) -> Result<PathBuf> {
    let stamp = at.format("%Y%m%d_%H%M%S");
    let mut path = dir.join(format!("{}-{}.yaml", prefix, stamp));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{}-{}-{}.yaml", prefix, stamp, n));
        n += 1;
    }
    write_yaml(&path, value)?;
    Ok(path)
}

/// Append-only log of rollback records
#[derive(Debug, Clone)]
pub struct RollbackLog {
    path: PathBuf,
}

impl RollbackLog {
    /// Open the log at `path` (created on first append)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// All records, oldest first
    pub fn load(&self) -> Result<Vec<RollbackRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let records: Option<Vec<RollbackRecord>> = read_yaml(&self.path)?;
        Ok(records.unwrap_or_default())
    }

    /// Append records; existing records are never rewritten
    pub fn append(&self, records: &[RollbackRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut all = self.load()?;
        all.extend_from_slice(records);
        write_yaml(&self.path, &all)
    }
}

/// Batch records, one YAML file per batch id
#[derive(Debug, Clone)]
pub struct BatchLog {
    dir: PathBuf,
}

impl BatchLog {
    /// Create a batch log rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &RunId) -> PathBuf {
        self.dir.join(format!("{}.yaml", id))
    }

    /// Persist a batch record (replacing any earlier version of it)
    pub fn save(&self, record: &BatchRecord) -> Result<PathBuf> {
        let path = self.path_for(&record.id);
        write_yaml(&path, record)?;
        Ok(path)
    }

    /// Load a batch record
    pub fn load(&self, id: &RunId) -> Result<BatchRecord> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(StoreError::NotFound(format!("batch {}", id)));
        }
        read_yaml(&path)
    }

    /// List batch records, oldest first
    pub fn list(&self) -> Result<Vec<BatchRecord>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for item in fs::read_dir(&self.dir)? {
            let path = item?.path();
            if path.extension().is_some_and(|e| e == "yaml") {
                records.push(read_yaml::<BatchRecord>(&path)?);
            }
        }
        records.sort_by_key(|r| r.started_at);
        Ok(records)
    }
}

/// Persisted state of the conflict id sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceState {
    /// Date the sequence belongs to
    pub date: NaiveDate,

    /// Last number handed out on that date
    pub last: u32,
}

impl SequenceState {
    /// Load the state, if any
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Persist the state atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        write_atomic(path, text.as_bytes())
    }
}
