//! Immutable conflict snapshots

use crate::error::{Result, StoreError};
use crate::fsutil::write_atomic;
use concord_domain::{ConflictId, Snapshot};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Append-only store of [`Snapshot`]s, one YAML file per conflict id
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Create a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &ConflictId) -> PathBuf {
        self.dir.join(format!("{}.yaml", id.as_str()))
    }

    /// Whether a snapshot exists for the conflict
    pub fn exists(&self, id: &ConflictId) -> bool {
        self.path_for(id).exists()
    }

    /// Persist a snapshot
    ///
    /// Snapshots are immutable: a second capture for the same conflict id is
    /// refused with [`StoreError::AlreadyExists`].
    pub fn capture(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        let path = self.path_for(&snapshot.conflict_id);
        if path.exists() {
            return Err(StoreError::AlreadyExists(format!(
                "snapshot {}",
                snapshot.conflict_id
            )));
        }
        let text = serde_yaml::to_string(snapshot)?;
        write_atomic(&path, text.as_bytes())?;
        info!(conflict = %snapshot.conflict_id, entry = %snapshot.entry_id, "Captured snapshot");
        Ok(path)
    }

    /// Load the snapshot of a conflict
    pub fn load(&self, id: &ConflictId) -> Result<Snapshot> {
        let path = self.path_for(id);
        if !path.exists() {
            return Err(StoreError::NotFound(format!("snapshot {}", id)));
        }
        let text = fs::read_to_string(&path)?;
        serde_yaml::from_str(&text).map_err(|e| StoreError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// List captured conflict ids, sorted
    pub fn list(&self) -> Result<Vec<ConflictId>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for item in fs::read_dir(&self.dir)? {
            let path = item?.path();
            if path.extension().is_some_and(|e| e == "yaml") {
                if let Some(stem) = path.file_stem() {
                    ids.push(ConflictId::from_string(stem.to_string_lossy()));
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
