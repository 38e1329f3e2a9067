//! A knowledge-base repository opened for one run

use crate::config::EngineConfig;
use crate::context::RunContext;
use crate::error::Result;
use concord_store::{
    BackupStore, BatchLog, FileEntryStore, RestorePointStore, ReviewQueue, RollbackLog,
    SnapshotStore, TrackingLayout,
};
use concord_domain::traits::EntryStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Repository root, tracking layout and configuration
///
/// Hands out the stores every operation works on.
#[derive(Debug, Clone)]
pub struct Workspace {
    layout: TrackingLayout,
    config: EngineConfig,
}

impl Workspace {
    /// Open a repository
    ///
    /// Fails only if the root is not a readable directory.
    pub fn open(root: impl Into<PathBuf>, config: EngineConfig) -> Result<Self> {
        let layout = TrackingLayout::new(root, &config.tracking_dir);
        layout.ensure_root()?;
        debug!(root = %layout.root().display(), "Opened workspace");
        Ok(Self { layout, config })
    }

    /// Repository root
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Tracking layout
    pub fn layout(&self) -> &TrackingLayout {
        &self.layout
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a run, continuing the persisted conflict id sequence
    pub fn context(&self) -> Result<RunContext> {
        let mut ctx = RunContext::new(self.config.clone());
        ctx.resume_sequence(&self.layout.conflict_sequence())?;
        Ok(ctx)
    }

    /// Entry files
    pub fn entries(&self) -> FileEntryStore {
        FileEntryStore::new(self.root(), self.config.entry_patterns.clone())
    }

    /// Conflict snapshots
    pub fn snapshots(&self) -> SnapshotStore {
        SnapshotStore::new(self.layout.snapshots_dir())
    }

    /// Backups and object copies
    pub fn backups(&self) -> BackupStore {
        BackupStore::new(&self.layout)
    }

    /// Restore points
    pub fn restore_points(&self) -> RestorePointStore {
        RestorePointStore::new(self.layout.restore_points_dir())
    }

    /// Batch records
    pub fn batches(&self) -> BatchLog {
        BatchLog::new(self.layout.batches_dir())
    }

    /// Rollback log
    pub fn rollback_log(&self) -> RollbackLog {
        RollbackLog::new(self.layout.rollback_log())
    }

    /// Manual review queue
    pub fn review_queue(&self) -> ReviewQueue {
        ReviewQueue::new(self.layout.review_queue())
    }

    /// Map of lower-cased entry id to entry path
    ///
    /// Unreadable entries are skipped with a warning.
    pub fn entry_index(&self) -> Result<BTreeMap<String, String>> {
        let store = self.entries();
        let mut index = BTreeMap::new();
        for path in store.entry_paths()? {
            match store.load_entry(&path) {
                Ok(entry) => {
                    index.insert(entry.id().to_lowercase(), path);
                }
                Err(e) => warn!(path = %path, error = %e, "Skipping unreadable entry"),
            }
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(Workspace::open(missing, EngineConfig::default()).is_err());
    }

    #[test]
    fn test_tracking_dir_from_config() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig {
            tracking_dir: "state".into(),
            ..EngineConfig::default()
        };
        let ws = Workspace::open(dir.path(), config).unwrap();
        assert_eq!(ws.layout().tracking(), dir.path().join("state"));
        assert!(ws.rollback_log().load().unwrap().is_empty());
    }

    #[test]
    fn test_entry_index_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("instructions").join("mov.yaml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "metadata:\n  id: MOV-Instruction\n").unwrap();
        std::fs::write(dir.path().join("instructions").join("bad.yaml"), "metadata: [").unwrap();

        let ws = Workspace::open(dir.path(), EngineConfig::default()).unwrap();
        let index = ws.entry_index().unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index["mov-instruction"], "instructions/mov.yaml");
    }
}
