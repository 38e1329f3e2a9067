//! On-disk layout of the tracking directory

use crate::error::{Result, StoreError};
use std::path::{Path, PathBuf};

/// Default tracking directory name, relative to the repository root
pub const DEFAULT_TRACKING_DIR: &str = "update-tracking";

/// Paths of every persisted record kind
///
/// ```text
/// <repo>/update-tracking/
///   source-hashes.json          entry-hashes.json
///   conflict-sequence.json      manual-review-queue.yaml
///   rollback-log.yaml
///   conflicts/  resolutions/  conflict-snapshots/  batches/
///   backups/<rel dir>/<stem>_backup_<ts>.yaml
///   backups/rollback-safety/...
///   objects/<sha256>
///   restore-points/<name>/{metadata.yaml,files/}
///   extraction-triggers/{,processed/}
/// ```
#[derive(Debug, Clone)]
pub struct TrackingLayout {
    root: PathBuf,
    tracking: PathBuf,
}

impl TrackingLayout {
    /// Layout for a repository root and a tracking directory name
    pub fn new(root: impl Into<PathBuf>, tracking_dir: &str) -> Self {
        let root = root.into();
        let tracking = root.join(tracking_dir);
        Self { root, tracking }
    }

    /// Layout with the default tracking directory
    pub fn with_default(root: impl Into<PathBuf>) -> Self {
        Self::new(root, DEFAULT_TRACKING_DIR)
    }

    /// Fail unless the repository root is a readable directory
    pub fn ensure_root(&self) -> Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!(
                "repository root {}",
                self.root.display()
            )))
        }
    }

    /// Repository root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Tracking directory
    pub fn tracking(&self) -> &Path {
        &self.tracking
    }

    /// Persisted source digest map
    pub fn source_hashes(&self) -> PathBuf {
        self.tracking.join("source-hashes.json")
    }

    /// Persisted entry digest map
    pub fn entry_hashes(&self) -> PathBuf {
        self.tracking.join("entry-hashes.json")
    }

    /// Conflict id sequence state
    pub fn conflict_sequence(&self) -> PathBuf {
        self.tracking.join("conflict-sequence.json")
    }

    /// Per-run conflict logs
    pub fn conflicts_dir(&self) -> PathBuf {
        self.tracking.join("conflicts")
    }

    /// Per-run resolution logs
    pub fn resolutions_dir(&self) -> PathBuf {
        self.tracking.join("resolutions")
    }

    /// Conflict snapshots
    pub fn snapshots_dir(&self) -> PathBuf {
        self.tracking.join("conflict-snapshots")
    }

    /// Batch records
    pub fn batches_dir(&self) -> PathBuf {
        self.tracking.join("batches")
    }

    /// Entry backups
    pub fn backups_dir(&self) -> PathBuf {
        self.tracking.join("backups")
    }

    /// Safety backups written before a restore
    pub fn safety_dir(&self) -> PathBuf {
        self.backups_dir().join("rollback-safety")
    }

    /// Content-addressed copies of backed-up files
    pub fn objects_dir(&self) -> PathBuf {
        self.tracking.join("objects")
    }

    /// Restore points
    pub fn restore_points_dir(&self) -> PathBuf {
        self.tracking.join("restore-points")
    }

    /// Append-only rollback log
    pub fn rollback_log(&self) -> PathBuf {
        self.tracking.join("rollback-log.yaml")
    }

    /// Per-run audit trails
    pub fn audit_dir(&self) -> PathBuf {
        self.tracking.join("audit")
    }

    /// Manual review queue
    pub fn review_queue(&self) -> PathBuf {
        self.tracking.join("manual-review-queue.yaml")
    }

    /// Pending extraction triggers
    pub fn triggers_dir(&self) -> PathBuf {
        self.tracking.join("extraction-triggers")
    }

    /// Archived extraction triggers
    pub fn processed_triggers_dir(&self) -> PathBuf {
        self.triggers_dir().join("processed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_live_under_tracking_dir() {
        let layout = TrackingLayout::with_default("/repo");
        assert_eq!(layout.tracking(), Path::new("/repo/update-tracking"));
        assert!(layout.safety_dir().starts_with(layout.backups_dir()));
        assert!(layout.rollback_log().starts_with(layout.tracking()));
        assert_eq!(layout.audit_dir(), Path::new("/repo/update-tracking/audit"));
    }

    #[test]
    fn test_ensure_root() {
        let dir = TempDir::new().unwrap();
        assert!(TrackingLayout::with_default(dir.path()).ensure_root().is_ok());
        let missing = TrackingLayout::with_default(dir.path().join("nope"));
        assert!(missing.ensure_root().is_err());
    }
}
