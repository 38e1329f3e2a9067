//! Concord Storage Layer
//!
//! File-backed persistence for the consistency engine. Everything lives in
//! plain files under the repository so the knowledge base stays reviewable
//! with ordinary tools.
//!
//! # Architecture
//!
//! - YAML entry files, located by watch patterns ([`FileEntryStore`])
//! - JSON digest baselines ([`DigestMap`]), replaced atomically
//! - Immutable conflict snapshots ([`SnapshotStore`])
//! - Timestamped backups plus content-addressed objects ([`BackupStore`])
//! - Restore points, batch records, review queue and append-only logs
//!
//! # Examples
//!
//! ```no_run
//! use concord_store::{DigestMap, TrackingLayout};
//!
//! let layout = TrackingLayout::with_default("/path/to/kb");
//! let baseline = DigestMap::load(&layout.source_hashes()).unwrap();
//! println!("{} tracked sources", baseline.len());
//! ```

#![warn(missing_docs)]

mod backups;
mod digest_map;
mod entries;
mod error;
mod fsutil;
mod layout;
mod logs;
mod restore_points;
mod review;
mod scan;
mod snapshots;

pub use backups::{BackupInfo, BackupStore, CleanupReport, ObjectStore};
pub use digest_map::DigestMap;
pub use entries::FileEntryStore;
pub use error::{Result, StoreError};
pub use fsutil::{digest_bytes, digest_file, relative_path, resolve, write_atomic};
pub use layout::{TrackingLayout, DEFAULT_TRACKING_DIR};
pub use logs::{read_yaml, write_run_log, write_yaml, BatchLog, RollbackLog, SequenceState};
pub use restore_points::{source_commit, RestorePointStore};
pub use review::ReviewQueue;
pub use scan::{scan_files, WatchPattern};
pub use snapshots::SnapshotStore;
