//! Snapshots - immutable before/after records of applied resolutions

use crate::{Conflict, ConflictId, Entry, Resolution};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State of an entry around one automated resolution
///
/// `raw_before` is the exact file text before the write, so restoring from a
/// snapshot reproduces the original bytes, not a re-serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Conflict the snapshot belongs to
    pub conflict_id: ConflictId,

    /// Entry identifier
    pub entry_id: String,

    /// Entry file path relative to the repository root
    pub entry_path: String,

    /// The conflict as detected
    pub conflict: Conflict,

    /// The resolution that was applied
    pub resolution: Resolution,

    /// Parsed entry before the write
    pub entry_before: Entry,

    /// Parsed entry after the write
    pub entry_after: Entry,

    /// Exact file content before the write
    pub raw_before: String,

    /// Digest of `raw_before`
    pub digest_before: String,

    /// Digest of the written file
    pub digest_after: String,

    /// Capture time
    pub captured_at: DateTime<Utc>,
}
