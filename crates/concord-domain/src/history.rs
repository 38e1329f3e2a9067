//! History records - batches, rollbacks, restore points and review items

use crate::{ConflictId, ConflictKind, ConflictSide, FieldValue, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one tool run (UUIDv7, chronologically sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Generate a new run id
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse a run id from a string
    pub fn from_string(s: &str) -> Result<Self, String> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid run id: {}", e))
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of work a batch recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    /// Extraction batch merged into entries
    Propagation,

    /// Automated conflict resolutions written
    Resolution,

    /// Rollback writes
    Rollback,
}

/// One entry file touched by a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Entry file path relative to the repository root
    pub path: String,

    /// Digest before the write (absent when the file was created)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_digest: Option<String>,

    /// Digest after the write
    pub after_digest: String,
}

/// A unit of work that can be rolled back as a whole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    /// Batch identifier (the run id of the run that wrote it)
    pub id: RunId,

    /// Kind of work
    pub kind: BatchKind,

    /// Who ran it
    pub actor: String,

    /// When it started
    pub started_at: DateTime<Utc>,

    /// Source tag, for propagation batches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Files written
    #[serde(default)]
    pub changes: Vec<FileChange>,
}

/// Outcome of restoring one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollbackStatus {
    /// Content was rewritten
    Restored,

    /// Content already matched the target
    Unchanged,

    /// Nothing could be restored
    Failed,

    /// Dry run, nothing written
    Planned,
}

impl RollbackStatus {
    /// Get the status as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            RollbackStatus::Restored => "restored",
            RollbackStatus::Unchanged => "unchanged",
            RollbackStatus::Failed => "failed",
            RollbackStatus::Planned => "planned",
        }
    }
}

/// Audit record of one restore, appended to the rollback log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackRecord {
    /// Run that performed the restore
    pub run_id: RunId,

    /// Who ran it
    pub actor: String,

    /// When it happened
    pub timestamp: DateTime<Utc>,

    /// Operation name (`entry`, `batch`, `time_range`, `restore_point`, `snapshot`)
    pub operation: String,

    /// Entry file that was restored
    pub target: String,

    /// Reason given by the operator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Backup, object or snapshot the content came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_from: Option<String>,

    /// Safety backup of the state that was replaced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_backup: Option<String>,

    /// Outcome
    pub status: RollbackStatus,

    /// Error message for failed restores
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Metadata stored with a restore point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestorePointMetadata {
    /// Restore point name
    pub name: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Number of entry files copied
    pub file_count: usize,

    /// Source-control commit at creation, when available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_commit: Option<String>,
}

/// Steps every manual review goes through
pub const REVIEW_CHECKLIST: [&str; 6] = [
    "Analyze conflicting information",
    "Research additional context if needed",
    "Make resolution decision",
    "Document rationale",
    "Update entry",
    "Close conflict",
];

/// Decision recorded by a reviewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDecision {
    /// Reviewer
    pub decided_by: String,

    /// Decision time
    pub decided_at: DateTime<Utc>,

    /// Value the reviewer chose
    pub value: FieldValue,

    /// Rationale
    #[serde(default)]
    pub note: String,
}

/// An escalated conflict waiting for a human
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    /// Conflict under review
    pub conflict_id: ConflictId,

    /// Entry identifier
    pub entry_id: String,

    /// Field in disagreement
    pub field: String,

    /// Conflict classification
    pub kind: ConflictKind,

    /// Severity
    pub severity: Severity,

    /// Lower-authority side
    pub lower: ConflictSide,

    /// Higher-authority side
    pub upper: ConflictSide,

    /// Why the conflict was escalated
    pub reason: String,

    /// When it was queued
    pub queued_at: DateTime<Utc>,

    /// Review deadline
    pub deadline: DateTime<Utc>,

    /// Review steps
    pub checklist: Vec<String>,

    /// Reviewer decision, once made
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<ReviewDecision>,
}
