//! Change records produced by digest comparison

use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to a file since the last baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// New file
    Added,

    /// Content changed
    Modified,

    /// File no longer present
    Removed,
}

impl ChangeKind {
    /// Get the change kind as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A changed source document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceChange {
    /// Path relative to the repository root
    pub path: String,

    /// Kind of change
    pub kind: ChangeKind,

    /// Current digest (absent when removed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Baseline digest (absent when added)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_digest: Option<String>,
}

/// A changed entry file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryChange {
    /// Path relative to the repository root
    pub path: String,

    /// Kind of change
    pub kind: ChangeKind,

    /// Entry identifier, when the file could be read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,

    /// Completeness score recorded in the entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completeness_score: Option<u32>,

    /// Modified entries are flagged for a consistency audit
    #[serde(default)]
    pub needs_audit: bool,
}
