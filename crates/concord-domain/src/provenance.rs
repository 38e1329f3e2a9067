//! Provenance tracking for consolidated entry fields

use crate::{AuthorityLayer, ConflictId, FieldValue, Strategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the current value of a consolidated field came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProvenance {
    /// Authority layer that supplied the value
    pub layer: AuthorityLayer,

    /// Source tag (document name, conflict id, ...)
    pub source: String,

    /// When the value was written
    pub updated_at: DateTime<Utc>,
}

impl FieldProvenance {
    /// Create a new provenance record
    pub fn new(layer: AuthorityLayer, source: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            layer,
            source: source.into(),
            updated_at,
        }
    }
}

/// One applied conflict resolution, kept in the entry's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    /// Conflict that was resolved
    pub conflict_id: ConflictId,

    /// Field the conflict was about
    pub field: String,

    /// Strategy that produced the value
    pub strategy: Strategy,

    /// Layer whose value won, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_layer: Option<AuthorityLayer>,

    /// Layer that was marked as overridden, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_layer: Option<AuthorityLayer>,

    /// Value written into the consolidated field
    pub resolved_value: FieldValue,

    /// Confidence of the resolution
    pub confidence: f64,

    /// When the resolution was applied
    pub resolved_at: DateTime<Utc>,
}

/// One propagation pass over an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// When the update was applied
    pub date: DateTime<Utc>,

    /// Source tag of the extraction batch
    pub source: String,

    /// Layer the batch was extracted at
    pub layer: AuthorityLayer,

    /// Consolidated fields that changed
    #[serde(default)]
    pub fields_updated: Vec<String>,
}
