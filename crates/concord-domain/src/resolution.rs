//! Resolution module - the outcome chosen for a conflict

use crate::{AuthorityLayer, ConflictId, FieldValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy used to settle a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Higher-authority value wins
    AuthorityOverride,

    /// Both values are kept, each attributed to its layer
    AdditiveMerge,

    /// The more precise value wins because it covers the other
    PrecisionContainment,

    /// A human has to decide
    Escalate,
}

impl Strategy {
    /// Get the strategy name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::AuthorityOverride => "authority_override",
            Strategy::AdditiveMerge => "additive_merge",
            Strategy::PrecisionContainment => "precision_containment",
            Strategy::Escalate => "escalate",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for exactly one conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Conflict being resolved
    pub conflict_id: ConflictId,

    /// Strategy applied
    pub strategy: Strategy,

    /// Value to write, absent when escalated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_value: Option<FieldValue>,

    /// Layer whose value won
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_layer: Option<AuthorityLayer>,

    /// Layer marked as overridden
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_layer: Option<AuthorityLayer>,

    /// Confidence in [0, 1]
    pub confidence: f64,

    /// Whether the resolution may be written without review
    pub automated: bool,

    /// Human-readable explanation
    pub rationale: String,

    /// When the resolution was produced
    pub resolved_at: DateTime<Utc>,
}

impl Resolution {
    /// Create an escalation for a conflict
    pub fn escalate(conflict_id: ConflictId, reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            conflict_id,
            strategy: Strategy::Escalate,
            resolved_value: None,
            winning_layer: None,
            superseded_layer: None,
            confidence: 0.0,
            automated: false,
            rationale: reason.into(),
            resolved_at: at,
        }
    }

    /// Whether this resolution was escalated
    pub fn is_escalated(&self) -> bool {
        self.strategy == Strategy::Escalate
    }
}
