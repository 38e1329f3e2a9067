//! Conflict module - classified disagreements between authority layers

use crate::{AuthorityLayer, FieldValue};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Conflict identifier of the form `CONF-YYYY-MM-DD-NNN`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictId(String);

impl ConflictId {
    /// Build an id from a detection date and a sequence number
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use concord_domain::ConflictId;
    ///
    /// let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
    /// assert_eq!(ConflictId::new(date, 7).as_str(), "CONF-2026-03-09-007");
    /// ```
    pub fn new(date: NaiveDate, seq: u32) -> Self {
        Self(format!("CONF-{}-{:03}", date.format("%Y-%m-%d"), seq))
    }

    /// Wrap an existing id string
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classification of a disagreement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// The values cannot both be true
    DirectContradiction,

    /// One value is an elaboration of the other
    CompletenessGap,

    /// One value refines the other numerically (point vs range)
    PrecisionVariant,
}

impl ConflictKind {
    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::DirectContradiction => "direct_contradiction",
            ConflictKind::CompletenessGap => "completeness_gap",
            ConflictKind::PrecisionVariant => "precision_variant",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a conflict, derived from the field it concerns
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Cosmetic fields
    Low,

    /// Notes, examples, relations
    Medium,

    /// Timing, flags, syntax
    High,

    /// Identity and encoding
    Critical,
}

impl Severity {
    /// All severities in ascending order
    pub const ALL: [Severity; 4] = [Severity::Low, Severity::Medium, Severity::High, Severity::Critical];

    /// Get the severity name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Parse a severity from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value one authority layer holds for a field of an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerValue {
    /// Entry the value belongs to
    pub entry_id: String,

    /// Field name
    pub field: String,

    /// Supplying layer
    pub layer: AuthorityLayer,

    /// The value itself
    pub value: FieldValue,

    /// Extraction date of the layer, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<String>,
}

/// One side of a conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictSide {
    /// Layer holding the value
    pub layer: AuthorityLayer,

    /// Value held
    pub value: FieldValue,
}

impl ConflictSide {
    /// Create a new conflict side
    pub fn new(layer: AuthorityLayer, value: FieldValue) -> Self {
        Self { layer, value }
    }
}

/// A classified field-level disagreement between two layers
///
/// Sides are stored lower authority first. Conflicts are immutable once
/// detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Conflict identifier
    pub id: ConflictId,

    /// Entry the conflict was found in
    pub entry_id: String,

    /// Field in disagreement
    pub field: String,

    /// Classification
    pub kind: ConflictKind,

    /// Lower-authority side
    pub lower: ConflictSide,

    /// Higher-authority side (may share the rank of `lower`)
    pub upper: ConflictSide,

    /// Severity
    pub severity: Severity,

    /// When the conflict was detected
    pub detected_at: DateTime<Utc>,
}

impl Conflict {
    /// Create a conflict, ordering the sides by authority
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ConflictId,
        entry_id: impl Into<String>,
        field: impl Into<String>,
        kind: ConflictKind,
        a: ConflictSide,
        b: ConflictSide,
        severity: Severity,
        detected_at: DateTime<Utc>,
    ) -> Self {
        let (lower, upper) = if b.layer < a.layer { (b, a) } else { (a, b) };
        Self {
            id,
            entry_id: entry_id.into(),
            field: field.into(),
            kind,
            lower,
            upper,
            severity,
            detected_at,
        }
    }

    /// Whether both sides have the same authority rank
    pub fn same_rank(&self) -> bool {
        self.lower.layer == self.upper.layer
    }

    /// The side held by `layer`, if it takes part in this conflict
    pub fn side(&self, layer: AuthorityLayer) -> Option<&ConflictSide> {
        if self.upper.layer == layer {
            Some(&self.upper)
        } else if self.lower.layer == layer {
            Some(&self.lower)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sides_are_ordered() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let c = Conflict::new(
            ConflictId::new(date, 1),
            "e",
            "timing",
            ConflictKind::DirectContradiction,
            ConflictSide::new(AuthorityLayer::Absolute, "4".into()),
            ConflictSide::new(AuthorityLayer::Baseline, "2".into()),
            Severity::High,
            Utc::now(),
        );
        assert_eq!(c.lower.layer, AuthorityLayer::Baseline);
        assert_eq!(c.upper.layer, AuthorityLayer::Absolute);
        assert!(!c.same_rank());
        assert_eq!(c.side(AuthorityLayer::Absolute).unwrap().value, FieldValue::from("4"));
        assert!(c.side(AuthorityLayer::Verified).is_none());
    }

    #[test]
    fn test_severity_order() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!(Severity::parse("HIGH"), Some(Severity::High));
    }

    #[test]
    fn test_conflict_id_serializes_as_string() {
        let id = ConflictId::from_string("CONF-2026-01-02-003");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"CONF-2026-01-02-003\"");
    }
}
