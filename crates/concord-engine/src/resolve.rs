//! Conflict resolution
//!
//! Maps a [`Conflict`] to exactly one [`Resolution`]. Automated
//! resolutions are applied to entries by [`apply_resolution`]; escalations
//! become [`ReviewItem`]s and are never applied.

use crate::config::{EngineConfig, RuleTables, Thresholds};
use crate::error::{EngineError, Result};
use crate::text;
use chrono::{DateTime, Duration, Utc};
use concord_domain::{
    Conflict, ConflictKind, ConflictSide, Entry, FieldProvenance, FieldValue, Resolution,
    ResolutionRecord, ReviewItem, Strategy, REVIEW_CHECKLIST,
};

const OVERRIDE_CONFIDENCE: f64 = 0.95;
const MERGE_CONFIDENCE: f64 = 0.85;
const CONTAINMENT_BASE: f64 = 0.7;
const CONTAINMENT_SPAN: f64 = 0.25;

/// Resolves conflicts by rule
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    rules: RuleTables,
    thresholds: Thresholds,
}

impl ConflictResolver {
    /// Create a resolver from engine configuration
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            rules: config.rules.clone(),
            thresholds: config.thresholds.clone(),
        }
    }

    /// Decide how a conflict is settled
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Utc;
    /// use concord_domain::{AuthorityLayer, Conflict, ConflictId, ConflictKind, ConflictSide, Severity, Strategy};
    /// use concord_engine::{ConflictResolver, EngineConfig};
    ///
    /// let conflict = Conflict::new(
    ///     ConflictId::from_string("CONF-2026-01-01-001"),
    ///     "y",
    ///     "interrupt_shield",
    ///     ConflictKind::DirectContradiction,
    ///     ConflictSide::new(AuthorityLayer::Baseline, false.into()),
    ///     ConflictSide::new(AuthorityLayer::Absolute, true.into()),
    ///     Severity::Low,
    ///     Utc::now(),
    /// );
    /// let resolution = ConflictResolver::new(&EngineConfig::default()).resolve(&conflict, Utc::now());
    /// assert_eq!(resolution.strategy, Strategy::AuthorityOverride);
    /// assert_eq!(resolution.resolved_value, Some(true.into()));
    /// ```
    pub fn resolve(&self, conflict: &Conflict, at: DateTime<Utc>) -> Resolution {
        let id = conflict.id.clone();

        if self.rules.is_identity(&conflict.field) {
            return Resolution::escalate(
                id,
                format!("identity field '{}' is never changed automatically", conflict.field),
                at,
            );
        }
        if conflict.same_rank() {
            return Resolution::escalate(
                id,
                format!("both sides carry {} authority", conflict.upper.layer),
                at,
            );
        }

        match conflict.kind {
            ConflictKind::DirectContradiction => self.authority_override(conflict, at),
            ConflictKind::CompletenessGap => self.additive_merge(conflict, at),
            ConflictKind::PrecisionVariant => self.precision_containment(conflict, at),
        }
    }

    fn authority_override(&self, conflict: &Conflict, at: DateTime<Utc>) -> Resolution {
        Resolution {
            conflict_id: conflict.id.clone(),
            strategy: Strategy::AuthorityOverride,
            resolved_value: Some(conflict.upper.value.clone()),
            winning_layer: Some(conflict.upper.layer),
            superseded_layer: Some(conflict.lower.layer),
            confidence: OVERRIDE_CONFIDENCE,
            automated: true,
            rationale: format!(
                "{} outranks {}",
                conflict.upper.layer, conflict.lower.layer
            ),
            resolved_at: at,
        }
    }

    fn additive_merge(&self, conflict: &Conflict, at: DateTime<Utc>) -> Resolution {
        let (low, high) = (
            conflict.lower.value.to_string(),
            conflict.upper.value.to_string(),
        );
        if text::contradicts(&low.to_lowercase(), &high.to_lowercase(), &self.rules) {
            return Resolution::escalate(
                conflict.id.clone(),
                "values elaborate each other but contradict",
                at,
            );
        }
        Resolution {
            conflict_id: conflict.id.clone(),
            strategy: Strategy::AdditiveMerge,
            resolved_value: Some(FieldValue::Text(merged_text(&conflict.lower, &conflict.upper))),
            winning_layer: Some(conflict.upper.layer),
            superseded_layer: Some(conflict.lower.layer),
            confidence: MERGE_CONFIDENCE,
            automated: true,
            rationale: "complementary values merged with layer attribution".to_string(),
            resolved_at: at,
        }
    }

    fn precision_containment(&self, conflict: &Conflict, at: DateTime<Utc>) -> Resolution {
        let score = |side: &ConflictSide| text::precision_score(&side.value.to_string(), &self.rules);
        // Ties go to the higher layer
        let (chosen, rejected) = if score(&conflict.lower) > score(&conflict.upper) {
            (&conflict.lower, &conflict.upper)
        } else {
            (&conflict.upper, &conflict.lower)
        };

        let covered = text::coverage(&rejected.value.to_string(), &chosen.value.to_string());
        if covered < self.thresholds.precision_containment {
            return Resolution::escalate(
                conflict.id.clone(),
                format!(
                    "precise value covers only {:.0}% of the other",
                    covered * 100.0
                ),
                at,
            );
        }

        Resolution {
            conflict_id: conflict.id.clone(),
            strategy: Strategy::PrecisionContainment,
            resolved_value: Some(chosen.value.clone()),
            winning_layer: Some(chosen.layer),
            superseded_layer: Some(rejected.layer),
            confidence: (CONTAINMENT_BASE + CONTAINMENT_SPAN * covered).min(1.0),
            automated: true,
            rationale: format!(
                "{} value is more precise and covers the {} value",
                chosen.layer, rejected.layer
            ),
            resolved_at: at,
        }
    }
}

/// `"<lower> [<layer>] <upper> [<layer>]"`
fn merged_text(lower: &ConflictSide, upper: &ConflictSide) -> String {
    format!(
        "{} [{}] {} [{}]",
        lower.value, lower.layer, upper.value, upper.layer
    )
}

/// Apply an automated resolution to an entry, returning the new entry
///
/// Writes the consolidated value and its provenance, marks the superseded
/// layer and appends the resolution record. Escalations are refused.
pub fn apply_resolution(entry: &Entry, conflict: &Conflict, resolution: &Resolution) -> Result<Entry> {
    let value = match (&resolution.resolved_value, resolution.automated) {
        (Some(value), true) if !resolution.is_escalated() => value.clone(),
        _ => {
            return Err(EngineError::Escalated(format!(
                "{} has no automated resolution",
                conflict.id
            )))
        }
    };

    let mut after = entry.clone();
    after.set_consolidated(&conflict.field, value.clone());

    if let Some(winner) = resolution.winning_layer {
        let source = entry
            .layer(winner)
            .and_then(|block| block.source.clone())
            .unwrap_or_else(|| conflict.id.to_string());
        after.provenance.insert(
            conflict.field.clone(),
            FieldProvenance::new(winner, source, resolution.resolved_at),
        );
        if let Some(superseded) = resolution.superseded_layer {
            if let Some(block) = after.layer_mut(superseded) {
                block.overridden_by.insert(conflict.field.clone(), winner);
            }
        }
    }

    after.conflict_resolutions.push(ResolutionRecord {
        conflict_id: conflict.id.clone(),
        field: conflict.field.clone(),
        strategy: resolution.strategy,
        winning_layer: resolution.winning_layer,
        superseded_layer: resolution.superseded_layer,
        resolved_value: value,
        confidence: resolution.confidence,
        resolved_at: resolution.resolved_at,
    });
    after.last_updated = Some(resolution.resolved_at.to_rfc3339());
    Ok(after)
}

/// Queue record for an escalated conflict
pub fn review_item(
    conflict: &Conflict,
    resolution: &Resolution,
    queued_at: DateTime<Utc>,
    deadline_days: i64,
) -> ReviewItem {
    ReviewItem {
        conflict_id: conflict.id.clone(),
        entry_id: conflict.entry_id.clone(),
        field: conflict.field.clone(),
        kind: conflict.kind,
        severity: conflict.severity,
        lower: conflict.lower.clone(),
        upper: conflict.upper.clone(),
        reason: resolution.rationale.clone(),
        queued_at,
        deadline: queued_at + Duration::days(deadline_days),
        checklist: REVIEW_CHECKLIST.iter().map(|s| s.to_string()).collect(),
        decision: None,
    }
}
