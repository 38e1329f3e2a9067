//! Conflict detection across authority layers
//!
//! Every field held by two or more layers of an entry is compared pairwise.
//! Each disagreement is classified as a direct contradiction, a
//! completeness gap or a precision variant; benign textual variation is
//! not a conflict.

use crate::config::{EngineConfig, RuleTables, Thresholds};
use crate::context::RunContext;
use crate::error::{EngineError, Result};
use crate::text;
use chrono::{DateTime, Utc};
use concord_domain::traits::EntryStore;
use concord_domain::{
    Conflict, ConflictKind, ConflictSide, Entry, FieldValue, ItemFailure, LayerValue, RunId,
    Severity,
};
use concord_store::{read_yaml, write_run_log, TrackingLayout};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Pairwise field classifier
///
/// # Examples
///
/// ```
/// use concord_domain::{ConflictKind, FieldValue};
/// use concord_engine::{ConflictDetector, EngineConfig};
///
/// let detector = ConflictDetector::new(&EngineConfig::default());
/// let kind = detector.classify(&FieldValue::from("2"), &FieldValue::from("13-20"));
/// assert_eq!(kind, Some(ConflictKind::PrecisionVariant));
/// ```
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    rules: RuleTables,
    thresholds: Thresholds,
}

impl ConflictDetector {
    /// Create a detector from engine configuration
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            rules: config.rules.clone(),
            thresholds: config.thresholds.clone(),
        }
    }

    /// Rule tables in use
    pub fn rules(&self) -> &RuleTables {
        &self.rules
    }

    /// Severity of a field
    pub fn severity_of(&self, field: &str) -> Severity {
        self.rules.severity.severity_of(field)
    }

    /// Classify the disagreement between two values, if any
    pub fn classify(&self, a: &FieldValue, b: &FieldValue) -> Option<ConflictKind> {
        if a.is_empty() || b.is_empty() {
            return None;
        }
        let (sa, sb) = (a.normalized(), b.normalized());
        if sa == sb {
            return None;
        }

        // Numbers first: point vs point, point vs range
        let (na, nb) = (text::numbers(&sa), text::numbers(&sb));
        if !na.is_empty() && !nb.is_empty() {
            if na.len() == 1 && nb.len() == 1 {
                let differ = match (na[0].parse::<f64>(), nb[0].parse::<f64>()) {
                    (Ok(x), Ok(y)) => x != y,
                    _ => false,
                };
                if differ {
                    return Some(ConflictKind::DirectContradiction);
                }
            }
            let point_vs_range = (na.len() == 1 && text::numeric_range(&sb).is_some())
                || (nb.len() == 1 && text::numeric_range(&sa).is_some());
            if point_vs_range {
                return Some(ConflictKind::PrecisionVariant);
            }
        }

        if text::contradicts(&sa, &sb, &self.rules) {
            return Some(ConflictKind::DirectContradiction);
        }

        // One side elaborates the other
        let (wa, wb) = (text::word_set(&sa).len(), text::word_set(&sb).len());
        if wa != wb {
            let (shorter, longer) = if wa < wb { (&sa, &sb) } else { (&sb, &sa) };
            if text::overlap_ratio(shorter, longer) >= self.thresholds.completeness_overlap {
                return Some(ConflictKind::CompletenessGap);
            }
        }

        None
    }

    /// Field values of every layer, grouped by field, lowest layer first
    ///
    /// Bookkeeping keys and empty values are left out.
    pub fn layer_values(&self, entry: &Entry) -> BTreeMap<String, Vec<LayerValue>> {
        let mut by_field: BTreeMap<String, Vec<LayerValue>> = BTreeMap::new();
        for (layer, block) in entry.layers() {
            for (field, value) in &block.fields {
                if self.rules.is_ignored_layer_key(field) || value.is_empty() {
                    continue;
                }
                by_field.entry(field.clone()).or_default().push(LayerValue {
                    entry_id: entry.id().to_string(),
                    field: field.clone(),
                    layer,
                    value: value.clone(),
                    as_of: block.extraction_date.clone(),
                });
            }
        }
        by_field
    }

    /// Detect all conflicts of one entry
    ///
    /// Pairs whose lower side is already marked as overridden are settled
    /// and skipped.
    pub fn detect(&self, entry: &Entry, ctx: &mut RunContext) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        let now = ctx.now();

        for (field, values) in self.layer_values(entry) {
            for (i, low) in values.iter().enumerate() {
                let settled = entry
                    .layer(low.layer)
                    .is_some_and(|block| block.is_overridden(&field));
                if settled {
                    continue;
                }
                for high in &values[i + 1..] {
                    if let Some(kind) = self.classify(&low.value, &high.value) {
                        let conflict = self.build(ctx.next_conflict_id(), entry.id(), &field, kind, low, high, now);
                        debug!(conflict = %conflict.id, entry = %entry.id(), field = %field, kind = %kind, "Detected conflict");
                        conflicts.push(conflict);
                    }
                }
            }
        }
        conflicts
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        id: concord_domain::ConflictId,
        entry_id: &str,
        field: &str,
        kind: ConflictKind,
        a: &LayerValue,
        b: &LayerValue,
        now: DateTime<Utc>,
    ) -> Conflict {
        Conflict::new(
            id,
            entry_id,
            field,
            kind,
            ConflictSide::new(a.layer, a.value.clone()),
            ConflictSide::new(b.layer, b.value.clone()),
            self.severity_of(field),
            now,
        )
    }
}

/// Result of scanning every entry for conflicts
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Entries scanned successfully
    pub scanned: usize,

    /// Conflicts found
    pub conflicts: Vec<Conflict>,

    /// Entries that could not be read
    pub failures: Vec<ItemFailure>,
}

impl ScanReport {
    /// Conflict counts per severity
    pub fn by_severity(&self) -> BTreeMap<Severity, usize> {
        let mut counts = BTreeMap::new();
        for c in &self.conflicts {
            *counts.entry(c.severity).or_insert(0) += 1;
        }
        counts
    }
}

/// Scan every entry of a store
pub fn scan<S>(store: &S, detector: &ConflictDetector, ctx: &mut RunContext) -> Result<ScanReport>
where
    S: EntryStore,
    S::Error: Into<EngineError>,
{
    let mut report = ScanReport::default();
    let paths = store.entry_paths().map_err(Into::into)?;
    info!("Scanning {} entries for conflicts", paths.len());

    for path in paths {
        match store.load_entry(&path) {
            Ok(entry) => {
                report.conflicts.extend(detector.detect(&entry, ctx));
                report.scanned += 1;
            }
            Err(e) => {
                let e: EngineError = e.into();
                warn!(path = %path, error = %e, "Skipping unreadable entry");
                report.failures.push(ItemFailure::new(path, e.kind(), e.to_string()));
            }
        }
    }

    info!(
        "Detected {} conflicts in {} entries",
        report.conflicts.len(),
        report.scanned
    );
    Ok(report)
}

/// Persisted conflict log of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictLog {
    /// Run that produced the log
    pub run_id: RunId,

    /// When it was written
    pub generated_at: DateTime<Utc>,

    /// Number of conflicts
    pub total_conflicts: usize,

    /// Conflict counts per severity
    #[serde(default)]
    pub by_severity: BTreeMap<Severity, usize>,

    /// The conflicts
    pub conflicts: Vec<Conflict>,
}

impl ConflictLog {
    /// Build a log from conflicts
    pub fn new(ctx: &RunContext, conflicts: Vec<Conflict>) -> Self {
        let mut by_severity = BTreeMap::new();
        for c in &conflicts {
            *by_severity.entry(c.severity).or_insert(0) += 1;
        }
        Self {
            run_id: ctx.run_id(),
            generated_at: ctx.now(),
            total_conflicts: conflicts.len(),
            by_severity,
            conflicts,
        }
    }

    /// Read a conflict log
    pub fn load(path: &Path) -> Result<Self> {
        Ok(read_yaml(path)?)
    }

    /// Write the log under the conflicts directory (skipped in dry-run mode)
    pub fn write(&self, layout: &TrackingLayout, ctx: &RunContext) -> Result<Option<PathBuf>> {
        if ctx.dry_run() {
            info!("DRY RUN: Would write conflict log with {} conflicts", self.total_conflicts);
            return Ok(None);
        }
        let path = write_run_log(&layout.conflicts_dir(), "conflict-log", self.generated_at, self)?;
        info!("Conflict log saved to {}", path.display());
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use concord_domain::AuthorityLayer;
    use concord_store::StoreError;
    use proptest::prelude::*;

    fn detector() -> ConflictDetector {
        ConflictDetector::new(&EngineConfig::default())
    }

    fn ctx() -> RunContext {
        RunContext::at(
            EngineConfig::default(),
            Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap(),
        )
    }

    fn entry_with(field: &str, values: &[(AuthorityLayer, FieldValue)]) -> Entry {
        let mut entry = Entry::new("test-entry");
        for (layer, value) in values {
            entry.layer_or_default(*layer).set(field, value.clone());
        }
        entry
    }

    #[test]
    fn test_equal_values_do_not_conflict() {
        let d = detector();
        assert_eq!(d.classify(&"Stops a COG".into(), &" stops a cog ".into()), None);
        assert_eq!(d.classify(&FieldValue::Integer(2), &"2".into()), None);
    }

    #[test]
    fn test_point_vs_point() {
        let d = detector();
        assert_eq!(
            d.classify(&"2 cycles".into(), &"4 cycles".into()),
            Some(ConflictKind::DirectContradiction)
        );
    }

    #[test]
    fn test_point_vs_range_is_precision_variant() {
        let d = detector();
        assert_eq!(
            d.classify(&"2".into(), &"13-20".into()),
            Some(ConflictKind::PrecisionVariant)
        );
        assert_eq!(
            d.classify(&"4 clocks".into(), &"2 to 9 clocks".into()),
            Some(ConflictKind::PrecisionVariant)
        );
    }

    #[test]
    fn test_boolean_and_antonym_contradictions() {
        let d = detector();
        assert_eq!(
            d.classify(&FieldValue::Bool(false), &FieldValue::Bool(true)),
            Some(ConflictKind::DirectContradiction)
        );
        assert_eq!(
            d.classify(&"Increments the pointer".into(), &"Decrements the pointer".into()),
            Some(ConflictKind::DirectContradiction)
        );
    }

    #[test]
    fn test_completeness_gap() {
        let d = detector();
        assert_eq!(
            d.classify(
                &"Stops a cog.".into(),
                &"Stops a cog; it becomes available for reuse.".into()
            ),
            Some(ConflictKind::CompletenessGap)
        );
    }

    #[test]
    fn test_unrelated_text_is_benign() {
        let d = detector();
        assert_eq!(
            d.classify(&"Copies a register".into(), &"Moves data between locations".into()),
            None
        );
    }

    #[test]
    fn test_nulls_are_skipped() {
        let d = detector();
        assert_eq!(d.classify(&FieldValue::Null, &"x".into()), None);
        let entry = entry_with(
            "timing",
            &[
                (AuthorityLayer::Baseline, FieldValue::Null),
                (AuthorityLayer::Verified, "13-20".into()),
            ],
        );
        assert!(d.detect(&entry, &mut ctx()).is_empty());
    }

    #[test]
    fn test_detect_orders_sides_and_assigns_ids() {
        let d = detector();
        let entry = entry_with(
            "timing",
            &[
                (AuthorityLayer::Baseline, "2".into()),
                (AuthorityLayer::Verified, "13-20".into()),
                (AuthorityLayer::Absolute, "13-20".into()),
            ],
        );
        let conflicts = d.detect(&entry, &mut ctx());
        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].id.as_str(), "CONF-2026-06-01-001");
        assert_eq!(conflicts[0].lower.layer, AuthorityLayer::Baseline);
        assert_eq!(conflicts[0].upper.layer, AuthorityLayer::Verified);
        assert_eq!(conflicts[1].upper.layer, AuthorityLayer::Absolute);
        assert_eq!(conflicts[0].severity, Severity::High);
    }

    #[test]
    fn test_ignored_keys_and_overridden_layers() {
        let d = detector();
        let mut entry = entry_with(
            "parts_used",
            &[
                (AuthorityLayer::Baseline, "1".into()),
                (AuthorityLayer::Confirmed, "2".into()),
            ],
        );
        assert!(d.detect(&entry, &mut ctx()).is_empty());

        entry.layer_or_default(AuthorityLayer::Baseline).set("timing", "2".into());
        entry.layer_or_default(AuthorityLayer::Confirmed).set("timing", "4".into());
        assert_eq!(d.detect(&entry, &mut ctx()).len(), 1);

        entry
            .layer_or_default(AuthorityLayer::Baseline)
            .overridden_by
            .insert("timing".into(), AuthorityLayer::Confirmed);
        assert!(d.detect(&entry, &mut ctx()).is_empty());
    }

    struct MockStore {
        entries: Vec<(String, std::result::Result<Entry, String>)>,
    }

    impl EntryStore for MockStore {
        type Error = StoreError;

        fn entry_paths(&self) -> std::result::Result<Vec<String>, StoreError> {
            Ok(self.entries.iter().map(|(p, _)| p.clone()).collect())
        }

        fn load_entry(&self, path: &str) -> std::result::Result<Entry, StoreError> {
            match self.entries.iter().find(|(p, _)| p == path) {
                Some((_, Ok(e))) => Ok(e.clone()),
                Some((_, Err(m))) => Err(StoreError::Parse {
                    path: path.to_string(),
                    message: m.clone(),
                }),
                None => Err(StoreError::NotFound(path.to_string())),
            }
        }

        fn read_raw(&self, _path: &str) -> std::result::Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn save_entry(&mut self, _path: &str, _entry: &Entry) -> std::result::Result<(), StoreError> {
            Ok(())
        }

        fn write_raw(&mut self, _path: &str, _text: &str) -> std::result::Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn test_scan_collects_failures_and_continues() {
        let store = MockStore {
            entries: vec![
                ("a.yaml".into(), Err("bad yaml".into())),
                (
                    "b.yaml".into(),
                    Ok(entry_with(
                        "interrupt_shield",
                        &[
                            (AuthorityLayer::Baseline, FieldValue::Bool(false)),
                            (AuthorityLayer::Absolute, FieldValue::Bool(true)),
                        ],
                    )),
                ),
            ],
        };
        let report = scan(&store, &detector(), &mut ctx()).unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, concord_domain::ErrorKind::Parse);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.by_severity()[&Severity::Low], 1);
    }

    proptest! {
        #[test]
        fn prop_contained_point_is_precision_variant(lo in 0u32..500, span in 1u32..500, offset in 0u32..500) {
            let hi = lo + span;
            let point = lo + offset % (span + 1);
            let kind = detector().classify(
                &FieldValue::from(point.to_string()),
                &FieldValue::from(format!("{}-{}", lo, hi)),
            );
            prop_assert_eq!(kind, Some(ConflictKind::PrecisionVariant));
        }

        #[test]
        fn prop_classification_is_symmetric(a in "[a-z ]{0,20}", b in "[a-z0-9 -]{0,20}") {
            let d = detector();
            let x = FieldValue::from(a);
            let y = FieldValue::from(b);
            prop_assert_eq!(d.classify(&x, &y), d.classify(&y, &x));
        }
    }
}
