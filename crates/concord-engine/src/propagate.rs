//! Update propagation: merging freshly extracted values into entries
//!
//! Each incoming value is written verbatim into its layer block, then merged
//! into the consolidated field according to the field's class. Identity
//! fields are never overwritten; a differing identity value becomes a
//! critical conflict instead.

use crate::change::archive_triggers;
use crate::config::{EngineConfig, RuleTables, Thresholds};
use crate::context::RunContext;
use crate::dependency::DependencyIndex;
use crate::detect::{ConflictDetector, ConflictLog};
use crate::error::{EngineError, Result};
use crate::metrics::RunMetrics;
use crate::workspace::Workspace;
use chrono::{DateTime, Utc};
use concord_domain::traits::EntryStore;
use concord_domain::{
    AuthorityLayer, BatchKind, BatchRecord, Conflict, ConflictKind, ConflictSide, Entry,
    FieldProvenance, FieldValue, FileChange, ItemFailure, LayerValue, Severity, UpdateRecord,
};
use concord_store::{digest_bytes, read_yaml, FileEntryStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Values extracted for one entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedEntry {
    /// Target entry id
    pub entry_id: String,

    /// Extracted field values
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

/// Output of one extractor run
///
/// # Examples
///
/// ```
/// use concord_engine::{EngineConfig, ExtractionBatch};
/// use concord_domain::AuthorityLayer;
///
/// let batch: ExtractionBatch = serde_yaml::from_str(r#"
/// source: Silicon-Doc-v35
/// extracted_at: 2026-01-01T00:00:00Z
/// entries:
///   - entry_id: mov-instruction
///     fields: { timing: "2" }
/// "#).unwrap();
/// assert_eq!(batch.layer(&EngineConfig::default()).unwrap(), AuthorityLayer::Verified);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionBatch {
    /// Source tag (document name and version)
    pub source: String,

    /// Layer the values belong to; derived from the source tag when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<AuthorityLayer>,

    /// When the extraction ran
    pub extracted_at: DateTime<Utc>,

    /// Extracted entries
    #[serde(default)]
    pub entries: Vec<ExtractedEntry>,
}

impl ExtractionBatch {
    /// Read a batch file
    pub fn load(path: &Path) -> Result<Self> {
        let batch: Self = read_yaml(path)?;
        if batch.source.trim().is_empty() {
            return Err(EngineError::InvalidInput(format!(
                "{}: source must not be empty",
                path.display()
            )));
        }
        Ok(batch)
    }

    /// Layer of the batch
    pub fn layer(&self, config: &EngineConfig) -> Result<AuthorityLayer> {
        self.layer
            .or_else(|| config.layer_for_source(&self.source))
            .ok_or_else(|| {
                EngineError::InvalidInput(format!(
                    "no layer given and none configured for source '{}'",
                    self.source
                ))
            })
    }

    /// Layer values of one extracted entry
    pub fn layer_values(&self, entry: &ExtractedEntry, layer: AuthorityLayer) -> Vec<LayerValue> {
        let as_of = Some(self.extracted_at.to_rfc3339());
        entry
            .fields
            .iter()
            .map(|(field, value)| LayerValue {
                entry_id: entry.entry_id.clone(),
                field: field.clone(),
                layer,
                value: value.clone(),
                as_of: as_of.clone(),
            })
            .collect()
    }
}

/// Merges layer values into entries
#[derive(Debug, Clone)]
pub struct UpdatePropagator {
    rules: RuleTables,
    thresholds: Thresholds,
}

impl UpdatePropagator {
    /// Create a propagator from engine configuration
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            rules: config.rules.clone(),
            thresholds: config.thresholds.clone(),
        }
    }

    /// Completeness score: one point per layer, one per key section
    pub fn completeness_score(&self, entry: &Entry) -> u32 {
        let sections = self
            .rules
            .completeness_sections
            .iter()
            .filter(|s| entry.consolidated(s).is_some_and(|v| !v.is_empty()))
            .count();
        let score = (entry.layers_present() + sections) as u32;
        score.min(self.thresholds.completeness_cap)
    }

    /// Merge values into an entry
    ///
    /// Returns the merged entry and the identity conflicts the merge raised.
    pub fn apply(
        &self,
        ctx: &mut RunContext,
        entry: &Entry,
        values: &[LayerValue],
        source: &str,
    ) -> (Entry, Vec<Conflict>) {
        let now = ctx.now();
        let mut merged = entry.clone();
        let mut conflicts = Vec::new();
        let mut changed = Vec::new();

        for value in values {
            if value.value.is_empty() || self.rules.is_ignored_layer_key(&value.field) {
                continue;
            }
            let block = merged.layer_or_default(value.layer);
            block.set(value.field.clone(), value.value.clone());
            block.extraction_date = Some(value.as_of.clone().unwrap_or_else(|| now.to_rfc3339()));
            block.source = Some(source.to_string());

            match self.merge_field(&mut merged, value) {
                Merge::Changed => {
                    merged.provenance.insert(
                        value.field.clone(),
                        FieldProvenance::new(value.layer, source, now),
                    );
                    changed.push(value.field.clone());
                }
                Merge::Unchanged => {}
                Merge::Conflict(existing) => {
                    let conflict = Conflict::new(
                        ctx.next_conflict_id(),
                        merged.id(),
                        &value.field,
                        ConflictKind::DirectContradiction,
                        existing,
                        ConflictSide::new(value.layer, value.value.clone()),
                        Severity::Critical,
                        now,
                    );
                    warn!(conflict = %conflict.id, entry = %merged.id(), field = %value.field, "Identity field differs");
                    conflicts.push(conflict);
                }
            }
        }

        merged.completeness_score = Some(self.completeness_score(&merged));
        if let Some(layer) = values.iter().map(|v| v.layer).max() {
            changed.sort();
            changed.dedup();
            merged.update_history.push(UpdateRecord {
                date: now,
                source: source.to_string(),
                layer,
                fields_updated: changed,
            });
        }
        merged.last_updated = Some(now.to_rfc3339());
        (merged, conflicts)
    }

    fn merge_field(&self, entry: &mut Entry, incoming: &LayerValue) -> Merge {
        let field = incoming.field.as_str();
        let existing = entry.consolidated(field);
        let existing_layer = entry.provenance.get(field).map(|p| p.layer);

        if self.rules.is_identity(field) {
            return match existing {
                None => {
                    entry.set_consolidated(field, incoming.value.clone());
                    Merge::Changed
                }
                Some(current) if current.normalized() == incoming.value.normalized() => {
                    Merge::Unchanged
                }
                Some(current) => Merge::Conflict(ConflictSide::new(
                    existing_layer.unwrap_or(AuthorityLayer::Baseline),
                    current,
                )),
            };
        }

        if self.rules.is_list(field) {
            return match union(existing.as_ref(), &incoming.value) {
                Some(list) => {
                    entry.set_consolidated(field, list);
                    Merge::Changed
                }
                None => Merge::Unchanged,
            };
        }

        let overwrite = match (&existing, existing_layer) {
            (None, _) => true,
            (Some(_), _) if !self.rules.is_technical(field) => {
                incoming.layer >= self.thresholds.default_overwrite_layer
            }
            (Some(_), None) => true,
            (Some(_), Some(layer)) => layer <= incoming.layer,
        };
        let differs = existing.as_ref() != Some(&incoming.value);
        if overwrite && differs {
            entry.set_consolidated(field, incoming.value.clone());
            Merge::Changed
        } else {
            Merge::Unchanged
        }
    }
}

enum Merge {
    Changed,
    Unchanged,
    Conflict(ConflictSide),
}

fn list_items(value: &FieldValue) -> Vec<FieldValue> {
    match value {
        FieldValue::List(items) => items.clone(),
        FieldValue::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

/// Union keeping existing order; `None` when nothing new was added
fn union(existing: Option<&FieldValue>, incoming: &FieldValue) -> Option<FieldValue> {
    let mut items = existing.map(list_items).unwrap_or_default();
    let mut seen: BTreeSet<String> = items.iter().map(FieldValue::normalized).collect();
    let before = items.len();
    for item in list_items(incoming) {
        if seen.insert(item.normalized()) {
            items.push(item);
        }
    }
    (items.len() > before).then_some(FieldValue::List(items))
}

/// Everything a propagation run produced
#[derive(Debug, Clone, Serialize)]
pub struct PropagationReport {
    /// Source tag of the batch
    pub source: String,

    /// Layer the batch was merged into
    pub layer: AuthorityLayer,

    /// Entry files updated
    pub updated: Vec<String>,

    /// Identity conflicts of the merge plus conflicts detected afterwards
    pub conflicts: Vec<Conflict>,

    /// Entries referencing an updated entry, for review
    pub dependents: BTreeSet<String>,

    /// Entries that could not be updated
    pub failures: Vec<ItemFailure>,

    /// Batch record of the writes
    pub batch: Option<BatchRecord>,

    /// Conflict log written
    pub conflict_log: Option<PathBuf>,

    /// Extraction triggers archived
    pub triggers_archived: usize,

    /// Run counters
    pub metrics: RunMetrics,
}

/// Read an extraction batch file and propagate it
pub fn propagate_file(ws: &Workspace, ctx: &mut RunContext, path: &Path) -> Result<PropagationReport> {
    let batch = ExtractionBatch::load(path)?;
    propagate(ws, ctx, &batch)
}

/// Merge an extraction batch into the workspace
///
/// Every entry is backed up before it is written. Unknown entry ids are
/// reported per entry and do not stop the run.
pub fn propagate(ws: &Workspace, ctx: &mut RunContext, batch: &ExtractionBatch) -> Result<PropagationReport> {
    let layer = batch.layer(ws.config())?;
    let propagator = UpdatePropagator::new(ws.config());
    let detector = ConflictDetector::new(ws.config());
    let index = ws.entry_index()?;
    let mut store = ws.entries();
    let backups = ws.backups();
    let mut metrics = RunMetrics::new();

    let mut updated = Vec::new();
    let mut updated_ids = Vec::new();
    let mut conflicts = Vec::new();
    let mut failures = Vec::new();
    let mut changes = Vec::new();

    info!(
        "Propagating {} entries from {} into {}",
        batch.entries.len(),
        batch.source,
        layer
    );

    for extracted in &batch.entries {
        let result = (|| -> Result<(String, Entry, Vec<Conflict>, Option<FileChange>)> {
            let path = index
                .get(&extracted.entry_id.to_lowercase())
                .cloned()
                .ok_or_else(|| EngineError::EntryNotFound(extracted.entry_id.clone()))?;
            let raw = store
                .read_raw(&path)?
                .ok_or_else(|| EngineError::EntryNotFound(path.clone()))?;
            let entry = FileEntryStore::parse_entry(&path, &raw)?;
            let values = batch.layer_values(extracted, layer);
            let (merged, merge_conflicts) = propagator.apply(ctx, &entry, &values, &batch.source);
            let rendered = FileEntryStore::render_entry(&merged)?;

            if ctx.dry_run() {
                info!("DRY RUN: Would update {}", path);
                return Ok((path, merged, merge_conflicts, None));
            }
            let now = ctx.now();
            backups.backup(&path, raw.as_bytes(), now)?;
            store.write_raw(&path, &rendered)?;
            ctx.record("write_entry", &path, format!("propagated from {}", batch.source));
            let change = FileChange {
                path: path.clone(),
                before_digest: Some(digest_bytes(raw.as_bytes())),
                after_digest: digest_bytes(rendered.as_bytes()),
            };
            Ok((path, merged, merge_conflicts, Some(change)))
        })();

        match result {
            Ok((path, merged, merge_conflicts, change)) => {
                debug!(entry = %merged.id(), path = %path, "Merged entry");
                conflicts.extend(merge_conflicts);
                conflicts.extend(detector.detect(&merged, ctx));
                updated_ids.push(merged.id().to_string());
                updated.push(path);
                if let Some(change) = change {
                    changes.push(change);
                    metrics.record_write();
                }
            }
            Err(e) => {
                warn!(entry = %extracted.entry_id, error = %e, "Failed to propagate entry");
                failures.push(ItemFailure::new(&extracted.entry_id, e.kind(), e.to_string()));
                metrics.record_failure();
            }
        }
    }

    for conflict in &conflicts {
        metrics.record_conflict(conflict.severity);
    }

    let all_entries: Vec<Entry> = store
        .entry_paths()?
        .iter()
        .filter_map(|p| store.load_entry(p).ok())
        .collect();
    let dependents = DependencyIndex::build(&all_entries, &ws.config().rules).affected(&updated_ids);

    let batch_record = (!changes.is_empty()).then(|| BatchRecord {
        id: ctx.run_id(),
        kind: BatchKind::Propagation,
        actor: ctx.actor().to_string(),
        started_at: ctx.started_at(),
        source: Some(batch.source.clone()),
        changes,
    });

    let mut conflict_log = None;
    if !conflicts.is_empty() {
        conflict_log = ConflictLog::new(ctx, conflicts.clone()).write(ws.layout(), ctx)?;
    }
    ctx.persist_sequence(&ws.layout().conflict_sequence())?;
    if let Some(record) = &batch_record {
        ws.batches().save(record)?;
    }
    let triggers_archived = if updated.is_empty() {
        0
    } else {
        archive_triggers(ws.layout(), &batch.source, ctx.dry_run())?
    };

    info!(
        "Updated {} entries, {} conflicts, {} dependents to review",
        updated.len(),
        conflicts.len(),
        dependents.len()
    );

    Ok(PropagationReport {
        source: batch.source.clone(),
        layer,
        updated,
        conflicts,
        dependents,
        failures,
        batch: batch_record,
        conflict_log,
        triggers_archived,
        metrics,
    })
}
