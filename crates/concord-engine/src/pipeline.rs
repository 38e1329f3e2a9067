//! Scan and resolution runs over a workspace
//!
//! A resolution run walks a conflict log in order. Every automated
//! resolution goes through the same sequence: snapshot, backup, write,
//! batch record. A conflict whose snapshot already exists was applied by an
//! earlier run and is skipped, so re-running a log is harmless.

use crate::context::RunContext;
use crate::detect::{scan, ConflictDetector, ConflictLog, ScanReport};
use crate::error::{EngineError, Result};
use crate::metrics::RunMetrics;
use crate::resolve::{apply_resolution, review_item, ConflictResolver};
use crate::workspace::Workspace;
use chrono::{DateTime, Utc};
use concord_domain::traits::EntryStore;
use concord_domain::{
    BatchKind, BatchRecord, Conflict, ConflictId, FileChange, FieldValue, ItemFailure,
    ReviewItem, RunId, Snapshot, Strategy,
};
use concord_store::{digest_bytes, write_run_log, FileEntryStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of one conflict in a resolution run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Resolution written (or planned in dry-run mode)
    Resolved,

    /// Queued for manual review
    Escalated,

    /// Could not be applied
    Failed,

    /// Already applied by an earlier run
    Skipped,
}

impl ItemStatus {
    /// Get the status as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Resolved => "resolved",
            ItemStatus::Escalated => "escalated",
            ItemStatus::Failed => "failed",
            ItemStatus::Skipped => "skipped",
        }
    }
}

/// One line of the resolution log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    /// Conflict
    pub conflict_id: ConflictId,

    /// Entry identifier
    pub entry_id: String,

    /// Field
    pub field: String,

    /// Strategy chosen
    pub strategy: Strategy,

    /// Outcome
    pub status: ItemStatus,

    /// Confidence of the resolution
    pub confidence: f64,

    /// Value written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_value: Option<FieldValue>,

    /// Rationale or failure message
    pub message: String,
}

/// Persisted log of a resolution run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionLog {
    /// Run identifier
    pub run_id: RunId,

    /// Who ran it
    pub actor: String,

    /// When the log was written
    pub generated_at: DateTime<Utc>,

    /// Conflict log the run read, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_log: Option<String>,

    /// Count per status
    pub summary: BTreeMap<String, usize>,

    /// Per-conflict outcomes, in log order
    pub outcomes: Vec<ResolutionOutcome>,
}

/// Everything a resolution run produced
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    /// The resolution log
    pub log: ResolutionLog,

    /// Items queued for review this run
    pub review_items: Vec<ReviewItem>,

    /// Newly queued items (excluding ones already in the queue)
    pub newly_queued: usize,

    /// Batch record of the writes, if anything was written
    pub batch: Option<BatchRecord>,

    /// Per-conflict failures
    pub failures: Vec<ItemFailure>,

    /// Run counters
    pub metrics: RunMetrics,

    /// Where the log was written
    pub log_path: Option<PathBuf>,
}

impl ResolutionReport {
    /// Number of conflicts with a given status
    pub fn count(&self, status: ItemStatus) -> usize {
        self.log.outcomes.iter().filter(|o| o.status == status).count()
    }
}

/// Scan every entry for conflicts and write the conflict log
pub fn scan_workspace(ws: &Workspace, ctx: &mut RunContext) -> Result<(ScanReport, Option<PathBuf>)> {
    let detector = ConflictDetector::new(ws.config());
    let report = scan(&ws.entries(), &detector, ctx)?;
    let log = ConflictLog::new(ctx, report.conflicts.clone());
    let path = log.write(ws.layout(), ctx)?;
    ctx.persist_sequence(&ws.layout().conflict_sequence())?;
    Ok((report, path))
}

/// Resolve the conflicts of a conflict log file
pub fn resolve_log(ws: &Workspace, ctx: &mut RunContext, log_path: &Path) -> Result<ResolutionReport> {
    let log = ConflictLog::load(log_path)?;
    info!(
        "Resolving {} conflicts from {}",
        log.conflicts.len(),
        log_path.display()
    );
    resolve_conflicts(ws, ctx, &log.conflicts, Some(log_path.display().to_string()))
}

struct Applier<'a> {
    ws: &'a Workspace,
    store: FileEntryStore,
    index: BTreeMap<String, String>,
    changes: Vec<FileChange>,
}

impl Applier<'_> {
    fn apply(
        &mut self,
        ctx: &mut RunContext,
        conflict: &Conflict,
        resolution: &concord_domain::Resolution,
    ) -> Result<()> {
        let path = self
            .index
            .get(&conflict.entry_id.to_lowercase())
            .cloned()
            .ok_or_else(|| EngineError::EntryNotFound(conflict.entry_id.clone()))?;
        let raw = self
            .store
            .read_raw(&path)?
            .ok_or_else(|| EngineError::EntryNotFound(path.clone()))?;
        let before = FileEntryStore::parse_entry(&path, &raw)?;
        let after = apply_resolution(&before, conflict, resolution)?;
        let rendered = FileEntryStore::render_entry(&after)?;
        let now = ctx.now();

        if ctx.dry_run() {
            info!(
                "DRY RUN: Would apply {} to {} ({})",
                resolution.strategy, path, conflict.field
            );
            return Ok(());
        }

        let snapshot = Snapshot {
            conflict_id: conflict.id.clone(),
            entry_id: conflict.entry_id.clone(),
            entry_path: path.clone(),
            conflict: conflict.clone(),
            resolution: resolution.clone(),
            entry_before: before,
            entry_after: after,
            raw_before: raw.clone(),
            digest_before: digest_bytes(raw.as_bytes()),
            digest_after: digest_bytes(rendered.as_bytes()),
            captured_at: now,
        };
        self.ws.snapshots().capture(&snapshot)?;
        ctx.record("capture_snapshot", conflict.id.as_str(), &path);

        self.ws.backups().backup(&path, raw.as_bytes(), now)?;
        self.store.write_raw(&path, &rendered)?;
        ctx.record("write_entry", &path, format!("{} via {}", conflict.field, resolution.strategy));

        match self.changes.iter_mut().find(|c| c.path == path) {
            Some(change) => change.after_digest = snapshot.digest_after,
            None => self.changes.push(FileChange {
                path,
                before_digest: Some(snapshot.digest_before),
                after_digest: snapshot.digest_after,
            }),
        }
        Ok(())
    }
}

/// Resolve conflicts in order, applying the automated ones
///
/// Per-conflict failures are collected; the run continues.
pub fn resolve_conflicts(
    ws: &Workspace,
    ctx: &mut RunContext,
    conflicts: &[Conflict],
    conflict_log: Option<String>,
) -> Result<ResolutionReport> {
    let resolver = ConflictResolver::new(ws.config());
    let snapshots = ws.snapshots();
    let mut applier = Applier {
        ws,
        store: ws.entries(),
        index: ws.entry_index()?,
        changes: Vec::new(),
    };
    let mut metrics = RunMetrics::new();
    let mut outcomes = Vec::with_capacity(conflicts.len());
    let mut review_items = Vec::new();
    let mut failures = Vec::new();

    for conflict in conflicts {
        let resolution = resolver.resolve(conflict, ctx.now());
        metrics.record_resolution(resolution.strategy);
        let mut outcome = ResolutionOutcome {
            conflict_id: conflict.id.clone(),
            entry_id: conflict.entry_id.clone(),
            field: conflict.field.clone(),
            strategy: resolution.strategy,
            status: ItemStatus::Resolved,
            confidence: resolution.confidence,
            resolved_value: resolution.resolved_value.clone(),
            message: resolution.rationale.clone(),
        };

        if resolution.is_escalated() {
            review_items.push(review_item(
                conflict,
                &resolution,
                ctx.now(),
                ws.config().review_deadline_days,
            ));
            outcome.status = ItemStatus::Escalated;
        } else if snapshots.exists(&conflict.id) {
            outcome.status = ItemStatus::Skipped;
            outcome.message = "already applied".to_string();
        } else if let Err(e) = applier.apply(ctx, conflict, &resolution) {
            warn!(conflict = %conflict.id, error = %e, "Failed to apply resolution");
            failures.push(ItemFailure::new(conflict.id.as_str(), e.kind(), e.to_string()));
            metrics.record_failure();
            outcome.status = ItemStatus::Failed;
            outcome.message = e.to_string();
        } else if !ctx.dry_run() {
            metrics.record_write();
        }
        outcomes.push(outcome);
    }

    let mut summary = BTreeMap::new();
    for outcome in &outcomes {
        *summary.entry(outcome.status.as_str().to_string()).or_insert(0) += 1;
    }
    let log = ResolutionLog {
        run_id: ctx.run_id(),
        actor: ctx.actor().to_string(),
        generated_at: ctx.now(),
        conflict_log,
        summary,
        outcomes,
    };

    let batch = (!applier.changes.is_empty()).then(|| BatchRecord {
        id: ctx.run_id(),
        kind: BatchKind::Resolution,
        actor: ctx.actor().to_string(),
        started_at: ctx.started_at(),
        source: log.conflict_log.clone(),
        changes: applier.changes.clone(),
    });

    let mut report = ResolutionReport {
        newly_queued: 0,
        log,
        review_items,
        batch,
        failures,
        metrics,
        log_path: None,
    };

    if ctx.dry_run() {
        info!(
            "DRY RUN: Would queue {} conflicts for review",
            report.review_items.len()
        );
        return Ok(report);
    }

    report.newly_queued = ws.review_queue().enqueue(&report.review_items)?;
    if let Some(batch) = &report.batch {
        ws.batches().save(batch)?;
    }
    let path = write_run_log(
        &ws.layout().resolutions_dir(),
        "resolution-log",
        report.log.generated_at,
        &report.log,
    )?;
    info!(
        "Resolved {}, escalated {}, failed {}, skipped {}",
        report.count(ItemStatus::Resolved),
        report.count(ItemStatus::Escalated),
        report.count(ItemStatus::Failed),
        report.count(ItemStatus::Skipped)
    );
    report.log_path = Some(path);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use concord_domain::{AuthorityLayer, Entry};
    use std::fs;
    use tempfile::TempDir;

    fn setup(dry_run: bool) -> (TempDir, Workspace) {
        let dir = TempDir::new().unwrap();
        let mut entry = Entry::new("x-instruction");
        entry.layer_or_default(AuthorityLayer::Baseline).set("timing", "2".into());
        entry.layer_or_default(AuthorityLayer::Verified).set("timing", "13-20".into());
        entry.layer_or_default(AuthorityLayer::Verified).set("interrupt_shield", false.into());
        entry.layer_or_default(AuthorityLayer::Absolute).set("interrupt_shield", true.into());
        entry.layer_or_default(AuthorityLayer::Confirmed).set("syntax", "X D,S".into());
        entry.layer_or_default(AuthorityLayer::Verified).set("syntax", "X D".into());

        let path = dir.path().join("instructions").join("x.yaml");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("# hand written\n{}", serde_yaml::to_string(&entry).unwrap())).unwrap();

        let config = EngineConfig {
            dry_run,
            ..EngineConfig::default()
        };
        let ws = Workspace::open(dir.path(), config).unwrap();
        (dir, ws)
    }

    #[test]
    fn test_scan_then_resolve() {
        let (_dir, ws) = setup(false);
        let mut ctx = ws.context().unwrap();
        let (report, log_path) = scan_workspace(&ws, &mut ctx).unwrap();
        assert_eq!(report.conflicts.len(), 3);
        let log_path = log_path.unwrap();

        let mut ctx = ws.context().unwrap();
        let result = resolve_log(&ws, &mut ctx, &log_path).unwrap();
        assert_eq!(result.count(ItemStatus::Resolved), 3);
        assert!(result.failures.is_empty());
        assert_eq!(result.batch.as_ref().unwrap().changes.len(), 1);
        assert!(result.log_path.is_some());

        let entry = ws.entries().load_entry("instructions/x.yaml").unwrap();
        assert_eq!(entry.consolidated("timing"), Some("13-20".into()));
        assert_eq!(entry.consolidated("interrupt_shield"), Some(true.into()));
        assert_eq!(
            entry.consolidated("syntax"),
            Some("X D,S [confirmed] X D [verified]".into())
        );
        assert_eq!(entry.conflict_resolutions.len(), 3);
        assert_eq!(ws.snapshots().list().unwrap().len(), 3);
        assert_eq!(ws.backups().list("instructions/x.yaml").unwrap().len(), 3);
    }

    #[test]
    fn test_rerun_skips_applied_conflicts() {
        let (_dir, ws) = setup(false);
        let mut ctx = ws.context().unwrap();
        let (_, log_path) = scan_workspace(&ws, &mut ctx).unwrap();
        let log_path = log_path.unwrap();

        resolve_log(&ws, &mut ws.context().unwrap(), &log_path).unwrap();
        let again = resolve_log(&ws, &mut ws.context().unwrap(), &log_path).unwrap();
        assert_eq!(again.count(ItemStatus::Skipped), 3);
        assert!(again.batch.is_none());
    }

    #[test]
    fn test_scan_ids_continue_across_runs() {
        let (_dir, ws) = setup(false);
        let (first, _) = scan_workspace(&ws, &mut ws.context().unwrap()).unwrap();
        let (second, _) = scan_workspace(&ws, &mut ws.context().unwrap()).unwrap();
        assert!(first.conflicts.last().unwrap().id < second.conflicts[0].id);
    }

    #[test]
    fn test_escalations_are_queued() {
        let (_dir, ws) = setup(false);
        let mut ctx = ws.context().unwrap();
        let conflict = Conflict::new(
            ctx.next_conflict_id(),
            "x-instruction",
            "mnemonic",
            concord_domain::ConflictKind::DirectContradiction,
            concord_domain::ConflictSide::new(AuthorityLayer::Baseline, "X".into()),
            concord_domain::ConflictSide::new(AuthorityLayer::Confirmed, "XX".into()),
            concord_domain::Severity::Critical,
            ctx.now(),
        );
        let report = resolve_conflicts(&ws, &mut ctx, &[conflict], None).unwrap();
        assert_eq!(report.count(ItemStatus::Escalated), 1);
        assert_eq!(report.newly_queued, 1);
        assert_eq!(ws.review_queue().load().unwrap().len(), 1);
        assert!(ws.snapshots().list().unwrap().is_empty());
    }

    #[test]
    fn test_missing_entry_fails_item_only() {
        let (_dir, ws) = setup(false);
        let mut ctx = ws.context().unwrap();
        let conflict = Conflict::new(
            ctx.next_conflict_id(),
            "ghost-instruction",
            "timing",
            concord_domain::ConflictKind::DirectContradiction,
            concord_domain::ConflictSide::new(AuthorityLayer::Baseline, "1".into()),
            concord_domain::ConflictSide::new(AuthorityLayer::Verified, "2".into()),
            concord_domain::Severity::High,
            ctx.now(),
        );
        let report = resolve_conflicts(&ws, &mut ctx, &[conflict], None).unwrap();
        assert_eq!(report.count(ItemStatus::Failed), 1);
        assert_eq!(report.failures[0].kind, concord_domain::ErrorKind::SchemaMismatch);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (dir, ws) = setup(true);
        let original = fs::read_to_string(dir.path().join("instructions/x.yaml")).unwrap();
        let mut ctx = ws.context().unwrap();
        let (report, log_path) = scan_workspace(&ws, &mut ctx).unwrap();
        assert!(log_path.is_none());

        let result = resolve_conflicts(&ws, &mut ctx, &report.conflicts, None).unwrap();
        assert_eq!(result.count(ItemStatus::Resolved), 3);
        assert!(result.log_path.is_none());
        assert_eq!(
            fs::read_to_string(dir.path().join("instructions/x.yaml")).unwrap(),
            original
        );
        assert!(!ws.layout().tracking().exists());
    }
}
