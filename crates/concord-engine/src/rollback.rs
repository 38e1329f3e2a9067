//! Rollback of entry files to earlier content
//!
//! Content comes from backups, the object store, restore points or conflict
//! snapshots. The current content is always saved (safety backup or safety
//! restore point) before it is replaced, and every restore is appended to
//! the rollback log. Snapshots are never deleted.

use crate::context::RunContext;
use crate::error::{EngineError, Result};
use crate::metrics::RunMetrics;
use crate::workspace::Workspace;
use chrono::{DateTime, Duration, Utc};
use concord_domain::traits::EntryStore;
use concord_domain::{
    BatchKind, BatchRecord, ConflictId, FileChange, RestorePointMetadata, RollbackRecord,
    RollbackStatus, RunId,
};
use concord_store::{digest_bytes, resolve, write_atomic, BackupInfo, CleanupReport};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Outcome of one rollback operation
#[derive(Debug, Clone, Serialize)]
pub struct RollbackReport {
    /// Operation name
    pub operation: String,

    /// What was rolled back (entry path, batch id, restore point...)
    pub target: String,

    /// One record per file
    pub records: Vec<RollbackRecord>,

    /// Safety restore point created before a restore-point rollback
    pub safety_point: Option<String>,

    /// Batch record of the writes
    pub batch: Option<BatchRecord>,

    /// Run counters
    pub metrics: RunMetrics,
}

impl RollbackReport {
    fn new(operation: &str, target: impl Into<String>) -> Self {
        Self {
            operation: operation.to_string(),
            target: target.into(),
            records: Vec::new(),
            safety_point: None,
            batch: None,
            metrics: RunMetrics::new(),
        }
    }

    /// Number of records with a status
    pub fn count(&self, status: RollbackStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    /// Whether every file was restored or already matched
    pub fn is_success(&self) -> bool {
        self.count(RollbackStatus::Failed) == 0
    }
}

/// Restores entry files from history
///
/// # Examples
///
/// ```no_run
/// use concord_engine::{EngineConfig, RollbackManager, Workspace};
///
/// let ws = Workspace::open("/path/to/kb", EngineConfig::default()).unwrap();
/// let mut ctx = ws.context().unwrap();
/// let report = RollbackManager::new(&ws)
///     .with_reason("bad extraction")
///     .rollback_entry(&mut ctx, "instructions/pasm2/mov.yaml", None)
///     .unwrap();
/// println!("{} restored", report.records.len());
/// ```
#[derive(Debug)]
pub struct RollbackManager<'a> {
    ws: &'a Workspace,
    reason: Option<String>,
}

impl<'a> RollbackManager<'a> {
    /// Create a manager for a workspace
    pub fn new(ws: &'a Workspace) -> Self {
        Self { ws, reason: None }
    }

    /// Reason recorded with every restore
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        self.reason = (!reason.trim().is_empty()).then_some(reason);
        self
    }

    /// Regular backups, optionally of one entry only, oldest first
    pub fn list_backups(&self, entry_path: Option<&str>) -> Result<Vec<BackupInfo>> {
        let backups = self.ws.backups();
        Ok(match entry_path {
            Some(path) => backups.list(path)?,
            None => backups.list_all()?,
        })
    }

    /// Restore an entry from a given backup file or its most recent backup
    pub fn rollback_entry(
        &self,
        ctx: &mut RunContext,
        entry_path: &str,
        backup: Option<&Path>,
    ) -> Result<RollbackReport> {
        let mut report = RollbackReport::new("entry", entry_path);
        let source = match backup {
            Some(path) => fs::read(path)
                .map(|bytes| (bytes, path.display().to_string()))
                .map_err(|e| format!("cannot read backup {}: {}", path.display(), e)),
            None => self.latest_backup(entry_path),
        };
        match source {
            Ok((content, from)) => self.restore(ctx, &mut report, entry_path, &content, from, None),
            Err(message) => self.fail(ctx, &mut report, entry_path, message),
        }
        self.finish(ctx, report)
    }

    /// Undo every change of a batch
    ///
    /// Per file, the backup closest to the batch start within the batch window
    /// is used, then the object store copy of the recorded before digest.
    pub fn rollback_batch(&self, ctx: &mut RunContext, id: &RunId) -> Result<RollbackReport> {
        let batch = self.ws.batches().load(id)?;
        let mut report = RollbackReport::new("batch", id.to_string());
        let backups = self.ws.backups();
        let window = Duration::seconds(self.ws.config().batch_window_secs);
        let by_entry = group_by_entry(backups.list_all()?);

        info!(
            "Rolling back batch {} ({} changes)",
            id,
            batch.changes.len()
        );
        for change in &batch.changes {
            let closest = by_entry
                .get(&change.path)
                .into_iter()
                .flatten()
                .filter(|b| (b.taken_at - batch.started_at).abs() <= window)
                .min_by_key(|b| (b.taken_at - batch.started_at).abs());

            let source = match (closest, &change.before_digest) {
                (Some(info), _) => backups
                    .read(info)
                    .map(|content| (content, info.path.display().to_string()))
                    .map_err(|e| format!("cannot read backup {}: {}", info.path.display(), e)),
                (None, Some(digest)) => match backups.objects().get(digest) {
                    Ok(Some(content)) => Ok((content, format!("object:{}", digest))),
                    Ok(None) => Err("no backup within the batch window and no stored object".to_string()),
                    Err(e) => Err(format!("cannot read object {}: {}", digest, e)),
                },
                (None, None) => Err("entry did not exist before the batch".to_string()),
            };
            match source {
                Ok((content, from)) => self.restore(ctx, &mut report, &change.path, &content, from, None),
                Err(message) => self.fail(ctx, &mut report, &change.path, message),
            }
        }
        self.finish(ctx, report)
    }

    /// Undo everything changed within `within` of now
    ///
    /// Each entry backed up after the cutoff gets its latest backup at or
    /// before the cutoff.
    pub fn rollback_time_range(&self, ctx: &mut RunContext, within: Duration) -> Result<RollbackReport> {
        let cutoff = ctx.now() - within;
        let mut report = RollbackReport::new("time_range", format!("since {}", cutoff.to_rfc3339()));
        let backups = self.ws.backups();

        let touched: Vec<(String, Vec<BackupInfo>)> = group_by_entry(backups.list_all()?)
            .into_iter()
            .filter(|(_, list)| list.iter().any(|b| b.taken_at > cutoff))
            .collect();
        info!("Found {} entries modified since {}", touched.len(), cutoff);

        for (entry_path, list) in touched {
            match pre_cutoff(&list, cutoff) {
                Some(info) => match backups.read(info) {
                    Ok(content) => {
                        let from = info.path.display().to_string();
                        self.restore(ctx, &mut report, &entry_path, &content, from, None);
                    }
                    Err(e) => self.fail(
                        ctx,
                        &mut report,
                        &entry_path,
                        format!("cannot read backup {}: {}", info.path.display(), e),
                    ),
                },
                None => self.fail(
                    ctx,
                    &mut report,
                    &entry_path,
                    "no backup at or before the cutoff".to_string(),
                ),
            }
        }
        self.finish(ctx, report)
    }

    /// Copy all entry files into a new restore point
    ///
    /// Returns `None` in dry-run mode.
    pub fn create_restore_point(
        &self,
        ctx: &mut RunContext,
        name: &str,
        description: &str,
    ) -> Result<Option<RestorePointMetadata>> {
        let points = self.ws.restore_points();
        if points.exists(name) {
            return Err(EngineError::InvalidInput(format!(
                "restore point '{}' already exists",
                name
            )));
        }
        let files = self.ws.entries().entry_paths()?;
        if ctx.dry_run() {
            info!("DRY RUN: Would create restore point {} ({} files)", name, files.len());
            return Ok(None);
        }
        let metadata = points.create(name, description, self.ws.root(), &files, ctx.now())?;
        ctx.record("create_restore_point", name, description);
        Ok(Some(metadata))
    }

    /// Rewrite every file that differs from a restore point
    ///
    /// A safety restore point of the current state is created first.
    pub fn restore_from_point(&self, ctx: &mut RunContext, name: &str) -> Result<RollbackReport> {
        let points = self.ws.restore_points();
        let metadata = points.metadata(name)?;
        let files = points.files(name)?;
        let mut report = RollbackReport::new("restore_point", name);

        if !ctx.dry_run() {
            let safety = self.safety_point_name(ctx.now());
            let current = self.ws.entries().entry_paths()?;
            points.create(
                &safety,
                &format!("Automatic safety point before restoring {}", name),
                self.ws.root(),
                &current,
                ctx.now(),
            )?;
            report.safety_point = Some(safety);
        }

        info!(
            "Restoring {} files from {} (created {})",
            files.len(),
            name,
            metadata.created_at
        );
        for rel in &files {
            match points.read_file(name, rel) {
                Ok(content) => {
                    let safety = report.safety_point.clone();
                    let from = format!("restore-point:{}", name);
                    self.restore(ctx, &mut report, rel, &content, from, safety);
                }
                Err(e) => self.fail(ctx, &mut report, rel, e.to_string()),
            }
        }
        self.finish(ctx, report)
    }

    /// Write a snapshot's raw before-text back, byte for byte
    pub fn restore_from_snapshot(&self, ctx: &mut RunContext, id: &ConflictId) -> Result<RollbackReport> {
        let snapshot = self.ws.snapshots().load(id)?;
        let mut report = RollbackReport::new("snapshot", id.as_str());
        self.restore(
            ctx,
            &mut report,
            &snapshot.entry_path,
            snapshot.raw_before.as_bytes(),
            format!("snapshot:{}", id),
            None,
        );
        self.finish(ctx, report)
    }

    /// Delete backups older than `days`
    pub fn cleanup_old_backups(&self, ctx: &mut RunContext, days: i64) -> Result<CleanupReport> {
        if days < 0 {
            return Err(EngineError::InvalidInput("days must not be negative".to_string()));
        }
        let cutoff = ctx.now() - Duration::days(days);
        let report = self.ws.backups().cleanup(cutoff, ctx.dry_run())?;
        info!(
            "Deleted {} backups, kept {}, freed {} bytes",
            report.deleted, report.kept, report.bytes_freed
        );
        if !ctx.dry_run() {
            ctx.record("cleanup_backups", &format!("older than {} days", days), format!("{} deleted", report.deleted));
        }
        Ok(report)
    }

    fn latest_backup(&self, entry_path: &str) -> std::result::Result<(Vec<u8>, String), String> {
        let backups = self.ws.backups();
        let info = backups
            .latest(entry_path)
            .map_err(|e| format!("cannot list backups: {}", e))?
            .ok_or_else(|| "no backup found".to_string())?;
        let content = backups
            .read(&info)
            .map_err(|e| format!("cannot read backup {}: {}", info.path.display(), e))?;
        Ok((content, info.path.display().to_string()))
    }

    fn safety_point_name(&self, at: DateTime<Utc>) -> String {
        let base = format!("auto-safety-{}", at.format("%Y%m%d_%H%M%S"));
        let points = self.ws.restore_points();
        let mut name = base.clone();
        let mut n = 1;
        while points.exists(&name) {
            name = format!("{}-{}", base, n);
            n += 1;
        }
        name
    }

    fn record(
        &self,
        ctx: &RunContext,
        operation: &str,
        target: &str,
        status: RollbackStatus,
    ) -> RollbackRecord {
        RollbackRecord {
            run_id: ctx.run_id(),
            actor: ctx.actor().to_string(),
            timestamp: ctx.now(),
            operation: operation.to_string(),
            target: target.to_string(),
            reason: self.reason.clone(),
            restored_from: None,
            safety_backup: None,
            status,
            error: None,
        }
    }

    fn fail(&self, ctx: &RunContext, report: &mut RollbackReport, target: &str, message: String) {
        warn!(target = %target, "Rollback failed: {}", message);
        let mut record = self.record(ctx, &report.operation, target, RollbackStatus::Failed);
        record.error = Some(message);
        report.records.push(record);
    }

    /// Replace one file's content, saving the current content first
    ///
    /// With `safety_point` set the file is covered by that restore point and no
    /// per-file safety backup is written.
    fn restore(
        &self,
        ctx: &mut RunContext,
        report: &mut RollbackReport,
        target: &str,
        content: &[u8],
        from: String,
        safety_point: Option<String>,
    ) {
        let mut record = self.record(ctx, &report.operation, target, RollbackStatus::Restored);
        record.restored_from = Some(from);
        record.safety_backup = safety_point.clone();

        let result = (|| -> Result<Option<FileChange>> {
            let full = resolve(self.ws.root(), target);
            let current = if full.exists() { Some(fs::read(&full)?) } else { None };
            if current.as_deref() == Some(content) {
                record.status = RollbackStatus::Unchanged;
                return Ok(None);
            }
            if ctx.dry_run() {
                info!("DRY RUN: Would restore {}", target);
                record.status = RollbackStatus::Planned;
                return Ok(None);
            }
            if let (Some(bytes), None) = (&current, &safety_point) {
                let safety = self.ws.backups().safety_backup(target, bytes, ctx.now())?;
                record.safety_backup = Some(safety.path.display().to_string());
            }
            write_atomic(&full, content)?;
            ctx.record("restore", target, record.restored_from.clone().unwrap_or_default());
            Ok(Some(FileChange {
                path: target.to_string(),
                before_digest: current.as_deref().map(digest_bytes),
                after_digest: digest_bytes(content),
            }))
        })();

        match result {
            Ok(change) => {
                if let Some(change) = change {
                    info!(entry = %target, "Restored");
                    let batch = report.batch.get_or_insert_with(|| BatchRecord {
                        id: ctx.run_id(),
                        kind: BatchKind::Rollback,
                        actor: ctx.actor().to_string(),
                        started_at: ctx.started_at(),
                        source: None,
                        changes: Vec::new(),
                    });
                    batch.changes.push(change);
                    report.metrics.record_write();
                }
                report.records.push(record);
            }
            Err(e) => self.fail(ctx, report, target, e.to_string()),
        }
    }

    fn finish(&self, ctx: &mut RunContext, mut report: RollbackReport) -> Result<RollbackReport> {
        for record in &report.records {
            report.metrics.record_rollback(record.status);
        }
        if !ctx.dry_run() {
            self.ws.rollback_log().append(&report.records)?;
            if let Some(batch) = &report.batch {
                self.ws.batches().save(batch)?;
            }
        }
        info!(
            "{} rollback of {}: {} restored, {} unchanged, {} failed",
            report.operation,
            report.target,
            report.count(RollbackStatus::Restored),
            report.count(RollbackStatus::Unchanged),
            report.count(RollbackStatus::Failed)
        );
        Ok(report)
    }
}

/// Backups grouped by entry path, each list keeping the store's order
fn group_by_entry(list: Vec<BackupInfo>) -> BTreeMap<String, Vec<BackupInfo>> {
    let mut by_entry: BTreeMap<String, Vec<BackupInfo>> = BTreeMap::new();
    for info in list {
        by_entry.entry(info.entry_path.clone()).or_default().push(info);
    }
    by_entry
}

/// Latest backup at or before the cutoff; `list` is oldest first
fn pre_cutoff(list: &[BackupInfo], cutoff: DateTime<Utc>) -> Option<&BackupInfo> {
    list.iter().rev().find(|b| b.taken_at <= cutoff)
}
