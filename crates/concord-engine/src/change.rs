//! Change detection over source documents and entry files
//!
//! Both watch sets are digested and compared with the baselines persisted
//! under the tracking directory. The baselines are replaced after every
//! detection (except in dry-run mode), so a second run without filesystem
//! changes reports nothing.

use crate::error::Result;
use crate::workspace::Workspace;
use chrono::{DateTime, Utc};
use concord_domain::{ChangeKind, EntryChange, ItemFailure, SourceChange};
use concord_store::{read_yaml, scan_files, write_run_log, DigestMap, FileEntryStore, TrackingLayout};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Request to re-extract a changed source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionTrigger {
    /// When the change was detected
    pub trigger_time: DateTime<Utc>,

    /// Changed source document
    pub source_file: String,

    /// Added or modified
    pub change_type: ChangeKind,

    /// Digest of the new content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_hash: Option<String>,

    /// Entry files fed by the source
    #[serde(default)]
    pub affected_entries: Vec<String>,
}

/// Everything one detection run found
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeReport {
    /// Changed source documents
    pub sources: Vec<SourceChange>,

    /// Changed entry files
    pub entries: Vec<EntryChange>,

    /// Entry files fed by each changed source
    pub affected: BTreeMap<String, Vec<String>>,

    /// Trigger files written
    pub triggers: Vec<PathBuf>,

    /// Watched files that could not be read
    pub failures: Vec<ItemFailure>,
}

/// Changes found in one watch set, plus the files skipped while digesting
#[derive(Debug, Clone, Default)]
pub struct Detection<T> {
    /// Changes against the baseline
    pub changes: Vec<T>,

    /// Files that could not be read; their baseline digest is kept
    pub failures: Vec<ItemFailure>,
}

impl ChangeReport {
    /// Whether nothing changed
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.entries.is_empty()
    }

    /// Entry changes flagged for audit
    pub fn needs_audit(&self) -> usize {
        self.entries.iter().filter(|e| e.needs_audit).count()
    }
}

struct Diff {
    path: String,
    kind: ChangeKind,
    digest: Option<String>,
    previous: Option<String>,
}

fn diff(previous: &DigestMap, current: &DigestMap) -> Vec<Diff> {
    let mut out = Vec::new();
    for (path, digest) in current.iter() {
        match previous.get(path) {
            None => out.push(Diff {
                path: path.clone(),
                kind: ChangeKind::Added,
                digest: Some(digest.clone()),
                previous: None,
            }),
            Some(old) if old != digest => out.push(Diff {
                path: path.clone(),
                kind: ChangeKind::Modified,
                digest: Some(digest.clone()),
                previous: Some(old.to_string()),
            }),
            Some(_) => {}
        }
    }
    for (path, digest) in previous.iter() {
        if current.get(path).is_none() {
            out.push(Diff {
                path: path.clone(),
                kind: ChangeKind::Removed,
                digest: None,
                previous: Some(digest.clone()),
            });
        }
    }
    out
}

/// Detects changed sources and entries of a workspace
pub struct ChangeDetector<'a> {
    ws: &'a Workspace,
}

impl<'a> ChangeDetector<'a> {
    /// Create a detector over a workspace
    pub fn new(ws: &'a Workspace) -> Self {
        Self { ws }
    }

    fn refresh(&self, files: &[String], baseline: &Path) -> Result<(Vec<Diff>, Vec<ItemFailure>)> {
        let previous = DigestMap::load(baseline)?;
        let (current, failures) = DigestMap::recompute(self.ws.root(), files, &previous);
        let changes = diff(&previous, &current);
        if self.ws.config().dry_run {
            info!("DRY RUN: Would update baseline {}", baseline.display());
        } else {
            current.save(baseline)?;
        }
        Ok((changes, failures))
    }

    /// Diff source documents against the persisted baseline
    pub fn detect_source_changes(&self) -> Result<Detection<SourceChange>> {
        let files = scan_files(self.ws.root(), &self.ws.config().source_patterns)?;
        let (changes, failures) = self.refresh(&files, &self.ws.layout().source_hashes())?;
        let changes = changes
            .into_iter()
            .map(|d| SourceChange {
                path: d.path,
                kind: d.kind,
                digest: d.digest,
                previous_digest: d.previous,
            })
            .collect();
        Ok(Detection { changes, failures })
    }

    /// Diff entry files against the persisted baseline
    ///
    /// Added and modified entries are flagged for audit and carry their
    /// completeness score when they parse.
    pub fn detect_entry_changes(&self) -> Result<Detection<EntryChange>> {
        let files = scan_files(self.ws.root(), &self.ws.config().entry_patterns)?;
        let (changes, failures) = self.refresh(&files, &self.ws.layout().entry_hashes())?;
        let mut out = Vec::with_capacity(changes.len());
        for d in changes {
            let (entry_id, completeness_score) = if d.kind == ChangeKind::Removed {
                (None, None)
            } else {
                match fs::read_to_string(self.ws.root().join(&d.path))
                    .map_err(concord_store::StoreError::from)
                    .and_then(|text| FileEntryStore::parse_entry(&d.path, &text))
                {
                    Ok(entry) => (Some(entry.metadata.id.clone()), entry.completeness_score),
                    Err(e) => {
                        warn!(path = %d.path, error = %e, "Changed entry does not parse");
                        (None, None)
                    }
                }
            };
            out.push(EntryChange {
                needs_audit: d.kind != ChangeKind::Removed,
                path: d.path,
                kind: d.kind,
                entry_id,
                completeness_score,
            });
        }
        Ok(Detection {
            changes: out,
            failures,
        })
    }

    /// Entry files fed by each changed source, per the source mappings
    pub fn affected_entries_by_source(
        &self,
        changes: &[SourceChange],
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let entry_files = scan_files(self.ws.root(), &self.ws.config().entry_patterns)?;
        let mut affected = BTreeMap::new();
        for change in changes.iter().filter(|c| c.kind != ChangeKind::Removed) {
            let source = change.path.to_lowercase();
            let mut files: Vec<String> = self
                .ws
                .config()
                .source_mappings
                .iter()
                .filter(|m| source.contains(&m.source.to_lowercase()))
                .flat_map(|m| {
                    let prefix = format!("{}/", m.entry_dir.trim_end_matches('/'));
                    entry_files
                        .iter()
                        .filter(move |f| f.starts_with(&prefix))
                        .cloned()
                })
                .collect();
            files.sort();
            files.dedup();
            affected.insert(change.path.clone(), files);
        }
        Ok(affected)
    }

    /// Write one trigger per added or modified source
    pub fn write_extraction_triggers(
        &self,
        changes: &[SourceChange],
        at: DateTime<Utc>,
    ) -> Result<Vec<PathBuf>> {
        let affected = self.affected_entries_by_source(changes)?;
        let dir = self.ws.layout().triggers_dir();
        let mut written = Vec::new();

        for change in changes.iter().filter(|c| c.kind != ChangeKind::Removed) {
            let trigger = ExtractionTrigger {
                trigger_time: at,
                source_file: change.path.clone(),
                change_type: change.kind,
                new_hash: change.digest.clone(),
                affected_entries: affected.get(&change.path).cloned().unwrap_or_default(),
            };
            let stem = Path::new(&change.path)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "source".to_string());

            if self.ws.config().dry_run {
                info!("DRY RUN: Would write extraction trigger for {}", change.path);
                continue;
            }
            let path = write_run_log(&dir, &format!("extract-{}", stem), at, &trigger)?;
            info!("Created extraction trigger: {}", path.display());
            written.push(path);
        }
        Ok(written)
    }

    /// Full detection: sources, entries, affected entries and triggers
    pub fn run(&self, at: DateTime<Utc>) -> Result<ChangeReport> {
        let sources = self.detect_source_changes()?;
        let entries = self.detect_entry_changes()?;
        let affected = self.affected_entries_by_source(&sources.changes)?;
        let triggers = self.write_extraction_triggers(&sources.changes, at)?;
        let mut failures = sources.failures;
        failures.extend(entries.failures);
        info!(
            "Detected {} source changes and {} entry changes ({} files skipped)",
            sources.changes.len(),
            entries.changes.len(),
            failures.len()
        );
        Ok(ChangeReport {
            sources: sources.changes,
            entries: entries.changes,
            affected,
            triggers,
            failures,
        })
    }
}

/// Pending extraction triggers, oldest first
pub fn pending_triggers(layout: &TrackingLayout) -> Result<Vec<(PathBuf, ExtractionTrigger)>> {
    let dir = layout.triggers_dir();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut triggers = Vec::new();
    for item in fs::read_dir(&dir)? {
        let path = item?.path();
        let is_trigger = path.is_file()
            && path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with("extract-"));
        if is_trigger {
            let trigger: ExtractionTrigger = read_yaml(&path)?;
            triggers.push((path, trigger));
        }
    }
    triggers.sort_by(|a, b| a.1.trigger_time.cmp(&b.1.trigger_time));
    Ok(triggers)
}

/// Move the triggers of a source to `processed/`
///
/// A trigger matches when either the source tag or the trigger's source
/// file contains the other's stem, case-insensitively.
pub fn archive_triggers(layout: &TrackingLayout, source: &str, dry_run: bool) -> Result<usize> {
    let tag = source.to_lowercase();
    let processed = layout.processed_triggers_dir();
    let mut archived = 0;

    for (path, trigger) in pending_triggers(layout)? {
        let file = trigger.source_file.to_lowercase();
        let stem = Path::new(&file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let matches = file.contains(&tag) || (!stem.is_empty() && tag.contains(&stem));
        if !matches {
            continue;
        }
        if dry_run {
            info!("DRY RUN: Would archive trigger {}", path.display());
        } else if let Some(name) = path.file_name() {
            fs::create_dir_all(&processed)?;
            fs::rename(&path, processed.join(name))?;
            debug!(trigger = %path.display(), "Archived trigger");
        }
        archived += 1;
    }
    Ok(archived)
}
