//! Entry evolution over time
//!
//! Everything here is read from records the other operations already keep:
//! layer extraction dates, the entry's propagation history, its applied
//! resolutions and the conflict snapshots (for completeness before and
//! after each resolution). Nothing is written.

use crate::context::RunContext;
use crate::detect::ConflictDetector;
use crate::error::{EngineError, Result};
use crate::workspace::Workspace;
use chrono::{DateTime, NaiveDate, Utc};
use concord_domain::traits::EntryStore;
use concord_domain::{AuthorityLayer, ConflictId, Entry, ItemFailure, ReviewItem};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

/// What kind of change an event records
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A layer block was extracted from its source
    Extraction,

    /// An extraction batch was merged into the entry
    Update,

    /// A conflict resolution was applied
    Resolution,
}

impl EventKind {
    /// Get the kind as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Extraction => "extraction",
            EventKind::Update => "update",
            EventKind::Resolution => "resolution",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completeness score before and after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletenessChange {
    /// Score before
    pub from: Option<u32>,

    /// Score after
    pub to: Option<u32>,
}

/// One change in an entry's life
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEvent {
    /// When it happened; extraction dates that do not parse stay `None`
    pub at: Option<DateTime<Utc>>,

    /// Entry identifier
    pub entry_id: String,

    /// Kind of change
    pub kind: EventKind,

    /// Layer involved (extracted, merged or winning layer)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<AuthorityLayer>,

    /// Source tag, or the conflict id of a resolution
    pub source: String,

    /// Fields touched
    pub fields: Vec<String>,

    /// Short description (strategy, raw extraction date...)
    pub detail: String,

    /// Completeness change, when a snapshot recorded it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completeness: Option<CompletenessChange>,
}

/// Evolution of one entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryHistory {
    /// Entry identifier
    pub entry_id: String,

    /// Entry file path
    pub path: String,

    /// Current completeness score
    pub completeness_score: Option<u32>,

    /// Conflicts the detector still reports
    pub open_conflicts: usize,

    /// Review items without a decision
    pub pending_reviews: usize,

    /// Events, oldest first
    pub events: Vec<HistoryEvent>,
}

impl EntryHistory {
    /// Time of the latest dated event
    pub fn last_changed(&self) -> Option<DateTime<Utc>> {
        self.events.iter().filter_map(|e| e.at).max()
    }

    /// Whether the entry has unsettled disagreements
    pub fn has_conflicts(&self) -> bool {
        self.open_conflicts > 0 || self.pending_reviews > 0
    }

    /// Source tags the entry has received content from
    pub fn sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = self
            .events
            .iter()
            .filter(|e| e.kind != EventKind::Resolution)
            .map(|e| e.source.as_str())
            .filter(|s| !s.is_empty())
            .collect();
        sources.sort_unstable();
        sources.dedup();
        sources
    }
}

/// Filter over entry histories; unset criteria match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryCriteria {
    /// Completeness strictly below this score
    pub completeness_below: Option<u32>,

    /// Completeness at or above this score
    pub min_completeness: Option<u32>,

    /// Only entries with open conflicts or pending reviews
    pub has_conflicts: bool,

    /// Changed at or after this time
    pub updated_since: Option<DateTime<Utc>>,

    /// Received content from a source containing this text (case-insensitive)
    pub source: Option<String>,
}

impl HistoryCriteria {
    /// Whether an entry history satisfies every set criterion
    ///
    /// Entries without a completeness score fail both completeness bounds.
    pub fn matches(&self, history: &EntryHistory) -> bool {
        if let Some(bound) = self.completeness_below {
            if !history.completeness_score.is_some_and(|s| s < bound) {
                return false;
            }
        }
        if let Some(min) = self.min_completeness {
            if !history.completeness_score.is_some_and(|s| s >= min) {
                return false;
            }
        }
        if self.has_conflicts && !history.has_conflicts() {
            return false;
        }
        if let Some(since) = self.updated_since {
            if !history.last_changed().is_some_and(|at| at >= since) {
                return false;
            }
        }
        if let Some(source) = &self.source {
            let needle = source.to_lowercase();
            if !history.sources().iter().any(|s| s.to_lowercase().contains(&needle)) {
                return false;
            }
        }
        true
    }
}

/// Every entry's history plus the merged timeline
#[derive(Debug, Clone, Default, Serialize)]
pub struct Timeline {
    /// Per-entry histories, in path order
    pub entries: Vec<EntryHistory>,

    /// All events, oldest first; undated events lead
    pub events: Vec<HistoryEvent>,

    /// Event counts per kind
    pub by_kind: BTreeMap<EventKind, usize>,

    /// Entries or snapshots that could not be read
    pub failures: Vec<ItemFailure>,
}

/// Reads entry histories from a workspace
#[derive(Debug)]
pub struct HistoryBrowser<'a> {
    ws: &'a Workspace,
}

impl<'a> HistoryBrowser<'a> {
    /// Create a browser over a workspace
    pub fn new(ws: &'a Workspace) -> Self {
        Self { ws }
    }

    /// History of one entry, looked up by id (case-insensitive)
    pub fn entry_evolution(&self, ctx: &RunContext, entry_id: &str) -> Result<EntryHistory> {
        let entries = self.ws.entries();
        let path = entries
            .find_entry(entry_id)?
            .ok_or_else(|| EngineError::EntryNotFound(entry_id.to_string()))?;
        let entry = entries.load_entry(&path)?;
        let mut failures = Vec::new();
        let completeness = self.snapshot_completeness(&mut failures)?;
        let reviews = self.ws.review_queue().load()?;
        Ok(self.history_of(ctx, path, &entry, &completeness, &reviews))
    }

    /// Histories of all entries and the merged timeline
    pub fn timeline(&self, ctx: &RunContext) -> Result<Timeline> {
        let entries = self.ws.entries();
        let mut timeline = Timeline::default();
        let completeness = self.snapshot_completeness(&mut timeline.failures)?;
        let reviews = self.ws.review_queue().load()?;

        for path in entries.entry_paths()? {
            match entries.load_entry(&path) {
                Ok(entry) => {
                    let history = self.history_of(ctx, path, &entry, &completeness, &reviews);
                    timeline.events.extend(history.events.iter().cloned());
                    timeline.entries.push(history);
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping unreadable entry");
                    timeline.failures.push(ItemFailure::new(path, e.kind(), e.to_string()));
                }
            }
        }
        timeline.events.sort_by(|a, b| a.at.cmp(&b.at));
        for event in &timeline.events {
            *timeline.by_kind.entry(event.kind).or_insert(0) += 1;
        }
        info!(
            "Loaded {} entries with {} events",
            timeline.entries.len(),
            timeline.events.len()
        );
        Ok(timeline)
    }

    /// Entry histories matching the criteria, in path order
    pub fn find(&self, ctx: &RunContext, criteria: &HistoryCriteria) -> Result<Vec<EntryHistory>> {
        let timeline = self.timeline(ctx)?;
        Ok(timeline
            .entries
            .into_iter()
            .filter(|h| criteria.matches(h))
            .collect())
    }

    fn history_of(
        &self,
        ctx: &RunContext,
        path: String,
        entry: &Entry,
        completeness: &BTreeMap<ConflictId, CompletenessChange>,
        reviews: &[ReviewItem],
    ) -> EntryHistory {
        let id = entry.id().to_string();
        let mut events = Vec::new();

        for (layer, block) in entry.layers() {
            let Some(date) = &block.extraction_date else {
                continue;
            };
            events.push(HistoryEvent {
                at: parse_date(date),
                entry_id: id.clone(),
                kind: EventKind::Extraction,
                layer: Some(layer),
                source: block.source.clone().unwrap_or_default(),
                fields: block.fields.keys().cloned().collect(),
                detail: date.clone(),
                completeness: None,
            });
        }
        for update in &entry.update_history {
            events.push(HistoryEvent {
                at: Some(update.date),
                entry_id: id.clone(),
                kind: EventKind::Update,
                layer: Some(update.layer),
                source: update.source.clone(),
                fields: update.fields_updated.clone(),
                detail: format!("{} field(s) updated", update.fields_updated.len()),
                completeness: None,
            });
        }
        for record in &entry.conflict_resolutions {
            events.push(HistoryEvent {
                at: Some(record.resolved_at),
                entry_id: id.clone(),
                kind: EventKind::Resolution,
                layer: record.winning_layer,
                source: record.conflict_id.to_string(),
                fields: vec![record.field.clone()],
                detail: record.strategy.to_string(),
                completeness: completeness.get(&record.conflict_id).copied(),
            });
        }
        events.sort_by(|a, b| a.at.cmp(&b.at).then(a.kind.cmp(&b.kind)));

        // Detection only needs ids to label conflicts; they are counted, not kept
        let mut scratch = RunContext::at(ctx.config().clone(), ctx.now());
        let open_conflicts = ConflictDetector::new(self.ws.config())
            .detect(entry, &mut scratch)
            .len();
        let pending_reviews = reviews
            .iter()
            .filter(|r| r.entry_id.eq_ignore_ascii_case(&id) && r.decision.is_none())
            .count();
        debug!(entry = %id, events = events.len(), open_conflicts, "Built entry history");

        EntryHistory {
            entry_id: id,
            path,
            completeness_score: entry.completeness_score,
            open_conflicts,
            pending_reviews,
            events,
        }
    }

    /// Completeness before and after every snapshotted resolution
    fn snapshot_completeness(
        &self,
        failures: &mut Vec<ItemFailure>,
    ) -> Result<BTreeMap<ConflictId, CompletenessChange>> {
        let snapshots = self.ws.snapshots();
        let mut out = BTreeMap::new();
        for id in snapshots.list()? {
            match snapshots.load(&id) {
                Ok(snapshot) => {
                    out.insert(
                        id,
                        CompletenessChange {
                            from: snapshot.entry_before.completeness_score,
                            to: snapshot.entry_after.completeness_score,
                        },
                    );
                }
                Err(e) => {
                    warn!(conflict = %id, error = %e, "Unreadable snapshot");
                    failures.push(ItemFailure::new(id.as_str(), e.kind(), e.to_string()));
                }
            }
        }
        Ok(out)
    }
}

/// RFC 3339 timestamp or plain `YYYY-MM-DD` date (midnight UTC)
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::pipeline::{resolve_conflicts, scan_workspace};
    use chrono::TimeZone;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const MOV: &str = r#"metadata:
  id: mov-instruction
  mnemonic: MOV
completeness_score: 3
layer1:
  extraction_date: '2026-05-01'
  source: P2-Instruction-Set.csv
  timing: '2'
layer3:
  extraction_date: '2026-06-10'
  source: Silicon-Doc
  timing: '4'
update_history:
- date: 2026-06-12T08:00:00Z
  source: Silicon-Doc
  layer: verified
  fields_updated:
  - timing
"#;

    const ADD: &str = r#"metadata:
  id: add-instruction
  mnemonic: ADD
completeness_score: 7
layer1:
  extraction_date: not a date
  source: P2-Instruction-Set.csv
  timing: '2'
"#;

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn ctx() -> RunContext {
        RunContext::at(
            EngineConfig::default(),
            Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap(),
        )
    }

    fn repo() -> (TempDir, Workspace) {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "instructions/pasm2/mov.yaml", MOV);
        write(dir.path(), "instructions/pasm2/add.yaml", ADD);
        let ws = Workspace::open(dir.path(), EngineConfig::default()).unwrap();
        (dir, ws)
    }

    #[test]
    fn test_parse_date_forms() {
        assert_eq!(
            parse_date("2026-05-01"),
            Some(Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_date("2026-05-01T10:00:00+02:00"),
            Some(Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap())
        );
        assert_eq!(parse_date("last spring"), None);
    }

    #[test]
    fn test_entry_evolution_orders_events() {
        let (_dir, ws) = repo();
        let history = HistoryBrowser::new(&ws)
            .entry_evolution(&ctx(), "MOV-Instruction")
            .unwrap();

        assert_eq!(history.path, "instructions/pasm2/mov.yaml");
        let kinds: Vec<EventKind> = history.events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Extraction, EventKind::Extraction, EventKind::Update]
        );
        assert_eq!(history.events[1].layer, Some(AuthorityLayer::Verified));
        assert_eq!(history.open_conflicts, 1);
        assert!(history.has_conflicts());
        assert_eq!(history.sources(), vec!["P2-Instruction-Set.csv", "Silicon-Doc"]);
    }

    #[test]
    fn test_unknown_entry_is_not_found() {
        let (_dir, ws) = repo();
        let err = HistoryBrowser::new(&ws)
            .entry_evolution(&ctx(), "nop-instruction")
            .unwrap_err();
        assert!(matches!(err, EngineError::EntryNotFound(_)));
    }

    #[test]
    fn test_resolution_carries_completeness_change() {
        let (_dir, ws) = repo();
        let mut run = ctx();
        let (scan, _) = scan_workspace(&ws, &mut run).unwrap();
        resolve_conflicts(&ws, &mut run, &scan.conflicts, None).unwrap();

        let history = HistoryBrowser::new(&ws)
            .entry_evolution(&ctx(), "mov-instruction")
            .unwrap();
        let resolution = history
            .events
            .iter()
            .find(|e| e.kind == EventKind::Resolution)
            .unwrap();
        assert_eq!(resolution.fields, vec!["timing".to_string()]);
        assert_eq!(resolution.source, scan.conflicts[0].id.to_string());
        let change = resolution.completeness.unwrap();
        assert_eq!(change.from, Some(3));
        assert_eq!(history.open_conflicts, 0);
        assert!(!history.has_conflicts());
    }

    #[test]
    fn test_timeline_merges_entries() {
        let (dir, ws) = repo();
        write(dir.path(), "instructions/pasm2/bad.yaml", "metadata: [unclosed");
        let timeline = HistoryBrowser::new(&ws).timeline(&ctx()).unwrap();

        assert_eq!(timeline.entries.len(), 2);
        assert_eq!(timeline.failures.len(), 1);
        assert_eq!(timeline.events.len(), 4);
        // The unparseable extraction date sorts first
        assert_eq!(timeline.events[0].entry_id, "add-instruction");
        assert!(timeline.events[0].at.is_none());
        assert_eq!(timeline.by_kind[&EventKind::Extraction], 3);
        assert_eq!(timeline.by_kind[&EventKind::Update], 1);
    }

    #[test]
    fn test_find_by_criteria() {
        let (_dir, ws) = repo();
        let browser = HistoryBrowser::new(&ws);
        let ids = |criteria: HistoryCriteria| -> Vec<String> {
            browser
                .find(&ctx(), &criteria)
                .unwrap()
                .into_iter()
                .map(|h| h.entry_id)
                .collect()
        };

        assert_eq!(
            ids(HistoryCriteria {
                completeness_below: Some(5),
                ..Default::default()
            }),
            vec!["mov-instruction".to_string()]
        );
        assert_eq!(
            ids(HistoryCriteria {
                min_completeness: Some(5),
                ..Default::default()
            }),
            vec!["add-instruction".to_string()]
        );
        assert_eq!(
            ids(HistoryCriteria {
                has_conflicts: true,
                ..Default::default()
            }),
            vec!["mov-instruction".to_string()]
        );
        assert_eq!(
            ids(HistoryCriteria {
                source: Some("silicon".into()),
                updated_since: Some(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()),
                ..Default::default()
            }),
            vec!["mov-instruction".to_string()]
        );
        assert_eq!(ids(HistoryCriteria::default()).len(), 2);
    }
}
