//! Re-evaluation of past automated resolutions
//!
//! A resolution is revisited when its confidence was low, when a layer above
//! the winning one now holds the field, when a reviewer recorded a decision
//! for the field, or when the resolved field changed since the resolution
//! was written. Edits to other fields of the same entry are ignored.

use crate::context::RunContext;
use crate::detect::ConflictDetector;
use crate::error::{EngineError, Result};
use crate::resolve::ConflictResolver;
use crate::rollback::{RollbackManager, RollbackReport};
use crate::workspace::Workspace;
use concord_domain::traits::EntryStore;
use concord_domain::{
    AuthorityLayer, Conflict, ConflictId, Entry, FieldValue, ItemFailure, Resolution, ReviewItem,
    Snapshot,
};
use concord_store::FileEntryStore;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Why a resolution should be revisited
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum RegenerationTrigger {
    /// Confidence below the configured threshold
    LowConfidence {
        /// Confidence of the resolution
        confidence: f64,
    },

    /// A layer above the winning layer now holds the field
    HigherLayer {
        /// Highest layer holding the field
        layer: AuthorityLayer,
    },

    /// A reviewer decided on the field after the resolution
    ReviewDecision {
        /// Reviewer
        decided_by: String,
    },

    /// The resolved field differs from what the resolution wrote
    EntryChanged,
}

/// A resolution with at least one trigger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegenerationCandidate {
    /// Conflict the resolution belongs to
    pub conflict_id: ConflictId,

    /// Entry id
    pub entry_id: String,

    /// Field
    pub field: String,

    /// Triggers that fired
    pub triggers: Vec<RegenerationTrigger>,
}

/// Result of checking all snapshots for triggers
#[derive(Debug, Clone, Default, Serialize)]
pub struct TriggerReport {
    /// Snapshots checked
    pub checked: usize,

    /// Resolutions to revisit
    pub candidates: Vec<RegenerationCandidate>,

    /// Snapshots or entries that could not be read
    pub failures: Vec<ItemFailure>,
}

/// What re-resolving a conflict today would produce
#[derive(Debug, Clone, Serialize)]
pub struct RegenerationPreview {
    /// Conflict id of the original resolution
    pub conflict_id: ConflictId,

    /// Resolution that was written
    pub previous: Resolution,

    /// The disagreement as detected now, if it still exists
    pub current_conflict: Option<Conflict>,

    /// Resolution the resolver proposes now
    pub proposed: Option<Resolution>,

    /// Whether the proposal differs from what was written
    pub changed: bool,
}

/// Re-evaluates resolutions recorded in snapshots
#[derive(Debug)]
pub struct Regenerator<'a> {
    ws: &'a Workspace,
}

impl<'a> Regenerator<'a> {
    /// Create a regenerator for a workspace
    pub fn new(ws: &'a Workspace) -> Self {
        Self { ws }
    }

    /// Check every snapshot for regeneration triggers
    pub fn check_triggers(&self) -> Result<TriggerReport> {
        let snapshots = self.ws.snapshots();
        let reviews = self.ws.review_queue().load()?;
        let mut report = TriggerReport::default();

        for id in snapshots.list()? {
            report.checked += 1;
            let snapshot = match snapshots.load(&id) {
                Ok(s) => s,
                Err(e) => {
                    warn!(conflict = %id, error = %e, "Unreadable snapshot");
                    report.failures.push(ItemFailure::new(id.as_str(), e.kind(), e.to_string()));
                    continue;
                }
            };
            match self.triggers_for(&snapshot, &reviews) {
                Ok(triggers) if triggers.is_empty() => {}
                Ok(triggers) => {
                    debug!(conflict = %id, count = triggers.len(), "Regeneration triggered");
                    report.candidates.push(RegenerationCandidate {
                        conflict_id: id,
                        entry_id: snapshot.entry_id.clone(),
                        field: snapshot.conflict.field.clone(),
                        triggers,
                    });
                }
                Err(e) => report.failures.push(ItemFailure::new(
                    snapshot.entry_path.clone(),
                    e.kind(),
                    e.to_string(),
                )),
            }
        }
        info!(
            "Checked {} resolutions, {} need regeneration",
            report.checked,
            report.candidates.len()
        );
        Ok(report)
    }

    fn triggers_for(&self, snapshot: &Snapshot, reviews: &[ReviewItem]) -> Result<Vec<RegenerationTrigger>> {
        let mut triggers = Vec::new();
        let resolution = &snapshot.resolution;
        let field = snapshot.conflict.field.as_str();

        if resolution.confidence < self.ws.config().thresholds.low_confidence {
            triggers.push(RegenerationTrigger::LowConfidence {
                confidence: resolution.confidence,
            });
        }

        let current = self.current_entry(snapshot)?;
        let top = current
            .layers()
            .into_iter()
            .filter(|(_, block)| block.get(field).is_some_and(|v| !v.is_empty()))
            .map(|(layer, _)| layer)
            .max();
        if let (Some(top), Some(winning)) = (top, resolution.winning_layer) {
            if top > winning {
                triggers.push(RegenerationTrigger::HigherLayer { layer: top });
            }
        }

        let decision = reviews
            .iter()
            .filter(|r| r.entry_id.eq_ignore_ascii_case(&snapshot.entry_id) && r.field == field)
            .filter_map(|r| r.decision.as_ref())
            .find(|d| d.decided_at > snapshot.captured_at);
        if let Some(decision) = decision {
            triggers.push(RegenerationTrigger::ReviewDecision {
                decided_by: decision.decided_by.clone(),
            });
        }

        if field_state(&current, field) != field_state(&snapshot.entry_after, field) {
            triggers.push(RegenerationTrigger::EntryChanged);
        }
        Ok(triggers)
    }

    fn current_entry(&self, snapshot: &Snapshot) -> Result<Entry> {
        let raw = self
            .ws
            .entries()
            .read_raw(&snapshot.entry_path)?
            .ok_or_else(|| EngineError::EntryNotFound(snapshot.entry_path.clone()))?;
        Ok(FileEntryStore::parse_entry(&snapshot.entry_path, &raw)?)
    }

    /// Re-detect and re-resolve a conflict against the current entry
    ///
    /// Nothing is written.
    pub fn regenerate(&self, ctx: &mut RunContext, id: &ConflictId) -> Result<RegenerationPreview> {
        let snapshot = self.ws.snapshots().load(id)?;
        let current = self.current_entry(&snapshot)?;
        let field = snapshot.conflict.field.clone();

        // Earlier resolutions marked the losing layer; look at all layers again
        let mut unmarked = current;
        for layer in AuthorityLayer::ALL {
            if let Some(block) = unmarked.layer_mut(layer).as_mut() {
                block.overridden_by.remove(&field);
            }
        }

        let detector = ConflictDetector::new(self.ws.config());
        let resolver = ConflictResolver::new(self.ws.config());
        let current_conflict = detector
            .detect(&unmarked, ctx)
            .into_iter()
            .filter(|c| c.field == field)
            .max_by_key(|c| (c.upper.layer, c.lower.layer));
        let proposed = current_conflict
            .as_ref()
            .map(|c| resolver.resolve(c, ctx.now()));

        let previous = snapshot.resolution;
        let changed = match &proposed {
            Some(p) => p.strategy != previous.strategy || p.resolved_value != previous.resolved_value,
            None => true,
        };
        info!(conflict = %id, changed, "Regenerated resolution");
        Ok(RegenerationPreview {
            conflict_id: id.clone(),
            previous,
            current_conflict,
            proposed,
            changed,
        })
    }

    /// Restore the entry text captured before a resolution was written
    pub fn rollback(&self, ctx: &mut RunContext, id: &ConflictId, reason: &str) -> Result<RollbackReport> {
        RollbackManager::new(self.ws)
            .with_reason(reason)
            .restore_from_snapshot(ctx, id)
    }
}

/// Per-layer value and override marker of one field
type LayerState<'e> = (AuthorityLayer, Option<&'e FieldValue>, Option<&'e AuthorityLayer>);

/// Everything an entry says about one field: its consolidated value and
/// every layer's value and override marker
fn field_state<'e>(entry: &'e Entry, field: &str) -> (Option<FieldValue>, Vec<LayerState<'e>>) {
    let layers = entry
        .layers()
        .into_iter()
        .map(|(layer, block)| (layer, block.get(field), block.overridden_by.get(field)))
        .filter(|(_, value, marker)| value.is_some() || marker.is_some())
        .collect();
    (entry.consolidated(field), layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::pipeline::{resolve_conflicts, scan_workspace};
    use chrono::{Duration, TimeZone, Utc};
    use concord_domain::{ReviewDecision, RollbackStatus, Strategy};
    use std::fs;
    use tempfile::TempDir;

    const PATH: &str = "instructions/pasm2/mov.yaml";

    const ENTRY: &str = r#"metadata:
  id: mov-instruction
  mnemonic: MOV
layer1:
  source: P2-Instruction-Set.csv
  timing: '2'
layer3:
  source: Silicon-Doc
  timing: '4'
"#;

    fn resolved() -> (TempDir, Workspace, ConflictId) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PATH);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, ENTRY).unwrap();
        let ws = Workspace::open(dir.path(), EngineConfig::default()).unwrap();

        let mut ctx = RunContext::at(
            EngineConfig::default(),
            Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap(),
        );
        let (scan, _) = scan_workspace(&ws, &mut ctx).unwrap();
        let id = scan.conflicts[0].id.clone();
        resolve_conflicts(&ws, &mut ctx, &scan.conflicts, None).unwrap();
        (dir, ws, id)
    }

    fn ctx() -> RunContext {
        RunContext::at(
            EngineConfig::default(),
            Utc.with_ymd_and_hms(2026, 7, 2, 9, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_fresh_override_has_no_triggers() {
        let (_dir, ws, _) = resolved();
        let report = Regenerator::new(&ws).check_triggers().unwrap();
        assert_eq!(report.checked, 1);
        assert!(report.candidates.is_empty());
    }

    #[test]
    fn test_higher_layer_and_edit_trigger() {
        let (dir, ws, id) = resolved();
        let path = dir.path().join(PATH);
        let mut text = fs::read_to_string(&path).unwrap();
        text.push_str("layer4:\n  source: forum-clarification\n  timing: 13-19\n");
        fs::write(&path, text).unwrap();

        let report = Regenerator::new(&ws).check_triggers().unwrap();
        let candidate = &report.candidates[0];
        assert_eq!(candidate.conflict_id, id);
        assert!(candidate.triggers.contains(&RegenerationTrigger::HigherLayer {
            layer: AuthorityLayer::Absolute
        }));
        assert!(candidate.triggers.contains(&RegenerationTrigger::EntryChanged));
    }

    #[test]
    fn test_edit_of_other_field_does_not_trigger() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(PATH);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            "metadata:\n  id: mov-instruction\nlayer1:\n  timing: '2'\n  cycles: '8'\nlayer3:\n  timing: '4'\n  cycles: '10'\n",
        )
        .unwrap();
        let ws = Workspace::open(dir.path(), EngineConfig::default()).unwrap();
        let mut run = RunContext::at(
            EngineConfig::default(),
            Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap(),
        );
        let (scan, _) = scan_workspace(&ws, &mut run).unwrap();
        assert_eq!(scan.conflicts.len(), 2);
        resolve_conflicts(&ws, &mut run, &scan.conflicts, None).unwrap();

        let changed = |report: &TriggerReport| -> Vec<String> {
            report
                .candidates
                .iter()
                .filter(|c| c.triggers.contains(&RegenerationTrigger::EntryChanged))
                .map(|c| c.field.clone())
                .collect()
        };
        let report = Regenerator::new(&ws).check_triggers().unwrap();
        assert_eq!(report.checked, 2);
        assert!(changed(&report).is_empty());

        // Hand edit of one resolved field flags only that field's resolution
        let mut entry =
            FileEntryStore::parse_entry(PATH, &fs::read_to_string(&path).unwrap()).unwrap();
        entry.set_consolidated("cycles", FieldValue::from("12"));
        fs::write(&path, FileEntryStore::render_entry(&entry).unwrap()).unwrap();

        let report = Regenerator::new(&ws).check_triggers().unwrap();
        assert_eq!(changed(&report), vec!["cycles".to_string()]);
    }

    #[test]
    fn test_review_decision_triggers() {
        let (_dir, ws, id) = resolved();
        let snapshot = ws.snapshots().load(&id).unwrap();
        let item = crate::resolve::review_item(
            &snapshot.conflict,
            &Resolution::escalate(id.clone(), "manual", snapshot.captured_at),
            snapshot.captured_at,
            7,
        );
        ws.review_queue().enqueue(&[item]).unwrap();
        ws.review_queue()
            .record_decision(
                &id,
                ReviewDecision {
                    decided_by: "alice".into(),
                    decided_at: snapshot.captured_at + Duration::hours(1),
                    value: "4".into(),
                    note: String::new(),
                },
            )
            .unwrap();

        let report = Regenerator::new(&ws).check_triggers().unwrap();
        assert_eq!(
            report.candidates[0].triggers,
            vec![RegenerationTrigger::ReviewDecision {
                decided_by: "alice".into()
            }]
        );
    }

    #[test]
    fn test_regenerate_reproduces_resolution() {
        let (_dir, ws, id) = resolved();
        let preview = Regenerator::new(&ws).regenerate(&mut ctx(), &id).unwrap();
        let proposed = preview.proposed.unwrap();
        assert_eq!(proposed.strategy, Strategy::AuthorityOverride);
        assert!(!preview.changed);
    }

    #[test]
    fn test_rollback_restores_raw_text() {
        let (dir, ws, id) = resolved();
        assert_ne!(fs::read_to_string(dir.path().join(PATH)).unwrap(), ENTRY);

        let report = Regenerator::new(&ws)
            .rollback(&mut ctx(), &id, "wrong winner")
            .unwrap();
        assert_eq!(report.count(RollbackStatus::Restored), 1);
        assert_eq!(fs::read_to_string(dir.path().join(PATH)).unwrap(), ENTRY);
        assert!(ws.snapshots().exists(&id));
        assert_eq!(ws.backups().list_safety().unwrap().len(), 1);
    }
}
