//! Manual review queue for escalated conflicts

use crate::error::{Result, StoreError};
use crate::logs::{read_yaml, write_yaml};
use concord_domain::{ConflictId, ReviewDecision, ReviewItem};
use std::path::PathBuf;

/// Persisted queue of [`ReviewItem`]s, keyed by conflict id
#[derive(Debug, Clone)]
pub struct ReviewQueue {
    path: PathBuf,
}

impl ReviewQueue {
    /// Open the queue at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// All queued items
    pub fn load(&self) -> Result<Vec<ReviewItem>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let items: Option<Vec<ReviewItem>> = read_yaml(&self.path)?;
        Ok(items.unwrap_or_default())
    }

    /// Queue items, keeping existing items (and their decisions) untouched
    ///
    /// Returns the number of newly queued items.
    pub fn enqueue(&self, items: &[ReviewItem]) -> Result<usize> {
        let mut all = self.load()?;
        let mut added = 0;
        for item in items {
            if !all.iter().any(|q| q.conflict_id == item.conflict_id) {
                all.push(item.clone());
                added += 1;
            }
        }
        if added > 0 {
            write_yaml(&self.path, &all)?;
        }
        Ok(added)
    }

    /// Find the item for a conflict
    pub fn get(&self, id: &ConflictId) -> Result<Option<ReviewItem>> {
        Ok(self.load()?.into_iter().find(|q| &q.conflict_id == id))
    }

    /// Record a reviewer decision on a queued item
    pub fn record_decision(&self, id: &ConflictId, decision: ReviewDecision) -> Result<()> {
        let mut all = self.load()?;
        let item = all
            .iter_mut()
            .find(|q| &q.conflict_id == id)
            .ok_or_else(|| StoreError::NotFound(format!("review item {}", id)))?;
        item.decision = Some(decision);
        write_yaml(&self.path, &all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use concord_domain::{
        AuthorityLayer, ConflictKind, ConflictSide, Severity, REVIEW_CHECKLIST,
    };
    use tempfile::TempDir;

    fn item(id: &str) -> ReviewItem {
        let now = Utc::now();
        ReviewItem {
            conflict_id: ConflictId::from_string(id),
            entry_id: "mov-instruction".into(),
            field: "mnemonic".into(),
            kind: ConflictKind::DirectContradiction,
            severity: Severity::Critical,
            lower: ConflictSide::new(AuthorityLayer::Baseline, "MOV".into()),
            upper: ConflictSide::new(AuthorityLayer::Confirmed, "MOVE".into()),
            reason: "identity field".into(),
            queued_at: now,
            deadline: now + Duration::days(7),
            checklist: REVIEW_CHECKLIST.iter().map(|s| s.to_string()).collect(),
            decision: None,
        }
    }

    #[test]
    fn test_enqueue_merges_by_conflict_id() {
        let dir = TempDir::new().unwrap();
        let queue = ReviewQueue::new(dir.path().join("queue.yaml"));
        assert_eq!(queue.enqueue(&[item("CONF-1"), item("CONF-2")]).unwrap(), 2);
        assert_eq!(queue.enqueue(&[item("CONF-2"), item("CONF-3")]).unwrap(), 1);
        assert_eq!(queue.load().unwrap().len(), 3);
        assert!(queue.get(&ConflictId::from_string("CONF-3")).unwrap().is_some());
        assert!(queue.get(&ConflictId::from_string("CONF-9")).unwrap().is_none());
    }

    #[test]
    fn test_record_decision_survives_enqueue() {
        let dir = TempDir::new().unwrap();
        let queue = ReviewQueue::new(dir.path().join("queue.yaml"));
        queue.enqueue(&[item("CONF-1")]).unwrap();

        let id = ConflictId::from_string("CONF-1");
        let decision = ReviewDecision {
            decided_by: "reviewer".into(),
            decided_at: Utc::now(),
            value: "MOV".into(),
            note: "CSV spelling is canonical".into(),
        };
        queue.record_decision(&id, decision).unwrap();
        queue.enqueue(&[item("CONF-1")]).unwrap();

        let stored = queue.get(&id).unwrap().unwrap();
        assert_eq!(stored.decision.unwrap().value, "MOV".into());
        assert!(queue
            .record_decision(&ConflictId::from_string("CONF-9"), stored_decision())
            .is_err());
    }

    fn stored_decision() -> ReviewDecision {
        ReviewDecision {
            decided_by: "reviewer".into(),
            decided_at: Utc::now(),
            value: "x".into(),
            note: String::new(),
        }
    }
}
