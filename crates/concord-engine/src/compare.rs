//! Entry-level and statistic-level comparison of two knowledge-base states

use crate::config::RuleTables;
use crate::error::{EngineError, Result};
use crate::workspace::Workspace;
use chrono::{DateTime, Utc};
use concord_domain::traits::EntryStore;
use concord_domain::{Entry, ErrorKind, FieldValue, ItemFailure};
use concord_store::FileEntryStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const VALUE_PREVIEW_CHARS: usize = 100;

/// Which state of the knowledge base to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRef {
    /// The working tree
    Current,

    /// A named restore point
    RestorePoint(String),

    /// Any directory laid out like the repository
    Directory(PathBuf),
}

impl VersionRef {
    /// Interpret `current`, a restore point name or a directory path
    pub fn parse(reference: &str, ws: &Workspace) -> Result<Self> {
        if reference.eq_ignore_ascii_case("current") {
            return Ok(VersionRef::Current);
        }
        if ws.restore_points().exists(reference) {
            return Ok(VersionRef::RestorePoint(reference.to_string()));
        }
        let dir = Path::new(reference);
        if dir.is_dir() {
            return Ok(VersionRef::Directory(dir.to_path_buf()));
        }
        Err(EngineError::InvalidInput(format!(
            "'{}' is neither 'current', a restore point nor a directory",
            reference
        )))
    }

    /// Display label
    pub fn label(&self) -> String {
        match self {
            VersionRef::Current => "current".to_string(),
            VersionRef::RestorePoint(name) => name.clone(),
            VersionRef::Directory(dir) => dir.display().to_string(),
        }
    }
}

/// Entries of one knowledge-base state, keyed by entry id
#[derive(Debug, Clone, Default)]
pub struct KnowledgeState {
    /// Display label
    pub label: String,

    /// Entry path and parsed entry per id
    pub entries: BTreeMap<String, (String, Entry)>,

    /// Files that could not be parsed
    pub failures: Vec<ItemFailure>,
}

impl KnowledgeState {
    /// Build a state from already loaded entries
    pub fn from_entries(label: impl Into<String>, entries: impl IntoIterator<Item = (String, Entry)>) -> Self {
        Self {
            label: label.into(),
            entries: entries
                .into_iter()
                .map(|(path, entry)| (entry.id().to_string(), (path, entry)))
                .collect(),
            failures: Vec::new(),
        }
    }

    /// Load a state of a workspace
    pub fn load(ws: &Workspace, version: &VersionRef) -> Result<Self> {
        let patterns = ws.config().entry_patterns.clone();
        let store = match version {
            VersionRef::Current => ws.entries(),
            VersionRef::RestorePoint(name) => {
                ws.restore_points().metadata(name)?;
                FileEntryStore::new(ws.restore_points().files_dir(name)?, patterns)
            }
            VersionRef::Directory(dir) => FileEntryStore::new(dir, patterns),
        };

        let mut state = KnowledgeState {
            label: version.label(),
            ..KnowledgeState::default()
        };
        for path in store.entry_paths()? {
            match store.load_entry(&path) {
                Ok(entry) => {
                    state.entries.insert(entry.id().to_string(), (path, entry));
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Skipping unreadable entry");
                    state.failures.push(ItemFailure::new(path, ErrorKind::Parse, e.to_string()));
                }
            }
        }
        info!("Loaded {} entries from {}", state.entries.len(), state.label);
        Ok(state)
    }
}

/// Aggregate figures of one state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    /// Number of entries
    pub total_entries: usize,

    /// Entries per category
    pub by_category: BTreeMap<String, usize>,

    /// Entries per completeness score
    pub by_completeness: BTreeMap<u32, usize>,

    /// Mean completeness over entries that carry a score
    pub average_completeness: f64,

    /// Examples across all entries
    pub total_examples: usize,

    /// References held in relation fields
    pub total_relation_refs: usize,
}

/// Kind of field change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldChangeKind {
    /// Field only in the newer state
    Added,

    /// Field differs
    Modified,

    /// Field only in the older state
    Removed,
}

/// One field difference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    /// Flattened field name
    pub field: String,

    /// Kind of change
    pub kind: FieldChangeKind,

    /// Older value, shortened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,

    /// Newer value, shortened
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
}

/// An entry present in only one state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySummary {
    /// Entry id
    pub id: String,

    /// Entry file
    pub path: String,

    /// Category, if set
    pub category: Option<String>,

    /// Completeness score, if set
    pub completeness: Option<u32>,
}

/// An entry present in both states with differing fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModifiedEntry {
    /// Entry id
    pub id: String,

    /// Entry file in the newer state
    pub path: String,

    /// Field differences
    pub changes: Vec<FieldChange>,
}

/// Statistics of both states
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsPair {
    /// Older state
    pub from: Statistics,

    /// Newer state
    pub to: Statistics,
}

/// Difference between two states
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionDiff {
    /// Older state label
    pub from: String,

    /// Newer state label
    pub to: String,

    /// When the comparison ran
    pub generated_at: DateTime<Utc>,

    /// Entries only in the newer state
    pub added: Vec<EntrySummary>,

    /// Entries only in the older state
    pub removed: Vec<EntrySummary>,

    /// Entries with field differences
    pub modified: Vec<ModifiedEntry>,

    /// Change counts per field and kind
    pub field_changes: BTreeMap<String, BTreeMap<FieldChangeKind, usize>>,

    /// Statistics of both states
    pub statistics: StatisticsPair,
}

impl VersionDiff {
    /// Whether the states hold the same entries with the same fields
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Write the diff as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::InvalidInput(format!("cannot encode diff: {}", e)))?;
        concord_store::write_atomic(path, text.as_bytes())?;
        Ok(())
    }

    /// Markdown notes for consumers of the knowledge base
    ///
    /// Removed entries and removed fields are listed as breaking changes.
    pub fn migration_notes(&self) -> String {
        let (a, b) = (&self.statistics.from, &self.statistics.to);
        let mut out = String::new();
        let _ = writeln!(out, "# Migration notes: {} -> {}\n", self.from, self.to);
        let _ = writeln!(out, "- Added: {} entries", self.added.len());
        let _ = writeln!(out, "- Removed: {} entries", self.removed.len());
        let _ = writeln!(out, "- Modified: {} entries", self.modified.len());
        let _ = writeln!(
            out,
            "- Total entries: {} -> {} ({:+})",
            a.total_entries,
            b.total_entries,
            b.total_entries as i64 - a.total_entries as i64
        );
        let _ = writeln!(
            out,
            "- Average completeness: {:.1} -> {:.1} ({:+.1})",
            a.average_completeness,
            b.average_completeness,
            b.average_completeness - a.average_completeness
        );

        let _ = writeln!(out, "\n## Breaking changes\n");
        let removed_fields: BTreeMap<&str, usize> = self
            .field_changes
            .iter()
            .filter_map(|(field, kinds)| {
                kinds.get(&FieldChangeKind::Removed).map(|n| (field.as_str(), *n))
            })
            .collect();
        if self.removed.is_empty() && removed_fields.is_empty() {
            let _ = writeln!(out, "None.");
        }
        for entry in &self.removed {
            let _ = writeln!(out, "- entry `{}` removed", entry.id);
        }
        for (field, n) in removed_fields {
            let _ = writeln!(out, "- field `{}` removed from {} entries", field, n);
        }
        out
    }
}

/// Compares knowledge-base states
#[derive(Debug, Clone)]
pub struct VersionComparator {
    rules: RuleTables,
}

impl VersionComparator {
    /// Create a comparator using the configured relation fields
    pub fn new(rules: &RuleTables) -> Self {
        Self { rules: rules.clone() }
    }

    /// Aggregate figures of a state
    pub fn statistics(&self, state: &KnowledgeState) -> Statistics {
        let mut stats = Statistics {
            total_entries: state.entries.len(),
            ..Statistics::default()
        };
        let mut scores = Vec::new();
        for (_, entry) in state.entries.values() {
            let category = entry
                .metadata
                .category
                .clone()
                .unwrap_or_else(|| "unknown".to_string());
            *stats.by_category.entry(category).or_default() += 1;
            if let Some(score) = entry.completeness_score {
                *stats.by_completeness.entry(score).or_default() += 1;
                scores.push(score);
            }
            stats.total_examples += match entry.consolidated("examples") {
                Some(FieldValue::List(items)) => items.len(),
                Some(v) if !v.is_empty() => 1,
                _ => 0,
            };
            stats.total_relation_refs += self
                .rules
                .relation_fields
                .iter()
                .filter_map(|r| entry.consolidated(&r.field))
                .map(|v| v.items().len())
                .sum::<usize>();
        }
        if !scores.is_empty() {
            stats.average_completeness =
                scores.iter().map(|s| f64::from(*s)).sum::<f64>() / scores.len() as f64;
        }
        stats
    }

    /// Field differences between two versions of an entry
    pub fn compare_entries(&self, older: &Entry, newer: &Entry) -> Vec<FieldChange> {
        let a = older.comparable_fields();
        let b = newer.comparable_fields();
        let mut changes = Vec::new();
        for (field, new) in &b {
            match a.get(field) {
                None => changes.push(FieldChange {
                    field: field.clone(),
                    kind: FieldChangeKind::Added,
                    old_value: None,
                    new_value: Some(preview(new)),
                }),
                Some(old) if old != new => changes.push(FieldChange {
                    field: field.clone(),
                    kind: FieldChangeKind::Modified,
                    old_value: Some(preview(old)),
                    new_value: Some(preview(new)),
                }),
                Some(_) => {}
            }
        }
        for (field, old) in &a {
            if !b.contains_key(field) {
                changes.push(FieldChange {
                    field: field.clone(),
                    kind: FieldChangeKind::Removed,
                    old_value: Some(preview(old)),
                    new_value: None,
                });
            }
        }
        changes
    }

    /// Compare two states
    pub fn compare(&self, from: &KnowledgeState, to: &KnowledgeState, at: DateTime<Utc>) -> VersionDiff {
        let summary = |path: &String, entry: &Entry| EntrySummary {
            id: entry.id().to_string(),
            path: path.clone(),
            category: entry.metadata.category.clone(),
            completeness: entry.completeness_score,
        };

        let added = to
            .entries
            .iter()
            .filter(|(id, _)| !from.entries.contains_key(*id))
            .map(|(_, (path, entry))| summary(path, entry))
            .collect();
        let removed = from
            .entries
            .iter()
            .filter(|(id, _)| !to.entries.contains_key(*id))
            .map(|(_, (path, entry))| summary(path, entry))
            .collect();

        let mut modified = Vec::new();
        let mut field_changes: BTreeMap<String, BTreeMap<FieldChangeKind, usize>> = BTreeMap::new();
        for (id, (_, older)) in &from.entries {
            let Some((path, newer)) = to.entries.get(id) else {
                continue;
            };
            let changes = self.compare_entries(older, newer);
            if changes.is_empty() {
                continue;
            }
            for change in &changes {
                *field_changes
                    .entry(change.field.clone())
                    .or_default()
                    .entry(change.kind)
                    .or_default() += 1;
            }
            modified.push(ModifiedEntry {
                id: id.clone(),
                path: path.clone(),
                changes,
            });
        }

        VersionDiff {
            from: from.label.clone(),
            to: to.label.clone(),
            generated_at: at,
            added,
            removed,
            modified,
            field_changes,
            statistics: StatisticsPair {
                from: self.statistics(from),
                to: self.statistics(to),
            },
        }
    }
}

fn preview(value: &str) -> String {
    if value.chars().count() <= VALUE_PREVIEW_CHARS {
        return value.to_string();
    }
    let mut short: String = value.chars().take(VALUE_PREVIEW_CHARS).collect();
    short.push_str("...");
    short
}
