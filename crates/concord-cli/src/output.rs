//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use concord_domain::{ItemFailure, RestorePointMetadata, ReviewItem, RollbackStatus};
use concord_engine::{
    ChangeReport, EntryHistory, HistoryEvent, ItemStatus, PropagationReport, RegenerationPreview,
    RegenerationTrigger, ResolutionReport, RollbackReport, ScanReport, Timeline, TriggerReport,
    VersionDiff,
};
use concord_store::{BackupInfo, CleanupReport};
use colored::*;
use serde::Serialize;
use std::path::Path;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

const CELL_PREVIEW_CHARS: usize = 48;

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Selected output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format a change detection report.
    pub fn change_report(&self, report: &ChangeReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(report),
            OutputFormat::Quiet => Ok(report
                .triggers
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                let mut out = Vec::new();
                if let Some(table) = self.failures_table(&report.failures) {
                    out.push(table);
                }
                if report.is_empty() {
                    out.push(self.success("No changes since the last baseline."));
                    return Ok(out.join("\n"));
                }
                if !report.sources.is_empty() {
                    let rows = report.sources.iter().map(|s| {
                        let affected = report.affected.get(&s.path).map_or(0, Vec::len);
                        vec![s.path.clone(), s.kind.to_string(), affected.to_string()]
                    });
                    out.push(self.table(&["Source", "Change", "Affected entries"], rows));
                }
                if !report.entries.is_empty() {
                    let rows = report.entries.iter().map(|e| {
                        vec![
                            e.path.clone(),
                            e.kind.to_string(),
                            e.entry_id.clone().unwrap_or_default(),
                        ]
                    });
                    out.push(self.table(&["Entry file", "Change", "Entry id"], rows));
                }
                out.push(self.info(&format!(
                    "{} source(s) changed, {} entry file(s) changed, {} need audit",
                    report.sources.len(),
                    report.entries.len(),
                    report.needs_audit()
                )));
                for trigger in &report.triggers {
                    out.push(self.info(&format!("Extraction trigger: {}", trigger.display())));
                }
                Ok(out.join("\n"))
            }
        }
    }

    /// Format a conflict scan.
    pub fn scan_report(&self, report: &ScanReport, log: Option<&Path>) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(&serde_json::json!({
                "report": report,
                "conflict_log": log,
            })),
            OutputFormat::Quiet => Ok(report
                .conflicts
                .iter()
                .map(|c| c.id.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                let mut out = Vec::new();
                if report.conflicts.is_empty() {
                    out.push(self.success(&format!(
                        "No conflicts in {} entries.",
                        report.scanned
                    )));
                } else {
                    let rows = report.conflicts.iter().map(|c| {
                        vec![
                            c.id.to_string(),
                            c.entry_id.clone(),
                            c.field.clone(),
                            c.kind.to_string(),
                            c.severity.to_string(),
                            format!("{}: {}", c.lower.layer, preview(&c.lower.value.to_string())),
                            format!("{}: {}", c.upper.layer, preview(&c.upper.value.to_string())),
                        ]
                    });
                    out.push(self.table(
                        &["ID", "Entry", "Field", "Kind", "Severity", "Lower", "Upper"],
                        rows,
                    ));
                    let by_severity = report
                        .by_severity()
                        .iter()
                        .rev()
                        .map(|(s, n)| format!("{} {}", n, s))
                        .collect::<Vec<_>>()
                        .join(", ");
                    out.push(self.warning(&format!(
                        "{} conflict(s) in {} entries ({})",
                        report.conflicts.len(),
                        report.scanned,
                        by_severity
                    )));
                }
                if let Some(table) = self.failures_table(&report.failures) {
                    out.push(table);
                }
                if let Some(path) = log {
                    out.push(self.info(&format!("Conflict log: {}", path.display())));
                }
                Ok(out.join("\n"))
            }
        }
    }

    /// Format a resolution run.
    pub fn resolution_report(&self, report: &ResolutionReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(report),
            OutputFormat::Quiet => Ok(report
                .log
                .outcomes
                .iter()
                .map(|o| format!("{} {}", o.conflict_id, o.status.as_str()))
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                let mut out = Vec::new();
                if report.log.outcomes.is_empty() {
                    out.push(self.info("No conflicts to resolve."));
                } else {
                    let rows = report.log.outcomes.iter().map(|o| {
                        vec![
                            o.conflict_id.to_string(),
                            o.entry_id.clone(),
                            o.field.clone(),
                            o.strategy.to_string(),
                            self.status(o.status),
                            format!("{:.2}", o.confidence),
                            o.resolved_value
                                .as_ref()
                                .map(|v| preview(&v.to_string()))
                                .unwrap_or_default(),
                        ]
                    });
                    out.push(self.table(
                        &["ID", "Entry", "Field", "Strategy", "Status", "Confidence", "Value"],
                        rows,
                    ));
                }
                out.push(self.info(&format!(
                    "{} resolved, {} escalated ({} newly queued), {} failed, {} skipped",
                    report.count(ItemStatus::Resolved),
                    report.count(ItemStatus::Escalated),
                    report.newly_queued,
                    report.count(ItemStatus::Failed),
                    report.count(ItemStatus::Skipped)
                )));
                if let Some(table) = self.failures_table(&report.failures) {
                    out.push(table);
                }
                if let Some(batch) = &report.batch {
                    out.push(self.success(&format!(
                        "Batch {}: {} file(s) written",
                        batch.id,
                        batch.changes.len()
                    )));
                }
                if let Some(path) = &report.log_path {
                    out.push(self.info(&format!("Resolution log: {}", path.display())));
                }
                Ok(out.join("\n"))
            }
        }
    }

    /// Format a propagation run.
    pub fn propagation_report(&self, report: &PropagationReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(report),
            OutputFormat::Quiet => Ok(report.updated.join("\n")),
            OutputFormat::Table => {
                let mut out = vec![self.info(&format!(
                    "Source {} merged into {}",
                    report.source, report.layer
                ))];
                if report.updated.is_empty() {
                    out.push(self.info("No entries changed."));
                } else {
                    let rows = report.updated.iter().map(|p| vec![p.clone()]);
                    out.push(self.table(&["Updated entry"], rows));
                }
                if !report.dependents.is_empty() {
                    out.push(self.warning(&format!(
                        "Review dependents: {}",
                        report.dependents.iter().cloned().collect::<Vec<_>>().join(", ")
                    )));
                }
                if !report.conflicts.is_empty() {
                    out.push(self.warning(&format!(
                        "{} conflict(s) after merge",
                        report.conflicts.len()
                    )));
                }
                if let Some(path) = &report.conflict_log {
                    out.push(self.info(&format!("Conflict log: {}", path.display())));
                }
                if let Some(table) = self.failures_table(&report.failures) {
                    out.push(table);
                }
                if report.triggers_archived > 0 {
                    out.push(self.info(&format!(
                        "{} extraction trigger(s) archived",
                        report.triggers_archived
                    )));
                }
                if let Some(batch) = &report.batch {
                    out.push(self.success(&format!("Batch {}", batch.id)));
                }
                Ok(out.join("\n"))
            }
        }
    }

    /// Format a rollback.
    pub fn rollback_report(&self, report: &RollbackReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(report),
            OutputFormat::Quiet => Ok(report
                .records
                .iter()
                .filter(|r| r.status != RollbackStatus::Unchanged)
                .map(|r| format!("{} {}", r.target, r.status.as_str()))
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                let mut out = Vec::new();
                if let Some(point) = &report.safety_point {
                    out.push(self.info(&format!("Safety restore point: {}", point)));
                }
                let changed: Vec<_> = report
                    .records
                    .iter()
                    .filter(|r| r.status != RollbackStatus::Unchanged)
                    .collect();
                if !changed.is_empty() {
                    let rows = changed.iter().map(|r| {
                        vec![
                            r.target.clone(),
                            r.status.as_str().to_string(),
                            r.restored_from.clone().unwrap_or_default(),
                            r.error.clone().unwrap_or_default(),
                        ]
                    });
                    out.push(self.table(&["Entry", "Status", "Restored from", "Error"], rows));
                }
                let summary = format!(
                    "{} {}: {} restored, {} unchanged, {} planned, {} failed",
                    report.operation,
                    report.target,
                    report.count(RollbackStatus::Restored),
                    report.count(RollbackStatus::Unchanged),
                    report.count(RollbackStatus::Planned),
                    report.count(RollbackStatus::Failed)
                );
                out.push(if report.is_success() {
                    self.success(&summary)
                } else {
                    self.error(&summary)
                });
                Ok(out.join("\n"))
            }
        }
    }

    /// Format a backup cleanup.
    pub fn cleanup_report(&self, report: &CleanupReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(report),
            OutputFormat::Quiet => Ok(report.deleted.to_string()),
            OutputFormat::Table => Ok(self.success(&format!(
                "Removed {} backup(s), kept {}, freed {} bytes",
                report.deleted, report.kept, report.bytes_freed
            ))),
        }
    }

    /// Format a backup listing.
    pub fn backups(&self, backups: &[BackupInfo]) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(&backups),
            OutputFormat::Quiet => Ok(backups
                .iter()
                .map(|b| b.path.display().to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if backups.is_empty() {
                    return Ok(self.colorize("No backups found.", "yellow"));
                }
                let rows = backups.iter().map(|b| {
                    vec![
                        b.entry_path.clone(),
                        b.taken_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        b.size.to_string(),
                        if b.safety { "safety" } else { "backup" }.to_string(),
                        b.path.display().to_string(),
                    ]
                });
                Ok(self.table(&["Entry", "Taken", "Bytes", "Kind", "File"], rows))
            }
        }
    }

    /// Format a restore point listing.
    pub fn restore_points(&self, points: &[RestorePointMetadata]) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(&points),
            OutputFormat::Quiet => Ok(points
                .iter()
                .map(|p| p.name.clone())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if points.is_empty() {
                    return Ok(self.colorize("No restore points found.", "yellow"));
                }
                let rows = points.iter().map(|p| {
                    vec![
                        p.name.clone(),
                        p.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        p.file_count.to_string(),
                        p.source_commit.clone().unwrap_or_default(),
                        p.description.clone(),
                    ]
                });
                Ok(self.table(&["Name", "Created", "Files", "Commit", "Description"], rows))
            }
        }
    }

    /// Format the result of creating a restore point.
    pub fn restore_point_created(&self, name: &str, metadata: Option<&RestorePointMetadata>) -> Result<String> {
        match (self.format, metadata) {
            (OutputFormat::Json, _) => self.json(&metadata),
            (OutputFormat::Quiet, _) => Ok(name.to_string()),
            (OutputFormat::Table, Some(m)) => Ok(self.success(&format!(
                "Restore point {} created ({} files)",
                m.name, m.file_count
            ))),
            (OutputFormat::Table, None) => Ok(self.info(&format!(
                "DRY RUN: restore point {} not created",
                name
            ))),
        }
    }

    /// Format regeneration triggers.
    pub fn trigger_report(&self, report: &TriggerReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(report),
            OutputFormat::Quiet => Ok(report
                .candidates
                .iter()
                .map(|c| c.conflict_id.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                let mut out = Vec::new();
                if report.candidates.is_empty() {
                    out.push(self.success(&format!(
                        "No resolutions to revisit ({} checked).",
                        report.checked
                    )));
                } else {
                    let rows = report.candidates.iter().map(|c| {
                        vec![
                            c.conflict_id.to_string(),
                            c.entry_id.clone(),
                            c.field.clone(),
                            c.triggers.iter().map(trigger_label).collect::<Vec<_>>().join("; "),
                        ]
                    });
                    out.push(self.table(&["ID", "Entry", "Field", "Triggers"], rows));
                    out.push(self.warning(&format!(
                        "{} of {} resolution(s) should be revisited",
                        report.candidates.len(),
                        report.checked
                    )));
                }
                if let Some(table) = self.failures_table(&report.failures) {
                    out.push(table);
                }
                Ok(out.join("\n"))
            }
        }
    }

    /// Format a regeneration preview.
    pub fn regeneration(&self, regen: &RegenerationPreview) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(regen),
            OutputFormat::Quiet => Ok(format!(
                "{} {}",
                regen.conflict_id,
                if regen.changed { "changed" } else { "unchanged" }
            )),
            OutputFormat::Table => {
                let value = |v: Option<String>| v.map(|s| preview(&s)).unwrap_or_default();
                let mut builder_rows = vec![vec![
                    "previous".to_string(),
                    regen.previous.strategy.to_string(),
                    value(regen.previous.resolved_value.as_ref().map(ToString::to_string)),
                    format!("{:.2}", regen.previous.confidence),
                ]];
                if let Some(proposed) = &regen.proposed {
                    builder_rows.push(vec![
                        "proposed".to_string(),
                        proposed.strategy.to_string(),
                        value(proposed.resolved_value.as_ref().map(ToString::to_string)),
                        format!("{:.2}", proposed.confidence),
                    ]);
                }
                let mut out = vec![self.table(&["", "Strategy", "Value", "Confidence"], builder_rows)];
                out.push(match (&regen.current_conflict, regen.changed) {
                    (None, _) => self.info("The disagreement no longer exists."),
                    (Some(_), true) => self.warning("Resolving today would produce a different result."),
                    (Some(_), false) => self.success("Resolving today produces the same result."),
                });
                Ok(out.join("\n"))
            }
        }
    }

    /// Format a version comparison.
    pub fn version_diff(&self, diff: &VersionDiff) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(diff),
            OutputFormat::Quiet => {
                let mut lines = Vec::new();
                lines.extend(diff.added.iter().map(|e| format!("+ {}", e.id)));
                lines.extend(diff.removed.iter().map(|e| format!("- {}", e.id)));
                lines.extend(diff.modified.iter().map(|e| format!("~ {}", e.id)));
                Ok(lines.join("\n"))
            }
            OutputFormat::Table => {
                let mut out = vec![self.info(&format!("Comparing {} -> {}", diff.from, diff.to))];
                if diff.is_empty() {
                    out.push(self.success("No differences."));
                }
                let (from, to) = (&diff.statistics.from, &diff.statistics.to);
                let stats = vec![
                    vec![
                        "Entries".to_string(),
                        from.total_entries.to_string(),
                        to.total_entries.to_string(),
                    ],
                    vec![
                        "Average completeness".to_string(),
                        format!("{:.2}", from.average_completeness),
                        format!("{:.2}", to.average_completeness),
                    ],
                    vec![
                        "Examples".to_string(),
                        from.total_examples.to_string(),
                        to.total_examples.to_string(),
                    ],
                    vec![
                        "Relation references".to_string(),
                        from.total_relation_refs.to_string(),
                        to.total_relation_refs.to_string(),
                    ],
                ];
                out.push(self.table(&["Statistic", diff.from.as_str(), diff.to.as_str()], stats));
                if !diff.field_changes.is_empty() {
                    let rows = diff.field_changes.iter().map(|(field, kinds)| {
                        let counts = kinds
                            .iter()
                            .map(|(kind, n)| format!("{} {:?}", n, kind).to_lowercase())
                            .collect::<Vec<_>>()
                            .join(", ");
                        vec![field.clone(), counts]
                    });
                    out.push(self.table(&["Field", "Changes"], rows));
                }
                out.push(self.info(&format!(
                    "{} added, {} removed, {} modified",
                    diff.added.len(),
                    diff.removed.len(),
                    diff.modified.len()
                )));
                Ok(out.join("\n"))
            }
        }
    }

    /// Format the review queue.
    pub fn review_items(&self, items: &[ReviewItem]) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(&items),
            OutputFormat::Quiet => Ok(items
                .iter()
                .map(|i| i.conflict_id.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if items.is_empty() {
                    return Ok(self.success("Review queue is empty."));
                }
                let rows = items.iter().map(|i| {
                    vec![
                        i.conflict_id.to_string(),
                        i.entry_id.clone(),
                        i.field.clone(),
                        i.severity.to_string(),
                        i.deadline.format("%Y-%m-%d").to_string(),
                        match &i.decision {
                            Some(d) => format!("{} ({})", preview(&d.value.to_string()), d.decided_by),
                            None => "pending".to_string(),
                        },
                    ]
                });
                Ok(self.table(&["ID", "Entry", "Field", "Severity", "Deadline", "Decision"], rows))
            }
        }
    }

    /// Format the evolution of one entry.
    pub fn entry_history(&self, history: &EntryHistory) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(history),
            OutputFormat::Quiet => Ok(history
                .events
                .iter()
                .map(|e| format!("{} {} {}", event_time(e), e.kind, e.source))
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                let mut out = vec![self.info(&format!(
                    "{} ({}): completeness {}, {} open conflict(s), {} pending review(s)",
                    history.entry_id,
                    history.path,
                    score(history.completeness_score),
                    history.open_conflicts,
                    history.pending_reviews
                ))];
                if history.events.is_empty() {
                    out.push(self.warning("No recorded history."));
                } else {
                    out.push(self.events_table(&history.events, false));
                }
                Ok(out.join("\n"))
            }
        }
    }

    /// Format the timeline of all entries.
    pub fn timeline(&self, timeline: &Timeline) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(timeline),
            OutputFormat::Quiet => Ok(timeline
                .events
                .iter()
                .map(|e| format!("{} {} {}", event_time(e), e.entry_id, e.kind))
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                let mut out = Vec::new();
                if timeline.events.is_empty() {
                    out.push(self.warning("No recorded history."));
                } else {
                    out.push(self.events_table(&timeline.events, true));
                }
                let by_kind = timeline
                    .by_kind
                    .iter()
                    .map(|(kind, n)| format!("{} {}", n, kind))
                    .collect::<Vec<_>>()
                    .join(", ");
                out.push(self.info(&format!(
                    "{} event(s) across {} entries ({})",
                    timeline.events.len(),
                    timeline.entries.len(),
                    by_kind
                )));
                if let Some(table) = self.failures_table(&timeline.failures) {
                    out.push(table);
                }
                Ok(out.join("\n"))
            }
        }
    }

    /// Format entries matched by a history search.
    pub fn history_matches(&self, matches: &[EntryHistory]) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(matches),
            OutputFormat::Quiet => Ok(matches
                .iter()
                .map(|h| h.entry_id.clone())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if matches.is_empty() {
                    return Ok(self.info("No entries match."));
                }
                let rows = matches.iter().map(|h| {
                    vec![
                        h.entry_id.clone(),
                        score(h.completeness_score),
                        h.open_conflicts.to_string(),
                        h.pending_reviews.to_string(),
                        h.last_changed()
                            .map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d").to_string()),
                    ]
                });
                Ok(format!(
                    "{}\n{}",
                    self.table(
                        &["Entry", "Completeness", "Open conflicts", "Pending reviews", "Last change"],
                        rows
                    ),
                    self.info(&format!("{} entries match", matches.len()))
                ))
            }
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)?)
    }

    fn table<I>(&self, header: &[&str], rows: I) -> String
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let mut builder = Builder::default();
        builder.push_record(header.iter().copied());
        for row in rows {
            builder.push_record(row.iter().map(String::as_str));
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        table.to_string()
    }

    fn events_table(&self, events: &[HistoryEvent], with_entry: bool) -> String {
        let mut header = vec!["When"];
        if with_entry {
            header.push("Entry");
        }
        header.extend(["Kind", "Layer", "Source", "Fields", "Completeness"]);
        let rows = events.iter().map(|e| {
            let mut row = vec![event_time(e)];
            if with_entry {
                row.push(e.entry_id.clone());
            }
            row.extend([
                e.kind.to_string(),
                e.layer.as_ref().map(|l| l.to_string()).unwrap_or_default(),
                preview(&e.source),
                preview(&e.fields.join(", ")),
                e.completeness
                    .map(|c| format!("{} -> {}", score(c.from), score(c.to)))
                    .unwrap_or_default(),
            ]);
            row
        });
        self.table(&header, rows)
    }

    fn failures_table(&self, failures: &[ItemFailure]) -> Option<String> {
        if failures.is_empty() {
            return None;
        }
        let rows = failures
            .iter()
            .map(|f| vec![f.target.clone(), f.kind.to_string(), f.message.clone()]);
        Some(format!(
            "{}\n{}",
            self.error(&format!("{} item(s) failed", failures.len())),
            self.table(&["Target", "Kind", "Message"], rows)
        ))
    }

    fn status(&self, status: ItemStatus) -> String {
        let color = match status {
            ItemStatus::Resolved => "green",
            ItemStatus::Escalated => "yellow",
            ItemStatus::Failed => "red",
            ItemStatus::Skipped => "cyan",
        };
        self.colorize(status.as_str(), color)
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            "magenta" => text.magenta().to_string(),
            _ => text.to_string(),
        }
    }
}

/// Shorten a value for a table cell.
fn preview(text: &str) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= CELL_PREVIEW_CHARS {
        return single_line;
    }
    let cut: String = single_line.chars().take(CELL_PREVIEW_CHARS).collect();
    format!("{}...", cut)
}

fn event_time(event: &HistoryEvent) -> String {
    event
        .at
        .map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string())
}

fn score(value: Option<u32>) -> String {
    value.map_or_else(|| "-".to_string(), |s| s.to_string())
}

fn trigger_label(trigger: &RegenerationTrigger) -> String {
    match trigger {
        RegenerationTrigger::LowConfidence { confidence } => {
            format!("low confidence ({:.2})", confidence)
        }
        RegenerationTrigger::HigherLayer { layer } => format!("{} now holds the field", layer),
        RegenerationTrigger::ReviewDecision { decided_by } => {
            format!("review decision by {}", decided_by)
        }
        RegenerationTrigger::EntryChanged => "entry changed since resolution".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use concord_domain::{ErrorKind, RollbackRecord, RunId};
    use std::path::PathBuf;

    fn backup() -> BackupInfo {
        BackupInfo {
            path: PathBuf::from("update-tracking/backups/mov.yaml.20260701_120000.bak"),
            entry_path: "instructions/mov.yaml".to_string(),
            taken_at: Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap(),
            seq: 0,
            size: 42,
            safety: false,
        }
    }

    fn rollback_report(status: RollbackStatus) -> RollbackReport {
        RollbackReport {
            operation: "entry".to_string(),
            target: "instructions/mov.yaml".to_string(),
            records: vec![RollbackRecord {
                run_id: RunId::new(),
                actor: "tester".to_string(),
                timestamp: Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap(),
                operation: "entry".to_string(),
                target: "instructions/mov.yaml".to_string(),
                reason: None,
                restored_from: Some("mov.yaml.bak".to_string()),
                safety_backup: None,
                status,
                error: None,
            }],
            safety_point: None,
            batch: None,
            metrics: Default::default(),
        }
    }

    #[test]
    fn test_table_format() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.backups(&[backup()]).unwrap();
        assert!(output.contains("Entry"));
        assert!(output.contains("instructions/mov.yaml"));
        assert!(output.contains("2026-07-01 12:00:00"));
    }

    #[test]
    fn test_json_format() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let output = formatter.backups(&[backup()]).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0]["entry_path"], "instructions/mov.yaml");
    }

    #[test]
    fn test_quiet_format() {
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        let output = formatter.backups(&[backup()]).unwrap();
        assert_eq!(output, "update-tracking/backups/mov.yaml.20260701_120000.bak");
    }

    #[test]
    fn test_empty_backups() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.backups(&[]).unwrap();
        assert!(output.contains("No backups found"));
    }

    #[test]
    fn test_rollback_summary_reflects_status() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let ok = formatter.rollback_report(&rollback_report(RollbackStatus::Restored)).unwrap();
        assert!(ok.contains("✓ entry instructions/mov.yaml: 1 restored"));

        let failed = formatter.rollback_report(&rollback_report(RollbackStatus::Failed)).unwrap();
        assert!(failed.contains("✗ entry"));
    }

    #[test]
    fn test_failures_table() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let failures = vec![ItemFailure::new("instructions/bad.yaml", ErrorKind::Parse, "bad yaml")];
        let output = formatter.failures_table(&failures).unwrap();
        assert!(output.contains("1 item(s) failed"));
        assert!(output.contains("bad yaml"));
        assert!(formatter.failures_table(&[]).is_none());
    }

    #[test]
    fn test_cell_preview_truncates() {
        let long = "x".repeat(100);
        let short = preview(&long);
        assert_eq!(short.chars().count(), CELL_PREVIEW_CHARS + 3);
        assert!(short.ends_with("..."));
        assert_eq!(preview("a\nb"), "a b");
    }

    #[test]
    fn test_colorize_disabled() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let msg = formatter.success("test");
        assert_eq!(msg, "✓ test");
    }

    #[test]
    fn test_trigger_labels() {
        assert_eq!(
            trigger_label(&RegenerationTrigger::LowConfidence { confidence: 0.5 }),
            "low confidence (0.50)"
        );
        assert_eq!(
            trigger_label(&RegenerationTrigger::EntryChanged),
            "entry changed since resolution"
        );
    }

    fn history() -> EntryHistory {
        use concord_engine::{CompletenessChange, EventKind};
        EntryHistory {
            entry_id: "mov-instruction".to_string(),
            path: "instructions/mov.yaml".to_string(),
            completeness_score: Some(80),
            open_conflicts: 1,
            pending_reviews: 0,
            events: vec![HistoryEvent {
                at: Some(Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap()),
                entry_id: "mov-instruction".to_string(),
                kind: EventKind::Resolution,
                layer: None,
                source: "CONF-2026-07-01-001".to_string(),
                fields: vec!["timing".to_string()],
                detail: "hierarchical".to_string(),
                completeness: Some(CompletenessChange {
                    from: Some(70),
                    to: Some(80),
                }),
            }],
        }
    }

    #[test]
    fn test_entry_history_table() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.entry_history(&history()).unwrap();
        assert!(output.contains("completeness 80"));
        assert!(output.contains("2026-07-01 12:00"));
        assert!(output.contains("70 -> 80"));
    }

    #[test]
    fn test_history_matches_quiet_and_json() {
        let quiet = Formatter::new(OutputFormat::Quiet, false);
        assert_eq!(quiet.history_matches(&[history()]).unwrap(), "mov-instruction");

        let json = Formatter::new(OutputFormat::Json, false);
        let parsed: serde_json::Value =
            serde_json::from_str(&json.history_matches(&[history()]).unwrap()).unwrap();
        assert_eq!(parsed[0]["open_conflicts"], 1);
        assert_eq!(parsed[0]["events"][0]["source"], "CONF-2026-07-01-001");

        let table = Formatter::new(OutputFormat::Table, false);
        assert!(table.history_matches(&[]).unwrap().contains("No entries match"));
    }

    #[test]
    fn test_timeline_summary_counts_kinds() {
        use concord_engine::EventKind;
        let mut timeline = Timeline::default();
        timeline.events = history().events;
        timeline.entries = vec![history()];
        timeline.by_kind.insert(EventKind::Resolution, 1);
        let output = Formatter::new(OutputFormat::Table, false).timeline(&timeline).unwrap();
        assert!(output.contains("1 event(s) across 1 entries"));
        assert!(output.contains("mov-instruction"));
    }
}
