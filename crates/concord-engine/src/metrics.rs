//! Metrics collected during engine runs

use concord_domain::{RollbackStatus, Severity, Strategy};
use serde::Serialize;
use std::collections::HashMap;

/// Counters of one run
///
/// Tracks conflicts per severity, resolutions per strategy, rollback
/// outcomes and entry writes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunMetrics {
    /// Conflicts detected per severity
    pub conflicts: HashMap<Severity, usize>,

    /// Resolutions per strategy
    pub resolutions: HashMap<Strategy, usize>,

    /// Rollback outcomes per status
    pub rollbacks: HashMap<RollbackStatus, usize>,

    /// Entry files written
    pub entries_written: usize,

    /// Per-item failures
    pub failures: usize,
}

impl RunMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a detected conflict
    pub fn record_conflict(&mut self, severity: Severity) {
        *self.conflicts.entry(severity).or_insert(0) += 1;
    }

    /// Record a resolution
    pub fn record_resolution(&mut self, strategy: Strategy) {
        *self.resolutions.entry(strategy).or_insert(0) += 1;
    }

    /// Record a rollback outcome
    pub fn record_rollback(&mut self, status: RollbackStatus) {
        *self.rollbacks.entry(status).or_insert(0) += 1;
    }

    /// Record an entry write
    pub fn record_write(&mut self) {
        self.entries_written += 1;
    }

    /// Record a per-item failure
    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Total conflicts across severities
    pub fn total_conflicts(&self) -> usize {
        self.conflicts.values().sum()
    }

    /// Total resolutions across strategies
    pub fn total_resolutions(&self) -> usize {
        self.resolutions.values().sum()
    }

    /// Resolutions that were escalated
    pub fn total_escalated(&self) -> usize {
        self.resolutions.get(&Strategy::Escalate).copied().unwrap_or(0)
    }

    /// Resolutions that were applied automatically
    pub fn total_automated(&self) -> usize {
        self.total_resolutions() - self.total_escalated()
    }

    /// Count of one rollback status
    pub fn rollback_count(&self, status: RollbackStatus) -> usize {
        self.rollbacks.get(&status).copied().unwrap_or(0)
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        self.conflicts.clear();
        self.resolutions.clear();
        self.rollbacks.clear();
        self.entries_written = 0;
        self.failures = 0;
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Run Metrics Summary".to_string(),
            "===================".to_string(),
            format!("Entries written: {}", self.entries_written),
            format!("Failures: {}", self.failures),
            String::new(),
        ];

        if !self.conflicts.is_empty() {
            lines.push("Conflicts by severity:".to_string());
            for severity in Severity::ALL.iter().rev() {
                if let Some(count) = self.conflicts.get(severity) {
                    lines.push(format!("  {}: {}", severity, count));
                }
            }
            lines.push(format!("  Total: {}", self.total_conflicts()));
            lines.push(String::new());
        }

        if !self.resolutions.is_empty() {
            lines.push("Resolutions by strategy:".to_string());
            let mut by_strategy: Vec<_> = self.resolutions.iter().collect();
            by_strategy.sort_by_key(|(s, _)| s.as_str());
            for (strategy, count) in by_strategy {
                lines.push(format!("  {}: {}", strategy, count));
            }
            lines.push(format!(
                "  Automated: {}, escalated: {}",
                self.total_automated(),
                self.total_escalated()
            ));
            lines.push(String::new());
        }

        if !self.rollbacks.is_empty() {
            lines.push("Rollbacks by status:".to_string());
            let mut by_status: Vec<_> = self.rollbacks.iter().collect();
            by_status.sort_by_key(|(s, _)| s.as_str());
            for (status, count) in by_status {
                lines.push(format!("  {}: {}", status.as_str(), count));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = RunMetrics::new();
        assert_eq!(metrics.total_conflicts(), 0);
        assert_eq!(metrics.total_resolutions(), 0);
        assert_eq!(metrics.entries_written, 0);
    }

    #[test]
    fn test_record_conflicts() {
        let mut metrics = RunMetrics::new();
        metrics.record_conflict(Severity::High);
        metrics.record_conflict(Severity::Low);
        metrics.record_conflict(Severity::High);

        assert_eq!(metrics.conflicts[&Severity::High], 2);
        assert_eq!(metrics.total_conflicts(), 3);
    }

    #[test]
    fn test_automated_and_escalated() {
        let mut metrics = RunMetrics::new();
        metrics.record_resolution(Strategy::AuthorityOverride);
        metrics.record_resolution(Strategy::AdditiveMerge);
        metrics.record_resolution(Strategy::Escalate);

        assert_eq!(metrics.total_resolutions(), 3);
        assert_eq!(metrics.total_automated(), 2);
        assert_eq!(metrics.total_escalated(), 1);
    }

    #[test]
    fn test_reset() {
        let mut metrics = RunMetrics::new();
        metrics.record_rollback(RollbackStatus::Restored);
        metrics.record_write();
        metrics.record_failure();
        metrics.reset();

        assert_eq!(metrics.rollback_count(RollbackStatus::Restored), 0);
        assert_eq!(metrics.entries_written, 0);
        assert_eq!(metrics.failures, 0);
    }

    #[test]
    fn test_summary() {
        let mut metrics = RunMetrics::new();
        metrics.record_conflict(Severity::Critical);
        metrics.record_resolution(Strategy::Escalate);
        metrics.record_rollback(RollbackStatus::Failed);

        let summary = metrics.summary();
        assert!(summary.contains("Run Metrics Summary"));
        assert!(summary.contains("critical: 1"));
        assert!(summary.contains("escalated: 1"));
        assert!(summary.contains("failed: 1"));
    }
}
