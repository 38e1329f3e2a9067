//! Per-run context threaded through every operation
//!
//! Holds what would otherwise be process-wide state: the run id, who is
//! running, the clock, the monotonic conflict id sequence and the audit
//! trail of the run.

use crate::config::EngineConfig;
use crate::error::Result;
use chrono::{DateTime, NaiveDate, Utc};
use concord_domain::{ConflictId, RunId};
use concord_store::{write_run_log, SequenceState};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Monotonic conflict id generator (`CONF-<date>-<seq>`)
///
/// The sequence restarts at 1 each day and continues across runs when its
/// persisted state is resumed.
#[derive(Debug, Clone)]
pub struct ConflictIdGenerator {
    date: NaiveDate,
    last: u32,
}

impl ConflictIdGenerator {
    /// Start a fresh sequence for `date`
    pub fn new(date: NaiveDate) -> Self {
        Self { date, last: 0 }
    }

    /// Continue a persisted sequence if it belongs to `date`
    pub fn resume(state: Option<SequenceState>, date: NaiveDate) -> Self {
        match state {
            Some(state) if state.date == date => Self { date, last: state.last },
            _ => Self::new(date),
        }
    }

    /// Hand out the next id
    pub fn next_id(&mut self) -> ConflictId {
        self.last += 1;
        ConflictId::new(self.date, self.last)
    }

    /// State to persist
    pub fn state(&self) -> SequenceState {
        SequenceState {
            date: self.date,
            last: self.last,
        }
    }
}

/// One audit event of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    /// When it happened
    pub at: DateTime<Utc>,

    /// What was done (`write_entry`, `capture_snapshot`, ...)
    pub action: String,

    /// What it was done to
    pub target: String,

    /// Extra detail
    pub detail: String,
}

/// Audit events of one run, as persisted
#[derive(Debug, Clone, Serialize)]
pub struct AuditTrail<'a> {
    /// Run identifier
    pub run_id: RunId,

    /// Who ran it
    pub actor: &'a str,

    /// Start of the run
    pub started_at: DateTime<Utc>,

    /// Events, oldest first
    pub events: &'a [AuditEvent],
}

/// Context of one tool run
///
/// # Examples
///
/// ```
/// use concord_engine::{EngineConfig, RunContext};
///
/// let mut ctx = RunContext::new(EngineConfig::default());
/// let first = ctx.next_conflict_id();
/// let second = ctx.next_conflict_id();
/// assert!(first < second);
/// ```
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: RunId,
    actor: String,
    started_at: DateTime<Utc>,
    fixed_now: Option<DateTime<Utc>>,
    config: EngineConfig,
    ids: ConflictIdGenerator,
    audit: Vec<AuditEvent>,
}

impl RunContext {
    /// Create a context using the system clock
    pub fn new(config: EngineConfig) -> Self {
        let now = Utc::now();
        let actor = config
            .actor
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            run_id: RunId::new(),
            actor,
            started_at: now,
            fixed_now: None,
            ids: ConflictIdGenerator::new(now.date_naive()),
            config,
            audit: Vec::new(),
        }
    }

    /// Create a context whose clock is frozen at `now`
    pub fn at(config: EngineConfig, now: DateTime<Utc>) -> Self {
        let mut ctx = Self::new(config);
        ctx.started_at = now;
        ctx.fixed_now = Some(now);
        ctx.ids = ConflictIdGenerator::new(now.date_naive());
        ctx
    }

    /// Override the actor
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Run identifier
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Who is running
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// When the run started
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Current time
    pub fn now(&self) -> DateTime<Utc> {
        self.fixed_now.unwrap_or_else(Utc::now)
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether writes are suppressed
    pub fn dry_run(&self) -> bool {
        self.config.dry_run
    }

    /// Next conflict id
    pub fn next_conflict_id(&mut self) -> ConflictId {
        self.ids.next_id()
    }

    /// Continue the conflict id sequence persisted at `path`
    pub fn resume_sequence(&mut self, path: &Path) -> Result<()> {
        let state = SequenceState::load(path)?;
        self.ids = ConflictIdGenerator::resume(state, self.started_at.date_naive());
        Ok(())
    }

    /// Persist the conflict id sequence (skipped in dry-run mode)
    pub fn persist_sequence(&self, path: &Path) -> Result<()> {
        if !self.dry_run() {
            self.ids.state().save(path)?;
        }
        Ok(())
    }

    /// Append an audit event
    pub fn record(&mut self, action: &str, target: &str, detail: impl Into<String>) {
        let at = self.now();
        self.audit.push(AuditEvent {
            at,
            action: action.to_string(),
            target: target.to_string(),
            detail: detail.into(),
        });
    }

    /// Audit events so far, oldest first
    pub fn audit(&self) -> &[AuditEvent] {
        &self.audit
    }

    /// Write the audit trail as `<dir>/audit-<timestamp>.yaml`
    ///
    /// Nothing is written for a dry run or a run without events.
    pub fn persist_audit(&self, dir: &Path) -> Result<Option<PathBuf>> {
        if self.dry_run() || self.audit.is_empty() {
            return Ok(None);
        }
        let trail = AuditTrail {
            run_id: self.run_id,
            actor: &self.actor,
            started_at: self.started_at,
            events: &self.audit,
        };
        let path = write_run_log(dir, "audit", self.started_at, &trail)?;
        debug!(run = %self.run_id, path = %path.display(), "Wrote audit trail");
        Ok(Some(path))
    }
}
