//! Concord Engine
//!
//! Keeps a layered knowledge base consistent when several sources of
//! different authority describe the same entries.
//!
//! # Overview
//!
//! The engine is responsible for:
//! - **Change detection**: digest baselines of source documents and entries
//! - **Conflict detection**: pairwise comparison of layer values per field
//! - **Resolution**: authority override, additive merge and precision
//!   containment, with escalation to a manual review queue
//! - **Propagation**: merging extraction batches into entries
//! - **Rollback**: entry, batch, time-range, restore-point and snapshot restores
//! - **Comparison**: entry and statistic diffs between two states
//! - **History**: per-entry evolution, a global timeline and criteria search
//!
//! # Authority layers
//!
//! | Layer | Key | Typical source |
//! |-------|-----|----------------|
//! | **Baseline** | `layer1` | Instruction CSV |
//! | **Confirmed** | `layer2` | Datasheet |
//! | **Verified** | `layer3` | Silicon documentation |
//! | **Absolute** | `layer4` | Designer clarification |
//!
//! # Usage
//!
//! ## Scan and resolve
//!
//! ```no_run
//! use concord_engine::{resolve_conflicts, scan_workspace, EngineConfig, Workspace};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ws = Workspace::open("/path/to/kb", EngineConfig::load_or_default("/path/to/kb".as_ref())?)?;
//! let mut ctx = ws.context()?;
//!
//! let (scan, log) = scan_workspace(&ws, &mut ctx)?;
//! let report = resolve_conflicts(&ws, &mut ctx, &scan.conflicts, log.map(|p| p.display().to_string()))?;
//! println!("{}", report.metrics.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Classifying a single disagreement
//!
//! ```
//! use concord_domain::{ConflictKind, FieldValue};
//! use concord_engine::{ConflictDetector, EngineConfig};
//!
//! let detector = ConflictDetector::new(&EngineConfig::default());
//! let kind = detector.classify(&FieldValue::from("2"), &FieldValue::from("4"));
//! assert_eq!(kind, Some(ConflictKind::DirectContradiction));
//! ```
//!
//! ## Configuration presets
//!
//! ```
//! use concord_engine::EngineConfig;
//!
//! // Default: balanced thresholds
//! let config = EngineConfig::default();
//!
//! // Strict: more escalations, fewer automated merges
//! let config = EngineConfig::strict();
//!
//! // Lenient: more automated merges
//! let config = EngineConfig::lenient();
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Configuration
//!
//! Every table can be overridden in `concord.toml`:
//!
//! ```toml
//! tracking_dir = "update-tracking"
//! review_deadline_days = 7
//! batch_window_secs = 300
//!
//! [thresholds]
//! completeness_overlap = 0.7
//! precision_containment = 0.6
//! low_confidence = 0.7
//! completeness_cap = 8
//! default_overwrite_layer = "verified"
//! ```

#![warn(missing_docs)]

mod change;
mod compare;
mod config;
mod context;
mod dependency;
mod detect;
mod error;
mod evolution;
mod metrics;
mod pipeline;
mod propagate;
mod regenerate;
mod resolve;
mod rollback;
mod text;
mod workspace;

pub use change::{
    archive_triggers, pending_triggers, ChangeDetector, ChangeReport, Detection, ExtractionTrigger,
};
pub use compare::{
    EntrySummary, FieldChange, FieldChangeKind, KnowledgeState, ModifiedEntry, Statistics,
    StatisticsPair, VersionComparator, VersionDiff, VersionRef,
};
pub use config::{
    AntonymGroup, EngineConfig, RelationField, RuleTables, SeverityTable, SourceLayerRule,
    SourceMapping, Thresholds,
};
pub use context::{AuditEvent, AuditTrail, ConflictIdGenerator, RunContext};
pub use dependency::{DependencyEdge, DependencyIndex};
pub use detect::{scan, ConflictDetector, ConflictLog, ScanReport};
pub use evolution::{
    parse_date, CompletenessChange, EntryHistory, EventKind, HistoryBrowser, HistoryCriteria,
    HistoryEvent, Timeline,
};
pub use error::{EngineError, Result};
pub use metrics::RunMetrics;
pub use pipeline::{
    resolve_conflicts, resolve_log, scan_workspace, ItemStatus, ResolutionLog, ResolutionOutcome,
    ResolutionReport,
};
pub use propagate::{
    propagate, propagate_file, ExtractedEntry, ExtractionBatch, PropagationReport, UpdatePropagator,
};
pub use regenerate::{
    RegenerationCandidate, RegenerationPreview, RegenerationTrigger, Regenerator, TriggerReport,
};
pub use resolve::{apply_resolution, review_item, ConflictResolver};
pub use rollback::{RollbackManager, RollbackReport};
pub use workspace::Workspace;
