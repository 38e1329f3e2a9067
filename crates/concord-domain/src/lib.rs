//! Concord Domain Layer
//!
//! This crate contains the domain model of the knowledge base consistency
//! engine. It defines the records every other layer passes around and the
//! trait interface used to reach entry storage.
//!
//! ## Key Concepts
//!
//! - **Entry**: a per-item record holding one block per authority layer
//!   plus the consolidated current values
//! - **Authority layer**: ranked source class (baseline → confirmed →
//!   verified → absolute)
//! - **Conflict**: a classified field disagreement between two layers
//! - **Resolution**: the strategy and value chosen for a conflict
//! - **Snapshot**: immutable before/after record of an applied resolution
//!
//! ## Architecture
//!
//! - Pure data and classification logic only
//! - Persistence lives in concord-store
//! - Detection, resolution and rollback live in concord-engine

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod change;
pub mod conflict;
pub mod entry;
pub mod error;
pub mod history;
pub mod layer;
pub mod provenance;
pub mod resolution;
pub mod snapshot;
pub mod traits;
pub mod value;

// Re-exports for convenience
pub use change::{ChangeKind, EntryChange, SourceChange};
pub use conflict::{Conflict, ConflictId, ConflictKind, ConflictSide, LayerValue, Severity};
pub use entry::{Entry, EntryMetadata, LayerBlock, IDENTITY_FIELDS};
pub use error::{ErrorKind, ItemFailure};
pub use history::{
    BatchKind, BatchRecord, FileChange, RestorePointMetadata, ReviewDecision, ReviewItem,
    RollbackRecord, RollbackStatus, RunId, REVIEW_CHECKLIST,
};
pub use layer::AuthorityLayer;
pub use provenance::{FieldProvenance, ResolutionRecord, UpdateRecord};
pub use resolution::{Resolution, Strategy};
pub use snapshot::Snapshot;
pub use value::FieldValue;
