//! CLI command definitions and argument parsing.

use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// Concord - keep a layered knowledge base consistent across sources.
#[derive(Debug, Parser)]
#[command(name = "concord")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Knowledge-base repository root
    #[arg(long, global = true, env = "CONCORD_REPO", default_value = ".")]
    pub repo_path: PathBuf,

    /// Report what would change without writing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Configuration file path (defaults to <repo>/concord.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (ids and paths only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Detect changed sources and entries, write extraction triggers
    Detect,

    /// Scan every entry for conflicts and write a conflict log
    Scan(ScanArgs),

    /// Resolve the conflicts of a conflict log
    Resolve(ResolveArgs),

    /// Merge an extraction batch into the entries
    Propagate(PropagateArgs),

    /// Re-evaluate past resolutions
    Regenerator(RegeneratorArgs),

    /// Restore entries from backups, batches or restore points
    Rollback(RollbackArgs),

    /// Compare two states of the knowledge base
    Compare(CompareArgs),

    /// Inspect and decide escalated conflicts
    Review(ReviewArgs),

    /// Show how entries evolved across extractions, updates and resolutions
    History(HistoryArgs),
}

/// Arguments for the scan command.
#[derive(Debug, Parser)]
pub struct ScanArgs {
    /// Resolve the detected conflicts right away
    #[arg(long)]
    pub resolve: bool,
}

/// Arguments for the resolve command.
#[derive(Debug, Parser)]
pub struct ResolveArgs {
    /// Conflict log written by `scan`
    #[arg(long, value_name = "FILE")]
    pub conflict_log: PathBuf,
}

/// Arguments for the propagate command.
#[derive(Debug, Parser)]
pub struct PropagateArgs {
    /// Extraction batch file (YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,
}

/// Arguments for the regenerator command.
#[derive(Debug, Parser)]
pub struct RegeneratorArgs {
    #[command(subcommand)]
    pub command: RegeneratorCommand,
}

/// Regenerator subcommands.
#[derive(Debug, Subcommand)]
pub enum RegeneratorCommand {
    /// List resolutions that should be revisited
    CheckTriggers,

    /// Show what resolving a conflict today would produce
    Regenerate {
        /// Conflict id (e.g. CONF-2026-07-01-001)
        id: String,
    },

    /// Restore the entry as it was before a resolution
    Rollback {
        /// Conflict id
        id: String,

        /// Reason recorded in the rollback log
        #[arg(long, default_value = "regenerator rollback")]
        reason: String,
    },
}

/// Arguments for the rollback command. Exactly one action is required.
#[derive(Debug, Parser)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args([
            "rollback_entry",
            "rollback_commit",
            "rollback_hours",
            "create_restore_point",
            "restore_from",
            "cleanup_days",
            "list_backups",
            "list_restore_points",
        ])
))]
pub struct RollbackArgs {
    /// Restore one entry file (relative to the repository root)
    #[arg(long, value_name = "PATH")]
    pub rollback_entry: Option<String>,

    /// Backup file to restore from (defaults to the latest backup)
    #[arg(long, value_name = "FILE", requires = "rollback_entry")]
    pub backup: Option<PathBuf>,

    /// Undo every change of a batch
    #[arg(long, value_name = "ID")]
    pub rollback_commit: Option<String>,

    /// Undo every change made in the last N hours
    #[arg(long, value_name = "N")]
    pub rollback_hours: Option<i64>,

    /// Copy all entries into a named restore point
    #[arg(long, value_name = "NAME")]
    pub create_restore_point: Option<String>,

    /// Description stored with a new restore point
    #[arg(long, requires = "create_restore_point")]
    pub description: Option<String>,

    /// Restore every entry from a named restore point
    #[arg(long, value_name = "NAME")]
    pub restore_from: Option<String>,

    /// Confirm a restore from a restore point
    #[arg(short, long)]
    pub yes: bool,

    /// Remove backups older than N days
    #[arg(long, value_name = "N")]
    pub cleanup_days: Option<i64>,

    /// List backups, optionally of one entry
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    pub list_backups: Option<Option<String>>,

    /// List restore points
    #[arg(long)]
    pub list_restore_points: bool,

    /// Reason recorded in the rollback log
    #[arg(long, value_name = "TEXT")]
    pub reason: Option<String>,
}

/// Arguments for the compare command.
#[derive(Debug, Parser)]
#[command(group(
    ArgGroup::new("from")
        .required(true)
        .args(["from_version", "from_tag"])
))]
pub struct CompareArgs {
    /// Older state: `current`, a restore point name or a directory
    #[arg(long, value_name = "REF")]
    pub from_version: Option<String>,

    /// Newer state (defaults to `current`)
    #[arg(long, value_name = "REF", default_value = "current")]
    pub to_version: String,

    /// Older state given as a restore point name
    #[arg(long, value_name = "NAME")]
    pub from_tag: Option<String>,

    /// Write the full diff as JSON
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print migration notes after the summary
    #[arg(long)]
    pub notes: bool,
}

/// Arguments for the review command.
#[derive(Debug, Parser)]
pub struct ReviewArgs {
    #[command(subcommand)]
    pub command: ReviewCommand,
}

/// Review subcommands.
#[derive(Debug, Subcommand)]
pub enum ReviewCommand {
    /// List queued items
    List {
        /// Only items without a decision
        #[arg(long)]
        pending: bool,
    },

    /// Record a decision for a queued item
    Decide {
        /// Conflict id
        id: String,

        /// Value to keep
        #[arg(long)]
        value: String,

        /// Rationale
        #[arg(long, default_value = "")]
        note: String,
    },
}

/// Arguments for the history command.
///
/// With an entry id, shows that entry. With `--timeline`, shows every event.
/// Otherwise lists the entries matching the filters.
#[derive(Debug, Parser)]
pub struct HistoryArgs {
    /// Entry id (e.g. mov-instruction)
    #[arg(conflicts_with = "timeline")]
    pub entry_id: Option<String>,

    /// Show events of every entry in time order
    #[arg(long)]
    pub timeline: bool,

    /// Only entries whose completeness score is below N
    #[arg(long, value_name = "N", conflicts_with_all = ["entry_id", "timeline"])]
    pub completeness_below: Option<u32>,

    /// Only entries whose completeness score is at least N
    #[arg(long, value_name = "N", conflicts_with_all = ["entry_id", "timeline"])]
    pub min_completeness: Option<u32>,

    /// Only entries with open conflicts or pending reviews
    #[arg(long, conflicts_with_all = ["entry_id", "timeline"])]
    pub has_conflicts: bool,

    /// Only entries changed on or after DATE (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_name = "DATE", conflicts_with_all = ["entry_id", "timeline"])]
    pub updated_since: Option<String>,

    /// Only entries touched by a source containing TEXT
    #[arg(long, value_name = "TEXT", conflicts_with_all = ["entry_id", "timeline"])]
    pub source: Option<String>,
}
