//! Compare command implementation.

use crate::cli::CompareArgs;
use crate::config::OutputFormat;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use concord_engine::{KnowledgeState, RunContext, VersionComparator, VersionDiff, VersionRef, Workspace};
use tracing::{info, warn};

/// Execute the compare command.
pub fn execute_compare(
    args: CompareArgs,
    ws: &Workspace,
    ctx: &mut RunContext,
    formatter: &Formatter,
) -> Result<()> {
    let diff = compare(&args, ws, ctx)?;

    if let Some(path) = &args.output {
        if ctx.dry_run() {
            info!("DRY RUN: Would write comparison to {}", path.display());
        } else {
            diff.write_json(path)?;
            ctx.record("compare", &path.display().to_string(), format!("{} -> {}", diff.from, diff.to));
        }
    }

    println!("{}", formatter.version_diff(&diff)?);
    if args.notes && formatter.format() != OutputFormat::Json {
        println!("{}", diff.migration_notes());
    }
    Ok(())
}

/// Load both states and diff them.
fn compare(args: &CompareArgs, ws: &Workspace, ctx: &RunContext) -> Result<VersionDiff> {
    let from = match (&args.from_tag, &args.from_version) {
        (Some(tag), _) => {
            if !ws.restore_points().exists(tag) {
                return Err(CliError::InvalidInput(format!("no restore point named '{}'", tag)));
            }
            VersionRef::RestorePoint(tag.clone())
        }
        (None, Some(reference)) => VersionRef::parse(reference, ws)?,
        (None, None) => {
            return Err(CliError::InvalidInput(
                "one of --from-version or --from-tag is required".to_string(),
            ))
        }
    };
    let to = VersionRef::parse(&args.to_version, ws)?;

    let older = load(ws, &from)?;
    let newer = load(ws, &to)?;
    let comparator = VersionComparator::new(&ws.config().rules);
    Ok(comparator.compare(&older, &newer, ctx.now()))
}

fn load(ws: &Workspace, version: &VersionRef) -> Result<KnowledgeState> {
    let state = KnowledgeState::load(ws, version)?;
    for failure in &state.failures {
        warn!(entry = %failure.target, "Skipped unreadable entry: {}", failure.message);
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_engine::{EngineConfig, RollbackManager};
    use std::fs;
    use tempfile::TempDir;

    fn args(from_tag: &str, output: Option<std::path::PathBuf>) -> CompareArgs {
        CompareArgs {
            from_version: None,
            to_version: "current".to_string(),
            from_tag: Some(from_tag.to_string()),
            output,
            notes: true,
        }
    }

    #[test]
    fn test_compare_restore_point_with_current() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("instructions")).unwrap();
        fs::write(
            dir.path().join("instructions/mov.yaml"),
            "metadata:\n  id: mov-instruction\ntiming: '2'\n",
        )
        .unwrap();
        let ws = Workspace::open(dir.path(), EngineConfig::default()).unwrap();
        let mut ctx = ws.context().unwrap();
        RollbackManager::new(&ws)
            .create_restore_point(&mut ctx, "v1", "first release")
            .unwrap();

        fs::write(
            dir.path().join("instructions/mov.yaml"),
            "metadata:\n  id: mov-instruction\ntiming: '4'\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("instructions/add.yaml"),
            "metadata:\n  id: add-instruction\n",
        )
        .unwrap();

        let diff = compare(&args("v1", None), &ws, &ctx).unwrap();
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.modified.len(), 1);
        assert!(diff.removed.is_empty());

        let output = dir.path().join("diff.json");
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        execute_compare(args("v1", Some(output.clone())), &ws, &mut ctx, &formatter).unwrap();
        assert!(output.exists());
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::open(dir.path(), EngineConfig::default()).unwrap();
        let ctx = ws.context().unwrap();
        assert!(matches!(
            compare(&args("missing", None), &ws, &ctx),
            Err(CliError::InvalidInput(_))
        ));
    }
}
