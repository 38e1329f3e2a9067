//! Rollback command implementation.

use crate::cli::RollbackArgs;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use chrono::Duration;
use concord_domain::RunId;
use concord_engine::{RollbackManager, RunContext, Workspace};

/// Execute the rollback command.
pub fn execute_rollback(
    args: RollbackArgs,
    ws: &Workspace,
    ctx: &mut RunContext,
    formatter: &Formatter,
) -> Result<()> {
    let mut manager = RollbackManager::new(ws);
    if let Some(reason) = &args.reason {
        manager = manager.with_reason(reason.clone());
    }

    if let Some(filter) = &args.list_backups {
        let backups = manager.list_backups(filter.as_deref())?;
        println!("{}", formatter.backups(&backups)?);
    } else if args.list_restore_points {
        let points = ws.restore_points().list()?;
        println!("{}", formatter.restore_points(&points)?);
    } else if let Some(entry) = &args.rollback_entry {
        let report = manager.rollback_entry(ctx, entry, args.backup.as_deref())?;
        println!("{}", formatter.rollback_report(&report)?);
    } else if let Some(id) = &args.rollback_commit {
        let id = RunId::from_string(id)
            .map_err(|e| CliError::InvalidInput(format!("invalid batch id '{}': {}", id, e)))?;
        let report = manager.rollback_batch(ctx, &id)?;
        println!("{}", formatter.rollback_report(&report)?);
    } else if let Some(hours) = args.rollback_hours {
        if hours <= 0 {
            return Err(CliError::InvalidInput(
                "--rollback-hours must be positive".to_string(),
            ));
        }
        let report = manager.rollback_time_range(ctx, Duration::hours(hours))?;
        println!("{}", formatter.rollback_report(&report)?);
    } else if let Some(name) = &args.create_restore_point {
        let description = args.description.clone().unwrap_or_default();
        let metadata = manager.create_restore_point(ctx, name, &description)?;
        println!("{}", formatter.restore_point_created(name, metadata.as_ref())?);
    } else if let Some(name) = &args.restore_from {
        if !args.yes && !ctx.dry_run() {
            return Err(CliError::NotPermitted(format!(
                "restoring from '{}' rewrites entry files; pass --yes to confirm",
                name
            )));
        }
        let report = manager.restore_from_point(ctx, name)?;
        println!("{}", formatter.rollback_report(&report)?);
    } else if let Some(days) = args.cleanup_days {
        if days < 0 {
            return Err(CliError::InvalidInput(
                "--cleanup-days must not be negative".to_string(),
            ));
        }
        let report = manager.cleanup_old_backups(ctx, days)?;
        println!("{}", formatter.cleanup_report(&report)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use concord_engine::EngineConfig;
    use std::fs;
    use tempfile::TempDir;

    fn args() -> RollbackArgs {
        RollbackArgs {
            rollback_entry: None,
            backup: None,
            rollback_commit: None,
            rollback_hours: None,
            create_restore_point: None,
            description: None,
            restore_from: None,
            yes: false,
            cleanup_days: None,
            list_backups: None,
            list_restore_points: false,
            reason: None,
        }
    }

    fn repo() -> (TempDir, Workspace) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("instructions")).unwrap();
        fs::write(
            dir.path().join("instructions/mov.yaml"),
            "metadata:\n  id: mov-instruction\n",
        )
        .unwrap();
        let ws = Workspace::open(dir.path(), EngineConfig::default()).unwrap();
        (dir, ws)
    }

    #[test]
    fn test_restore_from_requires_confirmation() {
        let (_dir, ws) = repo();
        let mut ctx = ws.context().unwrap();
        let formatter = Formatter::new(OutputFormat::Quiet, false);

        let mut create = args();
        create.create_restore_point = Some("baseline".to_string());
        execute_rollback(create, &ws, &mut ctx, &formatter).unwrap();
        assert!(ws.restore_points().exists("baseline"));

        let mut restore = args();
        restore.restore_from = Some("baseline".to_string());
        assert!(matches!(
            execute_rollback(restore, &ws, &mut ctx, &formatter),
            Err(CliError::NotPermitted(_))
        ));

        let mut confirmed = args();
        confirmed.restore_from = Some("baseline".to_string());
        confirmed.yes = true;
        execute_rollback(confirmed, &ws, &mut ctx, &formatter).unwrap();
    }

    #[test]
    fn test_invalid_arguments() {
        let (_dir, ws) = repo();
        let mut ctx = ws.context().unwrap();
        let formatter = Formatter::new(OutputFormat::Quiet, false);

        let mut hours = args();
        hours.rollback_hours = Some(0);
        assert!(matches!(
            execute_rollback(hours, &ws, &mut ctx, &formatter),
            Err(CliError::InvalidInput(_))
        ));

        let mut commit = args();
        commit.rollback_commit = Some("not-a-uuid".to_string());
        assert!(matches!(
            execute_rollback(commit, &ws, &mut ctx, &formatter),
            Err(CliError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_entry_without_backup_reports_failure() {
        let (_dir, ws) = repo();
        let mut ctx = ws.context().unwrap();
        let formatter = Formatter::new(OutputFormat::Json, false);

        let mut entry = args();
        entry.rollback_entry = Some("instructions/mov.yaml".to_string());
        execute_rollback(entry, &ws, &mut ctx, &formatter).unwrap();
        let log = ws.rollback_log().load().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, concord_domain::RollbackStatus::Failed);
    }
}
