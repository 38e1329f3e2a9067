//! History command implementation.

use crate::cli::HistoryArgs;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use concord_engine::{parse_date, HistoryBrowser, HistoryCriteria, RunContext, Workspace};

/// Execute the history command.
pub fn execute_history(
    args: HistoryArgs,
    ws: &Workspace,
    ctx: &mut RunContext,
    formatter: &Formatter,
) -> Result<()> {
    let browser = HistoryBrowser::new(ws);
    if let Some(id) = args.entry_id.as_deref() {
        let history = browser.entry_evolution(ctx, id)?;
        println!("{}", formatter.entry_history(&history)?);
    } else if args.timeline {
        let timeline = browser.timeline(ctx)?;
        println!("{}", formatter.timeline(&timeline)?);
    } else {
        let matches = browser.find(ctx, &criteria(&args)?)?;
        println!("{}", formatter.history_matches(&matches)?);
    }
    Ok(())
}

/// Search filters from the command line.
fn criteria(args: &HistoryArgs) -> Result<HistoryCriteria> {
    let updated_since = match args.updated_since.as_deref() {
        Some(text) => Some(parse_date(text).ok_or_else(|| {
            CliError::InvalidInput(format!(
                "invalid date '{}': expected YYYY-MM-DD or RFC 3339",
                text
            ))
        })?),
        None => None,
    };
    Ok(HistoryCriteria {
        completeness_below: args.completeness_below,
        min_completeness: args.min_completeness,
        has_conflicts: args.has_conflicts,
        updated_since,
        source: args.source.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use chrono::{TimeZone, Utc};
    use concord_engine::EngineConfig;
    use std::fs;
    use tempfile::TempDir;

    fn args() -> HistoryArgs {
        HistoryArgs {
            entry_id: None,
            timeline: false,
            completeness_below: None,
            min_completeness: None,
            has_conflicts: false,
            updated_since: None,
            source: None,
        }
    }

    fn repo() -> (TempDir, Workspace) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("instructions")).unwrap();
        fs::write(
            dir.path().join("instructions/mov.yaml"),
            "metadata:\n  id: mov-instruction\ncompleteness_score: 4\n\
             layer1:\n  source: P2-Instruction-Set.csv\n  extraction_date: '2026-05-01'\n  timing: '2'\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("instructions/add.yaml"),
            "metadata:\n  id: add-instruction\ncompleteness_score: 9\n",
        )
        .unwrap();
        let ws = Workspace::open(dir.path(), EngineConfig::default()).unwrap();
        (dir, ws)
    }

    #[test]
    fn test_criteria_from_args() {
        let mut a = args();
        a.completeness_below = Some(60);
        a.has_conflicts = true;
        a.updated_since = Some("2026-06-01".to_string());
        let criteria = criteria(&a).unwrap();
        assert_eq!(criteria.completeness_below, Some(60));
        assert!(criteria.has_conflicts);
        assert_eq!(
            criteria.updated_since,
            Some(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_invalid_since_is_rejected() {
        let mut a = args();
        a.updated_since = Some("yesterday".to_string());
        assert!(matches!(criteria(&a), Err(CliError::InvalidInput(_))));
    }

    #[test]
    fn test_history_modes_run() {
        let (_dir, ws) = repo();
        let mut ctx = ws.context().unwrap();
        let formatter = Formatter::new(OutputFormat::Quiet, false);

        let mut one = args();
        one.entry_id = Some("mov-instruction".to_string());
        execute_history(one, &ws, &mut ctx, &formatter).unwrap();

        let mut timeline = args();
        timeline.timeline = true;
        execute_history(timeline, &ws, &mut ctx, &formatter).unwrap();

        let mut low = args();
        low.completeness_below = Some(5);
        execute_history(low, &ws, &mut ctx, &formatter).unwrap();

        let browser = HistoryBrowser::new(&ws);
        let mut filter = args();
        filter.completeness_below = Some(5);
        let matches = browser.find(&ctx, &criteria(&filter).unwrap()).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].entry_id, "mov-instruction");
    }

    #[test]
    fn test_unknown_entry_fails() {
        let (_dir, ws) = repo();
        let mut ctx = ws.context().unwrap();
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        let mut a = args();
        a.entry_id = Some("jmp-instruction".to_string());
        assert!(execute_history(a, &ws, &mut ctx, &formatter).is_err());
    }
}
