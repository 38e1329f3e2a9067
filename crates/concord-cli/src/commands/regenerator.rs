//! Regenerator command implementation.

use crate::cli::{RegeneratorArgs, RegeneratorCommand};
use crate::error::{CliError, Result};
use crate::output::Formatter;
use chrono::NaiveDate;
use concord_domain::ConflictId;
use concord_engine::{Regenerator, RunContext, Workspace};

/// Execute the regenerator command.
pub fn execute_regenerator(
    args: RegeneratorArgs,
    ws: &Workspace,
    ctx: &mut RunContext,
    formatter: &Formatter,
) -> Result<()> {
    let regenerator = Regenerator::new(ws);
    match args.command {
        RegeneratorCommand::CheckTriggers => {
            let report = regenerator.check_triggers()?;
            println!("{}", formatter.trigger_report(&report)?);
        }
        RegeneratorCommand::Regenerate { id } => {
            let id = parse_conflict_id(&id)?;
            let preview = regenerator.regenerate(ctx, &id)?;
            println!("{}", formatter.regeneration(&preview)?);
        }
        RegeneratorCommand::Rollback { id, reason } => {
            let id = parse_conflict_id(&id)?;
            let report = regenerator.rollback(ctx, &id, &reason)?;
            println!("{}", formatter.rollback_report(&report)?);
        }
    }
    Ok(())
}

/// Accept `CONF-YYYY-MM-DD-NNN`, case-insensitively.
pub(crate) fn parse_conflict_id(raw: &str) -> Result<ConflictId> {
    let id = raw.trim().to_uppercase();
    let valid = id
        .strip_prefix("CONF-")
        .and_then(|rest| rest.rsplit_once('-'))
        .map_or(false, |(date, seq)| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
                && !seq.is_empty()
                && seq.chars().all(|c| c.is_ascii_digit())
        });
    if !valid {
        return Err(CliError::InvalidInput(format!(
            "'{}' is not a conflict id (expected CONF-YYYY-MM-DD-NNN)",
            raw
        )));
    }
    Ok(ConflictId::from_string(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_conflict_id() {
        let id = parse_conflict_id(" conf-2026-07-01-007 ").unwrap();
        assert_eq!(id.as_str(), "CONF-2026-07-01-007");
    }

    #[test]
    fn test_parse_conflict_id_rejects_garbage() {
        assert!(parse_conflict_id("CONF-2026-13-01-001").is_err());
        assert!(parse_conflict_id("mov-instruction").is_err());
        assert!(parse_conflict_id("CONF-2026-07-01-").is_err());
    }
}
