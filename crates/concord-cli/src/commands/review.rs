//! Review command implementation.

use super::regenerator::parse_conflict_id;
use crate::cli::{ReviewArgs, ReviewCommand};
use crate::error::{CliError, Result};
use crate::output::Formatter;
use concord_domain::{FieldValue, ReviewDecision};
use concord_engine::{RunContext, Workspace};
use tracing::info;

/// Execute the review command.
pub fn execute_review(
    args: ReviewArgs,
    ws: &Workspace,
    ctx: &mut RunContext,
    formatter: &Formatter,
) -> Result<()> {
    let queue = ws.review_queue();
    match args.command {
        ReviewCommand::List { pending } => {
            let mut items = queue.load()?;
            if pending {
                items.retain(|item| item.decision.is_none());
            }
            println!("{}", formatter.review_items(&items)?);
        }
        ReviewCommand::Decide { id, value, note } => {
            let id = parse_conflict_id(&id)?;
            if queue.get(&id)?.is_none() {
                return Err(CliError::InvalidInput(format!("{} is not in the review queue", id)));
            }
            let decision = ReviewDecision {
                decided_by: ctx.actor().to_string(),
                decided_at: ctx.now(),
                value: parse_value(&value),
                note,
            };
            if ctx.dry_run() {
                info!("DRY RUN: Would record decision {} for {}", decision.value, id);
                return Ok(());
            }
            let detail = decision.value.to_string();
            queue.record_decision(&id, decision)?;
            ctx.record("review_decision", id.as_str(), detail);
            println!("{}", formatter.success(&format!("Decision recorded for {}", id)));
        }
    }
    Ok(())
}

/// Interpret a command-line value the way an entry file would hold it.
fn parse_value(raw: &str) -> FieldValue {
    let trimmed = raw.trim();
    match trimmed.to_lowercase().as_str() {
        "true" => return FieldValue::Bool(true),
        "false" => return FieldValue::Bool(false),
        "" | "null" => return FieldValue::Null,
        _ => {}
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return FieldValue::Integer(n);
    }
    FieldValue::from(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("true"), FieldValue::Bool(true));
        assert_eq!(parse_value(" FALSE "), FieldValue::Bool(false));
        assert_eq!(parse_value("42"), FieldValue::Integer(42));
        assert_eq!(parse_value("13-20"), FieldValue::from("13-20"));
        assert_eq!(parse_value(""), FieldValue::Null);
    }
}
