//! Resolve command implementation.

use crate::cli::ResolveArgs;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use concord_engine::{resolve_log, RunContext, Workspace};

/// Execute the resolve command.
pub fn execute_resolve(
    args: ResolveArgs,
    ws: &Workspace,
    ctx: &mut RunContext,
    formatter: &Formatter,
) -> Result<()> {
    if !args.conflict_log.is_file() {
        return Err(CliError::InvalidInput(format!(
            "conflict log {} not found",
            args.conflict_log.display()
        )));
    }
    let report = resolve_log(ws, ctx, &args.conflict_log)?;
    println!("{}", formatter.resolution_report(&report)?);
    Ok(())
}
