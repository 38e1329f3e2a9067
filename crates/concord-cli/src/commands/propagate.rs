//! Propagate command implementation.

use crate::cli::PropagateArgs;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use concord_engine::{propagate_file, RunContext, Workspace};

/// Execute the propagate command.
pub fn execute_propagate(
    args: PropagateArgs,
    ws: &Workspace,
    ctx: &mut RunContext,
    formatter: &Formatter,
) -> Result<()> {
    if !args.input.is_file() {
        return Err(CliError::InvalidInput(format!(
            "extraction batch {} not found",
            args.input.display()
        )));
    }
    let report = propagate_file(ws, ctx, &args.input)?;
    println!("{}", formatter.propagation_report(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use concord_engine::EngineConfig;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_propagate_from_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("instructions")).unwrap();
        fs::write(
            dir.path().join("instructions/mov.yaml"),
            "metadata:\n  id: mov-instruction\n",
        )
        .unwrap();
        let input = dir.path().join("batch.yaml");
        fs::write(
            &input,
            "source: P2-Instruction-Set.csv\nextracted_at: 2026-07-01T12:00:00Z\nentries:\n- entry_id: mov-instruction\n  fields:\n    timing: '2'\n",
        )
        .unwrap();
        let ws = Workspace::open(dir.path(), EngineConfig::default()).unwrap();
        let mut ctx = ws.context().unwrap();
        let formatter = Formatter::new(OutputFormat::Quiet, false);

        execute_propagate(PropagateArgs { input }, &ws, &mut ctx, &formatter).unwrap();
        let text = fs::read_to_string(dir.path().join("instructions/mov.yaml")).unwrap();
        assert!(text.contains("layer1"));
    }

    #[test]
    fn test_missing_input_is_rejected() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::open(dir.path(), EngineConfig::default()).unwrap();
        let mut ctx = ws.context().unwrap();
        let formatter = Formatter::new(OutputFormat::Table, false);
        let args = PropagateArgs {
            input: dir.path().join("nope.yaml"),
        };
        assert!(matches!(
            execute_propagate(args, &ws, &mut ctx, &formatter),
            Err(CliError::InvalidInput(_))
        ));
    }
}
