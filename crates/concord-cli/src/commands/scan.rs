//! Scan command implementation.

use crate::cli::ScanArgs;
use crate::error::Result;
use crate::output::Formatter;
use concord_engine::{resolve_conflicts, scan_workspace, RunContext, Workspace};

/// Execute the scan command.
pub fn execute_scan(
    args: ScanArgs,
    ws: &Workspace,
    ctx: &mut RunContext,
    formatter: &Formatter,
) -> Result<()> {
    let (report, log) = scan_workspace(ws, ctx)?;
    println!("{}", formatter.scan_report(&report, log.as_deref())?);

    if args.resolve && !report.conflicts.is_empty() {
        let log_name = log.as_ref().map(|p| p.display().to_string());
        let resolution = resolve_conflicts(ws, ctx, &report.conflicts, log_name)?;
        println!("{}", formatter.resolution_report(&resolution)?);
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

    const ENTRY: &str = "metadata:\n  id: y-instruction\nlayer1:\n  source: P2-Instruction-Set.csv\n  interrupt_shield: false\nlayer4:\n  source: forum-clarification\n  interrupt_shield: true\n";

    #[test]
    fn test_scan_and_resolve() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("instructions")).unwrap();
        fs::write(dir.path().join("instructions/y.yaml"), ENTRY).unwrap();
        let ws = Workspace::open(dir.path(), EngineConfig::default()).unwrap();
        let mut ctx = ws.context().unwrap();
        let formatter = Formatter::new(OutputFormat::Json, false);

        execute_scan(ScanArgs { resolve: true }, &ws, &mut ctx, &formatter).unwrap();

        let (rescan, _) = scan_workspace(&ws, &mut ctx).unwrap();
        assert!(rescan.conflicts.is_empty());
        assert_ne!(
            fs::read_to_string(dir.path().join("instructions/y.yaml")).unwrap(),
            ENTRY
        );
    }
}
