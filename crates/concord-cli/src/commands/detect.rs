//! Detect command implementation.

use crate::error::Result;
use crate::output::Formatter;
use concord_engine::{ChangeDetector, RunContext, Workspace};

/// Execute the detect command.
pub fn execute_detect(ws: &Workspace, ctx: &mut RunContext, formatter: &Formatter) -> Result<()> {
    let report = ChangeDetector::new(ws).run(ctx.now())?;
    ctx.record(
        "detect",
        &ws.root().display().to_string(),
        format!("{} sources, {} entries", report.sources.len(), report.entries.len()),
    );
    println!("{}", formatter.change_report(&report)?);
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
    fn test_detect_writes_baseline() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("instructions")).unwrap();
        fs::write(
            dir.path().join("instructions/mov.yaml"),
            "metadata:\n  id: mov-instruction\n",
        )
        .unwrap();
        let ws = Workspace::open(dir.path(), EngineConfig::default()).unwrap();
        let mut ctx = ws.context().unwrap();
        let formatter = Formatter::new(OutputFormat::Quiet, false);

        execute_detect(&ws, &mut ctx, &formatter).unwrap();
        assert!(ws.layout().entry_hashes().exists());
        assert!(ChangeDetector::new(&ws).run(ctx.now()).unwrap().is_empty());
    }
}
