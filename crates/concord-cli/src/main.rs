//! Concord CLI - keeps a layered knowledge base consistent across sources.

use clap::Parser;
use concord_cli::commands;
use concord_cli::{Cli, Command, Formatter, Settings};
use concord_engine::Workspace;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CONCORD_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> concord_cli::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Resolve repository, engine configuration and output settings
    let settings = Settings::from_cli(&cli)?;
    let formatter = Formatter::new(settings.format, settings.color);

    let ws = Workspace::open(&settings.repo, settings.engine)?;
    let mut ctx = ws.context()?;

    match cli.command {
        Command::Detect => commands::execute_detect(&ws, &mut ctx, &formatter)?,
        Command::Scan(args) => commands::execute_scan(args, &ws, &mut ctx, &formatter)?,
        Command::Resolve(args) => commands::execute_resolve(args, &ws, &mut ctx, &formatter)?,
        Command::Propagate(args) => commands::execute_propagate(args, &ws, &mut ctx, &formatter)?,
        Command::Regenerator(args) => {
            commands::execute_regenerator(args, &ws, &mut ctx, &formatter)?
        }
        Command::Rollback(args) => commands::execute_rollback(args, &ws, &mut ctx, &formatter)?,
        Command::Compare(args) => commands::execute_compare(args, &ws, &mut ctx, &formatter)?,
        Command::Review(args) => commands::execute_review(args, &ws, &mut ctx, &formatter)?,
        Command::History(args) => commands::execute_history(args, &ws, &mut ctx, &formatter)?,
    }

    if let Some(path) = ctx.persist_audit(&ws.layout().audit_dir())? {
        tracing::debug!(run = %ctx.run_id(), trail = %path.display(), "Run finished");
    }
    Ok(())
}
