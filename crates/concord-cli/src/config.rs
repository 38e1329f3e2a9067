//! Configuration management for the CLI.

use crate::cli::{Cli, CliFormat};
use crate::error::{CliError, Result};
use concord_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

impl From<CliFormat> for OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => OutputFormat::Table,
            CliFormat::Json => OutputFormat::Json,
            CliFormat::Quiet => OutputFormat::Quiet,
        }
    }
}

/// Everything a command needs besides its own arguments.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Repository root
    pub repo: PathBuf,

    /// Engine configuration, with command-line overrides applied
    pub engine: EngineConfig,

    /// Output format
    pub format: OutputFormat,

    /// Enable colored output
    pub color: bool,
}

impl Settings {
    /// Resolve settings from parsed arguments.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        if !cli.repo_path.is_dir() {
            return Err(CliError::Config(format!(
                "repository root {} is not a readable directory",
                cli.repo_path.display()
            )));
        }
        let engine = load_engine_config(&cli.repo_path, cli.config.as_deref(), cli.dry_run)?;
        Ok(Self {
            repo: cli.repo_path.clone(),
            engine,
            format: cli.format.map(Into::into).unwrap_or_default(),
            color: !cli.no_color && std::env::var_os("NO_COLOR").is_none(),
        })
    }
}

/// Load the engine configuration from `path`, or `<repo>/concord.toml` when
/// no path is given, then apply the dry-run flag and validate.
pub fn load_engine_config(repo: &Path, path: Option<&Path>, dry_run: bool) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::Config(format!(
                    "config file {} not found",
                    path.display()
                )));
            }
            EngineConfig::load(path)?
        }
        None => EngineConfig::load_or_default(repo)?,
    };
    if dry_run {
        config.dry_run = true;
    }
    config.validate().map_err(CliError::Config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let config = load_engine_config(dir.path(), None, false).unwrap();
        assert_eq!(config.tracking_dir, "update-tracking");
        assert!(!config.dry_run);
    }

    #[test]
    fn test_repo_file_and_dry_run_override() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("concord.toml"), "review_deadline_days = 3\n").unwrap();
        let config = load_engine_config(dir.path(), None, true).unwrap();
        assert_eq!(config.review_deadline_days, 3);
        assert!(config.dry_run);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            load_engine_config(dir.path(), Some(&missing), false),
            Err(CliError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[thresholds]\nlow_confidence = 1.5\n").unwrap();
        let err = load_engine_config(dir.path(), Some(&path), false).unwrap_err();
        assert!(err.to_string().contains("low_confidence"));
    }

    #[test]
    fn test_format_conversion() {
        assert_eq!(OutputFormat::from(CliFormat::Json), OutputFormat::Json);
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
    }
}
