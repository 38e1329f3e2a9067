//! Watch patterns and directory scanning

use crate::error::Result;
use crate::fsutil::{relative_path, resolve};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use walkdir::WalkDir;

/// A set of files to watch: a directory, extensions, and depth
///
/// # Examples
///
/// ```
/// use concord_store::WatchPattern;
///
/// let p = WatchPattern::recursive("sources", &["csv", "md"]);
/// assert!(p.matches_extension("notes.MD"));
/// assert!(!p.matches_extension("notes.pdf"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchPattern {
    /// Directory relative to the repository root
    pub dir: String,

    /// File extensions without the dot, matched case-insensitively
    pub extensions: Vec<String>,

    /// Descend into subdirectories
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

fn default_recursive() -> bool {
    true
}

impl WatchPattern {
    /// Pattern matching files at any depth below `dir`
    pub fn recursive(dir: &str, extensions: &[&str]) -> Self {
        Self {
            dir: dir.to_string(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            recursive: true,
        }
    }

    /// Pattern matching files directly inside `dir`
    pub fn flat(dir: &str, extensions: &[&str]) -> Self {
        Self {
            recursive: false,
            ..Self::recursive(dir, extensions)
        }
    }

    /// Whether a file name carries one of the pattern's extensions
    pub fn matches_extension(&self, name: &str) -> bool {
        let ext = match Path::new(name).extension() {
            Some(ext) => ext.to_string_lossy().to_lowercase(),
            None => return false,
        };
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
    }
}

/// List files under `root` matched by any pattern
///
/// Paths are relative to `root`, `/`-separated, sorted and unique. Missing
/// directories are skipped.
pub fn scan_files(root: &Path, patterns: &[WatchPattern]) -> Result<Vec<String>> {
    let mut found = BTreeSet::new();

    for pattern in patterns {
        let base = resolve(root, &pattern.dir);
        if !base.is_dir() {
            continue;
        }
        let max_depth = if pattern.recursive { usize::MAX } else { 1 };
        for item in WalkDir::new(&base).max_depth(max_depth).sort_by_file_name() {
            let item = item?;
            if !item.file_type().is_file() {
                continue;
            }
            let name = item.file_name().to_string_lossy();
            if pattern.matches_extension(&name) {
                found.insert(relative_path(root, item.path())?);
            }
        }
    }

    Ok(found.into_iter().collect())
}
