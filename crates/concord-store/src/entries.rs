//! YAML entry files on disk

use crate::error::{Result, StoreError};
use crate::fsutil::{resolve, write_atomic};
use crate::scan::{scan_files, WatchPattern};
use concord_domain::traits::EntryStore;
use concord_domain::Entry;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Entry store backed by YAML files matched by watch patterns
///
/// # Examples
///
/// ```no_run
/// use concord_domain::traits::EntryStore;
/// use concord_store::{FileEntryStore, WatchPattern};
///
/// let store = FileEntryStore::new("/path/to/kb", vec![
///     WatchPattern::recursive("instructions", &["yaml"]),
/// ]);
/// for path in store.entry_paths().unwrap() {
///     println!("{}", path);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileEntryStore {
    root: PathBuf,
    patterns: Vec<WatchPattern>,
}

impl FileEntryStore {
    /// Create a store over `root` using the given entry patterns
    pub fn new(root: impl Into<PathBuf>, patterns: Vec<WatchPattern>) -> Self {
        Self {
            root: root.into(),
            patterns,
        }
    }

    /// Repository root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entry patterns
    pub fn patterns(&self) -> &[WatchPattern] {
        &self.patterns
    }

    /// Parse entry text, filling a missing id from the file stem
    pub fn parse_entry(path: &str, text: &str) -> Result<Entry> {
        let mut entry: Entry = serde_yaml::from_str(text).map_err(|e| StoreError::Parse {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        if entry.metadata.id.trim().is_empty() {
            let stem = Path::new(path)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            entry.metadata.id = stem;
        }
        Ok(entry)
    }

    /// Serialize an entry to YAML text
    pub fn render_entry(entry: &Entry) -> Result<String> {
        Ok(serde_yaml::to_string(entry)?)
    }
}

impl EntryStore for FileEntryStore {
    type Error = StoreError;

    fn entry_paths(&self) -> Result<Vec<String>> {
        scan_files(&self.root, &self.patterns)
    }

    fn load_entry(&self, path: &str) -> Result<Entry> {
        let text = self
            .read_raw(path)?
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        Self::parse_entry(path, &text)
    }

    fn read_raw(&self, path: &str) -> Result<Option<String>> {
        let full = resolve(&self.root, path);
        if !full.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(full)?))
    }

    fn save_entry(&mut self, path: &str, entry: &Entry) -> Result<()> {
        let text = Self::render_entry(entry)?;
        self.write_raw(path, &text)
    }

    fn write_raw(&mut self, path: &str, text: &str) -> Result<()> {
        debug!(path = %path, bytes = text.len(), "Writing entry");
        write_atomic(&resolve(&self.root, path), text.as_bytes())
    }
}
