//! Persisted `relative path → digest` baselines

use crate::error::Result;
use crate::fsutil::{digest_file, resolve, write_atomic};
use concord_domain::ItemFailure;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Map of relative file paths to SHA-256 digests
///
/// Serialized as a flat JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestMap(BTreeMap<String, String>);

impl DigestMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a map, returning an empty one if the file is missing
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let text = fs::read_to_string(path)?;
        if text.trim().is_empty() {
            return Ok(Self::new());
        }
        Ok(Self(serde_json::from_str(&text)?))
    }

    /// Replace the persisted map atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.0)?;
        write_atomic(path, text.as_bytes())
    }

    /// Digest every listed file under `root`
    pub fn compute(root: &Path, files: &[String]) -> Result<Self> {
        let mut map = BTreeMap::new();
        for rel in files {
            map.insert(rel.clone(), digest_file(&resolve(root, rel))?);
        }
        Ok(Self(map))
    }

    /// Digest every listed file, skipping the ones that cannot be read
    ///
    /// A skipped file keeps its digest from `previous` when it has one, so an
    /// unreadable file is neither reported as changed nor as removed.
    pub fn recompute(root: &Path, files: &[String], previous: &DigestMap) -> (Self, Vec<ItemFailure>) {
        let mut map = BTreeMap::new();
        let mut failures = Vec::new();
        for rel in files {
            match digest_file(&resolve(root, rel)) {
                Ok(digest) => {
                    map.insert(rel.clone(), digest);
                }
                Err(e) => {
                    warn!(path = %rel, error = %e, "Skipping unreadable file");
                    if let Some(old) = previous.get(rel) {
                        map.insert(rel.clone(), old.to_string());
                    }
                    failures.push(ItemFailure::new(rel, e.kind(), e.to_string()));
                }
            }
        }
        (Self(map), failures)
    }

    /// Digest of a path, if recorded
    pub fn get(&self, path: &str) -> Option<&str> {
        self.0.get(path).map(String::as_str)
    }

    /// Record a digest
    pub fn insert(&mut self, path: impl Into<String>, digest: impl Into<String>) {
        self.0.insert(path.into(), digest.into());
    }

    /// Iterate over `(path, digest)` pairs in path order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Number of recorded files
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no file is recorded
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
