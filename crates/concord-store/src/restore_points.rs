//! Named restore points: full copies of all entry files

use crate::error::{Result, StoreError};
use crate::fsutil::{relative_path, resolve, write_atomic};
use crate::logs::{read_yaml, write_yaml};
use chrono::{DateTime, Utc};
use concord_domain::RestorePointMetadata;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

const METADATA_FILE: &str = "metadata.yaml";
const FILES_DIR: &str = "files";

/// Store of restore points under `<dir>/<name>/`
#[derive(Debug, Clone)]
pub struct RestorePointStore {
    dir: PathBuf,
}

impl RestorePointStore {
    /// Create a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn point_dir(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(StoreError::InvalidData(format!(
                "invalid restore point name '{}'",
                name
            )));
        }
        Ok(self.dir.join(name))
    }

    /// Whether a restore point exists
    pub fn exists(&self, name: &str) -> bool {
        self.point_dir(name)
            .map(|d| d.join(METADATA_FILE).exists())
            .unwrap_or(false)
    }

    /// Directory holding the copied entry files of a restore point
    pub fn files_dir(&self, name: &str) -> Result<PathBuf> {
        Ok(self.point_dir(name)?.join(FILES_DIR))
    }

    /// Copy the listed entry files of `root` into a new restore point
    ///
    /// Existing names are refused.
    pub fn create(
        &self,
        name: &str,
        description: &str,
        root: &Path,
        entry_paths: &[String],
        at: DateTime<Utc>,
    ) -> Result<RestorePointMetadata> {
        let point = self.point_dir(name)?;
        if point.exists() {
            return Err(StoreError::AlreadyExists(format!("restore point {}", name)));
        }
        let files = point.join(FILES_DIR);
        for rel in entry_paths {
            let bytes = fs::read(resolve(root, rel))?;
            write_atomic(&resolve(&files, rel), &bytes)?;
        }

        let metadata = RestorePointMetadata {
            name: name.to_string(),
            description: description.to_string(),
            created_at: at,
            file_count: entry_paths.len(),
            source_commit: source_commit(root),
        };
        write_yaml(&point.join(METADATA_FILE), &metadata)?;
        info!(name = %name, files = entry_paths.len(), "Created restore point");
        Ok(metadata)
    }

    /// Metadata of one restore point
    pub fn metadata(&self, name: &str) -> Result<RestorePointMetadata> {
        let path = self.point_dir(name)?.join(METADATA_FILE);
        if !path.exists() {
            return Err(StoreError::NotFound(format!("restore point {}", name)));
        }
        read_yaml(&path)
    }

    /// All restore points, oldest first
    pub fn list(&self) -> Result<Vec<RestorePointMetadata>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut points = Vec::new();
        for item in fs::read_dir(&self.dir)? {
            let path = item?.path().join(METADATA_FILE);
            if path.exists() {
                points.push(read_yaml::<RestorePointMetadata>(&path)?);
            }
        }
        points.sort_by_key(|p| p.created_at);
        Ok(points)
    }

    /// Relative paths of the files held by a restore point
    pub fn files(&self, name: &str) -> Result<Vec<String>> {
        let base = self.files_dir(name)?;
        if !self.exists(name) {
            return Err(StoreError::NotFound(format!("restore point {}", name)));
        }
        let mut out = Vec::new();
        if !base.is_dir() {
            return Ok(out);
        }
        for item in WalkDir::new(&base).sort_by_file_name() {
            let item = item?;
            if item.file_type().is_file() {
                out.push(relative_path(&base, item.path())?);
            }
        }
        Ok(out)
    }

    /// Content of one file in a restore point
    pub fn read_file(&self, name: &str, rel: &str) -> Result<Vec<u8>> {
        Ok(fs::read(resolve(&self.files_dir(name)?, rel))?)
    }
}

/// Commit hash of the repository's checked-out HEAD, if it is a git checkout
pub fn source_commit(root: &Path) -> Option<String> {
    let git = root.join(".git");
    let head = fs::read_to_string(git.join("HEAD")).ok()?;
    let head = head.trim();
    let Some(reference) = head.strip_prefix("ref:") else {
        return Some(head.to_string());
    };
    let reference = reference.trim();
    if let Ok(hash) = fs::read_to_string(resolve(&git, reference)) {
        return Some(hash.trim().to_string());
    }
    let packed = fs::read_to_string(git.join("packed-refs")).ok()?;
    packed
        .lines()
        .filter_map(|line| line.split_once(' '))
        .find(|(_, name)| *name == reference)
        .map(|(hash, _)| hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_read_back() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("instructions")).unwrap();
        fs::write(root.join("instructions/a.yaml"), "a").unwrap();
        fs::write(root.join("instructions/b.yaml"), "b").unwrap();

        let store = RestorePointStore::new(root.join("update-tracking/restore-points"));
        let paths = vec!["instructions/a.yaml".to_string(), "instructions/b.yaml".to_string()];
        let meta = store.create("pre-migration", "before", root, &paths, Utc::now()).unwrap();
        assert_eq!(meta.file_count, 2);
        assert!(meta.source_commit.is_none());

        assert_eq!(store.files("pre-migration").unwrap(), paths);
        assert_eq!(store.read_file("pre-migration", "instructions/b.yaml").unwrap(), b"b");
        assert_eq!(store.list().unwrap().len(), 1);
        assert!(store.create("pre-migration", "", root, &paths, Utc::now()).is_err());
    }

    #[test]
    fn test_invalid_names_rejected() {
        let dir = TempDir::new().unwrap();
        let store = RestorePointStore::new(dir.path());
        assert!(store.create("../evil", "", dir.path(), &[], Utc::now()).is_err());
        assert!(store.metadata("missing").is_err());
    }

    #[test]
    fn test_source_commit_follows_ref() {
        let dir = TempDir::new().unwrap();
        let git = dir.path().join(".git");
        fs::create_dir_all(git.join("refs/heads")).unwrap();
        fs::write(git.join("HEAD"), "ref: refs/heads/main\n").unwrap();
        fs::write(git.join("refs/heads/main"), "abc123\n").unwrap();
        assert_eq!(source_commit(dir.path()).as_deref(), Some("abc123"));

        fs::write(git.join("HEAD"), "def456\n").unwrap();
        assert_eq!(source_commit(dir.path()).as_deref(), Some("def456"));
    }
}
