//! Timestamped entry backups and the content-addressed object store

use crate::error::Result;
use crate::fsutil::{digest_bytes, relative_path, resolve, write_atomic};
use crate::layout::TrackingLayout;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

const BACKUP_MARKER: &str = "_backup_";
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A backup file found on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupInfo {
    /// Backup file location
    pub path: PathBuf,

    /// Entry file the backup was taken of
    pub entry_path: String,

    /// Time encoded in the file name
    pub taken_at: DateTime<Utc>,

    /// Collision suffix for backups sharing a timestamp (`-N`, 0 when absent)
    pub seq: u32,

    /// File size in bytes
    pub size: u64,

    /// Whether this is a safety backup written before a restore
    pub safety: bool,
}

/// Result of removing old backups
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Backup files removed
    pub deleted: usize,

    /// Backup files kept
    pub kept: usize,

    /// Bytes freed
    pub bytes_freed: u64,
}

/// Content-addressed copies of file contents, keyed by SHA-256 digest
#[derive(Debug, Clone)]
pub struct ObjectStore {
    dir: PathBuf,
}

impl ObjectStore {
    /// Create an object store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store content, returning its digest
    pub fn put(&self, bytes: &[u8]) -> Result<String> {
        let digest = digest_bytes(bytes);
        let path = self.dir.join(&digest);
        if !path.exists() {
            write_atomic(&path, bytes)?;
        }
        Ok(digest)
    }

    /// Fetch content by digest
    pub fn get(&self, digest: &str) -> Result<Option<Vec<u8>>> {
        let path = self.dir.join(digest);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read(path)?))
    }

    /// Whether content with the digest is stored
    pub fn contains(&self, digest: &str) -> bool {
        self.dir.join(digest).exists()
    }
}

/// Timestamped backups of entry files
///
/// Backups mirror the entry's directory below the backups root and are named
/// `<stem>_backup_<YYYYmmdd_HHMMSS_mmm>[-N].<ext>`. Every backup is also
/// copied into the object store.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
    safety_dir: PathBuf,
    objects: ObjectStore,
}

impl BackupStore {
    /// Create a backup store for a tracking layout
    pub fn new(layout: &TrackingLayout) -> Self {
        Self {
            dir: layout.backups_dir(),
            safety_dir: layout.safety_dir(),
            objects: ObjectStore::new(layout.objects_dir()),
        }
    }

    /// The object store shared by all backups
    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    /// Back up the current content of an entry
    pub fn backup(&self, entry_path: &str, content: &[u8], at: DateTime<Utc>) -> Result<BackupInfo> {
        self.write_backup(&self.dir, entry_path, content, at, false)
    }

    /// Back up content that is about to be replaced by a restore
    pub fn safety_backup(
        &self,
        entry_path: &str,
        content: &[u8],
        at: DateTime<Utc>,
    ) -> Result<BackupInfo> {
        self.write_backup(&self.safety_dir, entry_path, content, at, true)
    }

    fn write_backup(
        &self,
        base: &Path,
        entry_path: &str,
        content: &[u8],
        at: DateTime<Utc>,
        safety: bool,
    ) -> Result<BackupInfo> {
        let (dir, stem, ext) = split_entry_path(entry_path);
        let target_dir = resolve(base, &dir);
        let stamp = format!("{}_{:03}", at.format(STAMP_FORMAT), at.timestamp_subsec_millis());

        let mut name = format!("{}{}{}.{}", stem, BACKUP_MARKER, stamp, ext);
        let mut seq = 0;
        while target_dir.join(&name).exists() {
            seq += 1;
            name = format!("{}{}{}-{}.{}", stem, BACKUP_MARKER, stamp, seq, ext);
        }

        let path = target_dir.join(&name);
        write_atomic(&path, content)?;
        self.objects.put(content)?;
        debug!(entry = %entry_path, backup = %path.display(), safety, "Wrote backup");

        Ok(BackupInfo {
            path,
            entry_path: entry_path.to_string(),
            taken_at: parse_stamp(&stamp).unwrap_or(at),
            seq,
            size: content.len() as u64,
            safety,
        })
    }

    /// Regular backups of one entry, oldest first
    pub fn list(&self, entry_path: &str) -> Result<Vec<BackupInfo>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|b| b.entry_path == entry_path)
            .collect())
    }

    /// Most recent regular backup of one entry
    pub fn latest(&self, entry_path: &str) -> Result<Option<BackupInfo>> {
        Ok(self.list(entry_path)?.pop())
    }

    /// All regular backups, oldest first
    pub fn list_all(&self) -> Result<Vec<BackupInfo>> {
        let mut all = self.collect(&self.dir, false)?;
        sort_backups(&mut all);
        Ok(all)
    }

    /// Safety backups, oldest first
    pub fn list_safety(&self) -> Result<Vec<BackupInfo>> {
        let mut all = self.collect(&self.safety_dir, true)?;
        sort_backups(&mut all);
        Ok(all)
    }

    fn collect(&self, base: &Path, safety: bool) -> Result<Vec<BackupInfo>> {
        let mut found = Vec::new();
        if !base.is_dir() {
            return Ok(found);
        }
        let walker = WalkDir::new(base).into_iter().filter_entry(|e| {
            // Safety backups live below the regular root; keep them apart
            safety || e.path() != self.safety_dir
        });
        for item in walker {
            let item = item?;
            if !item.file_type().is_file() {
                continue;
            }
            let rel = relative_path(base, item.path())?;
            if let Some(name) = parse_backup_name(&rel) {
                found.push(BackupInfo {
                    path: item.path().to_path_buf(),
                    entry_path: name.entry_path,
                    taken_at: name.taken_at,
                    seq: name.seq,
                    size: item.metadata().map(|m| m.len()).unwrap_or(0),
                    safety,
                });
            }
        }
        Ok(found)
    }

    /// Read a backup's content
    pub fn read(&self, backup: &BackupInfo) -> Result<Vec<u8>> {
        Ok(fs::read(&backup.path)?)
    }

    /// Delete backups (regular and safety) taken before `cutoff`
    ///
    /// Snapshots, objects and restore points are never touched.
    pub fn cleanup(&self, cutoff: DateTime<Utc>, dry_run: bool) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();
        let mut all = self.list_all()?;
        all.extend(self.list_safety()?);

        for backup in all {
            if backup.taken_at < cutoff {
                if dry_run {
                    info!("DRY RUN: Would delete backup {}", backup.path.display());
                } else {
                    fs::remove_file(&backup.path)?;
                }
                report.deleted += 1;
                report.bytes_freed += backup.size;
            } else {
                report.kept += 1;
            }
        }
        Ok(report)
    }
}

/// Split `a/b/stem.ext` into (`a/b`, `stem`, `ext`)
fn split_entry_path(entry_path: &str) -> (String, String, String) {
    let (dir, file) = match entry_path.rsplit_once('/') {
        Some((dir, file)) => (dir.to_string(), file),
        None => (String::new(), entry_path),
    };
    let (stem, ext) = match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), ext.to_string()),
        _ => (file.to_string(), "yaml".to_string()),
    };
    (dir, stem, ext)
}

fn parse_stamp(stamp: &str) -> Option<DateTime<Utc>> {
    let (secs, millis) = stamp.rsplit_once('_')?;
    let base = NaiveDateTime::parse_from_str(secs, STAMP_FORMAT).ok()?;
    let millis: i64 = millis.parse().ok()?;
    Some(base.and_utc() + Duration::milliseconds(millis))
}

/// Oldest first; backups sharing a timestamp follow their collision suffix
fn sort_backups(list: &mut [BackupInfo]) {
    list.sort_by(|a, b| {
        (a.taken_at, a.seq)
            .cmp(&(b.taken_at, b.seq))
            .then_with(|| a.path.cmp(&b.path))
    });
}

struct BackupName {
    entry_path: String,
    taken_at: DateTime<Utc>,
    seq: u32,
}

/// Recover entry path, timestamp and suffix from a backup path relative to its root
fn parse_backup_name(rel: &str) -> Option<BackupName> {
    let (dir, file) = match rel.rsplit_once('/') {
        Some((dir, file)) => (Some(dir), file),
        None => (None, rel),
    };
    let (name, ext) = file.rsplit_once('.')?;
    let (stem, rest) = name.rsplit_once(BACKUP_MARKER)?;
    let (stamp, seq) = match rest.split_once('-') {
        Some((stamp, seq)) => (stamp, seq.parse().ok()?),
        None => (rest, 0),
    };
    let taken_at = parse_stamp(stamp)?;
    let entry_file = format!("{}.{}", stem, ext);
    let entry_path = match dir {
        Some(dir) => format!("{}/{}", dir, entry_file),
        None => entry_file,
    };
    Some(BackupName {
        entry_path,
        taken_at,
        seq,
    })
}
