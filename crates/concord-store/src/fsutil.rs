//! File helpers: content digests, atomic replace, relative paths

use crate::error::{Result, StoreError};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// SHA-256 digest of a byte slice, hex encoded
///
/// # Examples
///
/// ```
/// use concord_store::digest_bytes;
///
/// assert_eq!(
///     digest_bytes(b"abc"),
///     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
/// );
/// ```
pub fn digest_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 digest of a file's content
pub fn digest_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(digest_bytes(&bytes))
}

/// Replace a file atomically
///
/// The content goes to a temporary file in the same directory, which is then
/// renamed over the target. Readers never see a partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

/// Path of `path` relative to `root`, with `/` separators
pub fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).map_err(|_| {
        StoreError::InvalidData(format!(
            "{} is outside {}",
            path.display(),
            root.display()
        ))
    })?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

/// Join a `/`-separated relative path onto a root
pub fn resolve(root: &Path, rel: &str) -> PathBuf {
    rel.split('/')
        .filter(|part| !part.is_empty())
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}
