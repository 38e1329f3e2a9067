//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

use crate::Entry;

/// Trait for reading and writing entry records
///
/// Paths are relative to the repository root and use `/` separators.
/// Implemented by the infrastructure layer (concord-store)
pub trait EntryStore {
    /// Error type for store operations
    type Error;

    /// List all entry file paths, sorted
    fn entry_paths(&self) -> Result<Vec<String>, Self::Error>;

    /// Load and parse an entry
    fn load_entry(&self, path: &str) -> Result<Entry, Self::Error>;

    /// Read the exact file text of an entry, if it exists
    fn read_raw(&self, path: &str) -> Result<Option<String>, Self::Error>;

    /// Serialize and write an entry, replacing the file atomically
    fn save_entry(&mut self, path: &str, entry: &Entry) -> Result<(), Self::Error>;

    /// Write exact file text, replacing the file atomically
    fn write_raw(&mut self, path: &str, text: &str) -> Result<(), Self::Error>;

    /// Find the path of the entry with the given id
    ///
    /// The default implementation loads every entry; unreadable files are
    /// skipped.
    fn find_entry(&self, id: &str) -> Result<Option<String>, Self::Error> {
        for path in self.entry_paths()? {
            if let Ok(entry) = self.load_entry(&path) {
                if entry.id().eq_ignore_ascii_case(id) {
                    return Ok(Some(path));
                }
            }
        }
        Ok(None)
    }
}
