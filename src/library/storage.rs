//! Byte storage behind a part library

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// One directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    /// File or directory name, as stored
    pub name: String,
    /// True for a directory
    pub is_dir: bool,
}

/// Directory lister and byte-stream opener
pub trait Storage: std::fmt::Debug {
    /// Entries of a directory
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamOpen`] when `dir` cannot be listed.
    fn list_dir(&self, dir: &Path) -> Result<Vec<StorageEntry>>;

    /// Open a file for reading
    ///
    /// # Errors
    ///
    /// Returns [`Error::StreamOpen`] when `path` cannot be opened.
    fn open(&self, path: &Path) -> Result<Box<dyn Read + '_>>;
}

/// Storage on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn list_dir(&self, dir: &Path) -> Result<Vec<StorageEntry>> {
        let entries = std::fs::read_dir(dir)
            .map_err(|_| Error::stream_open("FsStorage::list_dir", dir.display().to_string()))?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry?;
            out.push(StorageEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        Ok(out)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read + '_>> {
        let file = File::open(path)
            .map_err(|_| Error::stream_open("FsStorage::open", path.display().to_string()))?;
        Ok(Box::new(file))
    }
}

/// In-memory storage, mostly for tests and embedded libraries
///
/// Directories exist implicitly as prefixes of inserted file paths.
///
/// # Example
///
/// ```
/// use libldr::library::{MemoryStorage, Storage};
/// use std::path::Path;
///
/// let mut storage = MemoryStorage::new();
/// storage.insert("ldraw/p/stud.dat", "0 Stud\n");
/// let names: Vec<String> = storage
///     .list_dir(Path::new("ldraw"))
///     .unwrap()
///     .into_iter()
///     .map(|e| e.name)
///     .collect();
/// assert_eq!(names, vec!["p"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl MemoryStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    /// Builder form of [`MemoryStorage::insert`]
    pub fn with_file(mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    /// Number of stored files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when no file is stored
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn list_dir(&self, dir: &Path) -> Result<Vec<StorageEntry>> {
        let mut out: Vec<StorageEntry> = Vec::new();
        for path in self.files.keys() {
            let Ok(rest) = path.strip_prefix(dir) else {
                continue;
            };
            let mut parts = rest.components();
            let Some(first) = parts.next() else {
                continue;
            };
            let name = first.as_os_str().to_string_lossy().into_owned();
            let is_dir = parts.next().is_some();
            if !out.iter().any(|e| e.name == name) {
                out.push(StorageEntry { name, is_dir });
            }
        }
        if out.is_empty() {
            return Err(Error::stream_open(
                "MemoryStorage::list_dir",
                dir.display().to_string(),
            ));
        }
        Ok(out)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn Read + '_>> {
        let bytes = self
            .files
            .get(path)
            .ok_or_else(|| Error::stream_open("MemoryStorage::open", path.display().to_string()))?;
        Ok(Box::new(Cursor::new(bytes.as_slice())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_listing_marks_directories() {
        let storage = MemoryStorage::new()
            .with_file("lib/parts/3001.dat", "0 Brick\n")
            .with_file("lib/parts/s/3001s01.dat", "0 Sub\n");
        let mut entries = storage.list_dir(Path::new("lib/parts")).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            entries,
            vec![
                StorageEntry { name: "3001.dat".into(), is_dir: false },
                StorageEntry { name: "s".into(), is_dir: true },
            ]
        );
    }

    #[test]
    fn test_memory_open_and_missing() {
        let storage = MemoryStorage::new().with_file("a.dat", "0 A\n");
        let mut text = String::new();
        storage
            .open(Path::new("a.dat"))
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "0 A\n");
        assert!(matches!(
            storage.open(Path::new("b.dat")),
            Err(Error::StreamOpen { .. })
        ));
        assert!(storage.list_dir(Path::new("nowhere")).is_err());
    }

    #[test]
    fn test_fs_storage() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("p")).unwrap();
        std::fs::write(dir.path().join("p/stud.dat"), "0 Stud\n").unwrap();
        let entries = FsStorage.list_dir(dir.path()).unwrap();
        assert_eq!(entries, vec![StorageEntry { name: "p".into(), is_dir: true }]);
        assert!(FsStorage.open(&dir.path().join("p/stud.dat")).is_ok());
    }
}
