//! Hash-indexed catalog of archive entries
//!
//! Each entry has a 14-bit handle (its position), a normalised name, the bit
//! offset of its first record and the handles it depends on. Lookups by name
//! hash the name and binary-search the table sorted by hash; hashes are kept
//! unique by renaming a colliding entry with a numeric suffix.

use super::format::{MAX_HANDLES, name_hash};
use crate::error::{Error, Result};
use crate::utils::normalize_name;
use std::collections::HashMap;

const NO_OFFSET: u32 = u32::MAX;

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Normalised name, possibly with a collision suffix
    pub name: String,
    /// FNV-1a hash of `name`
    pub hash: u32,
    /// Bit offset of the entry's first record; `None` for a placeholder
    pub offset: Option<u32>,
    /// Handles of referenced entries, sorted and unique
    pub dependencies: Vec<u16>,
}

/// Little-endian byte cursor over the container header
pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    operation: &'static str,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(bytes: &'a [u8], operation: &'static str) -> Self {
        Self {
            bytes,
            pos: 0,
            operation,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| Error::invalid_archive(self.operation, "truncated header"))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.u32()?))
    }
}

/// Name table of an archive
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    sorted: Vec<(u32, u16)>,
    requested: HashMap<String, u16>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, placeholders included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the catalog has no entry
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in handle order
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Entry by handle
    pub fn entry(&self, handle: u16) -> Option<&CatalogEntry> {
        self.entries.get(usize::from(handle))
    }

    fn find_hash(&self, hash: u32) -> Option<u16> {
        self.sorted
            .binary_search_by_key(&hash, |&(h, _)| h)
            .ok()
            .map(|i| self.sorted[i].1)
    }

    /// Handle of a name, placeholders included
    pub fn handle(&self, name: &str) -> Option<u16> {
        let key = normalize_name(name);
        let handle = self.find_hash(name_hash(&key))?;
        (self.entries[usize::from(handle)].name == key).then_some(handle)
    }

    /// Name stored under a handle
    pub fn name_of(&self, handle: u16) -> Option<&str> {
        self.entry(handle).map(|e| e.name.as_str())
    }

    /// Bit offset of a defined entry
    pub fn offset(&self, name: &str) -> Option<u32> {
        self.handle(name).and_then(|h| self.entries[usize::from(h)].offset)
    }

    /// True when `name` has records in the archive
    pub fn contains(&self, name: &str) -> bool {
        self.offset(name).is_some()
    }

    /// Dependency handles of an entry
    pub fn dependencies(&self, name: &str) -> Option<&[u16]> {
        self.handle(name)
            .map(|h| self.entries[usize::from(h)].dependencies.as_slice())
    }

    /// Create a new entry under `key` or the first free suffixed variant
    fn allocate(&mut self, key: &str, operation: &'static str) -> Result<u16> {
        if self.entries.len() >= MAX_HANDLES {
            return Err(Error::ArchiveLimit {
                operation,
                message: format!("more than {} catalog entries", MAX_HANDLES),
            });
        }
        let mut candidate = key.to_string();
        let mut suffix = 2;
        while let Some(existing) = self.find_hash(name_hash(&candidate)) {
            let other = &self.entries[usize::from(existing)].name;
            if *other != candidate {
                tracing::warn!(name = %candidate, colliding = %other, "catalog hash collision");
            }
            candidate = format!("{}.{}", key, suffix);
            suffix += 1;
        }
        if candidate != key {
            tracing::warn!(name = %key, renamed = %candidate, "catalog entry renamed");
        }
        let hash = name_hash(&candidate);
        let handle = self.entries.len() as u16;
        self.entries.push(CatalogEntry {
            name: candidate,
            hash,
            offset: None,
            dependencies: Vec::new(),
        });
        let pos = self.sorted.partition_point(|&(h, _)| h < hash);
        self.sorted.insert(pos, (hash, handle));
        Ok(handle)
    }

    /// Handle for a referenced name, creating a placeholder if needed
    pub(crate) fn intern(&mut self, name: &str) -> Result<u16> {
        let key = normalize_name(name);
        if let Some(&h) = self.requested.get(&key) {
            return Ok(h);
        }
        let handle = match self.handle(&key) {
            Some(h) => h,
            None => self.allocate(&key, "ArchiveWriter::intern")?,
        };
        self.requested.insert(key, handle);
        Ok(handle)
    }

    /// Record the offset of a model's records
    ///
    /// A second definition of the same name gets a renamed entry of its own;
    /// references keep pointing at the first.
    pub(crate) fn define(&mut self, name: &str, offset: u32) -> Result<u16> {
        let handle = self.intern(name)?;
        let handle = if self.entries[usize::from(handle)].offset.is_some() {
            tracing::warn!(name = %normalize_name(name), "model archived twice");
            self.allocate(&normalize_name(name), "ArchiveWriter::define")?
        } else {
            handle
        };
        self.entries[usize::from(handle)].offset = Some(offset);
        Ok(handle)
    }

    /// Record that `handle` references `dependency`
    pub(crate) fn add_dependency(&mut self, handle: u16, dependency: u16) {
        if let Some(e) = self.entries.get_mut(usize::from(handle))
            && let Err(pos) = e.dependencies.binary_search(&dependency)
        {
            e.dependencies.insert(pos, dependency);
        }
    }

    /// Serialise the tables
    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for &(hash, handle) in &self.sorted {
            out.extend_from_slice(&hash.to_le_bytes());
            out.extend_from_slice(&handle.to_le_bytes());
        }
        for e in &self.entries {
            out.extend_from_slice(&e.offset.unwrap_or(NO_OFFSET).to_le_bytes());
            out.extend_from_slice(&(e.name.len() as u16).to_le_bytes());
            out.extend_from_slice(e.name.as_bytes());
            out.extend_from_slice(&(e.dependencies.len() as u16).to_le_bytes());
            for d in &e.dependencies {
                out.extend_from_slice(&d.to_le_bytes());
            }
        }
    }

    /// Deserialise the tables written by [`Catalog::write_to`]
    pub(crate) fn read_from(r: &mut ByteReader<'_>) -> Result<Catalog> {
        const OP: &str = "Catalog::read";
        let count = r.u32()? as usize;
        if count > MAX_HANDLES {
            return Err(Error::invalid_archive(OP, format!("{} entries exceed the handle range", count)));
        }
        let mut sorted = Vec::with_capacity(count);
        for _ in 0..count {
            let hash = r.u32()?;
            let handle = r.u16()?;
            if usize::from(handle) >= count {
                return Err(Error::invalid_archive(OP, format!("handle {} out of range", handle)));
            }
            sorted.push((hash, handle));
        }
        if sorted.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(Error::invalid_archive(OP, "hash table is not sorted"));
        }

        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let offset = r.u32()?;
            let len = usize::from(r.u16()?);
            let name = String::from_utf8(r.take(len)?.to_vec())
                .map_err(|_| Error::invalid_archive(OP, "entry name is not UTF-8"))?;
            let deps = usize::from(r.u16()?);
            let mut dependencies = Vec::with_capacity(deps);
            for _ in 0..deps {
                dependencies.push(r.u16()?);
            }
            entries.push(CatalogEntry {
                hash: name_hash(&name),
                name,
                offset: (offset != NO_OFFSET).then_some(offset),
                dependencies,
            });
        }
        for &(hash, handle) in &sorted {
            if entries[usize::from(handle)].hash != hash {
                return Err(Error::invalid_archive(
                    OP,
                    format!("hash mismatch for entry {}", handle),
                ));
            }
        }
        Ok(Catalog {
            entries,
            sorted,
            requested: HashMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_creates_placeholder_once() {
        let mut c = Catalog::new();
        let a = c.intern("Stud.DAT").unwrap();
        assert_eq!(c.intern("stud.dat").unwrap(), a);
        assert_eq!(c.handle("STUD.dat"), Some(a));
        assert!(!c.contains("stud.dat"));
        c.define("stud.dat", 42).unwrap();
        assert_eq!(c.offset("stud.dat"), Some(42));
    }

    #[test]
    fn test_duplicate_definition_is_renamed() {
        let mut c = Catalog::new();
        let first = c.define("box.dat", 0).unwrap();
        let second = c.define("box.dat", 100).unwrap();
        assert_ne!(first, second);
        assert_eq!(c.name_of(second), Some("box.dat.2"));
        assert_eq!(c.offset("box.dat"), Some(0));
        assert_eq!(c.offset("box.dat.2"), Some(100));
        assert_eq!(c.intern("box.dat").unwrap(), first);
    }

    #[test]
    fn test_dependencies_sorted_unique() {
        let mut c = Catalog::new();
        let p = c.intern("3001.dat").unwrap();
        let s = c.intern("stud.dat").unwrap();
        let b = c.intern("box5.dat").unwrap();
        c.add_dependency(p, b);
        c.add_dependency(p, s);
        c.add_dependency(p, b);
        let mut expected = vec![s, b];
        expected.sort();
        assert_eq!(c.dependencies("3001.dat").unwrap(), expected.as_slice());
    }

    #[test]
    fn test_serialisation_round_trip() {
        let mut c = Catalog::new();
        let p = c.define("3001.dat", 7).unwrap();
        let s = c.intern("stud.dat").unwrap();
        c.add_dependency(p, s);

        let mut bytes = Vec::new();
        c.write_to(&mut bytes);
        let mut r = ByteReader::new(&bytes, "test");
        let back = Catalog::read_from(&mut r).unwrap();
        assert_eq!(r.position(), bytes.len());
        assert_eq!(back.entries(), c.entries());
        assert_eq!(back.handle("3001.DAT"), Some(p));
        assert_eq!(back.offset("stud.dat"), None);
        assert_eq!(back.dependencies("3001.dat").unwrap(), &[s]);
    }

    #[test]
    fn test_truncated_catalog_rejected() {
        let mut c = Catalog::new();
        c.define("3001.dat", 7).unwrap();
        let mut bytes = Vec::new();
        c.write_to(&mut bytes);
        bytes.truncate(bytes.len() - 3);
        let err = Catalog::read_from(&mut ByteReader::new(&bytes, "test")).unwrap_err();
        assert!(err.is_archive_corruption());
    }
}
