//! Shared, reference-counted resolver for part and primitive files
//!
//! A [`PartLibrary`] turns the filenames of unresolved references into
//! [`Link::Library`] handles. Every distinct normalised filename is loaded
//! once and kept in a cache entry whose reference count is the number of
//! linked references pointing at it. Sources are tried in this order:
//!
//! 1. a submodel or external model of the multipart being linked
//! 2. the configured external model directory
//! 3. the shared cache
//! 4. the primitives directory, preferring the configured quality variants
//! 5. the parts directory (`s/` sub-parts included)
//! 6. the compressed archive
//!
//! A reference no source can satisfy is logged and left unresolved.

mod storage;

pub use storage::{FsStorage, MemoryStorage, Storage, StorageEntry};

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::model::{Category, Element, EntryId, Link, ModelMultipart, ModelResolver};
use crate::parser;
use crate::utils::normalize_name;

/// Which cache categories are evicted when their count drops to zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlinkPolicy {
    parts: bool,
    primitives: bool,
}

impl UnlinkPolicy {
    /// Evict both parts and primitives
    pub const ALL: UnlinkPolicy = UnlinkPolicy::new(true, true);
    /// Keep everything cached
    pub const NONE: UnlinkPolicy = UnlinkPolicy::new(false, false);
    /// Evict parts, keep primitives
    pub const PARTS: UnlinkPolicy = UnlinkPolicy::new(true, false);
    /// Evict primitives, keep parts
    pub const PRIMITIVES: UnlinkPolicy = UnlinkPolicy::new(false, true);

    /// Build a policy from its two switches
    pub const fn new(parts: bool, primitives: bool) -> Self {
        Self { parts, primitives }
    }

    /// True when unused entries of `category` are evicted
    pub fn evicts(&self, category: Category) -> bool {
        match category {
            Category::Part => self.parts,
            Category::Primitive => self.primitives,
        }
    }
}

impl Default for UnlinkPolicy {
    fn default() -> Self {
        Self::ALL
    }
}

/// Configuration for a [`PartLibrary`]
///
/// # Example
///
/// ```
/// use libldr::library::{LibraryConfig, MemoryStorage, UnlinkPolicy};
///
/// let storage = MemoryStorage::new()
///     .with_file("ldraw/p/stud.dat", "0 Stud\n")
///     .with_file("ldraw/parts/3001.dat", "0 Brick 2 x 4\n");
/// let config = LibraryConfig::new()
///     .with_root("ldraw")
///     .with_storage(storage)
///     .with_unlink_policy(UnlinkPolicy::PARTS);
/// assert_eq!(config.root().unwrap().to_str(), Some("ldraw"));
/// ```
#[derive(Debug)]
pub struct LibraryConfig {
    root: Option<PathBuf>,
    storage: Box<dyn Storage>,
    archive: Option<Archive>,
    unlink_policy: UnlinkPolicy,
    primitive_variants: Vec<String>,
    model_dir: Option<PathBuf>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: None,
            storage: Box::new(FsStorage),
            archive: None,
            unlink_policy: UnlinkPolicy::default(),
            primitive_variants: vec!["48".to_string(), "8".to_string()],
            model_dir: None,
        }
    }
}

impl LibraryConfig {
    /// Default configuration: filesystem storage, no root, no archive
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration rooted at the library found in the environment
    ///
    /// `LDRAWDIR` wins; otherwise the conventional install locations are
    /// searched. Without any match the root stays unset.
    pub fn from_env() -> Self {
        match find_library_root() {
            Some(root) => Self::new().with_root(root),
            None => Self::new(),
        }
    }

    /// Directory holding the primitives and parts directories
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Replace the storage backend
    pub fn with_storage(mut self, storage: impl Storage + 'static) -> Self {
        self.storage = Box::new(storage);
        self
    }

    /// Archive consulted after the directories
    pub fn with_archive(mut self, archive: Archive) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Eviction policy
    pub fn with_unlink_policy(mut self, policy: UnlinkPolicy) -> Self {
        self.unlink_policy = policy;
        self
    }

    /// Primitive quality subdirectories, in order of preference
    pub fn with_primitive_variants<I, S>(mut self, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primitive_variants = variants.into_iter().map(Into::into).collect();
        self
    }

    /// Directory searched for external models (always on the local filesystem)
    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = Some(dir.into());
        self
    }

    /// Library root
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Eviction policy
    pub fn unlink_policy(&self) -> UnlinkPolicy {
        self.unlink_policy
    }

    /// Primitive quality subdirectories
    pub fn primitive_variants(&self) -> &[String] {
        &self.primitive_variants
    }
}

/// Locate a library root from `LDRAWDIR` or the usual install paths
pub fn find_library_root() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("LDRAWDIR")
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    let mut candidates: Vec<PathBuf> = Vec::new();
    if cfg!(windows) {
        candidates.push(PathBuf::from(r"C:\ldraw"));
        candidates.push(PathBuf::from(r"C:\Program Files\ldraw"));
    } else {
        for base in ["/usr/share", "/usr/local/share", "/opt"] {
            candidates.push(Path::new(base).join("ldraw"));
            candidates.push(Path::new(base).join("LDraw"));
        }
        if let Some(home) = std::env::var_os("HOME") {
            candidates.push(Path::new(&home).join(".ldraw"));
            candidates.push(Path::new(&home).join("ldraw"));
        }
    }
    candidates.into_iter().find(|p| p.is_dir())
}

/// Outcome of a [`PartLibrary::link`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// References resolved during the call, nested library files included
    pub resolved: usize,
    /// Filenames that could not be resolved
    pub unresolved: Vec<String>,
}

#[derive(Debug)]
struct CacheEntry {
    name: String,
    category: Category,
    refcount: usize,
    multipart: ModelMultipart,
}

/// Reference-counted cache of library files
///
/// Not thread-safe: counts and cache insertion are plain mutations.
#[derive(Debug)]
pub struct PartLibrary {
    config: LibraryConfig,
    primitives_dir: Option<PathBuf>,
    parts_dir: Option<PathBuf>,
    primitives: HashMap<String, PathBuf>,
    parts: HashMap<String, PathBuf>,
    slots: Vec<Option<CacheEntry>>,
    free: Vec<usize>,
    index: HashMap<String, EntryId>,
    loading: HashSet<String>,
}

impl PartLibrary {
    /// Index the configured library
    ///
    /// # Errors
    ///
    /// Returns [`Error::LibraryNotFound`] when no archive is configured and
    /// the root, its primitives directory or its parts directory is missing.
    pub fn new(config: LibraryConfig) -> Result<Self> {
        const OP: &str = "PartLibrary::new";
        let mut lib = Self {
            config,
            primitives_dir: None,
            parts_dir: None,
            primitives: HashMap::new(),
            parts: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            loading: HashSet::new(),
        };
        let has_archive = lib.config.archive.is_some();

        let Some(root) = lib.config.root.clone() else {
            if has_archive {
                return Ok(lib);
            }
            return Err(Error::LibraryNotFound {
                operation: OP,
                message: "no library root configured".to_string(),
            });
        };

        let entries = match lib.config.storage.list_dir(&root) {
            Ok(entries) => entries,
            Err(e) if has_archive => {
                tracing::warn!(root = %root.display(), error = %e, "library root unreadable, using archive only");
                return Ok(lib);
            }
            Err(_) => {
                return Err(Error::LibraryNotFound {
                    operation: OP,
                    message: format!("cannot list {}", root.display()),
                });
            }
        };
        let find_dir = |wanted: &str| {
            entries
                .iter()
                .find(|e| e.is_dir && e.name.eq_ignore_ascii_case(wanted))
                .map(|e| root.join(&e.name))
        };
        lib.primitives_dir = find_dir("p");
        lib.parts_dir = find_dir("parts");

        let missing: Vec<&str> = [("p", &lib.primitives_dir), ("parts", &lib.parts_dir)]
            .iter()
            .filter(|(_, d)| d.is_none())
            .map(|(n, _)| *n)
            .collect();
        if !missing.is_empty() && !has_archive {
            return Err(Error::LibraryNotFound {
                operation: OP,
                message: format!("{} has no {} directory", root.display(), missing.join(" or ")),
            });
        }

        if let Some(dir) = lib.primitives_dir.clone() {
            index_dir(lib.config.storage.as_ref(), &dir, "", &mut lib.primitives)?;
        }
        if let Some(dir) = lib.parts_dir.clone() {
            index_dir(lib.config.storage.as_ref(), &dir, "", &mut lib.parts)?;
        }
        tracing::debug!(
            root = %root.display(),
            primitives = lib.primitives.len(),
            parts = lib.parts.len(),
            "indexed part library"
        );
        Ok(lib)
    }

    /// Configuration in use
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Directory discovered for a category
    pub fn path_of(&self, category: Category) -> Option<&Path> {
        match category {
            Category::Part => self.parts_dir.as_deref(),
            Category::Primitive => self.primitives_dir.as_deref(),
        }
    }

    /// Change the eviction policy; already unused entries are not evicted until
    /// [`PartLibrary::evict_unused`] or the next release
    pub fn set_unlink_policy(&mut self, policy: UnlinkPolicy) {
        self.config.unlink_policy = policy;
    }

    /// Cached multipart for a filename
    pub fn find(&self, name: &str) -> Option<&ModelMultipart> {
        let id = self.index.get(&normalize_name(name))?;
        self.entry(*id).map(|e| &e.multipart)
    }

    /// Reference count of a cached filename
    pub fn refcount(&self, name: &str) -> Option<usize> {
        let id = self.index.get(&normalize_name(name))?;
        self.entry(*id).map(|e| e.refcount)
    }

    /// Category of a cached filename
    pub fn category(&self, name: &str) -> Option<Category> {
        let id = self.index.get(&normalize_name(name))?;
        self.entry(*id).map(|e| e.category)
    }

    /// Number of live cache entries
    pub fn entry_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn entry(&self, id: EntryId) -> Option<&CacheEntry> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Resolve every unresolved reference of a multipart
    ///
    /// Files loaded on the way are linked recursively before they enter the
    /// cache. Unresolvable references are logged and reported in
    /// [`LinkStats::unresolved`].
    ///
    /// # Errors
    ///
    /// Fails when a library file exists but cannot be read or parsed, or
    /// when the archive is corrupted.
    pub fn link(&mut self, multipart: &mut ModelMultipart) -> Result<LinkStats> {
        let mut stats = LinkStats::default();
        self.link_into(multipart, &mut stats)?;
        tracing::debug!(
            model = %multipart.main().name,
            resolved = stats.resolved,
            unresolved = stats.unresolved.len(),
            "linked"
        );
        Ok(stats)
    }

    fn link_into(&mut self, mm: &mut ModelMultipart, stats: &mut LinkStats) -> Result<()> {
        mm.link_submodels();
        let mut pending = Vec::new();
        for (mi, model) in mm.models().iter().enumerate() {
            for (ei, element) in model.elements.iter().enumerate() {
                if let Element::Reference(r) = element
                    && r.link == Link::Unresolved
                {
                    pending.push((mi, ei, r.filename.clone()));
                }
            }
        }

        for (mi, ei, filename) in pending {
            match self.resolve_reference(mm, &filename, stats)? {
                Some(link) => {
                    stats.resolved += 1;
                    if let Some(r) = mm
                        .model_mut(mi)
                        .and_then(|m| m.elements.get_mut(ei))
                        .and_then(Element::as_reference_mut)
                    {
                        r.link = link;
                    }
                }
                None => {
                    let model = mm.model(mi).map(|m| m.name.as_str()).unwrap_or_default();
                    tracing::warn!(file = %filename, model, "unresolved reference");
                    stats.unresolved.push(filename);
                }
            }
        }
        Ok(())
    }

    fn resolve_reference(
        &mut self,
        mm: &mut ModelMultipart,
        filename: &str,
        stats: &mut LinkStats,
    ) -> Result<Option<Link>> {
        let key = normalize_name(filename);
        if let Some(i) = mm.find_submodel_index(&key) {
            return Ok(Some(Link::Submodel(i)));
        }
        if let Some(i) = mm.find_external_index(&key) {
            return Ok(Some(Link::External(i)));
        }
        if self.loading.contains(&key) {
            tracing::warn!(file = %key, "library file references itself");
            return Ok(None);
        }

        if let Some(dir) = self.config.model_dir.clone()
            && let Some(i) = mm.load_external_model(filename, &dir)?
        {
            tracing::debug!(file = %key, dir = %dir.display(), "resolved as external model");
            self.loading.insert(key.clone());
            let linked = match mm.externals_mut().nth(i) {
                Some(external) => self.link_into(external, stats),
                None => Ok(()),
            };
            self.loading.remove(&key);
            linked?;
            return Ok(Some(Link::External(i)));
        }

        if let Some(&id) = self.index.get(&key) {
            if let Some(entry) = self.slots.get_mut(id.0).and_then(Option::as_mut) {
                entry.refcount += 1;
                tracing::debug!(file = %key, refcount = entry.refcount, "resolved from cache");
            }
            return Ok(Some(Link::Library(id)));
        }

        let Some((mut multipart, category)) = self.read_source(&key)? else {
            return Ok(None);
        };
        self.loading.insert(key.clone());
        let linked = self.link_into(&mut multipart, stats);
        self.loading.remove(&key);
        linked?;
        Ok(Some(Link::Library(self.insert_entry(key, multipart, category, 1))))
    }

    fn candidates(&self, key: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .config
            .primitive_variants
            .iter()
            .map(|v| format!("{}/{}", v, key))
            .collect();
        out.push(key.to_string());
        out
    }

    fn file_path(&self, key: &str) -> Option<(PathBuf, Category)> {
        self.candidates(key)
            .iter()
            .find_map(|c| self.primitives.get(c))
            .map(|p| (p.clone(), Category::Primitive))
            .or_else(|| self.parts.get(key).map(|p| (p.clone(), Category::Part)))
    }

    fn read_source(&mut self, key: &str) -> Result<Option<(ModelMultipart, Category)>> {
        if let Some((path, category)) = self.file_path(key) {
            tracing::debug!(file = %key, path = %path.display(), ?category, "resolved from directory");
            let reader = self.config.storage.open(&path)?;
            let mm = parser::load_from_stream(reader, key)?;
            return Ok(Some((mm, category)));
        }
        let mut names = vec![key.to_string()];
        names.extend(
            self.config
                .primitive_variants
                .iter()
                .map(|v| format!("{}/{}", v, key)),
        );
        if let Some(archive) = self.config.archive.as_mut() {
            for name in names {
                if let Some(found) = archive.load(&name)? {
                    tracing::debug!(file = %key, entry = %name, "resolved from archive");
                    return Ok(Some(found));
                }
            }
        }
        Ok(None)
    }

    fn insert_entry(
        &mut self,
        key: String,
        multipart: ModelMultipart,
        category: Category,
        refcount: usize,
    ) -> EntryId {
        let entry = CacheEntry {
            name: key.clone(),
            category,
            refcount,
            multipart,
        };
        // evicted slots have no live links left, so their ids can be reused
        let id = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                EntryId(slot)
            }
            None => {
                self.slots.push(Some(entry));
                EntryId(self.slots.len() - 1)
            }
        };
        self.index.insert(key, id);
        id
    }

    /// Release every library link of a multipart
    ///
    /// Links are reset to unresolved; entries reaching a zero count are
    /// evicted when the policy allows it. Returns the number of released
    /// references.
    pub fn unlink(&mut self, multipart: &mut ModelMultipart) -> usize {
        let mut released = 0;
        let mut ids = Vec::new();
        for model in multipart.models_mut() {
            for r in model.references_mut() {
                if let Link::Library(id) = r.link {
                    r.link = Link::Unresolved;
                    ids.push(id);
                }
            }
        }
        for id in ids {
            self.release(id);
            released += 1;
        }
        for external in multipart.externals_mut() {
            released += self.unlink(external);
        }
        released
    }

    fn release(&mut self, id: EntryId) {
        let Some(entry) = self.slots.get_mut(id.0).and_then(Option::as_mut) else {
            tracing::warn!(entry = id.0, "release of an evicted library entry");
            return;
        };
        entry.refcount = entry.refcount.saturating_sub(1);
        if entry.refcount == 0 && self.config.unlink_policy.evicts(entry.category) {
            self.evict(id);
        }
    }

    fn evict(&mut self, id: EntryId) {
        let Some(mut entry) = self.slots.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        self.index.remove(&entry.name);
        self.free.push(id.0);
        tracing::debug!(file = %entry.name, category = ?entry.category, "evicted");
        self.unlink(&mut entry.multipart);
    }

    /// Evict every zero-count entry the policy allows; returns how many went
    pub fn evict_unused(&mut self) -> usize {
        let before = self.entry_count();
        let unused: Vec<EntryId> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|e| (i, e)))
            .filter(|(_, e)| e.refcount == 0 && self.config.unlink_policy.evicts(e.category))
            .map(|(i, _)| EntryId(i))
            .collect();
        for id in unused {
            if self.entry(id).is_some_and(|e| e.refcount == 0) {
                self.evict(id);
            }
        }
        before - self.entry_count()
    }

    /// Load every archive entry reachable from a multipart into the cache
    ///
    /// Entries are read in archive order so the compressed stream is only
    /// walked forward. Preloaded entries start with a zero count. Names the
    /// directories or the multipart itself can satisfy are skipped. Returns
    /// the number of entries added.
    pub fn preload(&mut self, multipart: &ModelMultipart) -> Result<usize> {
        let Some(archive) = self.config.archive.as_ref() else {
            return Ok(0);
        };
        let mut queue: Vec<String> = multipart
            .all_references()
            .into_iter()
            .map(|r| normalize_name(&r.filename))
            .filter(|k| !multipart.contains(k))
            .collect();
        let mut seen = HashSet::new();
        let mut found: Vec<(u32, String, String)> = Vec::new();
        while let Some(key) = queue.pop() {
            if !seen.insert(key.clone()) {
                continue;
            }
            queue.extend(archive.dependencies(&key));
            if self.index.contains_key(&key) || self.file_path(&key).is_some() {
                continue;
            }
            let stored = std::iter::once(key.clone())
                .chain(
                    self.config
                        .primitive_variants
                        .iter()
                        .map(|v| format!("{}/{}", v, key)),
                )
                .find_map(|n| archive.offset(&n).map(|o| (o, n)));
            if let Some((offset, name)) = stored {
                found.push((offset, key, name));
            }
        }
        found.sort();

        let mut stats = LinkStats::default();
        let mut added = 0;
        for (_, key, name) in found {
            if self.index.contains_key(&key) {
                continue;
            }
            let loaded = match self.config.archive.as_mut() {
                Some(archive) => archive.load(&name)?,
                None => None,
            };
            let Some((mut mm, category)) = loaded else {
                continue;
            };
            self.loading.insert(key.clone());
            let linked = self.link_into(&mut mm, &mut stats);
            self.loading.remove(&key);
            linked?;
            self.insert_entry(key, mm, category, 0);
            added += 1;
        }
        tracing::debug!(added, "preloaded archive entries");
        Ok(added)
    }
}

impl ModelResolver for PartLibrary {
    fn resolve_entry(&self, id: EntryId) -> Option<&ModelMultipart> {
        self.entry(id).map(|e| &e.multipart)
    }
}

fn index_dir(
    storage: &dyn Storage,
    dir: &Path,
    prefix: &str,
    out: &mut HashMap<String, PathBuf>,
) -> Result<()> {
    for entry in storage.list_dir(dir)? {
        let lower = entry.name.to_lowercase();
        if entry.is_dir {
            let nested = format!("{}{}/", prefix, lower);
            index_dir(storage, &dir.join(&entry.name), &nested, out)?;
        } else if lower.ends_with(".dat") {
            out.insert(format!("{}{}", prefix, lower), dir.join(&entry.name));
        }
    }
    Ok(())
}
