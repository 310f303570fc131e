//! Models and multipart containers

use std::collections::BTreeMap;
use std::path::Path;

use super::bfc::BfcCertification;
use super::element::{Element, EntryId, Link, Reference};
use super::extension::{BoundingBox, ModelExtensions, NormalCache};
use crate::error::Result;
use crate::utils::normalize_name;

/// Library category of a cached model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// A complete part (`parts/`)
    Part,
    /// A primitive (`p/`)
    Primitive,
}

/// An ordered list of elements plus metadata
///
/// # Example
///
/// ```
/// use libldr::{Color, Element, Model, Reference};
///
/// let mut model = Model::with_name("car.ldr");
/// model.insert_element(Reference::new(Color::new(4), "3001.dat").into());
/// model.set_header("LICENSE", "CC BY 4.0");
/// assert_eq!(model.elements.len(), 1);
/// assert_eq!(model.header("license"), Some("CC BY 4.0"));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    /// First free-text header line
    pub description: String,
    /// `0 Name:` value
    pub name: String,
    /// `0 Author:` value
    pub author: String,
    /// `0 !KEY value` headers, in file order; keys may repeat
    pub headers: Vec<(String, String)>,
    /// Elements in file order
    pub elements: Vec<Element>,
    /// Extension slots
    pub extensions: ModelExtensions,
    null: bool,
}

impl Model {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty model with a name
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append an element
    pub fn insert_element(&mut self, element: Element) {
        self.elements.push(element);
        self.extensions.invalidate();
    }

    /// Insert an element before `position`; past-the-end positions append
    pub fn insert_element_at(&mut self, element: Element, position: usize) {
        let position = position.min(self.elements.len());
        self.elements.insert(position, element);
        self.extensions.invalidate();
    }

    /// Remove and return the element at `position`
    pub fn delete_element(&mut self, position: usize) -> Option<Element> {
        if position >= self.elements.len() {
            return None;
        }
        self.extensions.invalidate();
        Some(self.elements.remove(position))
    }

    /// Add a header value; existing values for the key are kept
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.push((key.into(), value.into()));
    }

    /// First value for a key, compared case-insensitively
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for a key, in file order
    pub fn headers_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Remove every value for a key, returning how many were removed
    pub fn remove_header(&mut self, key: &str) -> usize {
        let before = self.headers.len();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
        before - self.headers.len()
    }

    /// BFC certification
    pub fn bfc(&self) -> BfcCertification {
        self.extensions.bfc
    }

    /// Set the BFC certification
    pub fn set_bfc(&mut self, bfc: BfcCertification) {
        self.extensions.bfc = bfc;
    }

    /// Drop every element and all metadata and mark the model null
    pub fn clear(&mut self) {
        *self = Self {
            null: true,
            ..Self::default()
        };
    }

    /// True after [`Model::clear`]
    pub fn is_null(&self) -> bool {
        self.null
    }

    /// References in element order
    pub fn references(&self) -> impl Iterator<Item = &Reference> {
        self.elements.iter().filter_map(Element::as_reference)
    }

    /// Mutable references in element order
    pub fn references_mut(&mut self) -> impl Iterator<Item = &mut Reference> {
        self.elements.iter_mut().filter_map(Element::as_reference_mut)
    }

    /// Recompute the face normal cache
    pub fn update_normals(&mut self) {
        self.extensions.normals = Some(NormalCache::build(&self.elements));
    }

    /// Cached face normals, if computed and still current
    pub fn normals(&self) -> Option<&NormalCache> {
        self.extensions
            .normals
            .as_ref()
            .filter(|n| n.normals.len() == self.elements.len())
    }

    /// Recompute the bounding box of this model's own geometry, references excluded
    pub fn update_bounding_box(&mut self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        for e in &self.elements {
            for v in e.vertices() {
                bbox.extend(v);
            }
        }
        self.extensions.bounding_box = Some(bbox);
        bbox
    }

    /// Cached bounding box, if computed
    pub fn bounding_box(&self) -> Option<&BoundingBox> {
        self.extensions.bounding_box.as_ref()
    }
}

/// Lookup of shared library entries, implemented by the part library
pub trait ModelResolver {
    /// Multipart stored under a cache entry
    fn resolve_entry(&self, id: EntryId) -> Option<&ModelMultipart>;
}

/// Resolution context of a model: its owning multipart and the library
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    /// Multipart that owns the model being walked
    pub multipart: &'a ModelMultipart,
    /// Library used for [`Link::Library`] links
    pub resolver: Option<&'a dyn ModelResolver>,
}

impl<'a> Scope<'a> {
    /// Scope rooted at a multipart
    pub fn new(multipart: &'a ModelMultipart, resolver: Option<&'a dyn ModelResolver>) -> Self {
        Self {
            multipart,
            resolver,
        }
    }

    /// Follow a link to its model and the scope that model lives in
    pub fn resolve(&self, link: Link) -> Option<(&'a Model, Scope<'a>)> {
        match link {
            Link::Unresolved => None,
            Link::Submodel(i) => self.multipart.model(i).map(|m| (m, *self)),
            Link::External(i) => self
                .multipart
                .externals
                .get(i)
                .map(|(_, mm)| (mm.main(), Scope::new(mm, self.resolver))),
            Link::Library(id) => {
                let mm = self.resolver?.resolve_entry(id)?;
                Some((mm.main(), Scope::new(mm, self.resolver)))
            }
        }
    }
}

impl std::fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("main", &self.multipart.main().name)
            .field("has_resolver", &self.resolver.is_some())
            .finish()
    }
}

/// A main model with its submodels and externally loaded models
///
/// Index 0 is the main model; submodels follow in file order. Submodel and
/// external names are stored normalised.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMultipart {
    models: Vec<Model>,
    names: BTreeMap<String, usize>,
    externals: Vec<(String, ModelMultipart)>,
}

impl Default for ModelMultipart {
    fn default() -> Self {
        Self::new(Model::new())
    }
}

impl ModelMultipart {
    /// Wrap a main model
    pub fn new(main: Model) -> Self {
        Self {
            models: vec![main],
            names: BTreeMap::new(),
            externals: Vec::new(),
        }
    }

    /// The main model
    pub fn main(&self) -> &Model {
        &self.models[0]
    }

    /// The main model, mutably
    pub fn main_mut(&mut self) -> &mut Model {
        &mut self.models[0]
    }

    /// Model by index (0 is main)
    pub fn model(&self, index: usize) -> Option<&Model> {
        self.models.get(index)
    }

    /// Model by index, mutably
    pub fn model_mut(&mut self, index: usize) -> Option<&mut Model> {
        self.models.get_mut(index)
    }

    /// Main model followed by every submodel
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    /// Main model followed by every submodel, mutably
    pub fn models_mut(&mut self) -> &mut [Model] {
        &mut self.models
    }

    /// Number of submodels
    pub fn submodel_count(&self) -> usize {
        self.models.len() - 1
    }

    /// Submodels with their normalised names, in file order
    pub fn submodels(&self) -> impl Iterator<Item = (&str, &Model)> {
        let mut by_index: Vec<(&str, usize)> =
            self.names.iter().map(|(k, &i)| (k.as_str(), i)).collect();
        by_index.sort_by_key(|&(_, i)| i);
        by_index.into_iter().map(|(k, i)| (k, &self.models[i]))
    }

    /// Normalised name of the model at `index`, if it is a submodel
    pub fn submodel_name(&self, index: usize) -> Option<&str> {
        self.names
            .iter()
            .find(|&(_, &i)| i == index)
            .map(|(k, _)| k.as_str())
    }

    /// Index of a submodel
    pub fn find_submodel_index(&self, name: &str) -> Option<usize> {
        self.names.get(&normalize_name(name)).copied()
    }

    /// Submodel by name
    pub fn find_submodel(&self, name: &str) -> Option<&Model> {
        self.find_submodel_index(name).map(|i| &self.models[i])
    }

    /// Submodel by name, mutably
    pub fn find_submodel_mut(&mut self, name: &str) -> Option<&mut Model> {
        let i = self.find_submodel_index(name)?;
        self.models.get_mut(i)
    }

    /// Add a submodel under `name`
    ///
    /// Returns false, keeping the existing submodel, when the name is empty or
    /// already taken.
    pub fn insert_submodel(&mut self, model: Model, name: &str) -> bool {
        let key = normalize_name(name);
        if key.is_empty() {
            tracing::warn!("refusing to insert a submodel with an empty name");
            return false;
        }
        if self.names.contains_key(&key) {
            tracing::warn!(submodel = %key, "duplicate submodel, keeping the first definition");
            return false;
        }
        self.models.push(model);
        self.names.insert(key, self.models.len() - 1);
        true
    }

    fn is_referenced(&self, key: &str, link_matches: impl Fn(Link) -> bool) -> bool {
        let in_models = self.models.iter().any(|m| {
            m.references()
                .any(|r| link_matches(r.link) || normalize_name(&r.filename) == key)
        });
        in_models
            || self
                .externals
                .iter()
                .flat_map(|(_, mm)| mm.models.iter())
                .any(|m| m.references().any(|r| normalize_name(&r.filename) == key))
    }

    /// Remove a submodel that no model references any more
    ///
    /// Returns false when the submodel does not exist or is still referenced.
    pub fn remove_submodel(&mut self, name: &str) -> bool {
        let key = normalize_name(name);
        let Some(index) = self.names.get(&key).copied() else {
            return false;
        };
        if self.is_referenced(&key, |l| l == Link::Submodel(index)) {
            tracing::warn!(submodel = %key, "submodel is still referenced, not removing");
            return false;
        }
        self.models.remove(index);
        self.names.remove(&key);
        for i in self.names.values_mut() {
            if *i > index {
                *i -= 1;
            }
        }
        for r in self.models.iter_mut().flat_map(Model::references_mut) {
            if let Link::Submodel(i) = r.link
                && i > index
            {
                r.link = Link::Submodel(i - 1);
            }
        }
        true
    }

    /// Rename a submodel and rewrite every reference to it
    ///
    /// Returns false when `old` does not exist or `new` is already taken.
    pub fn rename_submodel(&mut self, old: &str, new: &str) -> bool {
        let old_key = normalize_name(old);
        let new_key = normalize_name(new);
        if new_key.is_empty() || self.names.contains_key(&new_key) {
            return false;
        }
        let Some(index) = self.names.remove(&old_key) else {
            return false;
        };
        self.names.insert(new_key, index);
        self.models[index].name = new.to_string();
        for r in self.models.iter_mut().flat_map(Model::references_mut) {
            if normalize_name(&r.filename) == old_key {
                r.filename = new.to_string();
            }
        }
        true
    }

    /// Point every reference whose filename names a submodel at that submodel
    ///
    /// Purely local; library links are left untouched.
    pub fn link_submodels(&mut self) {
        let names = &self.names;
        for r in self.models.iter_mut().flat_map(Model::references_mut) {
            if matches!(r.link, Link::Unresolved | Link::Submodel(_))
                && let Some(&i) = names.get(&normalize_name(&r.filename))
            {
                r.link = Link::Submodel(i);
            }
        }
    }

    /// True when the reference graph over this multipart's own submodels has a cycle
    pub fn cyclic_reference_test(&self) -> bool {
        crate::validator::find_cycle(self).is_some()
    }

    /// Fail with [`Error::CyclicReference`](crate::Error::CyclicReference) on a cycle
    pub fn validate(&self) -> Result<()> {
        crate::validator::validate_multipart(self, "ModelMultipart::validate")
    }

    /// Externally loaded models with their normalised names
    pub fn externals(&self) -> impl Iterator<Item = (&str, &ModelMultipart)> {
        self.externals.iter().map(|(k, mm)| (k.as_str(), mm))
    }

    /// Externally loaded models, mutably
    pub fn externals_mut(&mut self) -> impl Iterator<Item = &mut ModelMultipart> {
        self.externals.iter_mut().map(|(_, mm)| mm)
    }

    /// Index of an external model
    pub fn find_external_index(&self, name: &str) -> Option<usize> {
        let key = normalize_name(name);
        self.externals.iter().position(|(k, _)| *k == key)
    }

    /// External model by name
    pub fn find_external_model(&self, name: &str) -> Option<&ModelMultipart> {
        self.find_external_index(name).map(|i| &self.externals[i].1)
    }

    /// Add an external model; returns its index, or the existing index if the name is taken
    pub fn insert_external_model(&mut self, name: &str, model: ModelMultipart) -> usize {
        if let Some(i) = self.find_external_index(name) {
            tracing::warn!(external = %normalize_name(name), "external model already loaded");
            return i;
        }
        self.externals.push((normalize_name(name), model));
        self.externals.len() - 1
    }

    /// Load `name` from `dir` with the text reader and keep it as an external model
    ///
    /// Returns `Ok(None)` when no such file exists in `dir`.
    pub fn load_external_model(&mut self, name: &str, dir: &Path) -> Result<Option<usize>> {
        if let Some(i) = self.find_external_index(name) {
            return Ok(Some(i));
        }
        let path = dir.join(name.replace('\\', "/"));
        if !path.is_file() {
            return Ok(None);
        }
        let mm = crate::parser::load_from_file(&path)?;
        Ok(Some(self.insert_external_model(name, mm)))
    }

    /// Drop an external model no reference points at
    pub fn remove_external_model(&mut self, name: &str) -> bool {
        let Some(index) = self.find_external_index(name) else {
            return false;
        };
        let referenced = self
            .models
            .iter()
            .flat_map(Model::references)
            .any(|r| r.link == Link::External(index));
        if referenced {
            tracing::warn!(external = %normalize_name(name), "external model is still referenced");
            return false;
        }
        self.externals.remove(index);
        for r in self.models.iter_mut().flat_map(Model::references_mut) {
            if let Link::External(i) = r.link
                && i > index
            {
                r.link = Link::External(i - 1);
            }
        }
        true
    }

    /// True when `name` is a submodel or an external model
    pub fn contains(&self, name: &str) -> bool {
        self.find_submodel_index(name).is_some() || self.find_external_index(name).is_some()
    }

    /// Clear the main model and drop every submodel and external model
    pub fn clear(&mut self) {
        self.models.truncate(1);
        self.models[0].clear();
        self.names.clear();
        self.externals.clear();
    }

    /// Every reference of every model, including external ones
    pub fn all_references(&self) -> Vec<&Reference> {
        let mut out: Vec<&Reference> = self.models.iter().flat_map(Model::references).collect();
        for (_, mm) in &self.externals {
            out.extend(mm.all_references());
        }
        out
    }
}
