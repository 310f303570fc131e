//! Per-model extension slots
//!
//! A model carries at most one value of each extension type. The caches are
//! derived data: they are filled on request and dropped whenever the element
//! list changes.

use nalgebra::{Point3, Vector3};

use super::bfc::BfcCertification;
use super::element::{Element, Vertex};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner
    pub min: Point3<f32>,
    /// Maximum corner
    pub max: Point3<f32>,
}

impl BoundingBox {
    /// An empty box that any point will grow
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// True when no point has been added
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    /// Grow to include `p`
    pub fn extend(&mut self, p: &Point3<f32>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Grow to include another box
    pub fn merge(&mut self, other: &BoundingBox) {
        if !other.is_empty() {
            self.extend(&other.min);
            self.extend(&other.max);
        }
    }

    /// Edge lengths
    pub fn size(&self) -> Vector3<f32> {
        if self.is_empty() {
            Vector3::zeros()
        } else {
            self.max - self.min
        }
    }

    /// Centre point
    pub fn center(&self) -> Point3<f32> {
        if self.is_empty() {
            Point3::origin()
        } else {
            nalgebra::center(&self.min, &self.max)
        }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

/// Face normal of a triangle or quadrilateral in declared vertex order
pub fn face_normal(vertices: &[Vertex]) -> Vector3<f32> {
    let n = match vertices {
        [a, b, c] => (b - a).cross(&(c - a)),
        [a, b, c, d] => (c - a).cross(&(d - b)),
        _ => return Vector3::zeros(),
    };
    n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros)
}

/// Face normals, one slot per element (zero for non-faces)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalCache {
    /// Normals indexed like the element list
    pub normals: Vec<Vector3<f32>>,
}

impl NormalCache {
    /// Compute normals for every face element
    pub fn build(elements: &[Element]) -> Self {
        let normals = elements
            .iter()
            .map(|e| match e {
                Element::Triangle(t) => face_normal(&t.vertices),
                Element::Quadrilateral(q) => face_normal(&q.vertices),
                _ => Vector3::zeros(),
            })
            .collect();
        Self { normals }
    }

    /// Normal of the element at `index`
    pub fn get(&self, index: usize) -> Option<&Vector3<f32>> {
        self.normals.get(index)
    }
}

/// Extension slots of a model
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelExtensions {
    /// BFC certification
    pub bfc: BfcCertification,
    /// Cached face normals
    pub normals: Option<NormalCache>,
    /// Cached bounding box of the model's own geometry
    pub bounding_box: Option<BoundingBox>,
}

impl ModelExtensions {
    /// Drop every derived cache
    pub fn invalidate(&mut self) {
        self.normals = None;
        self.bounding_box = None;
    }
}
