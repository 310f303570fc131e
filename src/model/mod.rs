//! Data structures representing LDraw models

mod bfc;
mod core;
mod element;
mod extension;

pub use bfc::{BfcCertification, BfcCommand, CertificationStatus, Winding};
pub use core::{Category, Model, ModelMultipart, ModelResolver, Scope};
pub use element::{
    ConditionalLine, Element, EntryId, Line, Link, Quadrilateral, Reference, StateMarker,
    Triangle, Vertex,
};
pub use extension::{BoundingBox, ModelExtensions, NormalCache, face_normal};
