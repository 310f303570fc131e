//! Model elements, one variant per line type of the text grammar

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

use super::bfc::BfcCommand;
use crate::color::Color;

/// A 3D position in model coordinates
pub type Vertex = Point3<f32>;

/// Stable handle of a cached library entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub usize);

/// Where a [`Reference`] currently points
///
/// Links never own the target. Submodel and external indices are relative to
/// the [`ModelMultipart`](super::ModelMultipart) that owns the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Link {
    /// Not resolved yet, or resolution failed
    #[default]
    Unresolved,
    /// Submodel of the owning multipart (index 0 is the main model)
    Submodel(usize),
    /// Main model of an externally loaded multipart owned by the same multipart
    External(usize),
    /// Shared part library cache entry
    Library(EntryId),
}

impl Link {
    /// True for anything but [`Link::Unresolved`]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Link::Unresolved)
    }
}

/// `0 STEP` and friends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateMarker {
    /// `0 STEP`
    Step,
    /// `0 PAUSE`
    Pause,
    /// `0 CLEAR`
    Clear,
    /// `0 SAVE`
    Save,
}

impl StateMarker {
    /// Keyword as written in the text grammar
    pub fn as_str(&self) -> &'static str {
        match self {
            StateMarker::Step => "STEP",
            StateMarker::Pause => "PAUSE",
            StateMarker::Clear => "CLEAR",
            StateMarker::Save => "SAVE",
        }
    }
}

/// Placement of another model (line type 1)
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Colour applied to the placed model's main-colour geometry
    pub color: Color,
    /// Translation
    pub position: Vector3<f32>,
    /// Linear part of the transform, row-major as written in the file
    pub matrix: Matrix3<f32>,
    /// File name as written in the source
    pub filename: String,
    /// Resolution state
    pub link: Link,
}

impl Reference {
    /// Unresolved reference with an identity transform
    pub fn new(color: Color, filename: impl Into<String>) -> Self {
        Self {
            color,
            position: Vector3::zeros(),
            matrix: Matrix3::identity(),
            filename: filename.into(),
            link: Link::Unresolved,
        }
    }

    /// Set the translation
    pub fn with_position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.position = Vector3::new(x, y, z);
        self
    }

    /// Set the linear part of the transform
    pub fn with_matrix(mut self, matrix: Matrix3<f32>) -> Self {
        self.matrix = matrix;
        self
    }

    /// Full affine transform
    pub fn transform(&self) -> Matrix4<f32> {
        let mut m = self.matrix.to_homogeneous();
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.position);
        m
    }

    /// True when the transform mirrors geometry
    pub fn is_mirroring(&self) -> bool {
        crate::utils::det3(&self.matrix) < 0.0
    }
}

/// Line segment (line type 2)
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Colour
    pub color: Color,
    /// End points
    pub vertices: [Vertex; 2],
}

/// Triangle (line type 3)
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    /// Colour
    pub color: Color,
    /// Corners in declared order
    pub vertices: [Vertex; 3],
}

/// Quadrilateral (line type 4)
#[derive(Debug, Clone, PartialEq)]
pub struct Quadrilateral {
    /// Colour
    pub color: Color,
    /// Corners in declared order
    pub vertices: [Vertex; 4],
}

/// Conditional line (line type 5), drawn only when both control points lie on the same side
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalLine {
    /// Colour
    pub color: Color,
    /// End points
    pub vertices: [Vertex; 2],
    /// Control points
    pub controls: [Vertex; 2],
}

/// One line of a model
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Unrecognised `0` line, text after the `0`
    Comment(String),
    /// `0 STEP|PAUSE|CLEAR|SAVE`
    State(StateMarker),
    /// `0 PRINT|WRITE text`
    Print(String),
    /// Line type 1
    Reference(Reference),
    /// Line type 2
    Line(Line),
    /// Line type 3
    Triangle(Triangle),
    /// Line type 4
    Quadrilateral(Quadrilateral),
    /// Line type 5
    ConditionalLine(ConditionalLine),
    /// `0 BFC ...`
    Bfc(BfcCommand),
}

impl Element {
    /// Line type number in the text grammar
    pub fn line_type(&self) -> u8 {
        match self {
            Element::Comment(_) | Element::State(_) | Element::Print(_) | Element::Bfc(_) => 0,
            Element::Reference(_) => 1,
            Element::Line(_) => 2,
            Element::Triangle(_) => 3,
            Element::Quadrilateral(_) => 4,
            Element::ConditionalLine(_) => 5,
        }
    }

    /// Colour of geometric elements and references
    pub fn color(&self) -> Option<Color> {
        match self {
            Element::Reference(r) => Some(r.color),
            Element::Line(l) => Some(l.color),
            Element::Triangle(t) => Some(t.color),
            Element::Quadrilateral(q) => Some(q.color),
            Element::ConditionalLine(c) => Some(c.color),
            _ => None,
        }
    }

    /// The reference payload, if this is a reference
    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Element::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Mutable reference payload
    pub fn as_reference_mut(&mut self) -> Option<&mut Reference> {
        match self {
            Element::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Points drawn by this element, control points excluded
    pub fn vertices(&self) -> &[Vertex] {
        match self {
            Element::Line(l) => &l.vertices,
            Element::Triangle(t) => &t.vertices,
            Element::Quadrilateral(q) => &q.vertices,
            Element::ConditionalLine(c) => &c.vertices,
            _ => &[],
        }
    }
}

impl From<Reference> for Element {
    fn from(r: Reference) -> Self {
        Element::Reference(r)
    }
}

impl From<Line> for Element {
    fn from(l: Line) -> Self {
        Element::Line(l)
    }
}

impl From<Triangle> for Element {
    fn from(t: Triangle) -> Self {
        Element::Triangle(t)
    }
}

impl From<Quadrilateral> for Element {
    fn from(q: Quadrilateral) -> Self {
        Element::Quadrilateral(q)
    }
}

impl From<ConditionalLine> for Element {
    fn from(c: ConditionalLine) -> Self {
        Element::ConditionalLine(c)
    }
}

impl From<BfcCommand> for Element {
    fn from(c: BfcCommand) -> Self {
        Element::Bfc(c)
    }
}
