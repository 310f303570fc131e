//! Flattening of a linked model tree into renderable buffers
//!
//! [`GeometryExporter`] walks a model depth first, composing reference
//! transforms, and writes four independent buffers: lines, triangles,
//! quadrilaterals and conditional lines. Triangles and quads are emitted with
//! a consistent front-face winding whatever mirroring happened on the way.
//!
//! Main (16) and edge (24) colours that are still unresolved at the root are
//! stored as sentinels; [`GeometryExporter::get_precolored_array`] substitutes
//! a concrete colour on request.

mod bfc;

pub use bfc::{BfcState, ExportContext};

use std::collections::HashMap;

use nalgebra::{Matrix4, Point3, Vector3, Vector4};

use crate::color::Color;
use crate::model::{
    BfcCommand, BoundingBox, Element, Model, ModelMultipart, ModelResolver, Scope, face_normal,
};
use crate::utils::is_stud;

/// Colour value stored for main colour without a context
pub const INHERIT_SENTINEL: f32 = -1.0;
/// Colour value stored for edge colour without a context
pub const COMPLEMENT_SENTINEL: f32 = -2.0;
/// Colour index stored for main colour without a context
pub const INHERIT_INDEX: u32 = 0xFFFF_FFFF;
/// Colour index stored for edge colour without a context
pub const COMPLEMENT_INDEX: u32 = 0xFEFE_FEFE;

const MAX_DEPTH: usize = 64;

/// How stud primitives are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StudMode {
    /// Full geometry
    #[default]
    Regular,
    /// A two-segment vertical line
    Line,
    /// An eight-segment square outline on the stud top
    Square,
}

/// One of the four output buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    /// Line segments, two vertices each
    Lines = 0,
    /// Triangles, three vertices each
    Triangles = 1,
    /// Quadrilaterals, four vertices each
    Quads = 2,
    /// Conditional lines, two vertices each
    CondLines = 3,
}

impl BufferType {
    /// Every buffer type in storage order
    pub const ALL: [BufferType; 4] = [
        BufferType::Lines,
        BufferType::Triangles,
        BufferType::Quads,
        BufferType::CondLines,
    ];

    /// Vertices per primitive
    pub fn vertices_per_primitive(self) -> usize {
        match self {
            BufferType::Lines | BufferType::CondLines => 2,
            BufferType::Triangles => 3,
            BufferType::Quads => 4,
        }
    }
}

/// Export parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ExportParams {
    /// Inline referenced models; when off only the model's own geometry is exported
    pub collapse_subfiles: bool,
    /// Stud short-circuit
    pub stud_mode: StudMode,
    /// Transform applied at the root
    pub root_transform: Matrix4<f32>,
}

impl Default for ExportParams {
    fn default() -> Self {
        Self {
            collapse_subfiles: true,
            stud_mode: StudMode::Regular,
            // LDraw's y axis points down
            root_transform: Matrix4::from_diagonal(&Vector4::new(1.0, -1.0, 1.0, 1.0)),
        }
    }
}

impl ExportParams {
    /// Default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Set subfile collapsing
    pub fn with_collapse_subfiles(mut self, collapse: bool) -> Self {
        self.collapse_subfiles = collapse;
        self
    }

    /// Set the stud mode
    pub fn with_stud_mode(mut self, mode: StudMode) -> Self {
        self.stud_mode = mode;
        self
    }

    /// Set the root transform
    pub fn with_root_transform(mut self, transform: Matrix4<f32>) -> Self {
        self.root_transform = transform;
        self
    }
}

/// Flat arrays of one primitive type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryBuffer {
    /// Positions, xyz per vertex
    pub vertices: Vec<f32>,
    /// Colours, rgba per vertex; sentinels when ambiguous
    pub colors: Vec<f32>,
    /// Packed rgba per primitive, for grouping by material
    pub color_index: Vec<u32>,
    /// Normals, xyz per vertex (triangles and quads)
    pub normals: Vec<f32>,
    /// Control points, two xyz per conditional line
    pub controls: Vec<f32>,
}

impl GeometryBuffer {
    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    fn clear(&mut self) {
        *self = Self::default();
    }

    fn byte_size(&self) -> usize {
        (self.vertices.len() + self.colors.len() + self.normals.len() + self.controls.len())
            * std::mem::size_of::<f32>()
            + self.color_index.len() * std::mem::size_of::<u32>()
    }

    fn push_point(&mut self, p: &Point3<f32>) {
        self.vertices.extend_from_slice(&[p.x, p.y, p.z]);
    }
}

/// Resolved colour of one primitive
#[derive(Debug, Clone, Copy)]
enum Paint {
    Rgba([f32; 4], u32),
    Inherit,
    Complement,
}

impl Paint {
    fn resolve(color: Color, top: Color) -> Self {
        let literal = |c: Color, complement: bool| {
            let e = c.entity();
            if complement {
                Paint::Rgba(e.complement_f32(), e.packed_complement())
            } else {
                Paint::Rgba(e.rgba_f32(), e.packed_rgba())
            }
        };
        if color.is_main() {
            if top.is_main() {
                Paint::Inherit
            } else {
                literal(top, false)
            }
        } else if color.is_edge() {
            if top.is_main() || top.is_edge() {
                Paint::Complement
            } else {
                literal(top, true)
            }
        } else {
            literal(color, false)
        }
    }

    fn values(self) -> ([f32; 4], u32) {
        match self {
            Paint::Rgba(rgba, index) => (rgba, index),
            Paint::Inherit => ([INHERIT_SENTINEL; 4], INHERIT_INDEX),
            Paint::Complement => ([COMPLEMENT_SENTINEL; 4], COMPLEMENT_INDEX),
        }
    }
}

/// Flattens a model tree into per-primitive-type buffers
///
/// # Example
///
/// ```
/// use libldr::export::{BufferType, ExportParams, GeometryExporter};
/// use libldr::model::Scope;
/// use libldr::parser::load_from_str;
///
/// let mm = load_from_str("3 4 0 0 0 1 0 0 0 0 1\n", "tri.dat").unwrap();
/// let exporter = GeometryExporter::new(Scope::new(&mm, None), mm.main(), ExportParams::new());
/// assert_eq!(exporter.count(BufferType::Triangles), 3);
/// assert!(!exporter.is_color_ambiguous());
/// ```
#[derive(Debug)]
pub struct GeometryExporter<'a> {
    scope: Scope<'a>,
    model: &'a Model,
    params: ExportParams,
    buffers: [GeometryBuffer; 4],
    ambiguous: bool,
    forks: HashMap<Color, [Vec<f32>; 4]>,
    bbox: BoundingBox,
    built: bool,
}

impl<'a> GeometryExporter<'a> {
    /// Export `model`, resolving its references through `scope`
    pub fn new(scope: Scope<'a>, model: &'a Model, params: ExportParams) -> Self {
        let mut exporter = Self {
            scope,
            model,
            params,
            buffers: Default::default(),
            ambiguous: false,
            forks: HashMap::new(),
            bbox: BoundingBox::empty(),
            built: false,
        };
        exporter.update();
        exporter
    }

    /// Export the main model of a multipart
    pub fn for_multipart(
        multipart: &'a ModelMultipart,
        resolver: Option<&'a dyn ModelResolver>,
        params: ExportParams,
    ) -> Self {
        Self::new(Scope::new(multipart, resolver), multipart.main(), params)
    }

    /// Parameters of the last build
    pub fn params(&self) -> &ExportParams {
        &self.params
    }

    /// True when `params` would produce different buffers
    pub fn is_update_required(&self, params: &ExportParams) -> bool {
        *params != self.params
    }

    /// Rebuild with new parameters
    pub fn update_with(&mut self, params: ExportParams) {
        self.params = params;
        self.update();
    }

    /// Rebuild every buffer, dropping forked colour arrays
    pub fn update(&mut self) {
        for b in &mut self.buffers {
            b.clear();
        }
        self.forks.clear();
        self.bbox = BoundingBox::empty();
        self.ambiguous = self.scan_ambiguous(self.model, self.scope, 0);

        let ctx = ExportContext::root(self.params.root_transform);
        self.fill(self.model, self.scope, &ctx, 0);
        self.built = self.buffers.iter().any(|b| !b.vertices.is_empty());
        tracing::debug!(
            model = %self.model.name,
            lines = self.count(BufferType::Lines),
            triangles = self.count(BufferType::Triangles),
            quads = self.count(BufferType::Quads),
            condlines = self.count(BufferType::CondLines),
            ambiguous = self.ambiguous,
            "exported geometry"
        );
    }

    /// True when nothing was exported
    pub fn is_null(&self) -> bool {
        !self.built
    }

    /// Number of vertices in a buffer
    pub fn count(&self, ty: BufferType) -> usize {
        self.buffers[ty as usize].vertex_count()
    }

    /// Whole buffer of one type
    pub fn buffer(&self, ty: BufferType) -> &GeometryBuffer {
        &self.buffers[ty as usize]
    }

    /// Vertex positions
    pub fn vertex_array(&self, ty: BufferType) -> &[f32] {
        &self.buffers[ty as usize].vertices
    }

    /// Per-vertex normals; `None` for line buffers
    pub fn normal_array(&self, ty: BufferType) -> Option<&[f32]> {
        match ty {
            BufferType::Triangles | BufferType::Quads => Some(&self.buffers[ty as usize].normals),
            _ => None,
        }
    }

    /// Per-primitive packed colours
    pub fn color_index(&self, ty: BufferType) -> &[u32] {
        &self.buffers[ty as usize].color_index
    }

    /// Control points of the conditional lines
    pub fn condline_controls(&self) -> &[f32] {
        &self.buffers[BufferType::CondLines as usize].controls
    }

    /// True when some exported geometry uses main or edge colour
    pub fn is_color_ambiguous(&self) -> bool {
        self.ambiguous
    }

    /// Base colour array, with sentinels when ambiguous
    pub fn get_color_array(&self, ty: BufferType) -> &[f32] {
        &self.buffers[ty as usize].colors
    }

    /// Colour array with sentinels replaced by `color` and its complement
    ///
    /// Returns the base array itself when the export is not ambiguous;
    /// otherwise forks every buffer once per requested colour and keeps the
    /// copies until the next update.
    pub fn get_precolored_array(&mut self, ty: BufferType, color: Color) -> &[f32] {
        if !self.ambiguous {
            return &self.buffers[ty as usize].colors;
        }
        let buffers = &self.buffers;
        let fork = self.forks.entry(color).or_insert_with(|| {
            let entity = color.entity();
            let (rgba, complement) = (entity.rgba_f32(), entity.complement_f32());
            std::array::from_fn(|i| {
                buffers[i]
                    .colors
                    .chunks_exact(4)
                    .flat_map(|c| {
                        if c[0] < -1.0 {
                            complement
                        } else if c[0] < 0.0 {
                            rgba
                        } else {
                            [c[0], c[1], c[2], c[3]]
                        }
                    })
                    .collect()
            })
        });
        &fork[ty as usize]
    }

    /// Bounding box of every exported vertex
    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Bytes held by the buffers and forked colour arrays
    pub fn memory_usage(&self) -> usize {
        let forks: usize = self
            .forks
            .values()
            .flat_map(|f| f.iter())
            .map(|v| v.len() * std::mem::size_of::<f32>())
            .sum();
        self.buffers.iter().map(GeometryBuffer::byte_size).sum::<usize>() + forks
    }

    fn scan_ambiguous(&self, model: &Model, scope: Scope<'a>, depth: usize) -> bool {
        if depth > MAX_DEPTH {
            return false;
        }
        model.elements.iter().any(|e| match e {
            Element::Reference(r) if self.params.collapse_subfiles => {
                if is_stud(&r.filename) && self.params.stud_mode != StudMode::Regular {
                    // synthetic studs are edge coloured
                    return scope.resolve(r.link).is_some();
                }
                scope
                    .resolve(r.link)
                    .is_some_and(|(m, s)| self.scan_ambiguous(m, s, depth + 1))
            }
            Element::Line(_)
            | Element::Triangle(_)
            | Element::Quadrilateral(_)
            | Element::ConditionalLine(_) => e
                .color()
                .is_some_and(|c| c.is_main() || c.is_edge()),
            _ => false,
        })
    }

    fn fill(&mut self, model: &'a Model, scope: Scope<'a>, ctx: &ExportContext, depth: usize) {
        if depth > MAX_DEPTH {
            tracing::warn!(model = %model.name, "export depth limit reached");
            return;
        }
        let normals = model.normals();
        let normal_matrix = ctx.normal_matrix();
        let mut winding = model.bfc().winding;
        let mut invert_next = false;

        for (i, element) in model.elements.iter().enumerate() {
            match element {
                Element::Line(l) => {
                    self.emit(BufferType::Lines, ctx, l.color, &l.vertices, None);
                }
                Element::ConditionalLine(c) => {
                    self.emit(BufferType::CondLines, ctx, c.color, &c.vertices, None);
                    let buf = &mut self.buffers[BufferType::CondLines as usize];
                    for p in &c.controls {
                        let p = ctx.transform.transform_point(p);
                        buf.controls.extend_from_slice(&[p.x, p.y, p.z]);
                    }
                }
                Element::Triangle(_) | Element::Quadrilateral(_) => {
                    let ty = if matches!(element, Element::Triangle(_)) {
                        BufferType::Triangles
                    } else {
                        BufferType::Quads
                    };
                    let declared = element.vertices();
                    let n = normals
                        .and_then(|c| c.get(i).copied())
                        .unwrap_or_else(|| face_normal(declared));
                    let reverse = ctx.bfc.effective_cw(winding);
                    let mut n = (normal_matrix * n).try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros);
                    let mut points = declared.to_vec();
                    if reverse {
                        points.reverse();
                        n = -n;
                    }
                    let color = element.color().unwrap_or(Color::MAIN);
                    self.emit(ty, ctx, color, &points, Some(n));
                }
                Element::Reference(r) => {
                    let pending = std::mem::take(&mut invert_next);
                    if !self.params.collapse_subfiles {
                        continue;
                    }
                    let Some((child, child_scope)) = scope.resolve(r.link) else {
                        tracing::trace!(file = %r.filename, "skipping unresolved reference");
                        continue;
                    };
                    let child_ctx = ctx.enter(r, pending);
                    if is_stud(&r.filename) && self.params.stud_mode != StudMode::Regular {
                        self.emit_stud(&child_ctx);
                    } else {
                        self.fill(child, child_scope, &child_ctx, depth + 1);
                    }
                }
                Element::Bfc(cmd) => {
                    if let Some(w) = cmd.winding() {
                        winding = w;
                    }
                    if *cmd == BfcCommand::InvertNext {
                        invert_next = true;
                    }
                }
                Element::Comment(_) | Element::State(_) | Element::Print(_) => {}
            }
        }
    }

    fn emit(
        &mut self,
        ty: BufferType,
        ctx: &ExportContext,
        color: Color,
        points: &[Point3<f32>],
        normal: Option<Vector3<f32>>,
    ) {
        let (rgba, index) = Paint::resolve(color, ctx.top()).values();
        let buf = &mut self.buffers[ty as usize];
        for p in points {
            let p = ctx.transform.transform_point(p);
            self.bbox.extend(&p);
            buf.push_point(&p);
            buf.colors.extend_from_slice(&rgba);
            if let Some(n) = normal {
                buf.normals.extend_from_slice(&[n.x, n.y, n.z]);
            }
        }
        buf.color_index.push(index);
    }

    fn emit_stud(&mut self, ctx: &ExportContext) {
        match self.params.stud_mode {
            StudMode::Square => {
                let corners = [
                    Point3::new(-6.0, -4.0, -6.0),
                    Point3::new(6.0, -4.0, -6.0),
                    Point3::new(6.0, -4.0, 6.0),
                    Point3::new(-6.0, -4.0, 6.0),
                ];
                for k in 0..4 {
                    let (a, b) = (corners[k], corners[(k + 1) % 4]);
                    let mid = nalgebra::center(&a, &b);
                    self.emit(BufferType::Lines, ctx, Color::EDGE, &[a, mid], None);
                    self.emit(BufferType::Lines, ctx, Color::EDGE, &[mid, b], None);
                }
            }
            StudMode::Line => {
                let (a, b, c) = (
                    Point3::origin(),
                    Point3::new(0.0, -2.0, 0.0),
                    Point3::new(0.0, -4.0, 0.0),
                );
                self.emit(BufferType::Lines, ctx, Color::EDGE, &[a, b], None);
                self.emit(BufferType::Lines, ctx, Color::EDGE, &[b, c], None);
            }
            StudMode::Regular => {}
        }
    }
}
