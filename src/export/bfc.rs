//! Winding and colour state threaded through the export walk

use nalgebra::{Matrix3, Matrix4};

use crate::color::Color;
use crate::model::{Reference, Winding};
use crate::utils::det3;

/// Accumulated winding flips on the path from the root
///
/// A primitive is emitted clockwise-first, and therefore reversed, when
/// `local_cw ^ mirrored ^ inverted` holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BfcState {
    /// Odd number of negative-determinant transforms so far
    pub mirrored: bool,
    /// Odd number of `BFC INVERTNEXT` references so far
    pub inverted: bool,
}

impl BfcState {
    /// State inside a reference
    pub fn enter(self, negative_det: bool, invert_next: bool) -> Self {
        Self {
            mirrored: self.mirrored ^ negative_det,
            inverted: self.inverted ^ invert_next,
        }
    }

    /// True when a face declared with `local` winding must be reversed
    ///
    /// # Example
    ///
    /// ```
    /// use libldr::export::BfcState;
    /// use libldr::model::Winding;
    ///
    /// let root = BfcState::default();
    /// assert!(!root.effective_cw(Winding::Ccw));
    /// assert!(root.enter(true, false).effective_cw(Winding::Ccw));
    /// assert!(!root.enter(true, true).effective_cw(Winding::Ccw));
    /// ```
    pub fn effective_cw(self, local: Winding) -> bool {
        (local == Winding::Cw) ^ self.mirrored ^ self.inverted
    }
}

/// Transform, winding and colour context of one model in the walk
#[derive(Debug, Clone, PartialEq)]
pub struct ExportContext {
    /// Model to output space
    pub transform: Matrix4<f32>,
    /// Winding flips
    pub bfc: BfcState,
    /// Colour stack; the top substitutes main and edge colours
    pub colors: Vec<Color>,
}

impl ExportContext {
    /// Root context
    pub fn root(transform: Matrix4<f32>) -> Self {
        Self {
            bfc: BfcState::default().enter(det3(&linear(&transform)) < 0.0, false),
            transform,
            colors: vec![Color::MAIN],
        }
    }

    /// Colour that main and edge colours resolve against
    pub fn top(&self) -> Color {
        self.colors.last().copied().unwrap_or(Color::MAIN)
    }

    /// Context inside a reference
    ///
    /// A main or edge coloured reference passes the current top colour on.
    pub fn enter(&self, reference: &Reference, invert_next: bool) -> Self {
        let transform = self.transform * reference.transform();
        let color = if reference.color.is_main() || reference.color.is_edge() {
            self.top()
        } else {
            reference.color
        };
        let mut colors = self.colors.clone();
        colors.push(color);
        Self {
            bfc: self.bfc.enter(reference.is_mirroring(), invert_next),
            transform,
            colors,
        }
    }

    /// Cofactor of the linear part, mapping model normals to output normals
    pub fn normal_matrix(&self) -> Matrix3<f32> {
        let m = linear(&self.transform);
        let (c0, c1, c2) = (m.column(0), m.column(1), m.column(2));
        Matrix3::from_columns(&[c1.cross(&c2), c2.cross(&c0), c0.cross(&c1)])
    }
}

fn linear(m: &Matrix4<f32>) -> Matrix3<f32> {
    m.fixed_view::<3, 3>(0, 0).into_owned()
}
