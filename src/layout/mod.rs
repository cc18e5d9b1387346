//! Placement of the orientation axes and the reference plane.
//!
//! Coordinates follow the generator's frame: the organ's long axis runs along
//! `z` (lateral at `-z`, medial at `+z`), anterior-posterior along `x` and
//! inferior-superior along `y`. The plane perpendicular to the long axis is
//! called the transverse plane here; both diagonal axes lie in it.

use crate::params::ParameterSet;
use serde::{Deserialize, Serialize};

pub type Point3 = [f64; 3];

/// Divisor applied to a diagonal axis length so that each component of its
/// endpoint is `length / 2.828`, which puts the endpoint `length / 2` away
/// from the origin.
pub const DIAGONAL_NORMALIZATION: f64 = 2.828;

/// Fraction of half the larger transverse extent added around the mesh
/// envelope when sizing the reference plane.
pub const PLANE_MARGIN: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Long-axis (medial-lateral) length, `w` on the wire.
    pub width: f64,
    /// Superior-inferior distance, `h` on the wire.
    pub height: f64,
    /// Anterior-posterior distance, `d` on the wire.
    pub depth: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64, depth: f64) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    pub fn larger_transverse(&self) -> f64 {
        self.height.max(self.depth)
    }
}

impl From<&ParameterSet> for Dimensions {
    fn from(params: &ParameterSet) -> Self {
        Self::new(params.length(), params.height(), params.thickness())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisKind {
    LongAxis,
    AscendingDiagonal,
    DescendingDiagonal,
}

impl AxisKind {
    pub const fn ordered() -> [AxisKind; 3] {
        [
            AxisKind::LongAxis,
            AxisKind::AscendingDiagonal,
            AxisKind::DescendingDiagonal,
        ]
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ordered().get(index).copied()
    }

    pub fn index(self) -> usize {
        match self {
            AxisKind::LongAxis => 0,
            AxisKind::AscendingDiagonal => 1,
            AxisKind::DescendingDiagonal => 2,
        }
    }

    /// Unscaled direction of the end point and the labels of both ends.
    fn table(self) -> (Point3, &'static str, &'static str) {
        match self {
            AxisKind::LongAxis => ([0.0, 0.0, 1.0], "L", "M"),
            AxisKind::AscendingDiagonal => ([1.0, 1.0, 0.0], "AI", "PS"),
            AxisKind::DescendingDiagonal => ([1.0, -1.0, 0.0], "AS", "PI"),
        }
    }

    fn is_diagonal(self) -> bool {
        !matches!(self, AxisKind::LongAxis)
    }

    /// Which requested dimension drives this axis' length.
    pub fn length_for(self, dims: &Dimensions) -> f64 {
        match self {
            AxisKind::LongAxis => dims.width,
            AxisKind::AscendingDiagonal | AxisKind::DescendingDiagonal => dims.larger_transverse(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisSpec {
    pub kind: AxisKind,
    pub start_point: Point3,
    pub end_point: Point3,
    pub start_label: &'static str,
    pub end_label: &'static str,
}

pub fn compute_axis_positions(axis: AxisKind, length: f64) -> (Point3, Point3) {
    let (direction, _, _) = axis.table();
    let scale = if axis.is_diagonal() {
        length / DIAGONAL_NORMALIZATION
    } else {
        length / 2.0
    };
    let end = direction.map(|component| component * scale);
    (negate(end), end)
}

pub fn axis_spec(axis: AxisKind, dims: &Dimensions) -> AxisSpec {
    let (start_point, end_point) = compute_axis_positions(axis, axis.length_for(dims));
    let (_, start_label, end_label) = axis.table();
    AxisSpec {
        kind: axis,
        start_point,
        end_point,
        start_label,
        end_label,
    }
}

pub fn axis_specs(dims: &Dimensions) -> [AxisSpec; 3] {
    AxisKind::ordered().map(|axis| axis_spec(axis, dims))
}

/// Corner/edge description of a rectangular plane: `point1` and `point2` are
/// the ends of the two edges leaving `origin`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSpec {
    pub origin: Point3,
    pub point1: Point3,
    pub point2: Point3,
}

impl PlaneSpec {
    pub fn far_corner(&self) -> Point3 {
        [0, 1, 2].map(|i| self.point1[i] + self.point2[i] - self.origin[i])
    }
}

/// Transverse reference plane through the long-axis midpoint (`z = 0`).
pub fn compute_plane_position(dims: &Dimensions) -> PlaneSpec {
    let margin = PLANE_MARGIN * dims.larger_transverse() / 2.0;
    let half_x = dims.depth / 2.0 + margin;
    let half_y = dims.height / 2.0 + margin;
    PlaneSpec {
        origin: [-half_x, -half_y, 0.0],
        point1: [half_x, -half_y, 0.0],
        point2: [-half_x, half_y, 0.0],
    }
}

pub fn negate(point: Point3) -> Point3 {
    point.map(|component| -component)
}
