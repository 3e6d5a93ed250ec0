//! Rotational symmetry matching
//!
//! A symmetric piece looks the same after a half-turn about one or more of
//! its local axes. When stowing such a piece we aim for whichever equivalent
//! orientation is closest to where the piece already is.

use crate::math::{Axis, Quat};
use serde::{Deserialize, Serialize};

/// Set of 180° rotations considered equivalent for a piece's orientation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SymmetryClass {
    #[default]
    None,
    OneAxis {
        axis: Axis,
    },
    TwoAxes {
        axes: [Axis; 2],
    },
    ThreeAxes,
}

impl SymmetryClass {
    /// Axes whose half-turns generate the group, in enumeration order.
    pub fn axes(&self) -> &'static [Axis] {
        match self {
            SymmetryClass::None => &[],
            SymmetryClass::OneAxis { axis } => match axis {
                Axis::X => &[Axis::X],
                Axis::Y => &[Axis::Y],
                Axis::Z => &[Axis::Z],
            },
            SymmetryClass::TwoAxes { axes } => match axes {
                [Axis::X, Axis::Y] => &[Axis::X, Axis::Y],
                [Axis::Y, Axis::X] => &[Axis::Y, Axis::X],
                [Axis::X, Axis::Z] => &[Axis::X, Axis::Z],
                [Axis::Z, Axis::X] => &[Axis::Z, Axis::X],
                [Axis::Y, Axis::Z] => &[Axis::Y, Axis::Z],
                [Axis::Z, Axis::Y] => &[Axis::Z, Axis::Y],
                // degenerate: same axis twice
                [Axis::X, Axis::X] => &[Axis::X],
                [Axis::Y, Axis::Y] => &[Axis::Y],
                [Axis::Z, Axis::Z] => &[Axis::Z],
            },
            SymmetryClass::ThreeAxes => &[Axis::X, Axis::Y, Axis::Z],
        }
    }

    /// Number of candidate orientations (1, 2, 4 or 8).
    pub fn candidate_count(&self) -> usize {
        1 << self.axes().len()
    }

    /// All orientations equivalent to `target`.
    ///
    /// Order is binary counting over [`axes`](Self::axes): the first axis
    /// toggles fastest. For two axes `(a, b)` that is
    /// `target, target·Ra, target·Rb, target·Ra·Rb`.
    pub fn candidates(&self, target: &Quat) -> Vec<Quat> {
        let axes = self.axes();
        let count = 1usize << axes.len();
        let mut out = Vec::with_capacity(count);
        for mask in 0..count {
            let mut q = *target;
            for (bit, axis) in axes.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    q *= axis.half_turn();
                }
            }
            out.push(q);
        }
        out
    }
}

/// Candidate in `symmetry`'s group closest to `current`.
///
/// Ties keep the earlier candidate in enumeration order.
pub fn find_shortest_symmetric_rotation(current: &Quat, target: &Quat, symmetry: SymmetryClass) -> Quat {
    let mut best = *target;
    let mut best_angle = current.angle_to(target);
    for candidate in symmetry.candidates(target).into_iter().skip(1) {
        let angle = current.angle_to(&candidate);
        if angle < best_angle {
            best = candidate;
            best_angle = angle;
        }
    }
    best
}
