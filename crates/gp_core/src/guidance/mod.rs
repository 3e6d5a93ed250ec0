//! Guidance library
//!
//! Stateless per-tick motion commands that move a piece toward a target
//! frame and classify the outcome. Two flavours:
//! - [`breakable`]: physically forced approach that can fail ("break")
//! - [`stepped`]: kinematic puppeting at a capped per-tick step
//!
//! [`symmetry`] picks the cheapest equivalent orientation for symmetric
//! pieces.

pub mod breakable;
pub mod smooth_damp;
pub mod stepped;
pub mod symmetry;

pub use breakable::{move_to_breakable, AxisLocks, BreakableParams};
pub use smooth_damp::{smooth_damp, smooth_damp_f32};
pub use stepped::{move_to, SteppedMotion};
pub use symmetry::{find_shortest_symmetric_rotation, SymmetryClass};

use crate::math::Vec3;
use crate::physics_constants::units;
use serde::{Deserialize, Serialize};

/// Result of one guidance tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidanceOutcome {
    /// Still travelling
    Continuing,
    /// Within tolerance of the target
    Arrived,
    /// Too far from the target; the approach broke
    Lost,
}

/// Outcome plus the remaining displacement to the target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GuidanceReport {
    pub outcome: GuidanceOutcome,
    /// target - piece, world space (m)
    pub displacement: Vec3,
    /// |displacement| (m)
    pub distance: f32,
}

impl GuidanceReport {
    pub fn new(outcome: GuidanceOutcome, displacement: Vec3) -> Self {
        Self { outcome, displacement, distance: displacement.norm() }
    }

    /// Nothing to do: already there, no motion.
    pub fn arrived_in_place() -> Self {
        Self::new(GuidanceOutcome::Arrived, Vec3::zeros())
    }

    pub fn distance_in(&self) -> f32 {
        units::to_inches(self.distance)
    }

    pub fn is_arrived(&self) -> bool {
        self.outcome == GuidanceOutcome::Arrived
    }

    pub fn is_lost(&self) -> bool {
        self.outcome == GuidanceOutcome::Lost
    }
}
