//! Stepped approach
//!
//! Kinematic puppeting: position moves at most `linear_speed · dt` per tick
//! toward the target as it is *this* tick (moving targets are tracked), and
//! orientation turns at a constant angular speed. Velocity is zeroed every
//! tick; nothing here is physically simulated.

use super::symmetry::{find_shortest_symmetric_rotation, SymmetryClass};
use super::{GuidanceOutcome, GuidanceReport};
use crate::context::TickContext;
use crate::math::{move_towards, rotate_towards, Pose, Vec3};
use crate::physics::RigidBody;
use crate::physics_constants::guidance::STEPPED_ARRIVAL_IN;
use crate::physics_constants::units::inches;
use nalgebra::Point3;

/// Per-piece memory of the current stepped leg.
///
/// Idle until the first step of a leg. The leg start is cached in the frame
/// of the carrier the piece had when the leg began.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SteppedMotion {
    start_local: Option<Vec3>,
}

impl SteppedMotion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.start_local.is_none()
    }

    fn begin(&mut self, start_local: Vec3) {
        self.start_local = Some(start_local);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One tick of stepped guidance toward `target` (world pose).
///
/// `parent` is the world pose of the frame the piece is attached to, if any.
/// `linear_speed_in` is in/s, `angular_speed_deg` deg/s; a zero speed means
/// "instant" on that channel.
pub fn move_to(
    body: &mut RigidBody,
    motion: &mut SteppedMotion,
    parent: Option<&Pose>,
    target: &Pose,
    linear_speed_in: f32,
    angular_speed_deg: f32,
    symmetry: SymmetryClass,
    ctx: &TickContext,
) -> GuidanceReport {
    let target_pos = target.translation.vector;
    let goal_rot = find_shortest_symmetric_rotation(&body.rotation, &target.rotation, symmetry);

    if motion.is_idle() {
        let start_local = match parent {
            Some(p) => p.inverse_transform_point(&Point3::from(body.position)).coords,
            None => body.position,
        };
        motion.begin(start_local);
    }

    body.zero_velocity();
    body.clear_forces();

    if linear_speed_in <= 0.0 {
        body.position = target_pos;
        body.rotation = goal_rot;
        motion.reset();
        return GuidanceReport::arrived_in_place();
    }

    let dt = ctx.dt();
    let new_pos = move_towards(&body.position, &target_pos, inches(linear_speed_in) * dt);
    let new_rot = if angular_speed_deg <= 0.0 {
        goal_rot
    } else {
        rotate_towards(&body.rotation, &goal_rot, angular_speed_deg.to_radians() * dt)
    };
    body.position = new_pos;
    body.rotation = new_rot;

    let remaining = target_pos - new_pos;
    if remaining.norm() <= inches(STEPPED_ARRIVAL_IN) {
        body.position = target_pos;
        body.rotation = goal_rot;
        motion.reset();
        return GuidanceReport::new(GuidanceOutcome::Arrived, remaining);
    }
    GuidanceReport::new(GuidanceOutcome::Continuing, remaining)
}
