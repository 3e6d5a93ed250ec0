//! Breakable approach
//!
//! Closed-loop physical guidance used while an intake pulls a piece in. The
//! piece stays a dynamic body: each tick we compute the velocity a
//! critically damped approach would have and push the body toward it with
//! an acceleration-mode force. If the piece drifts too far the approach
//! "breaks" and the caller drops it.
//!
//! Arrival is tested either against a sphere (distance mode) or against an
//! oriented box in the target frame (planar mode) so slot-shaped intakes can
//! accept a piece anywhere in a rectangular mouth.

use super::smooth_damp::{smooth_damp, smooth_damp_f32};
use super::{GuidanceOutcome, GuidanceReport};
use crate::context::TickContext;
use crate::error::{ConfigError, Result};
use crate::math::{clamp_norm, flipped, rotate_towards, Axis, Pose, Vec3};
use crate::physics::{ForceMode, RigidBody};
use crate::physics_constants::guidance::{ANGLE_EPSILON, DISTANCE_EPSILON, MIN_SMOOTH_TIME};
use crate::physics_constants::units::{inches, inches_vec};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Local axes of the target frame along which no correction is applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisLocks {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl AxisLocks {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn any(&self) -> bool {
        self.x || self.y || self.z
    }

    /// Zero locked components of a target-local vector.
    fn apply(&self, mut local: Vec3) -> Vec3 {
        if self.x {
            local.x = 0.0;
        }
        if self.y {
            local.y = 0.0;
        }
        if self.z {
            local.z = 0.0;
        }
        local
    }
}

/// Tuning for one breakable approach. Distances are inches, angular speed is
/// degrees per second.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakableParams {
    /// Nominal approach speed (in/s); sets the smooth-damp time
    pub approach_speed_in: f32,
    /// Fraction of the velocity error corrected per tick
    pub approach_force_gain: f32,
    /// Distance mode: break radius (in). Planar mode: scale on the tolerance box.
    pub max_distance: f32,
    /// Distance mode arrival radius (in)
    pub arrival_tolerance_in: f32,
    /// Fraction of the angular velocity error corrected per tick
    pub rotation_force_gain: f32,
    pub max_angular_speed_deg: f32,
    pub use_rotation: bool,
    /// Use the oriented tolerance box instead of the sphere
    pub planar_tolerance: bool,
    /// Tolerance box half extents in the target frame (in)
    pub tolerance_box_in: [f32; 3],
    pub axis_locks: AxisLocks,
}

impl Default for BreakableParams {
    fn default() -> Self {
        Self {
            approach_speed_in: 60.0,
            approach_force_gain: 1.0,
            max_distance: 24.0,
            arrival_tolerance_in: 1.0,
            rotation_force_gain: 1.0,
            max_angular_speed_deg: 540.0,
            use_rotation: true,
            planar_tolerance: false,
            tolerance_box_in: [1.0, 1.0, 1.0],
            axis_locks: AxisLocks::none(),
        }
    }
}

impl BreakableParams {
    pub fn with_approach(mut self, speed_in: f32, force_gain: f32) -> Self {
        self.approach_speed_in = speed_in;
        self.approach_force_gain = force_gain;
        self
    }

    pub fn with_distances(mut self, arrival_tolerance_in: f32, max_distance: f32) -> Self {
        self.arrival_tolerance_in = arrival_tolerance_in;
        self.max_distance = max_distance;
        self
    }

    pub fn with_rotation(mut self, use_rotation: bool, force_gain: f32, max_speed_deg: f32) -> Self {
        self.use_rotation = use_rotation;
        self.rotation_force_gain = force_gain;
        self.max_angular_speed_deg = max_speed_deg;
        self
    }

    /// Switch to box arrival. `max_distance` becomes the box scale.
    pub fn with_tolerance_box(mut self, half_extents_in: [f32; 3], scale: f32) -> Self {
        self.planar_tolerance = true;
        self.tolerance_box_in = half_extents_in;
        self.max_distance = scale;
        self
    }

    pub fn with_axis_locks(mut self, locks: AxisLocks) -> Self {
        self.axis_locks = locks;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("approach_speed_in", self.approach_speed_in),
            ("max_distance", self.max_distance),
            ("max_angular_speed_deg", self.max_angular_speed_deg),
        ];
        for (field, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigError::invalid(field, value));
            }
        }
        let non_negative = [
            ("approach_force_gain", self.approach_force_gain),
            ("rotation_force_gain", self.rotation_force_gain),
            ("arrival_tolerance_in", self.arrival_tolerance_in),
            ("tolerance_box_in.x", self.tolerance_box_in[0]),
            ("tolerance_box_in.y", self.tolerance_box_in[1]),
            ("tolerance_box_in.z", self.tolerance_box_in[2]),
        ];
        for (field, value) in non_negative {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(ConfigError::invalid(field, value));
            }
        }
        Ok(())
    }
}

/// One tick of breakable guidance toward `target` (world pose).
///
/// The outcome is classified on the pre-step position, against the tolerance
/// box when `planar_tolerance` is set and by distance otherwise. Correction
/// is applied only while `Continuing` and never on disabled ticks.
pub fn move_to_breakable(
    body: &mut RigidBody,
    target: &Pose,
    params: &BreakableParams,
    ctx: &TickContext,
) -> GuidanceReport {
    let target_pos = target.translation.vector;
    let displacement = target_pos - body.position;
    let distance = displacement.norm();

    let outcome = if params.planar_tolerance {
        classify_box(&body.position, target, params)
    } else {
        classify_distance(distance, params)
    };
    if ctx.disabled || outcome != GuidanceOutcome::Continuing {
        return GuidanceReport::new(outcome, displacement);
    }

    let dt = ctx.dt();
    apply_linear(body, target, distance, params, dt);
    if params.use_rotation {
        apply_angular(body, target, params, dt);
    }

    GuidanceReport::new(outcome, displacement)
}

fn classify_distance(distance: f32, params: &BreakableParams) -> GuidanceOutcome {
    if distance <= inches(params.arrival_tolerance_in) {
        GuidanceOutcome::Arrived
    } else if distance < inches(params.max_distance) {
        GuidanceOutcome::Continuing
    } else {
        GuidanceOutcome::Lost
    }
}

fn classify_box(position: &Vec3, target: &Pose, params: &BreakableParams) -> GuidanceOutcome {
    let local = target.inverse_transform_point(&Point3::from(*position)).coords.abs();
    let tight = inches_vec(params.tolerance_box_in);
    let loose = tight * params.max_distance;
    if local.x <= tight.x && local.y <= tight.y && local.z <= tight.z {
        GuidanceOutcome::Arrived
    } else if local.x <= loose.x && local.y <= loose.y && local.z <= loose.z {
        GuidanceOutcome::Continuing
    } else {
        GuidanceOutcome::Lost
    }
}

fn apply_linear(body: &mut RigidBody, target: &Pose, distance: f32, params: &BreakableParams, dt: f32) {
    let speed = inches(params.approach_speed_in);
    let time_to_arrive = (distance / speed).max(MIN_SMOOTH_TIME);

    let mut damp_velocity = body.linear_velocity;
    let next = smooth_damp(
        body.position,
        target.translation.vector,
        &mut damp_velocity,
        time_to_arrive,
        f32::INFINITY,
        dt,
    );
    let desired_velocity = (next - body.position) / dt;
    let mut accel = (desired_velocity - body.linear_velocity) * (params.approach_force_gain / dt);

    if params.axis_locks.any() {
        let local = target.rotation.inverse() * accel;
        accel = target.rotation * params.axis_locks.apply(local);
    }

    body.apply_force(accel, ForceMode::Acceleration);
}

fn apply_angular(body: &mut RigidBody, target: &Pose, params: &BreakableParams, dt: f32) {
    // Backwards is fine: aim for whichever of target / target flipped about
    // its up axis is nearer.
    let forward = target.rotation;
    let backward = flipped(&forward, Axis::Y);
    let goal = if body.rotation.angle_to(&backward) < body.rotation.angle_to(&forward) {
        backward
    } else {
        forward
    };

    let max_speed = params.max_angular_speed_deg.to_radians();
    let angle = body.rotation.angle_to(&goal);
    let desired = if angle <= ANGLE_EPSILON {
        Vec3::zeros()
    } else {
        let axis = (goal * body.rotation.inverse()).scaled_axis();
        let axis = if axis.norm() > DISTANCE_EPSILON { axis.normalize() } else { Vec3::zeros() };
        // closing speed along the remaining rotation, as a negative rate
        let mut rate = -body.angular_velocity.dot(&axis);
        let time_to_arrive = (angle / max_speed).max(MIN_SMOOTH_TIME);
        let next_angle = smooth_damp_f32(angle, 0.0, &mut rate, time_to_arrive, f32::INFINITY, dt);
        let next = rotate_towards(&body.rotation, &goal, angle - next_angle);
        let delta = next * body.rotation.inverse();
        clamp_norm(delta.scaled_axis() / dt, max_speed)
    };

    let angular_accel = (desired - body.angular_velocity) * (params.rotation_force_gain / dt);
    body.apply_torque(angular_accel, ForceMode::Acceleration);
}
