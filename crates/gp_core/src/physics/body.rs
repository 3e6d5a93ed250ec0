//! Rigid body state and force application
//!
//! Stand-in for the host engine's rigidbody: just enough state for guidance
//! to push pieces around and for the ownership controller to flip physics
//! flags. Integration is semi-implicit Euler.

use crate::math::{pose, Pose, Quat, Vec3};
use crate::physics_constants::body::MIN_MASS;
use serde::{Deserialize, Serialize};

/// How a force or torque vector is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceMode {
    /// Continuous force (N), mass-dependent, applied over the tick
    #[default]
    Force,
    /// Continuous acceleration (m/s²), mass-independent
    Acceleration,
    /// Instant impulse (N·s), mass-dependent
    Impulse,
    /// Instant velocity change (m/s), mass-independent
    VelocityChange,
}

/// Collision group of a holder (a robot). Possessed pieces ignore their
/// holder's group and nothing else.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollisionGroup(pub u32);

/// Collision layer a piece kind lives on. Intake overlap queries filter by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CollisionLayer(pub u32);

#[derive(Clone, Debug)]
pub struct RigidBody {
    pub position: Vec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    /// World-space angular velocity (rad/s)
    pub angular_velocity: Vec3,
    pub mass: f32,
    pub drag: f32,
    pub angular_drag: f32,
    /// Principal inertia (kg·m²), body-local diagonal
    pub inertia: Vec3,
    pub use_gravity: bool,
    /// Kinematic bodies are positioned by their owner, never integrated
    pub kinematic: bool,
    pub detect_collisions: bool,
    pub layer: CollisionLayer,
    ignored_groups: Vec<CollisionGroup>,
    accel: Vec3,
    angular_accel: Vec3,
}

impl RigidBody {
    pub fn new(mass: f32, drag: f32, angular_drag: f32, inertia: Vec3, layer: CollisionLayer) -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            linear_velocity: Vec3::zeros(),
            angular_velocity: Vec3::zeros(),
            mass: mass.max(MIN_MASS),
            drag: drag.max(0.0),
            angular_drag: angular_drag.max(0.0),
            inertia: inertia.map(|i| i.max(MIN_MASS)),
            use_gravity: true,
            kinematic: false,
            detect_collisions: true,
            layer,
            ignored_groups: Vec::new(),
            accel: Vec3::zeros(),
            angular_accel: Vec3::zeros(),
        }
    }

    pub fn pose(&self) -> Pose {
        pose(self.position, self.rotation)
    }

    pub fn set_pose(&mut self, p: &Pose) {
        self.position = p.translation.vector;
        self.rotation = p.rotation;
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.linear_velocity.norm()
    }

    pub fn apply_force(&mut self, force: Vec3, mode: ForceMode) {
        match mode {
            ForceMode::Force => self.accel += force / self.mass,
            ForceMode::Acceleration => self.accel += force,
            ForceMode::Impulse => self.linear_velocity += force / self.mass,
            ForceMode::VelocityChange => self.linear_velocity += force,
        }
    }

    /// Apply a world-space torque.
    pub fn apply_torque(&mut self, torque: Vec3, mode: ForceMode) {
        match mode {
            ForceMode::Force => self.angular_accel += self.inverse_inertia_world(torque),
            ForceMode::Acceleration => self.angular_accel += torque,
            ForceMode::Impulse => self.angular_velocity += self.inverse_inertia_world(torque),
            ForceMode::VelocityChange => self.angular_velocity += torque,
        }
    }

    /// I⁻¹ · τ with the body-local diagonal inertia rotated into world space.
    fn inverse_inertia_world(&self, torque: Vec3) -> Vec3 {
        let local = self.rotation.inverse() * torque;
        let scaled = local.component_div(&self.inertia);
        self.rotation * scaled
    }

    pub fn zero_velocity(&mut self) {
        self.linear_velocity = Vec3::zeros();
        self.angular_velocity = Vec3::zeros();
    }

    pub fn clear_forces(&mut self) {
        self.accel = Vec3::zeros();
        self.angular_accel = Vec3::zeros();
    }

    /// Pending continuous acceleration (m/s²), for inspection.
    pub fn pending_acceleration(&self) -> Vec3 {
        self.accel
    }

    pub fn set_ignore_collisions(&mut self, group: CollisionGroup, ignore: bool) {
        let present = self.ignored_groups.contains(&group);
        if ignore && !present {
            self.ignored_groups.push(group);
        } else if !ignore && present {
            self.ignored_groups.retain(|g| *g != group);
        }
    }

    pub fn ignores(&self, group: CollisionGroup) -> bool {
        self.ignored_groups.contains(&group)
    }

    pub fn ignored_groups(&self) -> &[CollisionGroup] {
        &self.ignored_groups
    }

    /// Advance one tick. Kinematic bodies only drop their accumulators.
    pub fn integrate(&mut self, dt: f32, gravity: Vec3) {
        if self.kinematic {
            self.clear_forces();
            return;
        }

        let mut accel = self.accel;
        if self.use_gravity {
            accel += gravity;
        }
        self.linear_velocity += accel * dt;
        self.linear_velocity /= 1.0 + self.drag * dt;
        self.position += self.linear_velocity * dt;

        self.angular_velocity += self.angular_accel * dt;
        self.angular_velocity /= 1.0 + self.angular_drag * dt;
        let spin = Quat::from_scaled_axis(self.angular_velocity * dt);
        self.rotation = spin * self.rotation;
        self.rotation.renormalize();

        self.clear_forces();
    }
}
