//! Math aliases and small rotation helpers
//!
//! All simulation math is `f32` nalgebra. Conventions follow the host engine
//! the pieces live in: +Y is up, +Z is a frame's local forward.

use nalgebra::{Isometry3, Quaternion, Translation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

pub type Vec3 = Vector3<f32>;
pub type Quat = UnitQuaternion<f32>;
pub type Pose = Isometry3<f32>;

/// A principal axis of a local frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::x(),
            Axis::Y => Vec3::y(),
            Axis::Z => Vec3::z(),
        }
    }

    pub fn unit_axis(self) -> Unit<Vec3> {
        match self {
            Axis::X => Vector3::x_axis(),
            Axis::Y => Vector3::y_axis(),
            Axis::Z => Vector3::z_axis(),
        }
    }

    /// Half-turn about this axis, exact: zero scalar part, unit vector part.
    pub fn half_turn(self) -> Quat {
        Quat::new_unchecked(Quaternion::from_imag(self.unit()))
    }
}

/// Build a pose from a translation and an orientation.
#[inline]
pub fn pose(position: Vec3, rotation: Quat) -> Pose {
    Isometry3::from_parts(Translation3::from(position), rotation)
}

/// Orientation from XYZ Euler angles in degrees (applied Z, then X, then Y
/// like the host engine's inspector values).
pub fn quat_from_euler_deg(deg: [f32; 3]) -> Quat {
    let [x, y, z] = deg;
    let qx = Quat::from_axis_angle(&Vector3::x_axis(), x.to_radians());
    let qy = Quat::from_axis_angle(&Vector3::y_axis(), y.to_radians());
    let qz = Quat::from_axis_angle(&Vector3::z_axis(), z.to_radians());
    qy * qx * qz
}

/// Rotate `rotation` by a half-turn about its own local `axis`.
#[inline]
pub fn flipped(rotation: &Quat, axis: Axis) -> Quat {
    rotation * axis.half_turn()
}

/// Smallest angle (radians) taking `a` onto `b`.
#[inline]
pub fn angle_between(a: &Quat, b: &Quat) -> f32 {
    a.angle_to(b)
}

/// Rotate `from` toward `to` by at most `max_radians`.
pub fn rotate_towards(from: &Quat, to: &Quat, max_radians: f32) -> Quat {
    let angle = from.angle_to(to);
    if angle <= f32::EPSILON || max_radians >= angle {
        return *to;
    }
    if max_radians <= 0.0 {
        return *from;
    }
    let t = max_radians / angle;
    from.try_slerp(to, t, 1.0e-6).unwrap_or_else(|| from.nlerp(to, t))
}

/// Move `from` toward `to` by at most `max_step` metres.
pub fn move_towards(from: &Vec3, to: &Vec3, max_step: f32) -> Vec3 {
    let delta = to - from;
    let dist = delta.norm();
    if dist <= max_step || dist < 1.0e-6 {
        return *to;
    }
    from + delta / dist * max_step.max(0.0)
}

/// Clamp the magnitude of `v` to `max_len`.
#[inline]
pub fn clamp_norm(v: Vec3, max_len: f32) -> Vec3 {
    let len = v.norm();
    if len > max_len && len > 0.0 {
        v * (max_len / len)
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_half_turn_is_pi() {
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            let q = axis.half_turn();
            assert!((q.angle() - PI).abs() < 1e-5);
            let rotated = q * axis.unit();
            assert!((rotated - axis.unit()).norm() < 1e-5);
        }
    }

    #[test]
    fn test_rotate_towards_caps_step() {
        let from = Quat::identity();
        let to = Quat::from_axis_angle(&Vector3::y_axis(), 1.0);
        let step = rotate_towards(&from, &to, 0.25);
        assert!((from.angle_to(&step) - 0.25).abs() < 1e-4);
        let done = rotate_towards(&from, &to, 2.0);
        assert!(done.angle_to(&to) < 2e-3);
    }

    #[test]
    fn test_move_towards_caps_step() {
        let p = move_towards(&Vec3::zeros(), &Vec3::new(10.0, 0.0, 0.0), 2.0);
        assert!((p.x - 2.0).abs() < 1e-6);
        let q = move_towards(&Vec3::zeros(), &Vec3::new(1.0, 0.0, 0.0), 2.0);
        assert_eq!(q, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_euler_yaw() {
        let q = quat_from_euler_deg([0.0, 90.0, 0.0]);
        let fwd = q * Vec3::z();
        assert!((fwd - Vec3::x()).norm() < 1e-5);
    }
}
