//! Critically damped approach
//!
//! Spring-damper toward a target that never overshoots. `smooth_time` is
//! roughly the time to reach the target. The polynomial is the usual
//! Padé-style approximation of exp(-omega·dt).

use crate::math::{clamp_norm, Vec3};
use crate::physics_constants::guidance::MIN_SMOOTH_TIME;

#[inline]
fn decay(omega: f32, dt: f32) -> f32 {
    let x = omega * dt;
    1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x)
}

/// Scalar smooth-damp. Updates `velocity` in place and returns the new value.
pub fn smooth_damp_f32(
    current: f32,
    target: f32,
    velocity: &mut f32,
    smooth_time: f32,
    max_speed: f32,
    dt: f32,
) -> f32 {
    let smooth_time = smooth_time.max(MIN_SMOOTH_TIME);
    let omega = 2.0 / smooth_time;
    let exp = decay(omega, dt);

    let max_change = (max_speed * smooth_time).max(0.0);
    let change = (current - target).clamp(-max_change, max_change);
    let clamped_target = current - change;

    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * exp;
    let mut output = clamped_target + (change + temp) * exp;

    // overshoot guard
    if (target - current > 0.0) == (output > target) {
        output = target;
        *velocity = 0.0;
    }
    output
}

/// Vector smooth-damp. Updates `velocity` in place and returns the new point.
pub fn smooth_damp(
    current: Vec3,
    target: Vec3,
    velocity: &mut Vec3,
    smooth_time: f32,
    max_speed: f32,
    dt: f32,
) -> Vec3 {
    let smooth_time = smooth_time.max(MIN_SMOOTH_TIME);
    let omega = 2.0 / smooth_time;
    let exp = decay(omega, dt);

    let change = clamp_norm(current - target, (max_speed * smooth_time).max(0.0));
    let clamped_target = current - change;

    let temp = (*velocity + change * omega) * dt;
    *velocity = (*velocity - temp * omega) * exp;
    let mut output = clamped_target + (change + temp) * exp;

    // overshoot guard
    if (target - current).dot(&(output - target)) > 0.0 {
        output = target;
        *velocity = Vec3::zeros();
    }
    output
}
