//! Physics constants for the possession pipeline
//!
//! Tuning values are configured in engineering units (inches, inches per
//! second, degrees per second). The simulation runs in metres and radians.

// ============================================================
// Unit conversion
// ============================================================
pub mod units {
    /// Metres per inch.
    pub const INCH_TO_M: f32 = 0.0254;

    #[inline]
    pub fn inches(v: f32) -> f32 {
        v * INCH_TO_M
    }

    #[inline]
    pub fn to_inches(m: f32) -> f32 {
        m / INCH_TO_M
    }

    #[inline]
    pub fn inches_vec(v: [f32; 3]) -> crate::math::Vec3 {
        crate::math::Vec3::new(inches(v[0]), inches(v[1]), inches(v[2]))
    }
}

// ============================================================
// World defaults
// ============================================================
pub mod world {
    /// Gravity (m/s²), applied along -Y.
    pub const GRAVITY: f32 = 9.81;

    /// Floor plane height (m).
    pub const FLOOR_HEIGHT: f32 = 0.0;
}

// ============================================================
// Guidance
// ============================================================
pub mod guidance {
    /// Smallest smooth-damp time (s). Keeps omega finite at zero distance.
    pub const MIN_SMOOTH_TIME: f32 = 1.0e-3;

    /// Stepped approach arrival radius (in).
    pub const STEPPED_ARRIVAL_IN: f32 = 0.25;

    /// Below this distance (m) a direction is considered degenerate.
    pub const DISTANCE_EPSILON: f32 = 1.0e-5;

    /// Below this angle (rad) two orientations are considered equal.
    pub const ANGLE_EPSILON: f32 = 1.0e-4;
}

// ============================================================
// Piece bodies
// ============================================================
pub mod body {
    /// Inertia tensor diagonal (kg·m²) restored on release for flat,
    /// disc- or ring-shaped pieces. Low around the thin axis keeps thrown
    /// pieces from tumbling.
    pub const LOW_PROFILE_INERTIA: [f32; 3] = [0.012, 0.024, 0.012];

    /// Default piece mass (kg).
    pub const DEFAULT_MASS: f32 = 0.25;

    /// Smallest legal mass (kg). Avoids infinite impulse response.
    pub const MIN_MASS: f32 = 1.0e-4;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inch_round_trip() {
        assert!((units::inches(1.0) - 0.0254).abs() < 1e-7);
        assert!((units::to_inches(units::inches(12.0)) - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_stepped_threshold_small() {
        // quarter inch ≈ 6.35mm
        assert!(units::inches(guidance::STEPPED_ARRIVAL_IN) < 0.01);
    }
}
