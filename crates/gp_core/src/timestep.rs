/// timestep.rs
/// Fixed Timestep Constants
///
/// All guidance, ownership and orchestration logic runs once per physics
/// tick. Hosts may pick another rate through the scenario config; these are
/// the defaults.

/// Physics tick (20ms, 50 Hz)
pub const FIXED_DT: f32 = 0.02;

/// Ticks per simulated second
pub const TICKS_PER_SECOND: u32 = 50;

/// Smallest dt any tick may report. Guidance divides by dt.
pub const MIN_DT: f32 = 1.0e-4;

// Compile-time validation
const _: () = assert!(
    FIXED_DT * (TICKS_PER_SECOND as f32) > 0.999 && FIXED_DT * (TICKS_PER_SECOND as f32) < 1.001
);
