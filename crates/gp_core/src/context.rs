//! Per-tick context
//!
//! Guidance and ownership code never reads game state from a global. The
//! host builds one `TickContext` per tick and passes it down explicitly, so
//! tests can run disabled/enabled ticks side by side.

use crate::timestep::{FIXED_DT, MIN_DT};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickContext {
    /// Tick counter (0~)
    pub tick: u64,
    /// Elapsed time for this tick (s)
    dt: f32,
    /// Robot/game disabled: guidance classifies only, releases apply no force
    pub disabled: bool,
}

impl Default for TickContext {
    fn default() -> Self {
        Self::new(FIXED_DT)
    }
}

impl TickContext {
    pub fn new(dt: f32) -> Self {
        Self { tick: 0, dt: sanitize_dt(dt), disabled: false }
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_tick(mut self, tick: u64) -> Self {
        self.tick = tick;
        self
    }

    /// Elapsed time, never below [`MIN_DT`].
    #[inline]
    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Context for the following tick.
    pub fn next(&self) -> Self {
        Self { tick: self.tick + 1, ..*self }
    }
}

fn sanitize_dt(dt: f32) -> f32 {
    if dt.is_finite() {
        dt.max(MIN_DT)
    } else {
        FIXED_DT
    }
}
