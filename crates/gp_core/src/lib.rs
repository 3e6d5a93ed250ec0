//! # gp_core - Game Piece Possession Pipeline
//!
//! Moves physics-simulated game pieces between three regimes: free world
//! physics, breakable guidance while an intake pulls a piece in, and
//! robot possession where the piece is puppeted through named states.
//!
//! ## Layers
//! - [`guidance`]: stateless per-tick motion commands
//! - [`piece`]: per-piece ownership controller and release tasks
//! - [`intake`]: capture front-end per pickup point
//! - [`node`]: per-robot orchestrator, one node per possession slot
//! - [`sim`]: fixed-timestep host, [`config`] and the JSON [`api`]

// Game engine APIs often require many parameters for physics, state, etc.
#![allow(clippy::too_many_arguments)]
// NaN-rejecting comparisons are written as !(x > 0.0) on purpose
#![allow(clippy::neg_cmp_op_on_partial_ord)]

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod guidance;
pub mod intake;
pub mod math;
pub mod node;
pub mod physics;
pub mod physics_constants;
pub mod piece;
pub mod sim;
pub mod timestep;

#[cfg(test)]
mod pipeline_tests;

// Re-export main API functions
pub use api::{run_scenario, run_scenario_json, validate_scenario_json, API_VERSION};
pub use config::{ScenarioConfig, ScriptCommand};
pub use context::TickContext;
pub use error::{ConfigError, Result};
pub use events::{EventLog, PieceEvent, PieceEventType};
pub use guidance::{
    find_shortest_symmetric_rotation, move_to, move_to_breakable, BreakableParams, GuidanceOutcome, GuidanceReport,
    SymmetryClass,
};
pub use intake::{CaptureVolume, Intake, IntakeId, IntakeSpec};
pub use node::{NamedState, Node, NodeId, Robot, RobotId, StateSpec};
pub use physics::{CollisionGroup, CollisionLayer, ForceMode, FrameId, PieceId, RigidBody, VolumeShape, World};
pub use piece::{ContinuedRelease, PhysicsRegime, PieceController, PieceDescriptor, PieceOwner, TaskStatus};
pub use sim::{Scenario, ScenarioReport, Simulation};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
