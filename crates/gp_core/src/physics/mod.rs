//! Minimal physics world
//!
//! The host engine owns real rigid-body simulation; this module models just
//! enough of it (bodies, force modes, a frame hierarchy, overlap queries and
//! a floor) for the possession pipeline to run headless and be tested.

pub mod body;
pub mod frames;
pub mod volume;
pub mod world;

pub use body::{CollisionGroup, CollisionLayer, ForceMode, RigidBody};
pub use frames::{FrameId, FrameTree};
pub use volume::VolumeShape;
pub use world::{PieceId, World};
