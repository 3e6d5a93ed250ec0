//! Piece ownership
//!
//! One [`PieceController`] per spawned piece. It owns the piece's body and
//! is the only code that flips its physics flags; intakes and nodes ask it
//! to move or release the piece.

pub mod controller;
pub mod descriptor;
pub mod release;

pub use controller::{Holder, PhysicsRegime, PieceController, PieceOwner};
pub use descriptor::PieceDescriptor;
pub use release::{ContinuedRelease, TaskStatus};
