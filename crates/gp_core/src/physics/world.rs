//! Physics world: frames plus the piece arena

use super::frames::FrameTree;
use super::volume::VolumeShape;
use super::CollisionLayer;
use crate::context::TickContext;
use crate::math::{Pose, Vec3};
use crate::physics_constants::world::{FLOOR_HEIGHT, GRAVITY};
use crate::piece::{PieceController, PieceDescriptor};
use serde::{Deserialize, Serialize};

/// Slot in the piece arena. Slots are never reused, so a stale id after
/// despawn simply resolves to nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PieceId(pub(crate) usize);

impl PieceId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug)]
pub struct World {
    pub frames: FrameTree,
    pieces: Vec<Option<PieceController>>,
    gravity: Vec3,
    floor: Option<f32>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            frames: FrameTree::new(),
            pieces: Vec::new(),
            gravity: Vec3::new(0.0, -GRAVITY, 0.0),
            floor: Some(FLOOR_HEIGHT),
        }
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// `None` removes the floor entirely.
    pub fn with_floor(mut self, floor: Option<f32>) -> Self {
        self.floor = floor;
        self
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn spawn_piece(&mut self, descriptor: PieceDescriptor, pose: &Pose) -> PieceId {
        let id = PieceId(self.pieces.len());
        log::debug!("spawn {} piece {:?}", descriptor.kind, id);
        self.pieces.push(Some(PieceController::new(id, descriptor, pose)));
        id
    }

    /// Remove a piece. Owners notice on their next tick.
    pub fn despawn_piece(&mut self, id: PieceId) -> Option<PieceController> {
        let removed = self.pieces.get_mut(id.0).and_then(Option::take);
        if removed.is_some() {
            log::debug!("despawn piece {:?}", id);
        }
        removed
    }

    pub fn contains(&self, id: PieceId) -> bool {
        self.piece(id).is_some()
    }

    pub fn piece(&self, id: PieceId) -> Option<&PieceController> {
        self.pieces.get(id.0).and_then(Option::as_ref)
    }

    pub fn piece_mut(&mut self, id: PieceId) -> Option<&mut PieceController> {
        self.pieces.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Mutable piece alongside the frame tree it moves in.
    pub fn piece_with_frames(&mut self, id: PieceId) -> Option<(&mut PieceController, &FrameTree)> {
        let piece = self.pieces.get_mut(id.0).and_then(Option::as_mut)?;
        Some((piece, &self.frames))
    }

    /// Live pieces in spawn order.
    pub fn pieces(&self) -> impl Iterator<Item = &PieceController> {
        self.pieces.iter().flatten()
    }

    pub fn piece_count(&self) -> usize {
        self.pieces().count()
    }

    /// Pieces on `layer` touching `shape` placed at `pose`, in spawn order.
    /// A piece counts when its bounding sphere reaches into the volume.
    pub fn overlap(&self, pose: &Pose, shape: &VolumeShape, layer: CollisionLayer) -> Vec<PieceId> {
        self.pieces()
            .filter(|p| p.body().layer == layer && p.body().detect_collisions)
            .filter(|p| shape.overlaps(pose, &p.body().position, p.descriptor().radius))
            .map(|p| p.id())
            .collect()
    }

    /// Re-derive the world pose of every parented piece from its frame.
    pub fn sync_attached(&mut self) {
        let frames = &self.frames;
        for piece in self.pieces.iter_mut().flatten() {
            piece.sync_attached(frames);
        }
    }

    /// Integrate free bodies, then re-seat parented ones.
    pub fn step(&mut self, ctx: &TickContext) {
        let dt = ctx.dt();
        for piece in self.pieces.iter_mut().flatten() {
            piece.integrate(dt, self.gravity, self.floor);
        }
        self.sync_attached();
    }
}
