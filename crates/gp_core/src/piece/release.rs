//! Sustained release
//!
//! A "shooter" style release pushes the piece every tick for a while instead
//! of with a single impulse. Modelled as a small explicit state machine that
//! the robot advances once per tick.

use super::controller::{PhysicsRegime, PieceController};
use crate::context::TickContext;
use crate::math::Vec3;
use crate::physics::{ForceMode, PieceId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Finished,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContinuedRelease {
    piece: PieceId,
    /// Piece-local force (N)
    force: Vec3,
    /// Seconds
    duration: f32,
    /// Application skipped above this speed (m/s)
    speed_cap: f32,
    elapsed: f32,
    cancelled: bool,
}

impl ContinuedRelease {
    pub fn new(piece: PieceId, force: Vec3, duration: f32, speed_cap: f32) -> Self {
        Self {
            piece,
            force,
            duration: duration.max(0.0),
            speed_cap: speed_cap.max(0.0),
            elapsed: 0.0,
            cancelled: false,
        }
    }

    pub fn piece(&self) -> PieceId {
        self.piece
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn is_finished(&self) -> bool {
        self.cancelled || self.elapsed >= self.duration
    }

    /// Stop at the next advance without applying anything further.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// One tick. `piece` is `None` when it has been despawned.
    ///
    /// The force is applied only while the piece is in free physics, the
    /// tick is enabled and the body is at or below the speed cap. A piece
    /// that was recaptured mid-release is simply not pushed that tick.
    pub fn advance(&mut self, piece: Option<&mut PieceController>, ctx: &TickContext) -> TaskStatus {
        if self.is_finished() {
            return TaskStatus::Finished;
        }
        let Some(piece) = piece else {
            self.cancelled = true;
            return TaskStatus::Finished;
        };

        if !ctx.disabled && piece.regime() == PhysicsRegime::InWorld && piece.body().speed() <= self.speed_cap {
            let world_force = piece.body().rotation * self.force;
            piece.body_mut().apply_force(world_force, ForceMode::Force);
        }

        self.elapsed += ctx.dt();
        if self.is_finished() {
            TaskStatus::Finished
        } else {
            TaskStatus::Running
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{pose, quat_from_euler_deg, Quat};
    use crate::physics::CollisionLayer;
    use crate::piece::PieceDescriptor;

    fn free_piece() -> PieceController {
        let descriptor = PieceDescriptor::new("note", CollisionLayer(1));
        PieceController::new(PieceId(3), descriptor, &pose(Vec3::zeros(), Quat::identity()))
    }

    #[test]
    fn test_runs_for_duration() {
        let ctx = TickContext::new(0.1);
        let mut piece = free_piece();
        let mut task = ContinuedRelease::new(piece.id(), Vec3::new(0.0, 0.0, 1.0), 0.3, 100.0);

        assert_eq!(task.advance(Some(&mut piece), &ctx), TaskStatus::Running);
        assert!(piece.body().pending_acceleration().z > 0.0);
        piece.body_mut().clear_forces();
        assert_eq!(task.advance(Some(&mut piece), &ctx), TaskStatus::Running);
        piece.body_mut().clear_forces();
        // third tick reaches 0.3s (within float slack)
        let third = task.advance(Some(&mut piece), &ctx);
        let status = if third == TaskStatus::Running { task.advance(Some(&mut piece), &ctx) } else { third };
        assert_eq!(status, TaskStatus::Finished);
        assert_eq!(task.advance(Some(&mut piece), &ctx), TaskStatus::Finished);
    }

    #[test]
    fn test_force_in_piece_frame() {
        let ctx = TickContext::new(0.1);
        let descriptor = PieceDescriptor::new("note", CollisionLayer(1));
        let mut piece = PieceController::new(
            PieceId(0),
            descriptor,
            &pose(Vec3::zeros(), quat_from_euler_deg([0.0, 90.0, 0.0])),
        );
        let mut task = ContinuedRelease::new(piece.id(), Vec3::new(0.0, 0.0, 1.0), 1.0, 100.0);
        task.advance(Some(&mut piece), &ctx);
        let acc = piece.body().pending_acceleration();
        // local forward of a 90° yaw is world +X
        assert!(acc.x > 0.0 && acc.z.abs() < 1e-5);
    }

    #[test]
    fn test_speed_cap_skips_application() {
        let ctx = TickContext::new(0.1);
        let mut piece = free_piece();
        piece.body_mut().linear_velocity = Vec3::new(0.0, 0.0, 10.0);
        let mut task = ContinuedRelease::new(piece.id(), Vec3::new(0.0, 0.0, 1.0), 1.0, 5.0);
        assert_eq!(task.advance(Some(&mut piece), &ctx), TaskStatus::Running);
        assert_eq!(piece.body().pending_acceleration(), Vec3::zeros());
        // time still passes
        assert!(task.elapsed() > 0.0);
    }

    #[test]
    fn test_disabled_skips_application() {
        let ctx = TickContext::new(0.1).with_disabled(true);
        let mut piece = free_piece();
        let mut task = ContinuedRelease::new(piece.id(), Vec3::new(0.0, 0.0, 1.0), 1.0, 5.0);
        task.advance(Some(&mut piece), &ctx);
        assert_eq!(piece.body().pending_acceleration(), Vec3::zeros());
    }

    #[test]
    fn test_missing_piece_finishes() {
        let mut task = ContinuedRelease::new(PieceId(9), Vec3::new(0.0, 0.0, 1.0), 1.0, 5.0);
        assert_eq!(task.advance(None, &TickContext::default()), TaskStatus::Finished);
        assert!(task.is_finished());
    }

    #[test]
    fn test_cancel() {
        let mut piece = free_piece();
        let mut task = ContinuedRelease::new(piece.id(), Vec3::new(0.0, 0.0, 1.0), 1.0, 5.0);
        task.cancel();
        assert_eq!(task.advance(Some(&mut piece), &TickContext::default()), TaskStatus::Finished);
        assert_eq!(piece.body().pending_acceleration(), Vec3::zeros());
    }
}
