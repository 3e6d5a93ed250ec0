//! Piece ownership controller
//!
//! Three physical regimes:
//! - `InWorld`: free dynamic body, gravity on, collides with everything
//! - `Guided`: dynamic, gravity off, pushed by breakable guidance
//! - `Possessed`: kinematic, parented under a holder frame, ignores the
//!   holder's collision group (and only that group)
//!
//! Every transition re-establishes all flags of the new regime rather than
//! diffing against the old one.

use super::descriptor::PieceDescriptor;
use super::release::ContinuedRelease;
use crate::context::TickContext;
use crate::guidance::{self, find_shortest_symmetric_rotation, BreakableParams, GuidanceReport, SteppedMotion};
use crate::intake::IntakeId;
use crate::math::{Pose, Vec3};
use crate::node::{NodeId, RobotId};
use crate::physics::{CollisionGroup, ForceMode, FrameId, FrameTree, PieceId, RigidBody};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhysicsRegime {
    InWorld,
    Guided,
    Possessed,
}

/// Who currently holds the capability to drive this piece.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "owner", rename_all = "snake_case")]
pub enum PieceOwner {
    #[default]
    Unowned,
    Intake { robot: RobotId, intake: IntakeId },
    Node { robot: RobotId, node: NodeId },
}

impl PieceOwner {
    pub fn is_unowned(&self) -> bool {
        matches!(self, PieceOwner::Unowned)
    }

    pub fn robot(&self) -> Option<RobotId> {
        match self {
            PieceOwner::Unowned => None,
            PieceOwner::Intake { robot, .. } | PieceOwner::Node { robot, .. } => Some(*robot),
        }
    }
}

/// The robot a piece is being pulled into or carried by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Holder {
    pub robot: RobotId,
    pub group: CollisionGroup,
}

/// Possessed before the approach finished; keep correcting toward `target`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Handoff {
    target: FrameId,
    linear_speed_in: f32,
    angular_speed_deg: f32,
}

#[derive(Clone, Debug)]
pub struct PieceController {
    id: PieceId,
    descriptor: PieceDescriptor,
    body: RigidBody,
    regime: PhysicsRegime,
    owner: PieceOwner,
    parent: Option<FrameId>,
    /// Pose relative to `parent`; meaningless while unparented
    local: Pose,
    holder_group: Option<CollisionGroup>,
    stepped: SteppedMotion,
    handoff: Option<Handoff>,
}

impl PieceController {
    pub fn new(id: PieceId, descriptor: PieceDescriptor, pose: &Pose) -> Self {
        let body = descriptor.build_body(pose);
        Self {
            id,
            descriptor,
            body,
            regime: PhysicsRegime::InWorld,
            owner: PieceOwner::Unowned,
            parent: None,
            local: Pose::identity(),
            holder_group: None,
            stepped: SteppedMotion::new(),
            handoff: None,
        }
    }

    pub fn id(&self) -> PieceId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.descriptor.kind
    }

    pub fn descriptor(&self) -> &PieceDescriptor {
        &self.descriptor
    }

    pub fn body(&self) -> &RigidBody {
        &self.body
    }

    /// Direct body access for the host (placing, nudging). Owners go through
    /// the transport operations instead.
    pub fn body_mut(&mut self) -> &mut RigidBody {
        &mut self.body
    }

    pub fn regime(&self) -> PhysicsRegime {
        self.regime
    }

    pub fn owner(&self) -> PieceOwner {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: PieceOwner) {
        self.owner = owner;
    }

    pub fn parent(&self) -> Option<FrameId> {
        self.parent
    }

    pub fn local_pose(&self) -> Pose {
        self.local
    }

    pub fn is_free(&self) -> bool {
        self.regime == PhysicsRegime::InWorld
    }

    /// Possession began early and correction is still running.
    pub fn is_handoff_pending(&self) -> bool {
        self.handoff.is_some()
    }

    /// World pose of the body.
    pub fn pose(&self) -> Pose {
        self.body.pose()
    }

    // ========== Transport operations ==========

    /// Breakable approach toward `target`.
    ///
    /// `Arrived` possesses the piece under `target`: snapped into place, or,
    /// with `smooth_handoff`, possessed where it is and corrected over the
    /// following calls. `Lost` returns the piece to free physics.
    pub fn move_breakable(
        &mut self,
        frames: &FrameTree,
        target: FrameId,
        holder: Holder,
        params: &BreakableParams,
        smooth_handoff: bool,
        ctx: &TickContext,
    ) -> GuidanceReport {
        if self.regime == PhysicsRegime::Possessed {
            return self.continue_handoff(frames, ctx);
        }

        self.enter_guided();
        let target_pose = frames.world_pose(target);
        let report = guidance::move_to_breakable(&mut self.body, &target_pose, params, ctx);

        if report.is_arrived() {
            if smooth_handoff {
                self.enter_possessed(frames, target, holder.group);
                self.handoff = Some(Handoff {
                    target,
                    linear_speed_in: params.approach_speed_in,
                    angular_speed_deg: params.max_angular_speed_deg,
                });
                log::debug!("piece {:?} possessed early, correcting toward frame {}", self.id, frames.name(target));
            } else {
                let rotation = find_shortest_symmetric_rotation(
                    &self.body.rotation,
                    &target_pose.rotation,
                    self.descriptor.symmetry,
                );
                self.body.position = target_pose.translation.vector;
                self.body.rotation = rotation;
                self.enter_possessed(frames, target, holder.group);
                log::debug!("piece {:?} snapped into frame {}", self.id, frames.name(target));
            }
        } else if report.is_lost() {
            log::debug!("piece {:?} lost at {:.1}in, back to world", self.id, report.distance_in());
            self.restore_world(frames);
        }
        report
    }

    fn continue_handoff(&mut self, frames: &FrameTree, ctx: &TickContext) -> GuidanceReport {
        let Some(handoff) = self.handoff else {
            return GuidanceReport::arrived_in_place();
        };
        self.sync_attached(frames);
        let parent_pose = self.parent.map(|p| frames.world_pose(p));
        let target_pose = frames.world_pose(handoff.target);
        let report = guidance::move_to(
            &mut self.body,
            &mut self.stepped,
            parent_pose.as_ref(),
            &target_pose,
            handoff.linear_speed_in,
            handoff.angular_speed_deg,
            self.descriptor.symmetry,
            ctx,
        );
        self.refresh_local(frames);
        if report.is_arrived() {
            self.handoff = None;
        }
        // possession already happened; the approach itself is done
        GuidanceReport::new(guidance::GuidanceOutcome::Arrived, report.displacement)
    }

    /// Stepped approach toward `target`; re-parents under it on arrival.
    ///
    /// A missing target is "nothing to do" and arrives in place. With
    /// `smooth_handoff` the piece is re-parented at the start of the leg.
    pub fn move_to(
        &mut self,
        frames: &FrameTree,
        target: Option<FrameId>,
        holder: Holder,
        linear_speed_in: f32,
        angular_speed_deg: f32,
        smooth_handoff: bool,
        ctx: &TickContext,
    ) -> GuidanceReport {
        let Some(target) = target else {
            return GuidanceReport::arrived_in_place();
        };

        self.sync_attached(frames);
        self.handoff = None;
        if self.regime != PhysicsRegime::Possessed {
            let parent = self.parent.unwrap_or(target);
            self.enter_possessed(frames, parent, holder.group);
        }
        if smooth_handoff && self.parent != Some(target) {
            self.attach(frames, target);
        }

        let parent_pose = self.parent.map(|p| frames.world_pose(p));
        let target_pose = frames.world_pose(target);
        let report = guidance::move_to(
            &mut self.body,
            &mut self.stepped,
            parent_pose.as_ref(),
            &target_pose,
            linear_speed_in,
            angular_speed_deg,
            self.descriptor.symmetry,
            ctx,
        );

        if report.is_arrived() {
            self.attach(frames, target);
        } else {
            self.refresh_local(frames);
        }
        report
    }

    /// Return to free physics and apply `force` (piece-local) once.
    ///
    /// Disabled ticks restore physics but apply nothing.
    pub fn release(&mut self, frames: &FrameTree, force: Vec3, mode: ForceMode, ctx: &TickContext) {
        self.restore_world(frames);
        if !ctx.disabled {
            let world_force = self.body.rotation * force;
            self.body.apply_force(world_force, mode);
        }
        log::debug!("piece {:?} released ({:?})", self.id, mode);
    }

    /// Return to free physics; the caller hosts the returned task, which
    /// pushes with `force` (N, piece-local) every tick for `duration`
    /// seconds while the piece is slower than `speed_cap` (m/s).
    pub fn release_continued(
        &mut self,
        frames: &FrameTree,
        force: Vec3,
        duration: f32,
        speed_cap: f32,
    ) -> ContinuedRelease {
        self.restore_world(frames);
        log::debug!("piece {:?} released with sustained force for {:.2}s", self.id, duration);
        ContinuedRelease::new(self.id, force, duration, speed_cap)
    }

    /// Give up a guided/possessed piece without pushing it.
    pub fn drop_to_world(&mut self, frames: &FrameTree) {
        self.restore_world(frames);
    }

    // ========== Regime transitions ==========

    fn enter_guided(&mut self) {
        self.regime = PhysicsRegime::Guided;
        self.parent = None;
        self.body.kinematic = false;
        self.body.use_gravity = false;
        self.body.detect_collisions = true;
    }

    fn enter_possessed(&mut self, frames: &FrameTree, parent: FrameId, group: CollisionGroup) {
        if let Some(previous) = self.holder_group {
            if previous != group {
                self.body.set_ignore_collisions(previous, false);
            }
        }
        self.regime = PhysicsRegime::Possessed;
        self.body.kinematic = true;
        self.body.use_gravity = false;
        self.body.detect_collisions = true;
        self.body.zero_velocity();
        self.body.clear_forces();
        self.body.set_ignore_collisions(group, true);
        self.holder_group = Some(group);
        self.stepped.reset();
        self.attach(frames, parent);
    }

    fn restore_world(&mut self, frames: &FrameTree) {
        self.sync_attached(frames);
        self.regime = PhysicsRegime::InWorld;
        self.parent = None;
        self.local = Pose::identity();
        self.body.kinematic = false;
        self.body.use_gravity = true;
        self.body.detect_collisions = true;
        if let Some(group) = self.holder_group.take() {
            self.body.set_ignore_collisions(group, false);
        }
        self.body.mass = self.descriptor.mass;
        self.body.drag = self.descriptor.drag;
        self.body.angular_drag = self.descriptor.angular_drag;
        self.body.inertia = self.descriptor.release_inertia();
        self.body.zero_velocity();
        self.body.clear_forces();
        self.stepped.reset();
        self.handoff = None;
    }

    /// Parent under `frame`, keeping the current world pose.
    fn attach(&mut self, frames: &FrameTree, frame: FrameId) {
        self.parent = Some(frame);
        self.refresh_local(frames);
    }

    fn refresh_local(&mut self, frames: &FrameTree) {
        if let Some(parent) = self.parent {
            self.local = frames.world_pose(parent).inverse() * self.body.pose();
        }
    }

    // ========== World hooks ==========

    /// Re-derive the world pose of a parented piece from its frame.
    pub(crate) fn sync_attached(&mut self, frames: &FrameTree) {
        if let Some(parent) = self.parent {
            let world = frames.world_pose(parent) * self.local;
            self.body.set_pose(&world);
        }
    }

    pub(crate) fn integrate(&mut self, dt: f32, gravity: Vec3, floor: Option<f32>) {
        if self.parent.is_some() || self.body.kinematic {
            self.body.clear_forces();
            return;
        }
        self.body.integrate(dt, gravity);
        if let Some(floor) = floor {
            let rest = floor + self.descriptor.radius;
            if self.body.position.y < rest {
                self.body.position.y = rest;
                if self.body.linear_velocity.y < 0.0 {
                    self.body.linear_velocity.y = 0.0;
                }
            }
        }
    }
}
