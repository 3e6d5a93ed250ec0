//! Intake front-end
//!
//! One per pickup point on a robot. Finds a candidate piece in its capture
//! volumes, pulls it in with breakable guidance while capture is requested
//! and permitted, and holds it as "secured" until the owning node claims it.
//!
//! ```text
//! Searching ──(candidate found)──▶ Candidate ──(requested+permitted)──▶ Capturing
//!     ▲                                                                    │
//!     └──────────────(lost / de-requested / despawned)─────────────────────┤
//!                                                                          ▼
//!                                                       Secured ──(remove_piece)──▶ Searching
//! ```

use crate::context::TickContext;
use crate::events::{EventLog, PieceEvent, PieceEventType};
use crate::guidance::BreakableParams;
use crate::node::RobotId;
use crate::physics::{CollisionGroup, CollisionLayer, FrameId, PieceId, VolumeShape, World};
use crate::piece::{Holder, PhysicsRegime, PieceOwner};
use serde::{Deserialize, Serialize};

/// Index of an intake within its robot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntakeId(pub(crate) usize);

impl IntakeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One capture sub-volume, placed at a frame. Shape is in metres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureVolume {
    pub frame: FrameId,
    pub shape: VolumeShape,
}

#[derive(Clone, Debug)]
pub struct Intake {
    id: IntakeId,
    robot: RobotId,
    name: String,
    kind: String,
    layer: CollisionLayer,
    target: FrameId,
    volumes: Vec<CaptureVolume>,
    params: BreakableParams,
    smooth_handoff: bool,

    candidate: Option<PieceId>,
    /// Owns the candidate and is running the breakable approach
    capturing: bool,
    secured: bool,
    requested: bool,
    /// Granted by the owning node right before each advance; an intake no
    /// node feeds from never captures
    permitted: bool,
}

/// Static wiring of one intake.
#[derive(Clone, Debug)]
pub struct IntakeSpec {
    pub name: String,
    pub kind: String,
    pub layer: CollisionLayer,
    pub target: FrameId,
    pub volumes: Vec<CaptureVolume>,
    pub params: BreakableParams,
    pub smooth_handoff: bool,
}

impl Intake {
    pub fn new(id: IntakeId, robot: RobotId, spec: IntakeSpec) -> Self {
        Self {
            id,
            robot,
            name: spec.name,
            kind: spec.kind,
            layer: spec.layer,
            target: spec.target,
            volumes: spec.volumes,
            params: spec.params,
            smooth_handoff: spec.smooth_handoff,
            candidate: None,
            capturing: false,
            secured: false,
            requested: false,
            permitted: false,
        }
    }

    pub fn id(&self) -> IntakeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn target_frame(&self) -> FrameId {
        self.target
    }

    pub fn volumes(&self) -> &[CaptureVolume] {
        &self.volumes
    }

    pub fn params(&self) -> &BreakableParams {
        &self.params
    }

    pub fn candidate(&self) -> Option<PieceId> {
        self.candidate
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn is_secured(&self) -> bool {
        self.secured
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }

    pub(crate) fn set_requested(&mut self, requested: bool) {
        self.requested = requested;
    }

    pub(crate) fn set_permitted(&mut self, permitted: bool) {
        self.permitted = permitted;
    }

    fn owner(&self) -> PieceOwner {
        PieceOwner::Intake { robot: self.robot, intake: self.id }
    }

    fn event(&self, ctx: &TickContext, event_type: PieceEventType, piece: PieceId) -> PieceEvent {
        PieceEvent::new(ctx.tick, event_type, Some(self.robot), piece).with_details(self.name.as_str())
    }

    /// One tick of the front-end.
    pub fn advance(&mut self, world: &mut World, group: CollisionGroup, ctx: &TickContext, events: &mut EventLog) {
        if let Some(piece) = self.candidate {
            if !world.contains(piece) {
                log::debug!("intake {}: candidate {:?} despawned", self.name, piece);
                if self.capturing {
                    events.push(self.event(ctx, PieceEventType::Dropped, piece).with_details("despawned"));
                }
                self.reset();
            }
        }

        let holder = Holder { robot: self.robot, group };

        if self.secured {
            // keep a smooth handoff converging until the node claims it
            if let Some(piece) = self.candidate {
                if let Some((controller, frames)) = world.piece_with_frames(piece) {
                    controller.move_breakable(frames, self.target, holder, &self.params, self.smooth_handoff, ctx);
                }
            }
            return;
        }

        if !self.capturing {
            self.search(world, ctx, events);
        }

        let Some(piece) = self.candidate else {
            return;
        };

        if !(self.requested && self.permitted) {
            if self.capturing {
                self.drop_candidate(world, piece);
                events.push(self.event(ctx, PieceEventType::Dropped, piece));
                log::debug!("intake {}: capture of {:?} withdrawn", self.name, piece);
            }
            return;
        }

        let owner = self.owner();
        let Some((controller, frames)) = world.piece_with_frames(piece) else {
            return;
        };
        if !self.capturing {
            controller.set_owner(owner);
            self.capturing = true;
            events.push(self.event(ctx, PieceEventType::CaptureStarted, piece));
        }

        let report = controller.move_breakable(frames, self.target, holder, &self.params, self.smooth_handoff, ctx);
        if report.is_arrived() {
            self.secured = true;
            events.push(self.event(ctx, PieceEventType::Secured, piece));
            log::debug!("intake {}: secured {:?}", self.name, piece);
        } else if report.is_lost() {
            controller.set_owner(PieceOwner::Unowned);
            events.push(self.event(ctx, PieceEventType::Lost, piece));
            log::debug!("intake {}: lost {:?} at {:.1}in", self.name, piece, report.distance_in());
            self.reset();
        }
    }

    /// Re-query the capture volumes and adopt the first free piece of our kind.
    fn search(&mut self, world: &World, ctx: &TickContext, events: &mut EventLog) {
        let found = self.volumes.iter().find_map(|volume| {
            let pose = world.frames.world_pose(volume.frame);
            world
                .overlap(&pose, &volume.shape, self.layer)
                .into_iter()
                .find(|id| self.is_eligible(world, *id))
        });
        if found != self.candidate {
            if let Some(piece) = found {
                events.push(self.event(ctx, PieceEventType::Detected, piece));
            }
            self.candidate = found;
        }
    }

    fn is_eligible(&self, world: &World, id: PieceId) -> bool {
        world.piece(id).is_some_and(|p| {
            p.kind() == self.kind && p.owner().is_unowned() && p.regime() == PhysicsRegime::InWorld
        })
    }

    fn drop_candidate(&mut self, world: &mut World, piece: PieceId) {
        if let Some((controller, frames)) = world.piece_with_frames(piece) {
            controller.drop_to_world(frames);
            controller.set_owner(PieceOwner::Unowned);
        }
        self.reset();
    }

    /// Hand the secured piece over. Returns `None` unless secured; the caller
    /// becomes responsible for the piece's ownership tag.
    pub fn remove_piece(&mut self) -> Option<PieceId> {
        if !self.secured {
            return None;
        }
        let piece = self.candidate;
        self.reset();
        piece
    }

    fn reset(&mut self) {
        self.candidate = None;
        self.capturing = false;
        self.secured = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{pose, Pose, Quat, Vec3};
    use crate::piece::PieceDescriptor;

    const GROUP: CollisionGroup = CollisionGroup(5);

    fn setup(piece_at: Vec3) -> (World, Intake, PieceId) {
        let mut world = World::new().with_floor(None).with_gravity(Vec3::zeros());
        let robot = world.frames.add("robot", None, Pose::identity()).unwrap();
        let mouth = world
            .frames
            .add("mouth", Some(robot), pose(Vec3::new(0.0, 0.2, 0.4), Quat::identity()))
            .unwrap();
        let mut intake = Intake::new(
            IntakeId(0),
            RobotId(0),
            IntakeSpec {
                name: "front".to_string(),
                kind: "cube".to_string(),
                layer: CollisionLayer(1),
                target: mouth,
                volumes: vec![
                    CaptureVolume { frame: mouth, shape: VolumeShape::Sphere { radius: 0.05 } },
                    CaptureVolume { frame: mouth, shape: VolumeShape::Sphere { radius: 0.5 } },
                ],
                params: BreakableParams::default().with_rotation(false, 1.0, 360.0),
                smooth_handoff: false,
            },
        );
        intake.set_permitted(true);
        let id = world.spawn_piece(
            PieceDescriptor::new("cube", CollisionLayer(1)).with_radius(0.05),
            &pose(piece_at, Quat::identity()),
        );
        (world, intake, id)
    }

    fn tick(world: &mut World, intake: &mut Intake, ctx: &mut TickContext, events: &mut EventLog) {
        intake.advance(world, GROUP, ctx, events);
        world.step(ctx);
        *ctx = ctx.next();
    }

    #[test]
    fn test_detects_without_request() {
        let (mut world, mut intake, id) = setup(Vec3::new(0.0, 0.2, 0.7));
        let mut events = EventLog::new();
        intake.advance(&mut world, GROUP, &TickContext::default(), &mut events);
        assert_eq!(intake.candidate(), Some(id));
        assert!(!intake.is_capturing());
        assert!(world.piece(id).unwrap().owner().is_unowned());
        assert_eq!(events.count(PieceEventType::Detected), 1);
    }

    #[test]
    fn test_capture_secures_and_hands_over() {
        let (mut world, mut intake, id) = setup(Vec3::new(0.0, 0.2, 0.7));
        intake.set_requested(true);
        let mut events = EventLog::new();
        let mut ctx = TickContext::default();
        for _ in 0..300 {
            tick(&mut world, &mut intake, &mut ctx, &mut events);
            if intake.is_secured() {
                break;
            }
        }
        assert!(intake.is_secured());
        let piece = world.piece(id).unwrap();
        assert_eq!(piece.regime(), PhysicsRegime::Possessed);
        assert_eq!(piece.owner(), PieceOwner::Intake { robot: RobotId(0), intake: IntakeId(0) });

        assert_eq!(intake.remove_piece(), Some(id));
        assert!(intake.remove_piece().is_none());
        assert!(!intake.is_secured());
    }

    #[test]
    fn test_derequest_drops_candidate() {
        let (mut world, mut intake, id) = setup(Vec3::new(0.0, 0.2, 0.8));
        intake.set_requested(true);
        let mut events = EventLog::new();
        let mut ctx = TickContext::default();
        tick(&mut world, &mut intake, &mut ctx, &mut events);
        assert!(intake.is_capturing());
        assert_eq!(world.piece(id).unwrap().regime(), PhysicsRegime::Guided);

        intake.set_requested(false);
        tick(&mut world, &mut intake, &mut ctx, &mut events);
        let piece = world.piece(id).unwrap();
        assert!(piece.owner().is_unowned());
        assert_eq!(piece.regime(), PhysicsRegime::InWorld);
        assert_eq!(events.count(PieceEventType::Dropped), 1);
        // still in the volume, so it is re-detected next tick as a plain candidate
        tick(&mut world, &mut intake, &mut ctx, &mut events);
        assert_eq!(intake.candidate(), Some(id));
        assert!(!intake.is_capturing());
    }

    #[test]
    fn test_not_permitted_never_captures() {
        let (mut world, mut intake, id) = setup(Vec3::new(0.0, 0.2, 0.7));
        intake.set_requested(true);
        intake.set_permitted(false);
        let mut events = EventLog::new();
        intake.advance(&mut world, GROUP, &TickContext::default(), &mut events);
        assert!(!intake.is_capturing());
        assert!(world.piece(id).unwrap().owner().is_unowned());
    }

    #[test]
    fn test_ignores_other_kinds_and_owned_pieces() {
        let (mut world, mut intake, id) = setup(Vec3::new(0.0, 5.0, 0.0));
        let cone = world.spawn_piece(
            PieceDescriptor::new("cone", CollisionLayer(1)),
            &pose(Vec3::new(0.0, 0.2, 0.4), Quat::identity()),
        );
        let taken = world.spawn_piece(
            PieceDescriptor::new("cube", CollisionLayer(1)),
            &pose(Vec3::new(0.0, 0.2, 0.45), Quat::identity()),
        );
        world.piece_mut(taken).unwrap().set_owner(PieceOwner::Intake { robot: RobotId(1), intake: IntakeId(0) });

        let mut events = EventLog::new();
        intake.advance(&mut world, GROUP, &TickContext::default(), &mut events);
        assert_eq!(intake.candidate(), None);
        assert!(world.contains(cone) && world.contains(id));
    }

    #[test]
    fn test_despawned_candidate_is_dropped() {
        let (mut world, mut intake, id) = setup(Vec3::new(0.0, 0.2, 0.8));
        intake.set_requested(true);
        let mut events = EventLog::new();
        let mut ctx = TickContext::default();
        tick(&mut world, &mut intake, &mut ctx, &mut events);
        assert!(intake.is_capturing());

        world.despawn_piece(id);
        tick(&mut world, &mut intake, &mut ctx, &mut events);
        assert_eq!(intake.candidate(), None);
        assert!(!intake.is_capturing());
    }

    #[test]
    fn test_lost_when_candidate_pulled_away() {
        let (mut world, mut intake, id) = setup(Vec3::new(0.0, 0.2, 0.8));
        intake.set_requested(true);
        let mut events = EventLog::new();
        let mut ctx = TickContext::default();
        tick(&mut world, &mut intake, &mut ctx, &mut events);

        world.piece_mut(id).unwrap().body_mut().position = Vec3::new(0.0, 0.2, 10.0);
        tick(&mut world, &mut intake, &mut ctx, &mut events);
        assert_eq!(events.count(PieceEventType::Lost), 1);
        assert!(world.piece(id).unwrap().owner().is_unowned());
        assert_eq!(world.piece(id).unwrap().regime(), PhysicsRegime::InWorld);
    }
}
