//! End-to-end pipeline tests: intake → node → release on a single robot.

use crate::context::TickContext;
use crate::events::PieceEventType;
use crate::guidance::{move_to_breakable, BreakableParams};
use crate::intake::{CaptureVolume, IntakeId, IntakeSpec};
use crate::math::{pose, quat_from_euler_deg, Pose, Quat, Vec3};
use crate::node::{Node, NodeId, RobotId, StateSpec};
use crate::physics::{CollisionGroup, CollisionLayer, ForceMode, FrameId, PieceId, RigidBody, VolumeShape};
use crate::physics_constants::units::inches;
use crate::piece::{PhysicsRegime, PieceDescriptor, PieceOwner};
use crate::sim::Simulation;
use crate::timestep::FIXED_DT;

const MAX_TICKS: usize = 500;

struct Rig {
    sim: Simulation,
    robot: RobotId,
    node: NodeId,
    front: IntakeId,
    piece: PieceId,
    stow: FrameId,
}

fn cube() -> PieceDescriptor {
    PieceDescriptor::new("cube", CollisionLayer(2)).with_radius(0.05)
}

/// Robot at the origin with a mouth in front, a stow pose above and behind
/// it and an amp pose higher up. One cube lies on the floor ahead.
fn rig(smooth_stow: bool) -> Rig {
    let mut sim = Simulation::new(FIXED_DT);
    let robot = sim.add_robot("bot", CollisionGroup(4), Pose::identity()).unwrap();
    let root = sim.robot(robot).root_frame();

    let frames = &mut sim.world_mut().frames;
    let mouth = frames.add("bot/mouth", Some(root), pose(Vec3::new(0.0, 0.2, 0.4), Quat::identity())).unwrap();
    let stow = frames
        .add("bot/stow", Some(root), pose(Vec3::new(0.0, 0.5, -0.1), quat_from_euler_deg([0.0, 90.0, 0.0])))
        .unwrap();
    let amp = frames.add("bot/amp", Some(root), pose(Vec3::new(0.0, 0.8, 0.3), Quat::identity())).unwrap();

    let (bot, _) = sim.robot_and_world(robot);
    let front = bot
        .add_intake(IntakeSpec {
            name: "front".to_string(),
            kind: "cube".to_string(),
            layer: CollisionLayer(2),
            target: mouth,
            volumes: vec![CaptureVolume { frame: mouth, shape: VolumeShape::Sphere { radius: 0.3 } }],
            params: BreakableParams::default(),
            smooth_handoff: false,
        })
        .unwrap();
    let node = bot
        .add_node(
            "cube",
            "cube",
            vec![
                StateSpec::new("Stow", Some(stow)).with_smooth_handoff(smooth_stow),
                StateSpec::new("Amp", Some(amp)).with_speeds(40.0, 180.0),
                StateSpec::new("Hold", None),
            ],
            &["front"],
        )
        .unwrap();

    let piece = sim.spawn(cube(), &pose(Vec3::new(0.0, 0.05, 0.6), Quat::identity()));
    Rig { sim, robot, node, front, piece, stow }
}

impl Rig {
    fn node(&self) -> &Node {
        self.sim.robot(self.robot).node(self.node)
    }

    fn request(&mut self, enabled: bool) {
        self.sim.request_intake(self.robot, self.node, self.front, enabled);
    }

    fn step(&mut self) {
        self.sim.step();
        assert_invariants(&self.sim);
    }

    fn step_until(&mut self, mut done: impl FnMut(&Self) -> bool) {
        for _ in 0..MAX_TICKS {
            if done(self) {
                return;
            }
            self.step();
        }
        panic!("condition not reached within {MAX_TICKS} ticks");
    }

    fn capture(&mut self) {
        self.request(true);
        self.step_until(|r| r.node().has_piece());
    }

    fn settle(&mut self) {
        self.capture();
        self.step_until(|r| r.node().is_at_target());
    }

    fn release(&mut self, force: Vec3, mode: ForceMode, require_at_target: bool) -> bool {
        self.sim.release(self.robot, self.node, force, mode, require_at_target)
    }
}

/// Exclusive ownership, and ordinal > 0 exactly when a node drives a piece.
fn assert_invariants(sim: &Simulation) {
    for piece in sim.world().pieces() {
        let id = piece.id();
        let node_holders = sim.robots().iter().flat_map(|r| r.nodes()).filter(|n| n.controller() == Some(id)).count();
        let intake_holders = sim
            .robots()
            .iter()
            .flat_map(|r| r.intakes())
            .filter(|i| i.candidate() == Some(id) && i.is_capturing())
            .count();
        assert!(node_holders + intake_holders <= 1, "{id:?} held {node_holders}+{intake_holders} times");

        match piece.owner() {
            PieceOwner::Unowned => assert_eq!(node_holders + intake_holders, 0, "{id:?} unowned but held"),
            PieceOwner::Intake { robot, intake } => {
                let intake = sim.robot(robot).intake(intake);
                assert_eq!(intake.candidate(), Some(id));
                assert!(intake.is_capturing());
                assert_eq!(node_holders, 0);
            }
            PieceOwner::Node { robot, node } => {
                assert_eq!(sim.robot(robot).node(node).controller(), Some(id));
                assert_eq!(intake_holders, 0);
            }
        }
    }
    for node in sim.robots().iter().flat_map(|r| r.nodes()) {
        assert_eq!(node.current_ordinal() > 0, node.controller().is_some());
    }
    // replayed log never starts a second ownership before the first ends
    for piece in sim.world().pieces() {
        let mut owned = false;
        for event in sim.events().for_piece(piece.id()) {
            if event.event_type.starts_ownership() {
                assert!(!owned, "{:?} captured twice at tick {}", piece.id(), event.tick);
                owned = true;
            } else if event.event_type.ends_ownership() {
                owned = false;
            }
        }
    }
}

#[test]
fn test_stow_then_release_with_impulse() {
    let mut rig = rig(false);
    rig.capture();
    assert_eq!(rig.node().current_ordinal(), 1);
    assert!(!rig.node().is_at_target());
    assert_eq!(rig.sim.world().piece(rig.piece).unwrap().owner(), PieceOwner::Node {
        robot: rig.robot,
        node: rig.node
    });

    rig.step_until(|r| r.node().is_at_target());
    assert_eq!(rig.node().settled_state_name(), Some("stow"));
    let piece = rig.sim.world().piece(rig.piece).unwrap();
    assert_eq!(piece.parent(), Some(rig.stow));
    assert_eq!(piece.regime(), PhysicsRegime::Possessed);
    let stow_pos = rig.sim.world().frames.world_pose(rig.stow).translation.vector;
    assert!((piece.body().position - stow_pos).norm() < 1e-4);

    assert!(rig.release(Vec3::new(0.0, 0.0, 0.5), ForceMode::Impulse, true));
    assert_eq!(rig.node().current_ordinal(), 0);
    assert_eq!(rig.node().controller(), None);
    assert!(!rig.node().has_piece());
    assert!(rig.node().current_state().is_none());

    let piece = rig.sim.world().piece(rig.piece).unwrap();
    assert_eq!(piece.owner(), PieceOwner::Unowned);
    assert_eq!(piece.regime(), PhysicsRegime::InWorld);
    assert!(!piece.body().ignores(CollisionGroup(4)));
    // stow faces +X, so local forward is world +X; 0.5 N·s on 0.25 kg
    assert!((piece.body().linear_velocity - Vec3::new(2.0, 0.0, 0.0)).norm() < 1e-3);
    assert_eq!(rig.sim.events().count(PieceEventType::Released), 1);
}

#[test]
fn test_release_is_idempotent() {
    let mut rig = rig(false);
    assert!(!rig.release(Vec3::z(), ForceMode::Impulse, true));
    assert!(!rig.release(Vec3::z(), ForceMode::Impulse, true));

    rig.settle();
    assert!(rig.release(Vec3::new(0.0, 0.0, 0.5), ForceMode::Impulse, true));
    let velocity = rig.sim.world().piece(rig.piece).unwrap().body().linear_velocity;
    assert!(!rig.release(Vec3::new(0.0, 0.0, 0.5), ForceMode::Impulse, true));
    assert!(!rig.release(Vec3::new(0.0, 0.0, 0.5), ForceMode::Impulse, false));
    assert_eq!(rig.sim.world().piece(rig.piece).unwrap().body().linear_velocity, velocity);
    assert_eq!(rig.sim.events().count(PieceEventType::Released), 1);
}

#[test]
fn test_same_tick_request_on_then_off_leaves_capture_disabled() {
    let mut rig = rig(false);
    rig.request(true);
    rig.request(false);
    for _ in 0..60 {
        rig.step();
    }
    assert!(!rig.sim.robot(rig.robot).intake(rig.front).is_requested());
    assert!(!rig.node().has_piece());
    assert_eq!(rig.sim.events().count(PieceEventType::CaptureStarted), 0);
    assert!(rig.sim.world().piece(rig.piece).unwrap().owner().is_unowned());

    // and the other way round the last request still wins
    rig.request(false);
    rig.request(true);
    rig.step_until(|r| r.node().has_piece());
}

#[test]
fn test_release_requires_at_target_unless_waived() {
    let mut rig = rig(false);
    rig.capture();
    assert!(!rig.node().is_at_target());
    assert!(!rig.release(Vec3::z(), ForceMode::VelocityChange, true));
    assert!(rig.node().has_piece());
    assert!(rig.release(Vec3::z(), ForceMode::VelocityChange, false));
    assert!(!rig.node().has_piece());
}

#[test]
fn test_retarget_finishes_current_leg_first() {
    let mut rig = rig(false);
    rig.capture();
    rig.sim.set_target_state(rig.robot, rig.node, "AMP");
    rig.step();
    assert_eq!(rig.node().current_state().unwrap().name, "stow");
    assert_eq!(rig.node().requested_state_name(), "amp");

    rig.step_until(|r| r.node().settled_state_name() == Some("amp"));
    assert_eq!(rig.node().current_ordinal(), 2);

    let settled: Vec<_> = rig
        .sim
        .events()
        .of_type(PieceEventType::Settled)
        .filter_map(|e| e.details.clone())
        .collect();
    assert_eq!(settled, vec!["stow".to_string(), "amp".to_string()]);
}

#[test]
fn test_hold_state_without_frame_settles_in_place() {
    let mut rig = rig(false);
    rig.settle();
    rig.sim.set_target_state(rig.robot, rig.node, "hold");
    let before = rig.sim.world().piece(rig.piece).unwrap().pose();
    rig.step();
    assert!(rig.node().is_at_target());
    assert_eq!(rig.node().settled_state_name(), Some("hold"));
    let after = rig.sim.world().piece(rig.piece).unwrap().pose();
    assert!((after.translation.vector - before.translation.vector).norm() < 1e-5);
}

#[test]
fn test_unknown_target_state_keeps_request() {
    let mut rig = rig(false);
    rig.settle();
    rig.sim.set_target_state(rig.robot, rig.node, "trap");
    rig.step();
    assert_eq!(rig.node().requested_state_name(), "stow");
    assert!(rig.node().is_at_target());
}

#[test]
fn test_smooth_handoff_reparents_at_leg_start() {
    let mut rig = rig(true);
    rig.capture();
    assert!(!rig.node().is_at_target());
    let piece = rig.sim.world().piece(rig.piece).unwrap();
    assert_eq!(piece.parent(), Some(rig.stow));
    rig.step_until(|r| r.node().is_at_target());
    assert_eq!(rig.node().settled_state_name(), Some("stow"));
}

#[test]
fn test_continued_release_is_hosted_until_done() {
    let mut rig = rig(false);
    rig.settle();
    assert!(rig.sim.release_continued(rig.robot, rig.node, Vec3::new(0.0, 0.0, 2.0), 0.2, 3.0, true));
    assert_eq!(rig.node().current_ordinal(), 0);
    assert_eq!(rig.sim.robot(rig.robot).tasks().len(), 1);

    for _ in 0..15 {
        rig.step();
    }
    assert!(rig.sim.robot(rig.robot).tasks().is_empty());
    assert_eq!(rig.sim.events().count(PieceEventType::ReleaseFinished), 1);
    let body = rig.sim.world().piece(rig.piece).unwrap().body();
    // pushed along stow forward (+X) for 0.2 s at 8 m/s²
    assert!(body.linear_velocity.x > 1.0);
    assert!(body.linear_velocity.x <= 3.0 + 1e-3);
}

#[test]
fn test_continued_release_respects_speed_cap() {
    let mut rig = rig(false);
    rig.settle();
    assert!(rig.sim.release_continued(rig.robot, rig.node, Vec3::new(0.0, 0.0, 5.0), 1.0, 0.5, true));
    for _ in 0..60 {
        rig.step();
    }
    let body = rig.sim.world().piece(rig.piece).unwrap().body();
    // at most one push past the cap: 20 m/s² · 0.02 s
    assert!(body.linear_velocity.x < 0.5 + 0.4 + 1e-3);
}

#[test]
fn test_disabled_release_applies_no_force() {
    let mut rig = rig(false);
    rig.settle();
    rig.sim.set_disabled(true);
    assert!(rig.release(Vec3::new(0.0, 0.0, 5.0), ForceMode::VelocityChange, true));
    let piece = rig.sim.world().piece(rig.piece).unwrap();
    assert_eq!(piece.regime(), PhysicsRegime::InWorld);
    assert_eq!(piece.body().linear_velocity, Vec3::zeros());
}

#[test]
fn test_despawned_piece_empties_node() {
    let mut rig = rig(false);
    rig.settle();
    assert!(rig.sim.despawn(rig.piece));
    rig.step();
    assert!(!rig.node().has_piece());
    assert_eq!(rig.node().current_ordinal(), 0);
    assert_eq!(rig.sim.events().count(PieceEventType::Despawned), 1);
    assert!(!rig.release(Vec3::z(), ForceMode::Impulse, false));
}

#[test]
fn test_full_node_blocks_second_capture_until_release() {
    let mut rig = rig(false);
    rig.settle();
    let second = rig.sim.spawn(cube(), &pose(Vec3::new(0.05, 0.05, 0.55), Quat::identity()));
    for _ in 0..40 {
        rig.step();
    }
    assert!(rig.sim.world().piece(second).unwrap().owner().is_unowned());
    assert_eq!(rig.sim.events().count(PieceEventType::CaptureStarted), 1);

    assert!(rig.release(Vec3::zeros(), ForceMode::Impulse, true));
    rig.step_until(|r| r.node().has_piece());
    assert_eq!(rig.node().controller(), Some(second));
}

#[test]
fn test_held_piece_follows_moving_robot() {
    let mut rig = rig(false);
    rig.settle();
    rig.sim.robot_mut(rig.robot).set_velocity(Vec3::new(1.0, 0.0, 0.0));
    for _ in 0..25 {
        rig.step();
    }
    let stow = rig.sim.world().frames.world_pose(rig.stow).translation.vector;
    let piece = rig.sim.world().piece(rig.piece).unwrap();
    assert!((stow.x - 0.5).abs() < 1e-3);
    assert!((piece.body().position - stow).norm() < 1e-4);
}

#[test]
fn test_breakable_arrives_for_any_positive_speed() {
    let ctx = TickContext::default();
    for speed in [5.0, 20.0, 60.0, 240.0] {
        let params = BreakableParams::default().with_approach(speed, 1.0).with_rotation(false, 1.0, 360.0);
        let mut body = RigidBody::new(0.25, 0.0, 0.0, Vec3::new(0.01, 0.01, 0.01), CollisionLayer(1));
        body.position = Vec3::new(inches(10.0), 0.0, 0.0);
        let target = Pose::identity();

        let mut arrived = false;
        for _ in 0..5_000 {
            let report = move_to_breakable(&mut body, &target, &params, &ctx);
            assert!(!report.is_lost(), "speed {speed}: lost");
            if report.is_arrived() {
                arrived = true;
                break;
            }
            body.integrate(ctx.dt(), Vec3::zeros());
        }
        assert!(arrived, "speed {speed}: never arrived");
    }
}

struct TwinRig {
    sim: Simulation,
    robot: RobotId,
    node: NodeId,
    left: IntakeId,
    right: IntakeId,
    left_piece: PieceId,
    right_piece: PieceId,
}

/// One node fed by a left and a right intake, each with a cube in front.
fn twin_rig() -> TwinRig {
    let mut sim = Simulation::new(FIXED_DT);
    let robot = sim.add_robot("bot", CollisionGroup(4), Pose::identity()).unwrap();
    let root = sim.robot(robot).root_frame();
    let stow = sim
        .world_mut()
        .frames
        .add("bot/stow", Some(root), pose(Vec3::new(0.0, 0.5, -0.1), Quat::identity()))
        .unwrap();

    let mut ids = Vec::new();
    for (name, x) in [("left", -0.4), ("right", 0.4)] {
        let mouth = sim
            .world_mut()
            .frames
            .add(&format!("bot/{name}"), Some(root), pose(Vec3::new(x, 0.2, 0.4), Quat::identity()))
            .unwrap();
        let (bot, _) = sim.robot_and_world(robot);
        let id = bot
            .add_intake(IntakeSpec {
                name: name.to_string(),
                kind: "cube".to_string(),
                layer: CollisionLayer(2),
                target: mouth,
                volumes: vec![CaptureVolume { frame: mouth, shape: VolumeShape::Sphere { radius: 0.3 } }],
                params: BreakableParams::default(),
                smooth_handoff: false,
            })
            .unwrap();
        ids.push(id);
    }
    let (bot, _) = sim.robot_and_world(robot);
    let node = bot.add_node("cube", "cube", vec![StateSpec::new("Stow", Some(stow))], &["left", "right"]).unwrap();

    let left_piece = sim.spawn(cube(), &pose(Vec3::new(-0.4, 0.05, 0.6), Quat::identity()));
    let right_piece = sim.spawn(cube(), &pose(Vec3::new(0.4, 0.05, 0.6), Quat::identity()));
    TwinRig { sim, robot, node, left: ids[0], right: ids[1], left_piece, right_piece }
}

impl TwinRig {
    fn capturing(&self) -> usize {
        self.sim.robot(self.robot).intakes().iter().filter(|i| i.is_capturing()).count()
    }

    fn captures_by(&self, name: &str) -> usize {
        self.sim
            .events()
            .of_type(PieceEventType::CaptureStarted)
            .filter(|e| e.details.as_deref() == Some(name))
            .count()
    }
}

#[test]
fn test_sibling_intakes_never_capture_together() {
    let mut rig = twin_rig();
    rig.sim.request_intake(rig.robot, rig.node, rig.left, true);
    rig.sim.request_intake(rig.robot, rig.node, rig.right, true);

    rig.sim.step();
    assert_invariants(&rig.sim);
    assert_eq!(rig.sim.events().count(PieceEventType::CaptureStarted), 1);
    assert_eq!(rig.captures_by("left"), 1);
    assert!(rig.sim.world().piece(rig.right_piece).unwrap().owner().is_unowned());

    for _ in 0..MAX_TICKS {
        assert!(rig.capturing() <= 1, "two intakes capturing at tick {}", rig.sim.tick());
        if rig.sim.robot(rig.robot).node(rig.node).has_piece() {
            break;
        }
        rig.sim.step();
        assert_invariants(&rig.sim);
    }
    let node = rig.sim.robot(rig.robot).node(rig.node);
    assert_eq!(node.controller(), Some(rig.left_piece));

    // the node is full, so the right intake stays idle
    for _ in 0..40 {
        rig.sim.step();
        assert_invariants(&rig.sim);
        assert_eq!(rig.capturing(), 0);
    }
    assert_eq!(rig.captures_by("right"), 0);
}

#[test]
fn test_unrequested_sibling_never_captures() {
    let mut rig = twin_rig();
    rig.sim.request_intake(rig.robot, rig.node, rig.left, true);
    for _ in 0..120 {
        rig.sim.step();
        assert_invariants(&rig.sim);
        assert!(!rig.sim.robot(rig.robot).intake(rig.right).is_capturing());
    }
    assert_eq!(rig.captures_by("right"), 0);
    assert!(rig.sim.world().piece(rig.right_piece).unwrap().owner().is_unowned());
    assert_eq!(rig.sim.robot(rig.robot).node(rig.node).controller(), Some(rig.left_piece));
}
