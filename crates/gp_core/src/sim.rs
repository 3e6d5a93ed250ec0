//! Fixed-timestep host
//!
//! Tick order:
//! 1. robot root motion
//! 2. every robot's intakes (after its queued capture requests resolve)
//! 3. every robot's nodes, then its hosted release tasks
//! 4. caller logic ([`Simulation::step_with`])
//! 5. physics integration
//!
//! Robots run in insertion order; nothing runs concurrently.

use crate::context::TickContext;
use crate::error::{ConfigError, Result};
use crate::events::{EventLog, PieceEvent, PieceEventType};
use crate::intake::IntakeId;
use crate::math::{Pose, Vec3};
use crate::node::{NodeId, Robot, RobotId};
use crate::physics::{CollisionGroup, ForceMode, PieceId, World};
use crate::physics_constants::units::to_inches;
use crate::piece::{PhysicsRegime, PieceDescriptor, PieceOwner};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
pub struct Simulation {
    world: World,
    robots: Vec<Robot>,
    robot_names: FxHashMap<String, RobotId>,
    events: EventLog,
    ctx: TickContext,
}

impl Simulation {
    pub fn new(dt: f32) -> Self {
        Self::with_world(World::new(), dt)
    }

    pub fn with_world(world: World, dt: f32) -> Self {
        Self {
            world,
            robots: Vec::new(),
            robot_names: FxHashMap::default(),
            events: EventLog::new(),
            ctx: TickContext::new(dt),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Context of the tick in progress (or about to run).
    pub fn ctx(&self) -> &TickContext {
        &self.ctx
    }

    pub fn tick(&self) -> u64 {
        self.ctx.tick
    }

    pub fn is_disabled(&self) -> bool {
        self.ctx.disabled
    }

    /// Takes effect for the rest of the current tick and every later one.
    pub fn set_disabled(&mut self, disabled: bool) {
        if self.ctx.disabled != disabled {
            log::debug!("tick {}: {}", self.ctx.tick, if disabled { "disabled" } else { "enabled" });
        }
        self.ctx.disabled = disabled;
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<PieceEvent> {
        self.events.take()
    }

    // ========== Robots ==========

    /// Add a robot with a root frame of the same name at `root`.
    pub fn add_robot(&mut self, name: &str, group: CollisionGroup, root: Pose) -> Result<RobotId> {
        if self.robot_names.contains_key(name) {
            return Err(ConfigError::DuplicateName { what: "robot", name: name.to_string() });
        }
        let frame = self.world.frames.add(name, None, root)?;
        let id = RobotId(self.robots.len());
        self.robots.push(Robot::new(id, name, frame, group));
        self.robot_names.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn robot_id(&self, name: &str) -> Option<RobotId> {
        self.robot_names.get(name).copied()
    }

    /// # Panics
    /// If `id` was not issued by this simulation.
    pub fn robot(&self, id: RobotId) -> &Robot {
        &self.robots[id.0]
    }

    /// # Panics
    /// If `id` was not issued by this simulation.
    pub fn robot_mut(&mut self, id: RobotId) -> &mut Robot {
        &mut self.robots[id.0]
    }

    pub fn robots(&self) -> &[Robot] {
        &self.robots
    }

    /// Robot and world together, for wiring intakes against world frames.
    pub fn robot_and_world(&mut self, id: RobotId) -> (&mut Robot, &mut World) {
        (&mut self.robots[id.0], &mut self.world)
    }

    // ========== Pieces ==========

    pub fn spawn(&mut self, descriptor: PieceDescriptor, pose: &Pose) -> PieceId {
        self.world.spawn_piece(descriptor, pose)
    }

    /// External pooling removed a piece. Owners find out next tick.
    pub fn despawn(&mut self, piece: PieceId) -> bool {
        let Some(removed) = self.world.despawn_piece(piece) else {
            return false;
        };
        self.events
            .push(PieceEvent::new(self.ctx.tick, PieceEventType::Despawned, removed.owner().robot(), piece));
        true
    }

    // ========== Caller API (current tick) ==========

    pub fn request_intake(&mut self, robot: RobotId, node: NodeId, intake: IntakeId, enabled: bool) {
        self.robots[robot.0].request_intake(node, intake, enabled);
    }

    pub fn set_target_state(&mut self, robot: RobotId, node: NodeId, state: &str) {
        self.robots[robot.0].set_target_state(node, state);
    }

    pub fn release(&mut self, robot: RobotId, node: NodeId, force: Vec3, mode: ForceMode, require_at_target: bool) -> bool {
        let ctx = self.ctx;
        self.robots[robot.0].release_game_piece_with_force(
            node,
            &mut self.world,
            force,
            mode,
            require_at_target,
            &ctx,
            &mut self.events,
        )
    }

    pub fn release_continued(
        &mut self,
        robot: RobotId,
        node: NodeId,
        force: Vec3,
        duration: f32,
        speed_cap: f32,
        require_at_target: bool,
    ) -> bool {
        let ctx = self.ctx;
        self.robots[robot.0].release_game_piece_with_continued_force(
            node,
            &mut self.world,
            force,
            duration,
            speed_cap,
            require_at_target,
            &ctx,
            &mut self.events,
        )
    }

    // ========== Stepping ==========

    pub fn step(&mut self) {
        self.step_with(|_| {});
    }

    /// One tick with `logic` run after the orchestrators and before physics.
    pub fn step_with(&mut self, logic: impl FnOnce(&mut Self)) {
        let ctx = self.ctx;
        for robot in &self.robots {
            robot.drive(&mut self.world, &ctx);
        }
        self.world.sync_attached();

        for robot in &mut self.robots {
            robot.advance_intakes(&mut self.world, &ctx, &mut self.events);
        }
        for robot in &mut self.robots {
            robot.advance_nodes(&mut self.world, &ctx, &mut self.events);
        }

        logic(self);

        let ctx = self.ctx;
        self.world.step(&ctx);
        self.ctx = ctx.next();
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    // ========== Reporting ==========

    pub fn report(&self) -> ScenarioReport {
        let pieces = self
            .world
            .pieces()
            .map(|p| {
                let pos = p.body().position;
                PieceReport {
                    id: p.id(),
                    kind: p.kind().to_string(),
                    position_in: [to_inches(pos.x), to_inches(pos.y), to_inches(pos.z)],
                    regime: p.regime(),
                    owner: p.owner(),
                }
            })
            .collect();
        let nodes = self
            .robots
            .iter()
            .flat_map(|r| {
                r.nodes().iter().map(move |n| NodeReport {
                    robot: r.name().to_string(),
                    node: n.name().to_string(),
                    ordinal: n.current_ordinal(),
                    state: n.current_state().map(|s| s.name.clone()),
                    settled: n.settled_state_name().map(str::to_string),
                    at_target: n.is_at_target(),
                    piece: n.controller(),
                })
            })
            .collect();
        ScenarioReport { ticks: self.ctx.tick, events: self.events.events().to_vec(), pieces, nodes }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PieceReport {
    pub id: PieceId,
    pub kind: String,
    pub position_in: [f32; 3],
    pub regime: PhysicsRegime,
    pub owner: PieceOwner,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    pub robot: String,
    pub node: String,
    pub ordinal: u32,
    pub state: Option<String>,
    pub settled: Option<String>,
    pub at_target: bool,
    pub piece: Option<PieceId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub ticks: u64,
    pub events: Vec<PieceEvent>,
    pub pieces: Vec<PieceReport>,
    pub nodes: Vec<NodeReport>,
}

// ============================================================
// Scripted scenarios
// ============================================================

/// A caller action with every name already resolved.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    RequestIntake { robot: RobotId, node: NodeId, intake: IntakeId, enabled: bool },
    SetTargetState { robot: RobotId, node: NodeId, state: String },
    Release { robot: RobotId, node: NodeId, force: Vec3, mode: ForceMode, require_at_target: bool },
    ReleaseContinued {
        robot: RobotId,
        node: NodeId,
        force: Vec3,
        duration: f32,
        speed_cap: f32,
        require_at_target: bool,
    },
    SetDisabled(bool),
    Despawn(PieceId),
}

impl Command {
    pub fn apply(&self, sim: &mut Simulation) {
        match self {
            Command::RequestIntake { robot, node, intake, enabled } => {
                sim.request_intake(*robot, *node, *intake, *enabled)
            }
            Command::SetTargetState { robot, node, state } => sim.set_target_state(*robot, *node, state),
            Command::Release { robot, node, force, mode, require_at_target } => {
                if !sim.release(*robot, *node, *force, *mode, *require_at_target) {
                    log::warn!("tick {}: release on {:?}/{:?} refused", sim.tick(), robot, node);
                }
            }
            Command::ReleaseContinued { robot, node, force, duration, speed_cap, require_at_target } => {
                if !sim.release_continued(*robot, *node, *force, *duration, *speed_cap, *require_at_target) {
                    log::warn!("tick {}: continued release on {:?}/{:?} refused", sim.tick(), robot, node);
                }
            }
            Command::SetDisabled(disabled) => sim.set_disabled(*disabled),
            Command::Despawn(piece) => {
                sim.despawn(*piece);
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScriptStep {
    pub tick: u64,
    pub command: Command,
}

/// A built simulation plus its tick-stamped script.
#[derive(Clone, Debug)]
pub struct Scenario {
    pub sim: Simulation,
    /// Sorted by tick, stable within a tick
    script: Vec<ScriptStep>,
    cursor: usize,
    pub ticks: u64,
}

impl Scenario {
    pub fn new(sim: Simulation, mut script: Vec<ScriptStep>, ticks: u64) -> Self {
        script.sort_by_key(|s| s.tick);
        Self { sim, script, cursor: 0, ticks }
    }

    pub fn script(&self) -> &[ScriptStep] {
        &self.script
    }

    /// One tick; commands stamped with this tick run as caller logic.
    pub fn step(&mut self) {
        let tick = self.sim.tick();
        let start = self.cursor;
        while self.cursor < self.script.len() && self.script[self.cursor].tick <= tick {
            self.cursor += 1;
        }
        let due = &self.script[start..self.cursor];
        self.sim.step_with(|sim| {
            for step in due {
                step.command.apply(sim);
            }
        });
    }

    /// Run the configured number of ticks and report.
    pub fn run(mut self) -> ScenarioReport {
        for _ in 0..self.ticks {
            self.step();
        }
        self.sim.report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{pose, Quat};
    use crate::physics::CollisionLayer;
    use crate::timestep::FIXED_DT;

    #[test]
    fn test_tick_counter_and_disabled_flag() {
        let mut sim = Simulation::new(FIXED_DT);
        sim.step();
        sim.step_with(|s| s.set_disabled(true));
        assert_eq!(sim.tick(), 2);
        assert!(sim.is_disabled());
    }

    #[test]
    fn test_despawn_records_event_once() {
        let mut sim = Simulation::new(FIXED_DT);
        let id = sim.spawn(PieceDescriptor::new("cube", CollisionLayer(1)), &pose(Vec3::zeros(), Quat::identity()));
        assert!(sim.despawn(id));
        assert!(!sim.despawn(id));
        assert_eq!(sim.events().count(PieceEventType::Despawned), 1);
        assert!(sim.report().pieces.is_empty());
    }

    #[test]
    fn test_duplicate_robot_rejected() {
        let mut sim = Simulation::new(FIXED_DT);
        sim.add_robot("a", CollisionGroup(1), Pose::identity()).unwrap();
        assert!(sim.add_robot("a", CollisionGroup(2), Pose::identity()).is_err());
    }

    #[test]
    fn test_script_runs_on_its_tick() {
        let mut sim = Simulation::new(FIXED_DT);
        let id = sim.spawn(PieceDescriptor::new("cube", CollisionLayer(1)), &Pose::identity());
        let script = vec![
            ScriptStep { tick: 3, command: Command::Despawn(id) },
            ScriptStep { tick: 1, command: Command::SetDisabled(true) },
        ];
        let mut scenario = Scenario::new(sim, script, 5);
        scenario.step();
        assert!(!scenario.sim.is_disabled());
        scenario.step();
        assert!(scenario.sim.is_disabled());
        scenario.step();
        assert!(scenario.sim.world().contains(id));
        scenario.step();
        assert!(!scenario.sim.world().contains(id));
    }
}
