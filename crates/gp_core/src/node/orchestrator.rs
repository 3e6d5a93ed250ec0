//! Per-robot orchestrator
//!
//! A [`Robot`] owns its intakes and nodes, hosts sustained-release tasks and
//! exposes the per-tick entry points the host calls in order:
//! [`advance_intakes`](Robot::advance_intakes) then
//! [`advance_nodes`](Robot::advance_nodes).

use super::state::{StateSpec, StateTable};
use super::{Node, NodeId};
use crate::context::TickContext;
use crate::error::{ConfigError, Result};
use crate::events::{EventLog, PieceEvent, PieceEventType};
use crate::intake::{Intake, IntakeId, IntakeSpec};
use crate::math::Vec3;
use crate::physics::{CollisionGroup, ForceMode, FrameId, World};
use crate::piece::{ContinuedRelease, Holder, TaskStatus};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RobotId(pub(crate) usize);

impl RobotId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug)]
pub struct Robot {
    id: RobotId,
    name: String,
    root: FrameId,
    group: CollisionGroup,
    /// Root motion (m/s, world)
    velocity: Vec3,
    intakes: Vec<Intake>,
    nodes: Vec<Node>,
    intake_names: FxHashMap<String, IntakeId>,
    node_names: FxHashMap<String, NodeId>,
    tasks: Vec<ContinuedRelease>,
}

impl Robot {
    pub fn new(id: RobotId, name: &str, root: FrameId, group: CollisionGroup) -> Self {
        Self {
            id,
            name: name.to_string(),
            root,
            group,
            velocity: Vec3::zeros(),
            intakes: Vec::new(),
            nodes: Vec::new(),
            intake_names: FxHashMap::default(),
            node_names: FxHashMap::default(),
            tasks: Vec::new(),
        }
    }

    pub fn id(&self) -> RobotId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root_frame(&self) -> FrameId {
        self.root
    }

    pub fn collision_group(&self) -> CollisionGroup {
        self.group
    }

    pub fn holder(&self) -> Holder {
        Holder { robot: self.id, group: self.group }
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    // ========== Wiring ==========

    pub fn add_intake(&mut self, spec: IntakeSpec) -> Result<IntakeId> {
        if self.intake_names.contains_key(&spec.name) {
            return Err(ConfigError::DuplicateName { what: "intake", name: spec.name });
        }
        if spec.volumes.is_empty() {
            return Err(ConfigError::NoCaptureVolumes { intake: spec.name });
        }
        spec.params.validate()?;
        let id = IntakeId(self.intakes.len());
        self.intake_names.insert(spec.name.clone(), id);
        self.intakes.push(Intake::new(id, self.id, spec));
        Ok(id)
    }

    /// Add a node fed by the named intakes. An intake feeds at most one node
    /// and must collect the node's piece kind.
    pub fn add_node(&mut self, name: &str, kind: &str, states: Vec<StateSpec>, intakes: &[&str]) -> Result<NodeId> {
        if self.node_names.contains_key(name) {
            return Err(ConfigError::DuplicateName { what: "node", name: name.to_string() });
        }
        let table = StateTable::new(name, states)?;

        let mut attached = Vec::with_capacity(intakes.len());
        for intake_name in intakes {
            let id = self.intake_id(intake_name).ok_or_else(|| ConfigError::UnknownIntake {
                node: name.to_string(),
                intake: intake_name.to_string(),
            })?;
            let intake = &self.intakes[id.0];
            if intake.kind() != kind {
                return Err(ConfigError::KindMismatch {
                    node: name.to_string(),
                    node_kind: kind.to_string(),
                    intake: intake_name.to_string(),
                    intake_kind: intake.kind().to_string(),
                });
            }
            if attached.contains(&id) || self.nodes.iter().any(|n| n.intakes().contains(&id)) {
                return Err(ConfigError::DuplicateName { what: "intake attachment", name: intake_name.to_string() });
            }
            attached.push(id);
        }

        let id = NodeId(self.nodes.len());
        self.node_names.insert(name.to_string(), id);
        self.nodes.push(Node::new(id, self.id, name, kind, table, attached));
        Ok(id)
    }

    // ========== Lookup ==========

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.node_names.get(name).copied()
    }

    pub fn intake_id(&self, name: &str) -> Option<IntakeId> {
        self.intake_names.get(name).copied()
    }

    /// # Panics
    /// If `id` was not issued by this robot.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// # Panics
    /// If `id` was not issued by this robot.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// # Panics
    /// If `id` was not issued by this robot.
    pub fn intake(&self, id: IntakeId) -> &Intake {
        &self.intakes[id.0]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn intakes(&self) -> &[Intake] {
        &self.intakes
    }

    pub fn tasks(&self) -> &[ContinuedRelease] {
        &self.tasks
    }

    // ========== Node API ==========

    pub fn set_target_state(&mut self, node: NodeId, state: &str) {
        self.node_mut(node).set_target_state(state);
    }

    pub fn request_intake(&mut self, node: NodeId, intake: IntakeId, enabled: bool) {
        self.node_mut(node).request_intake(intake, enabled);
    }

    pub fn release_game_piece_with_force(
        &mut self,
        node: NodeId,
        world: &mut World,
        force: Vec3,
        mode: ForceMode,
        require_at_target: bool,
        ctx: &TickContext,
        events: &mut EventLog,
    ) -> bool {
        self.node_mut(node).release_with_force(world, force, mode, require_at_target, ctx, events)
    }

    /// Sustained release; the task is hosted by this robot from now on.
    pub fn release_game_piece_with_continued_force(
        &mut self,
        node: NodeId,
        world: &mut World,
        force: Vec3,
        duration: f32,
        speed_cap: f32,
        require_at_target: bool,
        ctx: &TickContext,
        events: &mut EventLog,
    ) -> bool {
        let task = self.node_mut(node).release_with_continued_force(
            world,
            force,
            duration,
            speed_cap,
            require_at_target,
            ctx,
            events,
        );
        match task {
            Some(task) => {
                self.run_task(task, world, ctx, events);
                true
            }
            None => false,
        }
    }

    /// Host a multi-tick release. It is advanced once right away (this tick's
    /// push) and then once per [`advance_nodes`](Self::advance_nodes).
    pub fn run_task(&mut self, mut task: ContinuedRelease, world: &mut World, ctx: &TickContext, events: &mut EventLog) {
        let piece = task.piece();
        match task.advance(world.piece_mut(piece), ctx) {
            TaskStatus::Running => self.tasks.push(task),
            TaskStatus::Finished => self.finish_task(&task, ctx, events),
        }
    }

    fn finish_task(&self, task: &ContinuedRelease, ctx: &TickContext, events: &mut EventLog) {
        events.push(PieceEvent::new(ctx.tick, PieceEventType::ReleaseFinished, Some(self.id), task.piece()));
    }

    // ========== Per-tick ==========

    /// Move the root frame by the robot's velocity.
    pub fn drive(&self, world: &mut World, ctx: &TickContext) {
        if self.velocity == Vec3::zeros() {
            return;
        }
        let mut root = world.frames.local_pose(self.root);
        root.translation.vector += self.velocity * ctx.dt();
        world.frames.set_local_pose(self.root, root);
    }

    /// Resolve queued capture requests, then tick every intake in insertion
    /// order. Each intake asks its node for permission right before it
    /// advances, so a capture started earlier in the pass blocks its siblings.
    pub fn advance_intakes(&mut self, world: &mut World, ctx: &TickContext, events: &mut EventLog) {
        for node in &mut self.nodes {
            node.resolve_requests(&mut self.intakes);
        }
        for index in 0..self.intakes.len() {
            let id = IntakeId(index);
            let permitted = self
                .nodes
                .iter()
                .find(|node| node.intakes().contains(&id))
                .is_some_and(|node| node.permits(id, &self.intakes));
            let intake = &mut self.intakes[index];
            intake.set_permitted(permitted);
            intake.advance(world, self.group, ctx, events);
        }
    }

    /// Tick every node in insertion order, then the hosted release tasks.
    pub fn advance_nodes(&mut self, world: &mut World, ctx: &TickContext, events: &mut EventLog) {
        let holder = self.holder();
        for node in &mut self.nodes {
            node.advance(world, &mut self.intakes, holder, ctx, events);
        }

        let mut finished = Vec::new();
        self.tasks.retain_mut(|task| {
            let piece = task.piece();
            match task.advance(world.piece_mut(piece), ctx) {
                TaskStatus::Running => true,
                TaskStatus::Finished => {
                    finished.push(piece);
                    false
                }
            }
        });
        for piece in finished {
            events.push(PieceEvent::new(ctx.tick, PieceEventType::ReleaseFinished, Some(self.id), piece));
        }
    }
}
