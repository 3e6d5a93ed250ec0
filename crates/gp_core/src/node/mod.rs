//! Nodes and the per-robot orchestrator
//!
//! A node is one possession slot on a robot (one piece kind). It claims a
//! secured piece from one of its intakes, walks it through named states and
//! releases it on request.
//!
//! Node lifecycle:
//! ```text
//! Empty(0) ─claim─▶ Transitioning ─arrive─▶ Settled ─new target─▶ Transitioning
//!    ▲                                         │
//!    └─────────────────release─────────────────┘
//! ```

pub mod orchestrator;
pub mod state;

pub use orchestrator::{Robot, RobotId};
pub use state::{NamedState, StateId, StateSpec, StateTable};

use crate::context::TickContext;
use crate::events::{EventLog, PieceEvent, PieceEventType};
use crate::intake::{Intake, IntakeId};
use crate::math::Vec3;
use crate::physics::{ForceMode, PieceId, World};
use crate::piece::{ContinuedRelease, Holder, PieceOwner};
use serde::{Deserialize, Serialize};

/// Index of a node within its robot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The piece a node holds and the state whose leg it is on. Having one is
/// what makes the ordinal non-zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Holding {
    piece: PieceId,
    current: StateId,
}

#[derive(Clone, Debug)]
pub struct Node {
    id: NodeId,
    robot: RobotId,
    name: String,
    kind: String,
    states: StateTable,
    holding: Option<Holding>,
    at_target: bool,
    /// Last settled state
    was_moving_to: Option<StateId>,
    /// Requested state
    moving_to: StateId,
    intakes: Vec<IntakeId>,
    /// Capture requests from this tick, one entry per intake
    pending: Vec<(IntakeId, bool)>,
}

impl Node {
    pub fn new(id: NodeId, robot: RobotId, name: &str, kind: &str, states: StateTable, intakes: Vec<IntakeId>) -> Self {
        let first = states.first();
        Self {
            id,
            robot,
            name: name.to_string(),
            kind: kind.to_string(),
            states,
            holding: None,
            at_target: false,
            was_moving_to: None,
            moving_to: first,
            intakes,
            pending: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn states(&self) -> &StateTable {
        &self.states
    }

    pub fn intakes(&self) -> &[IntakeId] {
        &self.intakes
    }

    // ========== Queries ==========

    pub fn has_piece(&self) -> bool {
        self.holding.is_some()
    }

    /// Piece whose controller this node currently drives.
    pub fn controller(&self) -> Option<PieceId> {
        self.holding.map(|h| h.piece)
    }

    /// 0 when empty, otherwise the ordinal of the state being walked to or
    /// held at.
    pub fn current_ordinal(&self) -> u32 {
        self.holding.map_or(0, |h| self.states.get(h.current).ordinal)
    }

    pub fn current_state(&self) -> Option<&NamedState> {
        self.holding.map(|h| self.states.get(h.current))
    }

    pub fn is_at_target(&self) -> bool {
        self.at_target
    }

    pub fn settled_state_name(&self) -> Option<&str> {
        self.was_moving_to.map(|id| self.states.get(id).name.as_str())
    }

    pub fn requested_state_name(&self) -> &str {
        &self.states.get(self.moving_to).name
    }

    pub fn state_by_name(&self, name: &str) -> Option<&NamedState> {
        self.states.id(name).map(|id| self.states.get(id))
    }

    /// Capture requests queued for the next resolution, in request order.
    pub fn pending_requests(&self) -> &[(IntakeId, bool)] {
        &self.pending
    }

    // ========== Mutators ==========

    /// Request a new target state (case-insensitive). Unknown names are
    /// logged and ignored.
    pub fn set_target_state(&mut self, name: &str) {
        match self.states.id(name) {
            Some(id) => self.moving_to = id,
            None => log::error!("node {}: unknown state '{}', keeping '{}'", self.name, name, self.requested_state_name()),
        }
    }

    /// Queue a capture on/off request. Repeated requests for the same intake
    /// within a tick collapse to the last one.
    pub fn request_intake(&mut self, intake: IntakeId, enabled: bool) {
        if !self.intakes.contains(&intake) {
            log::error!("node {}: intake {:?} is not attached", self.name, intake);
            return;
        }
        match self.pending.iter_mut().find(|(id, _)| *id == intake) {
            Some(entry) => entry.1 = enabled,
            None => self.pending.push((intake, enabled)),
        }
    }

    /// Single-impulse release. `false` when empty, or when `require_at_target`
    /// and the piece has not settled.
    pub fn release_with_force(
        &mut self,
        world: &mut World,
        force: Vec3,
        mode: ForceMode,
        require_at_target: bool,
        ctx: &TickContext,
        events: &mut EventLog,
    ) -> bool {
        let Some(piece) = self.releasable(require_at_target) else {
            return false;
        };
        let Some((controller, frames)) = world.piece_with_frames(piece) else {
            self.clear();
            return false;
        };
        controller.release(frames, force, mode, ctx);
        controller.set_owner(PieceOwner::Unowned);
        self.clear();
        events.push(self.event(ctx, PieceEventType::Released, piece));
        log::debug!("node {}: released {:?}", self.name, piece);
        true
    }

    /// Sustained release. Returns the task for the robot to host.
    pub fn release_with_continued_force(
        &mut self,
        world: &mut World,
        force: Vec3,
        duration: f32,
        speed_cap: f32,
        require_at_target: bool,
        ctx: &TickContext,
        events: &mut EventLog,
    ) -> Option<ContinuedRelease> {
        let piece = self.releasable(require_at_target)?;
        let Some((controller, frames)) = world.piece_with_frames(piece) else {
            self.clear();
            return None;
        };
        let task = controller.release_continued(frames, force, duration, speed_cap);
        controller.set_owner(PieceOwner::Unowned);
        self.clear();
        events.push(self.event(ctx, PieceEventType::Released, piece).with_details("continued"));
        Some(task)
    }

    fn releasable(&self, require_at_target: bool) -> Option<PieceId> {
        let holding = self.holding?;
        if require_at_target && !self.at_target {
            return None;
        }
        Some(holding.piece)
    }

    fn clear(&mut self) {
        self.holding = None;
        self.at_target = false;
        self.was_moving_to = None;
    }

    fn event(&self, ctx: &TickContext, event_type: PieceEventType, piece: PieceId) -> PieceEvent {
        PieceEvent::new(ctx.tick, event_type, Some(self.robot), piece).with_details(self.name.as_str())
    }

    // ========== Per-tick ==========

    /// Apply this tick's queued capture requests and clear the queue. Runs
    /// before the intakes advance.
    pub fn resolve_requests(&mut self, intakes: &mut [Intake]) {
        for (intake, enabled) in self.pending.drain(..) {
            if let Some(intake) = intakes.get_mut(intake.0) {
                intake.set_requested(enabled);
            }
        }
    }

    /// One tick: claim a secured piece, then step the current leg.
    pub fn advance(
        &mut self,
        world: &mut World,
        intakes: &mut [Intake],
        holder: Holder,
        ctx: &TickContext,
        events: &mut EventLog,
    ) {
        if let Some(holding) = self.holding {
            if !world.contains(holding.piece) {
                log::warn!("node {}: held piece {:?} despawned", self.name, holding.piece);
                self.clear();
            }
        }

        if self.holding.is_none() {
            self.claim(world, intakes, ctx, events);
        }

        if let Some(holding) = self.holding.as_mut() {
            if self.at_target && holding.current != self.moving_to {
                holding.current = self.moving_to;
                self.at_target = false;
            }
        }

        if let Some(holding) = self.holding {
            if !self.at_target {
                self.step_leg(world, holding, holder, ctx, events);
            }
        }
    }

    fn claim(&mut self, world: &mut World, intakes: &mut [Intake], ctx: &TickContext, events: &mut EventLog) {
        let secured = self.intakes.iter().find(|id| intakes.get(id.0).is_some_and(Intake::is_secured));
        let Some(intake) = secured.and_then(|id| intakes.get_mut(id.0)) else {
            return;
        };
        let Some(piece) = intake.remove_piece() else {
            return;
        };
        let Some(controller) = world.piece_mut(piece) else {
            return;
        };
        controller.set_owner(PieceOwner::Node { robot: self.robot, node: self.id });
        self.holding = Some(Holding { piece, current: self.states.first() });
        self.at_target = false;
        self.was_moving_to = None;
        events.push(self.event(ctx, PieceEventType::Claimed, piece));
        log::debug!("node {}: claimed {:?} from intake {}", self.name, piece, intake.name());
    }

    fn step_leg(&mut self, world: &mut World, holding: Holding, holder: Holder, ctx: &TickContext, events: &mut EventLog) {
        let state = self.states.get(holding.current);
        let Some((controller, frames)) = world.piece_with_frames(holding.piece) else {
            return;
        };
        let report = controller.move_to(
            frames,
            state.target,
            holder,
            state.linear_speed_in,
            state.angular_speed_deg,
            state.smooth_handoff,
            ctx,
        );
        if report.is_arrived() {
            self.at_target = true;
            self.was_moving_to = Some(holding.current);
            let name = state.name.clone();
            events.push(self.event(ctx, PieceEventType::Settled, holding.piece).with_details(name.as_str()));
            log::debug!("node {}: settled at {}", self.name, name);
        }
    }

    /// Whether `intake` may capture right now. A full node permits nothing;
    /// otherwise a sibling that is already capturing or secured keeps
    /// exclusive permission.
    pub fn permits(&self, intake: IntakeId, intakes: &[Intake]) -> bool {
        if self.holding.is_some() {
            return false;
        }
        self.intakes
            .iter()
            .filter(|id| **id != intake)
            .all(|id| intakes.get(id.0).map_or(true, |i| !(i.is_capturing() || i.is_secured())))
    }
}
