//! Piece lifecycle events
//!
//! Intakes and nodes record every ownership-relevant transition here. The
//! log is what scenario reports serialise and what tests replay to check
//! that no piece was ever held by two owners at once.

use crate::node::RobotId;
use crate::physics::PieceId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceEventType {
    /// Intake adopted a candidate
    Detected,
    /// Intake took ownership and started the breakable approach
    CaptureStarted,
    Secured,
    /// Breakable approach broke
    Lost,
    /// Candidate given up (de-requested, despawned, or kind lost)
    Dropped,
    /// Node took the piece from an intake
    Claimed,
    Settled,
    Released,
    /// Sustained release task ran out
    ReleaseFinished,
    Despawned,
}

impl PieceEventType {
    /// Events after which the robot no longer owns the piece.
    pub fn ends_ownership(self) -> bool {
        matches!(
            self,
            PieceEventType::Lost | PieceEventType::Dropped | PieceEventType::Released | PieceEventType::Despawned
        )
    }

    /// Events that begin robot ownership.
    pub fn starts_ownership(self) -> bool {
        matches!(self, PieceEventType::CaptureStarted)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PieceEvent {
    pub tick: u64,
    pub event_type: PieceEventType,
    pub robot: Option<RobotId>,
    pub piece: PieceId,
    /// Intake, node or state name
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<String>,
}

impl PieceEvent {
    pub fn new(tick: u64, event_type: PieceEventType, robot: Option<RobotId>, piece: PieceId) -> Self {
        Self { tick, event_type, robot, piece, details: None }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<PieceEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: PieceEvent) {
        log::trace!("{:?} piece {:?} at tick {}", event.event_type, event.piece, event.tick);
        self.events.push(event);
    }

    pub fn events(&self) -> &[PieceEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn of_type(&self, event_type: PieceEventType) -> impl Iterator<Item = &PieceEvent> {
        self.events.iter().filter(move |e| e.event_type == event_type)
    }

    pub fn for_piece(&self, piece: PieceId) -> impl Iterator<Item = &PieceEvent> {
        self.events.iter().filter(move |e| e.piece == piece)
    }

    pub fn count(&self, event_type: PieceEventType) -> usize {
        self.of_type(event_type).count()
    }

    pub fn take(&mut self) -> Vec<PieceEvent> {
        std::mem::take(&mut self.events)
    }
}
