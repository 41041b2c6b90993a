//! Queue types for admission

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::priority::Tier;

/// Unique, never reused identifier of a queue entry
pub type TicketId = u64;

/// Which worker routine services an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RoutineKind {
    #[default]
    LinkTrade,
    Clone,
    Dump,
    SeedCheck,
}

impl std::fmt::Display for RoutineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LinkTrade => write!(f, "LinkTrade"),
            Self::Clone => write!(f, "Clone"),
            Self::Dump => write!(f, "Dump"),
            Self::SeedCheck => write!(f, "SeedCheck"),
        }
    }
}

impl std::str::FromStr for RoutineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linktrade" | "trade" => Ok(Self::LinkTrade),
            "clone" => Ok(Self::Clone),
            "dump" => Ok(Self::Dump),
            "seedcheck" | "seed" => Ok(Self::SeedCheck),
            _ => Err(format!("Unknown routine: {}", s)),
        }
    }
}

/// What the requester asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RequestKind {
    #[default]
    Specific,
    Clone,
    Dump,
    Seed,
    Random,
}

/// Sub-state of a live entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Waiting for a worker
    Waiting,
    /// Handed to a worker, not yet completed
    Processing,
}

/// A live queue entry
#[derive(Debug, Clone)]
pub struct QueueEntry<P> {
    pub identity: String,
    pub payload: P,
    pub tier: Tier,
    pub routine: RoutineKind,
    pub request: RequestKind,
    pub enqueued_at: DateTime<Utc>,
    pub ticket: TicketId,
    pub state: EntryState,
    /// Removal was requested while processing
    pub cancel_requested: bool,
}

/// Estimated wait until service
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Eta {
    /// Position is within the active worker count
    WithinCycle,
    /// Whole service cycles ahead times the average service time
    Minutes(f64),
    /// No active workers
    Unknown,
}

/// Successful admission
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Admitted {
    pub ticket: TicketId,
    /// 1-based rank among waiting entries
    pub position: usize,
    pub eta: Eta,
}

/// Result of an admission attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdmissionResult {
    Added(Admitted),
    /// A live entry already exists for this identity
    AlreadyInQueue,
    /// The queue is closed to non-sudo requesters
    QueueClosed,
}

impl AdmissionResult {
    pub fn is_added(&self) -> bool {
        matches!(self, Self::Added(_))
    }
}

/// Result of a removal request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalResult {
    Removed,
    /// Entry is with a worker; cancellation was flagged
    CurrentlyProcessing,
    NotInQueue,
}

impl RemovalResult {
    /// Caller-facing message
    pub fn message(self) -> &'static str {
        match self {
            Self::CurrentlyProcessing => "Looks like you're currently being processed! Removed from queue.",
            Self::Removed => "Removed you from the queue.",
            Self::NotInQueue => "Sorry, you are not currently in the queue.",
        }
    }
}

/// Where an identity stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePosition {
    /// 1-based rank among waiting entries; 0 while processing
    pub position: usize,
    pub ticket: TicketId,
    pub routine: RoutineKind,
    pub state: EntryState,
}

impl std::fmt::Display for QueuePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.state {
            EntryState::Waiting => write!(
                f,
                "You are in the {} queue! Position: {} (ID {})",
                self.routine, self.position, self.ticket
            ),
            EntryState::Processing => write!(f, "Your request is currently being processed! (ID {})", self.ticket),
        }
    }
}

/// Statistics for the queue
#[derive(Debug, Default, Clone)]
pub struct QueueStats {
    pub total_admitted: u64,
    pub total_duplicates: u64,
    pub total_completed: u64,
    pub total_removed: u64,
    pub peak_queue_depth: usize,
}
