//! Queue admission
//!
//! Position-ordered admission of requests with at most one live entry
//! per identity, plus ETA estimates from the worker pool.

mod core;
mod types;
mod workers;

pub use core::QueueAdmission;
pub use types::{
    AdmissionResult, Admitted, EntryState, Eta, QueueEntry, QueuePosition, QueueStats, RemovalResult, RequestKind,
    RoutineKind, TicketId,
};
pub use workers::{FixedWorkerPool, WorkerPool, estimate_eta};
