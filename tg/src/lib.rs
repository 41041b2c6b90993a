//! TradeGate - cooldown-gated priority admission
//!
//! Requesters holding configured roles are admitted ahead of everyone else,
//! but at most once per role cooldown window; sudo requesters always go
//! first. Admission keeps a single live entry per identity and reports a
//! position and ETA from the worker pool.
//!
//! # Flow
//!
//! ```text
//! request -> AdmissionDesk -> PriorityResolver::evaluate -> Tier
//!                          -> QueueAdmission::admit      -> position, ETA
//! ```

pub mod cli;
pub mod clock;
pub mod config;
pub mod console;
pub mod desk;
pub mod priority;
pub mod queue;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use desk::{AdmissionDesk, CommandRouter, DeskOutcome, RequestContext, Requester, TradeTicket};
pub use priority::{CooldownStatus, PriorityResolver, RoleCooldownConfig, Tier};
pub use queue::{AdmissionResult, QueueAdmission, RemovalResult};

/// Window used when configuration gives no usable one
pub const DEFAULT_COOLDOWN_MINUTES: u32 = 60;

/// Largest trade code accepted unless configured otherwise
pub const MAX_TRADE_CODE: u32 = 9999;
