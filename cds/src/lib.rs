//! CooldownStore - persisted priority cooldown records
//!
//! Keeps one timestamp per identity that was granted an elevated priority
//! tier. The whole mapping lives in a single JSON object on disk and is
//! rewritten wholesale on every mutation.
//!
//! # File format
//!
//! ```text
//! cooldowns.json
//! {
//!   "1234567890": "2026-10-19T14:03:11.402Z",
//!   "alice": "2026-10-19T15:40:00Z"
//! }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use cooldownstore::{CooldownStore, PutOutcome};
//!
//! let mut store = CooldownStore::load("cooldowns.json");
//! assert_eq!(store.put("alice", chrono::Utc::now()), PutOutcome::Inserted);
//! assert!(store.get("alice").is_some());
//! store.remove("alice");
//! ```

pub mod cli;
mod error;
mod store;

pub use error::StoreError;
pub use store::{CooldownRecord, CooldownStore, PutOutcome};

/// Default cooldown file name, resolved against the working directory
pub const DEFAULT_COOLDOWN_FILE: &str = "cooldowns.json";
