//! Priority resolution
//!
//! Turns a requester's identity, roles and sudo flag into a [`Tier`],
//! enforcing the per-role cooldown window between elevated grants.

mod resolver;
mod roles;
mod tier;

pub use resolver::{CooldownStatus, PriorityResolver};
pub use roles::{CooldownWindow, DISABLE_SENTINEL, RoleCooldown, RoleCooldownConfig};
pub use tier::Tier;
