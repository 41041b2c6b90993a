//! Priority resolution with cooldown bookkeeping

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use cooldownstore::{CooldownStore, PutOutcome};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::clock::{Clock, SystemClock};

use super::roles::{CooldownWindow, RoleCooldownConfig};
use super::tier::Tier;

/// Cooldown state reported to a requester
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CooldownStatus {
    /// No cooldown record exists
    None,
    /// A record exists; remaining is floored at zero
    Active { elapsed_minutes: f64, remaining_minutes: f64 },
}

impl std::fmt::Display for CooldownStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "You do not have a priority cooldown!"),
            Self::Active {
                elapsed_minutes,
                remaining_minutes,
            } => write!(
                f,
                "You last traded {:.2} minutes ago! Your priority cooldown has {:.2} minutes left!",
                elapsed_minutes, remaining_minutes
            ),
        }
    }
}

/// Decides a requester's tier and keeps their cooldown record
///
/// Owns the cooldown store behind a single lock that is held for a whole
/// evaluation, so the check and the record write cannot interleave with
/// another request for the same identity.
pub struct PriorityResolver {
    config: RoleCooldownConfig,
    store: Mutex<CooldownStore>,
    clock: Arc<dyn Clock>,
}

impl PriorityResolver {
    pub fn new(config: RoleCooldownConfig, store: CooldownStore, clock: Arc<dyn Clock>) -> Self {
        debug!(roles = config.roles().len(), records = store.len(), "PriorityResolver::new: called");
        Self {
            config,
            store: Mutex::new(store),
            clock,
        }
    }

    pub fn with_system_clock(config: RoleCooldownConfig, store: CooldownStore) -> Self {
        Self::new(config, store, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &RoleCooldownConfig {
        &self.config
    }

    /// Resolve the tier for one request
    ///
    /// Sudo requesters always get `Tier::SUDO` and never touch the store.
    /// Otherwise a live cooldown forces `Tier::FREE`; an expired one is
    /// removed, and a requester holding a configured role is granted that
    /// role's tier and put on cooldown.
    pub async fn evaluate<R: AsRef<str>>(&self, identity: &str, roles: &[R], is_sudo: bool) -> Tier {
        debug!(%identity, roles = roles.len(), is_sudo, "PriorityResolver::evaluate: called");

        if is_sudo {
            info!(%identity, "Identity has a sudo role");
            return Tier::SUDO;
        }

        if self.config.is_disabled() {
            debug!(%identity, "PriorityResolver::evaluate: priority roles disabled");
            return Tier::FREE;
        }

        let highest = self.config.highest_role(roles);
        let window = self.config.window_for(highest);

        let mut store = self.store.lock().await;
        let now = self.clock.now();

        if let Some(granted_at) = store.get(identity)
            && window != CooldownWindow::Disabled
        {
            if !window_elapsed(granted_at, now, window) {
                info!(%identity, %window, "Cooldown not met");
                return Tier::FREE;
            }
            info!(%identity, "Cooldown expired, removing");
            store.remove(identity);
        }

        let Some(role) = highest else {
            info!(%identity, "Identity does not have a priority role");
            return Tier::FREE;
        };

        if store.put(identity, now) == PutOutcome::AlreadyPresent {
            debug!(%identity, "PriorityResolver::evaluate: existing record kept");
        }

        info!(%identity, tier = %role.tier, role = %role.role, "Assigning priority from role");
        role.tier
    }

    /// Report elapsed and remaining cooldown minutes without mutating state
    pub async fn check_status<R: AsRef<str>>(&self, identity: &str, roles: &[R]) -> CooldownStatus {
        debug!(%identity, "PriorityResolver::check_status: called");
        let store = self.store.lock().await;

        let Some(granted_at) = store.get(identity) else {
            return CooldownStatus::None;
        };

        let window = self.config.window_for(self.config.highest_role(roles));
        let elapsed_minutes = minutes_between(granted_at, self.clock.now());
        let remaining_minutes = match window {
            CooldownWindow::Minutes(m) => (f64::from(m) - elapsed_minutes).max(0.0),
            CooldownWindow::Disabled => 0.0,
        };

        CooldownStatus::Active {
            elapsed_minutes,
            remaining_minutes,
        }
    }

    /// Timestamp of the identity's cooldown record, if any
    pub async fn cooldown_of(&self, identity: &str) -> Option<DateTime<Utc>> {
        self.store.lock().await.get(identity)
    }

    /// Clear one identity's cooldown; returns whether it had one
    pub async fn clear(&self, identity: &str) -> bool {
        debug!(%identity, "PriorityResolver::clear: called");
        self.store.lock().await.remove(identity)
    }

    /// Clear every cooldown; returns how many were removed
    pub async fn clear_all(&self) -> usize {
        debug!("PriorityResolver::clear_all: called");
        self.store.lock().await.clear_all()
    }

    /// Number of identities currently holding a record
    pub async fn cooldown_count(&self) -> usize {
        self.store.lock().await.len()
    }

    /// Force a snapshot write, e.g. before shutdown
    pub async fn flush(&self) {
        if let Err(e) = self.store.lock().await.save() {
            error!(error = %e, "Failed to flush cooldown file");
        }
    }
}

/// Strictly more than `window` has passed since `granted_at`
fn window_elapsed(granted_at: DateTime<Utc>, now: DateTime<Utc>, window: CooldownWindow) -> bool {
    match window {
        CooldownWindow::Minutes(m) => now - granted_at > Duration::minutes(i64::from(m)),
        CooldownWindow::Disabled => true,
    }
}

fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}
