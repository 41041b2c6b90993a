//! Role to tier to cooldown-window table

use tracing::{debug, error, info};

use crate::config::{CooldownSetting, PriorityConfig};

use super::tier::Tier;

/// Marker that turns role priority off
pub const DISABLE_SENTINEL: &str = "DISABLE";

/// How long a requester waits between elevated grants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownWindow {
    Minutes(u32),
    /// No cooldown; always eligible
    Disabled,
}

impl CooldownWindow {
    /// Interpret a configured minute count; `-1` disables the cooldown
    pub fn from_minutes(minutes: i64) -> Option<Self> {
        match minutes {
            -1 => Some(Self::Disabled),
            m if m >= 0 => Some(Self::Minutes(u32::try_from(m).unwrap_or(u32::MAX))),
            _ => None,
        }
    }

    pub fn minutes(self) -> Option<u32> {
        match self {
            Self::Minutes(m) => Some(m),
            Self::Disabled => None,
        }
    }
}

impl std::fmt::Display for CooldownWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minutes(m) => write!(f, "{}m", m),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

/// One configured priority role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCooldown {
    pub role: String,
    pub tier: Tier,
    pub window: CooldownWindow,
}

/// Ordered role table; earlier roles are strictly higher priority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleCooldownConfig {
    roles: Vec<RoleCooldown>,
    default_window: CooldownWindow,
}

impl RoleCooldownConfig {
    /// Build a table from `(role, window)` pairs in priority order
    pub fn new<S: Into<String>>(roles: impl IntoIterator<Item = (S, CooldownWindow)>, default_window: CooldownWindow) -> Self {
        let roles = roles
            .into_iter()
            .enumerate()
            .map(|(index, (role, window))| RoleCooldown {
                role: role.into(),
                tier: Tier::for_role_index(index),
                window,
            })
            .collect();
        Self { roles, default_window }
    }

    /// A table with no priority roles
    pub fn disabled() -> Self {
        Self {
            roles: Vec::new(),
            default_window: CooldownWindow::Minutes(crate::DEFAULT_COOLDOWN_MINUTES),
        }
    }

    /// Resolve the raw config section into a table
    ///
    /// Configuration faults are logged and replaced with the default window:
    /// a role/cooldown list length mismatch applies the default to every role,
    /// a non-numeric or out-of-range window applies it to that role only.
    pub fn from_settings(settings: &PriorityConfig) -> Self {
        debug!(?settings, "RoleCooldownConfig::from_settings: called");

        let default_window = CooldownWindow::from_minutes(settings.default_cooldown).unwrap_or_else(|| {
            error!(
                default_cooldown = settings.default_cooldown,
                fallback = crate::DEFAULT_COOLDOWN_MINUTES,
                "Invalid default cooldown"
            );
            CooldownWindow::Minutes(crate::DEFAULT_COOLDOWN_MINUTES)
        });

        let roles = split_list(settings.roles.iter().map(String::as_str));
        if roles.is_empty() || (roles.len() == 1 && roles[0].eq_ignore_ascii_case(DISABLE_SENTINEL)) {
            info!("Priority roles disabled");
            return Self {
                roles: Vec::new(),
                default_window,
            };
        }

        let cooldowns: Vec<String> = settings
            .cooldowns
            .iter()
            .flat_map(|c| match c {
                CooldownSetting::Minutes(m) => vec![m.to_string()],
                CooldownSetting::Text(s) => split_list(std::iter::once(s.as_str())),
            })
            .collect();

        let windows: Vec<CooldownWindow> = if cooldowns.len() != roles.len() {
            error!(
                roles = roles.len(),
                cooldowns = cooldowns.len(),
                "Roles and cooldowns do not match, using the default cooldown for every role"
            );
            vec![default_window; roles.len()]
        } else {
            roles
                .iter()
                .zip(&cooldowns)
                .map(|(role, raw)| parse_window(role, raw).unwrap_or(default_window))
                .collect()
        };

        let table = Self::new(roles.into_iter().zip(windows), default_window);
        info!(roles = table.roles.len(), default = %default_window, "Loaded priority roles");
        table
    }

    pub fn is_disabled(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn roles(&self) -> &[RoleCooldown] {
        &self.roles
    }

    pub fn default_window(&self) -> CooldownWindow {
        self.default_window
    }

    /// First configured role the requester holds
    pub fn highest_role<R: AsRef<str>>(&self, held: &[R]) -> Option<&RoleCooldown> {
        self.roles
            .iter()
            .find(|rc| held.iter().any(|h| h.as_ref() == rc.role))
    }

    /// Window that applies to a requester whose highest role is `role`
    pub fn window_for(&self, role: Option<&RoleCooldown>) -> CooldownWindow {
        role.map(|rc| rc.window).unwrap_or(self.default_window)
    }
}

fn split_list<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_window(role: &str, raw: &str) -> Option<CooldownWindow> {
    let window = raw.parse::<i64>().ok().and_then(CooldownWindow::from_minutes);
    if window.is_none() {
        error!(%role, value = %raw, "Invalid cooldown window, using the default cooldown");
    }
    window
}
