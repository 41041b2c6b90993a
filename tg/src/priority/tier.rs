//! Priority tiers

use serde::{Deserialize, Serialize};

/// Priority rank; lower values are serviced first
///
/// `SUDO` is the best rank, `FREE` the worst. Role tiers sit strictly
/// between them, in role-list order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tier(u32);

impl Tier {
    /// Privileged requesters; never subject to cooldown
    pub const SUDO: Tier = Tier(1);

    /// Default tier; no cooldown
    pub const FREE: Tier = Tier(u32::MAX);

    /// Rank of the first configured role
    const ROLE_OFFSET: u32 = 2;

    /// Build a tier from a raw rank
    pub const fn new(rank: u32) -> Self {
        Self(rank)
    }

    /// Tier for the role at `index` in the configured role list
    pub fn for_role_index(index: usize) -> Self {
        let rank = u32::try_from(index)
            .unwrap_or(u32::MAX)
            .saturating_add(Self::ROLE_OFFSET)
            .min(u32::MAX - 1);
        Self(rank)
    }

    pub const fn rank(self) -> u32 {
        self.0
    }

    /// Strictly better than `FREE`
    pub fn is_elevated(self) -> bool {
        self < Self::FREE
    }

    pub fn is_sudo(self) -> bool {
        self == Self::SUDO
    }
}

impl Default for Tier {
    fn default() -> Self {
        Self::FREE
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::SUDO => write!(f, "sudo"),
            Self::FREE => write!(f, "free"),
            Tier(rank) => write!(f, "tier-{}", rank),
        }
    }
}
