//! TradeGate configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main TradeGate configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Priority roles and cooldown windows
    pub priority: PriorityConfig,

    /// Queue and worker pool settings
    pub queue: QueueConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Chat command settings
    pub commands: CommandsConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .tradegate.yml
        let local_config = PathBuf::from(".tradegate.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/tradegate/tradegate.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tradegate").join("tradegate.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// A cooldown window as written in the config file
///
/// Numbers are taken as minutes. Text is split on commas, so the
/// single-string form `"60, 30, -1"` is accepted too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CooldownSetting {
    Minutes(i64),
    Text(String),
}

/// Priority roles and cooldown windows
///
/// `roles` and `cooldowns` are parallel lists; earlier roles are higher
/// priority. An empty role list, or the single entry `DISABLE`, turns
/// role priority off.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityConfig {
    /// Role names, highest priority first
    pub roles: Vec<String>,

    /// Cooldown minutes per role (-1 disables the cooldown for that role)
    pub cooldowns: Vec<CooldownSetting>,

    /// Window used when a role has no usable window of its own
    #[serde(rename = "default-cooldown")]
    pub default_cooldown: i64,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            roles: Vec::new(),
            cooldowns: Vec::new(),
            default_cooldown: crate::DEFAULT_COOLDOWN_MINUTES as i64,
        }
    }
}

/// Queue and worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of execution workers servicing the queue
    pub workers: usize,

    /// Average minutes a worker spends on one request
    #[serde(rename = "average-service-minutes")]
    pub average_service_minutes: f64,

    /// Largest accepted trade code
    #[serde(rename = "max-trade-code")]
    pub max_trade_code: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            average_service_minutes: 1.0,
            max_trade_code: crate::MAX_TRADE_CODE,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Persisted cooldown file
    #[serde(rename = "cooldown-file")]
    pub cooldown_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/tradegate on Linux)
        let cooldown_file = dirs::data_dir()
            .map(|d| d.join("tradegate"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(cooldownstore::DEFAULT_COOLDOWN_FILE);

        Self { cooldown_file }
    }
}

/// Chat command settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Command prefix
    pub prefix: String,

    /// Identities treated as sudo
    pub sudo: Vec<String>,

    /// Identities whose commands are ignored
    pub blacklist: Vec<String>,

    /// Only subscribers (and sudo) may use commands
    #[serde(rename = "sub-only")]
    pub sub_only: bool,

    /// How many upcoming entries the on-deck list shows
    #[serde(rename = "on-deck-count")]
    pub on_deck_count: usize,

    /// Maximum requesters parked while waiting for their trade code
    #[serde(rename = "waiting-list-capacity")]
    pub waiting_list_capacity: usize,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            prefix: "$".to_string(),
            sudo: Vec::new(),
            blacklist: Vec::new(),
            sub_only: false,
            on_deck_count: 5,
            waiting_list_capacity: 100,
        }
    }
}

impl CommandsConfig {
    pub fn is_sudo(&self, identity: &str) -> bool {
        self.sudo.iter().any(|s| s == identity)
    }

    pub fn is_blacklisted(&self, identity: &str) -> bool {
        self.blacklist.iter().any(|s| s == identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.priority.roles.is_empty());
        assert_eq!(config.priority.default_cooldown, 60);
        assert_eq!(config.queue.workers, 1);
        assert_eq!(config.queue.max_trade_code, 9999);
        assert_eq!(config.commands.prefix, "$");
        assert_eq!(config.commands.waiting_list_capacity, 100);
        assert!(config.storage.cooldown_file.ends_with("cooldowns.json"));
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug

priority:
  roles: [Gold, Silver, Bronze]
  cooldowns: [120, 60, "-1"]
  default-cooldown: 30

queue:
  workers: 3
  average-service-minutes: 2.5
  max-trade-code: 99999999

storage:
  cooldown-file: /var/lib/tradegate/cooldowns.json

commands:
  prefix: "!"
  sudo: [owner]
  blacklist: [spammer]
  sub-only: true
  on-deck-count: 3
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.priority.roles, vec!["Gold", "Silver", "Bronze"]);
        assert_eq!(config.priority.cooldowns[0], CooldownSetting::Minutes(120));
        assert_eq!(config.priority.cooldowns[2], CooldownSetting::Text("-1".to_string()));
        assert_eq!(config.priority.default_cooldown, 30);
        assert_eq!(config.queue.workers, 3);
        assert_eq!(config.queue.average_service_minutes, 2.5);
        assert_eq!(config.queue.max_trade_code, 99_999_999);
        assert_eq!(config.storage.cooldown_file, PathBuf::from("/var/lib/tradegate/cooldowns.json"));
        assert_eq!(config.commands.prefix, "!");
        assert!(config.commands.sub_only);
        assert_eq!(config.commands.on_deck_count, 3);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
priority:
  roles: [Gold]
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Specified value
        assert_eq!(config.priority.roles, vec!["Gold"]);

        // Defaults for unspecified
        assert!(config.priority.cooldowns.is_empty());
        assert_eq!(config.priority.default_cooldown, 60);
        assert_eq!(config.queue.workers, 1);
        assert_eq!(config.commands.prefix, "$");
    }

    #[test]
    fn test_sudo_and_blacklist_lookup() {
        let commands = CommandsConfig {
            sudo: vec!["owner".to_string()],
            blacklist: vec!["spammer".to_string()],
            ..Default::default()
        };

        assert!(commands.is_sudo("owner"));
        assert!(!commands.is_sudo("alice"));
        assert!(commands.is_blacklisted("spammer"));
        assert!(!commands.is_blacklisted("owner"));
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("tradegate.yml");
        fs::write(&path, "queue:\n  workers: 4\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.queue.workers, 4);
    }

    #[test]
    fn test_load_explicit_path_missing_fails() {
        let path = PathBuf::from("/nonexistent/tradegate.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
