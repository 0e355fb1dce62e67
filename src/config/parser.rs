use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-server behaviour switches.
///
/// These are the values the controller caches in each server's runtime state;
/// they can be edited at runtime with
/// [`ServerController::set_extra_settings`](crate::ServerController::set_extra_settings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerExtraSettings {
    /// Persist bans seen on this server and re-issue them on sibling servers.
    pub sync_bans: bool,
    /// Rebuild `server-banlist.json` from the ban store before each start.
    /// When false the existing ban list file is kept untouched.
    pub build_bans_from_database_on_start: bool,
    /// Rebuild `server-adminlist.json` from the admin store before each start.
    /// When false the existing admin list file is kept untouched.
    pub build_admins_from_database_on_start: bool,
    /// Relay `[CHAT]` lines to the notifier.
    pub game_chat_to_relay: bool,
    /// Relay `[SHOUT]` lines to the notifier.
    pub game_shout_to_relay: bool,
    /// Mod pack directory name passed as `--mod-directory` on launch.
    pub selected_mod_pack: Option<String>,
}

impl Default for ServerExtraSettings {
    fn default() -> Self {
        Self {
            sync_bans: true,
            build_bans_from_database_on_start: true,
            build_admins_from_database_on_start: true,
            game_chat_to_relay: true,
            game_shout_to_relay: true,
            selected_mod_pack: None,
        }
    }
}

/// Configuration for a single server slot.
///
/// # Examples
///
/// ```
/// use factorio_controller::config::{ServerConfig, ServerExtraSettings};
///
/// let server_config = ServerConfig {
///     port: 34197,
///     settings: ServerExtraSettings::default(),
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// UDP port the game server binds to.
    pub port: u16,

    /// Behaviour switches for this server.
    #[serde(default)]
    pub settings: ServerExtraSettings,
}

/// Main configuration for the controller.
///
/// # JSON Schema
///
/// ```json
/// {
///   "rootDirectory": "/srv/factorio",
///   "wrapperExecutable": "/srv/factorio/wrapper",
///   "scenarioDirectory": "/srv/factorio/scenarios",
///   "modDirectory": "/srv/factorio/mods",
///   "maxLogFiles": 10,
///   "servers": {
///     "1": { "port": 34197 },
///     "2": { "port": 34198, "settings": { "syncBans": false } }
///   }
/// }
/// ```
///
/// YAML files with the same keys are accepted by [`Config::from_file`] when the
/// file extension is `.yaml` or `.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory holding one base directory per server plus `global_saves`.
    pub root_directory: PathBuf,

    /// Wrapper program launched for each server. It receives the server id
    /// and the game executable as its first two arguments.
    pub wrapper_executable: PathBuf,

    /// Game executable, relative to a server's base directory.
    #[serde(default = "default_factorio_executable")]
    pub factorio_executable: PathBuf,

    /// Root directory of scenarios; each scenario is a sub-directory.
    pub scenario_directory: PathBuf,

    /// Root directory of mod packs; each mod pack is a sub-directory.
    pub mod_directory: PathBuf,

    /// Archived log files kept per server before the oldest are removed.
    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,

    /// How long force-stop waits for the wrapper to acknowledge before killing.
    #[serde(default = "default_force_stop_timeout_ms")]
    pub force_stop_timeout_ms: u64,

    /// Minimum uptime before a crash is escalated to an alert.
    #[serde(default = "default_crash_alert_cooldown_secs")]
    pub crash_alert_cooldown_secs: u64,

    /// Window used to coalesce presence refreshes.
    #[serde(default = "default_presence_debounce_ms")]
    pub presence_debounce_ms: u64,

    /// Capacity of each server's control message history.
    #[serde(default = "default_control_message_capacity")]
    pub control_message_capacity: usize,

    /// Map of server ids to their configurations.
    pub servers: BTreeMap<String, ServerConfig>,
}

fn default_factorio_executable() -> PathBuf {
    Path::new("bin").join("x64").join("factorio")
}

fn default_max_log_files() -> usize {
    10
}

fn default_force_stop_timeout_ms() -> u64 {
    5000
}

fn default_crash_alert_cooldown_secs() -> u64 {
    300
}

fn default_presence_debounce_ms() -> u64 {
    10_000
}

fn default_control_message_capacity() -> usize {
    200
}

impl Config {
    /// Loads a configuration from a file path.
    ///
    /// Files ending in `.yaml` or `.yml` are parsed as YAML, everything else as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The file cannot be read
    /// * The contents do not parse
    /// * The parsed configuration fails validation
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigParse(format!("Failed to read config file: {}", e)))?;

        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        if is_yaml {
            Self::parse_from_yaml_str(&content)
        } else {
            Self::parse_from_str(&content)
        }
    }

    /// Parses and validates a configuration from a JSON string.
    pub fn parse_from_str(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse JSON config: {}", e)))?;
        super::validate_config(&config)?;
        Ok(config)
    }

    /// Parses and validates a configuration from a YAML string.
    pub fn parse_from_yaml_str(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse YAML config: {}", e)))?;
        super::validate_config(&config)?;
        Ok(config)
    }

    /// Timeout for the force-stop acknowledgment.
    pub fn force_stop_timeout(&self) -> Duration {
        Duration::from_millis(self.force_stop_timeout_ms)
    }

    /// Minimum uptime before a crash raises an alert.
    pub fn crash_alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.crash_alert_cooldown_secs)
    }

    /// Debounce window for presence refreshes.
    pub fn presence_debounce(&self) -> Duration {
        Duration::from_millis(self.presence_debounce_ms)
    }
}
