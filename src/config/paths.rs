use crate::config::Config;
use std::path::{Path, PathBuf};

/// Directory holding saves shared by every server, under the root directory.
pub const GLOBAL_SAVES_DIRECTORY: &str = "global_saves";
/// Per-server directory for saves that only that server uses.
pub const LOCAL_SAVES_DIRECTORY: &str = "local_saves";
/// Per-server directory the game itself writes autosaves into.
pub const TEMP_SAVES_DIRECTORY: &str = "saves";

/// Filesystem layout of one server slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPaths {
    pub base: PathBuf,
    pub global_saves: PathBuf,
    pub local_saves: PathBuf,
    pub temp_saves: PathBuf,
    pub logs: PathBuf,
    pub chat_logs: PathBuf,
    pub current_log: PathBuf,
    pub current_chat_log: PathBuf,
    pub settings: PathBuf,
    pub ban_list: PathBuf,
    pub admin_list: PathBuf,
    pub scenario_link: PathBuf,
    pub executable: PathBuf,
}

impl ServerPaths {
    pub fn new(config: &Config, server_id: &str) -> Self {
        let base = config.root_directory.join(server_id);
        let chat_logs = base.join("chat_logs");

        Self {
            global_saves: config.root_directory.join(GLOBAL_SAVES_DIRECTORY),
            local_saves: base.join(LOCAL_SAVES_DIRECTORY),
            temp_saves: base.join(TEMP_SAVES_DIRECTORY),
            logs: base.join("logs"),
            current_log: base.join("factorio-current.log"),
            current_chat_log: chat_logs.join("current.log"),
            chat_logs,
            settings: base.join("server-settings.json"),
            ban_list: base.join("server-banlist.json"),
            admin_list: base.join("server-adminlist.json"),
            scenario_link: base.join("scenarios"),
            executable: base.join(&config.factorio_executable),
            base,
        }
    }

    /// Directory for a permitted save directory name, or `None` for any other name.
    pub fn save_directory(&self, name: &str) -> Option<&Path> {
        match name {
            GLOBAL_SAVES_DIRECTORY => Some(&self.global_saves),
            LOCAL_SAVES_DIRECTORY => Some(&self.local_saves),
            TEMP_SAVES_DIRECTORY => Some(&self.temp_saves),
            _ => None,
        }
    }
}
