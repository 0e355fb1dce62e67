use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Visibility block of `server-settings.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub lan: bool,
}

/// The game's `server-settings.json`.
///
/// Only the fields the controller edits are typed; every other key is kept in
/// `extra` so a read-modify-write cycle does not drop settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerSettingsFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub max_players: u32,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub game_password: String,
    #[serde(default)]
    pub require_user_verification: bool,
    #[serde(default)]
    pub autosave_interval: u32,
    #[serde(default)]
    pub autosave_slots: u32,
    #[serde(default)]
    pub afk_autokick_interval: u32,
    #[serde(default)]
    pub auto_pause: bool,
    #[serde(default)]
    pub non_blocking_saving: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerSettingsFile {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::MissingFile(path.display().to_string()),
            _ => Error::Io(format!("Failed to read {}: {}", path.display(), e)),
        })?;

        serde_json::from_str(&content).map_err(|e| {
            Error::Io(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::Io(format!("Failed to serialize server settings: {}", e)))?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
