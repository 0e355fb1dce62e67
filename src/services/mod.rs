//! Collaborators consumed by the controller.
//!
//! Each concern sits behind an `async_trait` seam so storage, chat relay and
//! file layout can be swapped without touching the orchestration code:
//!
//! * [`BanStore`] / [`AdminStore`] - persisted ban and admin lists
//! * [`DataStore`] - key-value data shared between scenarios
//! * [`FileManager`] - saves, scenarios, mod packs and log rotation
//! * [`Notifier`] - chat relay and announcements
//! * [`ServerUpdater`] - downloading and installing game binaries
//!
//! In-memory and local-filesystem implementations are provided for wiring and
//! tests.
mod admins;
mod bans;
mod data;
mod files;
mod notifier;

pub use admins::{AdminStore, InMemoryAdminStore};
pub use bans::{Ban, BanStore, InMemoryBanStore};
pub use data::{DataStore, InMemoryDataStore};
pub use files::{FileManager, LocalFileManager};
pub use notifier::{Audience, Notifier, NullNotifier, RelayMessage, Style};

use crate::error::{Error, Result};
use crate::server::ServerId;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;

/// Downloads and installs a game version for a server
#[async_trait]
pub trait ServerUpdater: Send + Sync {
    async fn install(&self, server_id: &ServerId, version: &str) -> Result<()>;
}

/// Serialize `value` as pretty JSON into `path`, creating parent directories.
pub(crate) async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_vec_pretty(value)
        .map_err(|e| Error::Io(format!("Failed to serialize {}: {}", path.display(), e)))?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| Error::Io(format!("Failed to write {}: {}", path.display(), e)))
}
