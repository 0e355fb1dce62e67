use crate::error::Result;
use crate::services::write_json;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::RwLock;

/// A player ban
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ban {
    pub username: String,
    pub admin: String,
    pub reason: String,
    pub date_time: DateTime<Utc>,
}

impl Ban {
    pub fn new(username: impl Into<String>, admin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            admin: admin.into(),
            reason: reason.into(),
            date_time: Utc::now(),
        }
    }
}

/// Entry of the game's `server-banlist.json`
#[derive(Debug, Serialize)]
struct BanListEntry<'a> {
    username: &'a str,
    reason: &'a str,
}

/// Persistent ban list.
///
/// Implementations backed by a database are expected to retry optimistic
/// concurrency conflicts a bounded number of times and then surface
/// [`Error::PersistenceConflict`](crate::Error::PersistenceConflict).
#[async_trait]
pub trait BanStore: Send + Sync {
    /// Add or replace the ban of `ban.username`.
    async fn add_ban(&self, ban: Ban) -> Result<()>;

    /// Remove the ban of `username`; removing an unknown player is not an error.
    async fn remove_ban(&self, username: &str, admin: &str) -> Result<()>;

    /// Write every ban to `path` in the game's ban list format.
    async fn build_ban_list_file(&self, path: &Path) -> Result<()>;
}

/// Ban store kept in memory
#[derive(Default)]
pub struct InMemoryBanStore {
    bans: RwLock<BTreeMap<String, Ban>>,
}

impl InMemoryBanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn bans(&self) -> Vec<Ban> {
        self.bans.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl BanStore for InMemoryBanStore {
    async fn add_ban(&self, ban: Ban) -> Result<()> {
        tracing::debug!(username = %ban.username, admin = %ban.admin, "Adding ban");
        self.bans.write().await.insert(ban.username.clone(), ban);
        Ok(())
    }

    async fn remove_ban(&self, username: &str, admin: &str) -> Result<()> {
        tracing::debug!(username = %username, admin = %admin, "Removing ban");
        self.bans.write().await.remove(username);
        Ok(())
    }

    async fn build_ban_list_file(&self, path: &Path) -> Result<()> {
        let bans = self.bans.read().await;
        let entries: Vec<BanListEntry<'_>> = bans
            .values()
            .map(|ban| BanListEntry {
                username: &ban.username,
                reason: &ban.reason,
            })
            .collect();
        write_json(path, &entries).await
    }
}
