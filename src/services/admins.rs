use crate::error::Result;
use crate::services::write_json;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;
use tokio::sync::RwLock;

/// Persistent admin list
#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn get_admins(&self) -> Result<Vec<String>>;

    /// Write the admin list to `path` in the game's admin list format.
    async fn build_admin_list(&self, path: &Path) -> Result<()> {
        let admins = self.get_admins().await?;
        write_json(path, &admins).await
    }
}

/// Admin store kept in memory
#[derive(Default)]
pub struct InMemoryAdminStore {
    admins: RwLock<BTreeSet<String>>,
}

impl InMemoryAdminStore {
    pub fn new<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            admins: RwLock::new(admins.into_iter().map(Into::into).collect()),
        }
    }

    pub async fn add_admin(&self, name: &str) {
        self.admins.write().await.insert(name.to_string());
    }

    pub async fn remove_admin(&self, name: &str) {
        self.admins.write().await.remove(name);
    }
}

#[async_trait]
impl AdminStore for InMemoryAdminStore {
    async fn get_admins(&self) -> Result<Vec<String>> {
        Ok(self.admins.read().await.iter().cloned().collect())
    }
}
