use crate::error::Result;
use crate::protocol::DataEntry;
use crate::server::ServerId;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Key-value store behind the scenario data sets
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn get_value(&self, data_set: &str, key: &str) -> Result<Option<String>>;

    /// Every `(key, value)` of a data set, ordered by key.
    async fn get_all_entries(&self, data_set: &str) -> Result<Vec<(String, String)>>;

    /// Store or remove (`value == None`) one entry. `source_server_id` is the
    /// server the change came from, if any.
    async fn update_entry(&self, entry: &DataEntry, source_server_id: Option<&ServerId>) -> Result<()>;
}

/// Data store kept in memory
#[derive(Default)]
pub struct InMemoryDataStore {
    data_sets: RwLock<HashMap<String, BTreeMap<String, String>>>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    async fn get_value(&self, data_set: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .data_sets
            .read()
            .await
            .get(data_set)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn get_all_entries(&self, data_set: &str) -> Result<Vec<(String, String)>> {
        Ok(self
            .data_sets
            .read()
            .await
            .get(data_set)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_entry(&self, entry: &DataEntry, source_server_id: Option<&ServerId>) -> Result<()> {
        tracing::trace!(
            data_set = %entry.data_set,
            key = %entry.key,
            source = ?source_server_id,
            "Updating data entry"
        );

        let mut data_sets = self.data_sets.write().await;
        match &entry.value {
            Some(value) => {
                data_sets
                    .entry(entry.data_set.clone())
                    .or_default()
                    .insert(entry.key.clone(), value.clone());
            }
            None => {
                if let Some(entries) = data_sets.get_mut(&entry.data_set) {
                    entries.remove(&entry.key);
                    if entries.is_empty() {
                        data_sets.remove(&entry.data_set);
                    }
                }
            }
        }
        Ok(())
    }
}
