use crate::config::validator::is_single_component;
use crate::config::{Config, ServerPaths};
use crate::error::{Error, Result};
use crate::server::ServerId;
use async_trait::async_trait;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File and log management consumed by the preparation pipeline
#[async_trait]
pub trait FileManager: Send + Sync {
    /// True when the server's temporary save directory holds at least one file.
    async fn has_temp_save_files(&self, server_id: &ServerId) -> Result<bool>;

    /// Resolve `file` inside one of the permitted save directories.
    ///
    /// Fails with [`Error::InvalidDirectory`] for unknown directory names or
    /// file names that would leave the directory, and with
    /// [`Error::MissingFile`] when the file does not exist.
    async fn get_save_file(&self, server_id: &ServerId, directory: &str, file: &str) -> Result<PathBuf>;

    /// Copy a save into the temporary save directory under the same name and
    /// return the copy's path. A save already in that directory is returned as is.
    async fn copy_save_to_temp(&self, server_id: &ServerId, save: &Path) -> Result<PathBuf>;

    async fn scenario_exists(&self, name: &str) -> Result<bool>;

    /// Directory of a mod pack, or `None` if it no longer exists.
    async fn mod_pack_directory(&self, name: &str) -> Result<Option<PathBuf>>;

    /// Archive the current game log and trim the archive.
    async fn rotate_logs(&self, server_id: &ServerId) -> Result<()>;

    /// Archive the current chat log and trim the archive.
    async fn rotate_chat_logs(&self, server_id: &ServerId) -> Result<()>;

    /// Make the scenario root visible from the server's base directory.
    async fn ensure_scenario_directory_created(&self, server_id: &ServerId) -> Result<()>;

    /// Undo [`ensure_scenario_directory_created`](Self::ensure_scenario_directory_created).
    async fn ensure_scenario_directory_removed(&self, server_id: &ServerId) -> Result<()>;
}

/// [`FileManager`] over the directory layout described by [`ServerPaths`]
pub struct LocalFileManager {
    config: Arc<Config>,
}

impl LocalFileManager {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    fn paths(&self, server_id: &ServerId) -> ServerPaths {
        ServerPaths::new(&self.config, server_id.as_str())
    }
}

#[async_trait]
impl FileManager for LocalFileManager {
    async fn has_temp_save_files(&self, server_id: &ServerId) -> Result<bool> {
        let paths = self.paths(server_id);
        let mut entries = match tokio::fs::read_dir(&paths.temp_saves).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn get_save_file(&self, server_id: &ServerId, directory: &str, file: &str) -> Result<PathBuf> {
        let paths = self.paths(server_id);
        let dir = paths
            .save_directory(directory)
            .ok_or_else(|| Error::InvalidDirectory(directory.to_string()))?;

        if !is_single_component(file) {
            return Err(Error::InvalidDirectory(format!("{}/{}", directory, file)));
        }

        let missing = || Error::MissingFile(format!("{}/{}", directory, file));
        let dir = tokio::fs::canonicalize(dir).await.map_err(|_| missing())?;
        let resolved = tokio::fs::canonicalize(dir.join(file))
            .await
            .map_err(|_| missing())?;

        if !resolved.starts_with(&dir) {
            return Err(Error::InvalidDirectory(format!("{}/{}", directory, file)));
        }

        if !tokio::fs::metadata(&resolved).await?.is_file() {
            return Err(missing());
        }

        Ok(resolved)
    }

    async fn copy_save_to_temp(&self, server_id: &ServerId, save: &Path) -> Result<PathBuf> {
        let paths = self.paths(server_id);
        let file_name = save
            .file_name()
            .ok_or_else(|| Error::MissingFile(save.display().to_string()))?;

        tokio::fs::create_dir_all(&paths.temp_saves).await?;
        let temp_dir = tokio::fs::canonicalize(&paths.temp_saves).await?;
        if save.parent() == Some(temp_dir.as_path()) {
            return Ok(save.to_path_buf());
        }

        let destination = temp_dir.join(file_name);
        tokio::fs::copy(save, &destination).await?;
        tracing::debug!(
            server_id = %server_id,
            from = %save.display(),
            to = %destination.display(),
            "Copied save to temp directory"
        );
        Ok(destination)
    }

    async fn scenario_exists(&self, name: &str) -> Result<bool> {
        if !is_single_component(name) {
            return Ok(false);
        }
        Ok(is_directory(&self.config.scenario_directory.join(name)).await)
    }

    async fn mod_pack_directory(&self, name: &str) -> Result<Option<PathBuf>> {
        if !is_single_component(name) {
            return Ok(None);
        }
        let dir = self.config.mod_directory.join(name);
        Ok(is_directory(&dir).await.then_some(dir))
    }

    async fn rotate_logs(&self, server_id: &ServerId) -> Result<()> {
        let paths = self.paths(server_id);
        rotate(&paths.current_log, &paths.logs, "factorio", self.config.max_log_files).await
    }

    async fn rotate_chat_logs(&self, server_id: &ServerId) -> Result<()> {
        let paths = self.paths(server_id);
        rotate(&paths.current_chat_log, &paths.chat_logs, "chat", self.config.max_log_files).await
    }

    async fn ensure_scenario_directory_created(&self, server_id: &ServerId) -> Result<()> {
        let paths = self.paths(server_id);
        if tokio::fs::symlink_metadata(&paths.scenario_link).await.is_ok() {
            return Ok(());
        }

        tokio::fs::create_dir_all(&paths.base).await?;
        link_directory(&self.config.scenario_directory, &paths.scenario_link).await?;
        Ok(())
    }

    async fn ensure_scenario_directory_removed(&self, server_id: &ServerId) -> Result<()> {
        let paths = self.paths(server_id);
        match tokio::fs::symlink_metadata(&paths.scenario_link).await {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                unlink_directory(&paths.scenario_link).await?;
                Ok(())
            }
            Ok(_) => {
                tracing::warn!(
                    server_id = %server_id,
                    path = %paths.scenario_link.display(),
                    "Scenario path is not a link, leaving it in place"
                );
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn is_directory(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false)
}

/// Move `current` into `archive_dir` as `<prefix>-<timestamp>.log`, then
/// delete the oldest archives until at most `max_files` remain.
async fn rotate(current: &Path, archive_dir: &Path, prefix: &str, max_files: usize) -> Result<()> {
    tokio::fs::create_dir_all(archive_dir).await?;

    if tokio::fs::metadata(current).await.is_ok() {
        let archived = archive_dir.join(format!(
            "{}-{}.log",
            prefix,
            Utc::now().format("%Y%m%d-%H%M%S%.3f")
        ));
        tokio::fs::rename(current, &archived).await?;
    }

    let marker = format!("{}-", prefix);
    let mut archives = Vec::new();
    let mut entries = tokio::fs::read_dir(archive_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&marker) && name.ends_with(".log") {
            archives.push(entry.path());
        }
    }

    // Timestamped names sort chronologically.
    archives.sort();
    let excess = archives.len().saturating_sub(max_files);
    for old in archives.into_iter().take(excess) {
        tracing::debug!(path = %old.display(), "Removing old log file");
        tokio::fs::remove_file(&old).await?;
    }

    Ok(())
}

#[cfg(unix)]
async fn link_directory(target: &Path, link: &Path) -> std::io::Result<()> {
    tokio::fs::symlink(target, link).await
}

#[cfg(windows)]
async fn link_directory(target: &Path, link: &Path) -> std::io::Result<()> {
    tokio::fs::symlink_dir(target, link).await
}

#[cfg(unix)]
async fn unlink_directory(link: &Path) -> std::io::Result<()> {
    tokio::fs::remove_file(link).await
}

#[cfg(windows)]
async fn unlink_directory(link: &Path) -> std::io::Result<()> {
    tokio::fs::remove_dir(link).await
}
