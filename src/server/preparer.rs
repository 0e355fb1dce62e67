use crate::config::{Config, TEMP_SAVES_DIRECTORY};
use crate::controller::LockedServer;
use crate::error::{Error, Result};
use crate::events::{FileDirectory, Notification};
use crate::server::runner::ProcessLaunchDescriptor;
use crate::server::{ServerId, ServerStatus};
use crate::services::{AdminStore, BanStore, FileManager};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What the process should load once it starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartMode {
    /// Continue from the newest save in the temporary save directory
    Resume,
    /// Load a save resolved by [`Preparer::can_load_save`]
    LoadSave { directory: String, save: PathBuf },
    /// Start a fresh map from a scenario
    Scenario(String),
}

/// Gets a server ready to launch.
///
/// The `can_*` checks have no side effects and run before the server's lock
/// is taken. [`prepare`](Self::prepare) runs under the lock with the status
/// already at `Preparing`, and always leaves it at `Prepared` or `Errored`.
#[derive(Clone)]
pub struct Preparer {
    config: Arc<Config>,
    bans: Arc<dyn BanStore>,
    admins: Arc<dyn AdminStore>,
    files: Arc<dyn FileManager>,
}

impl Preparer {
    pub fn new(
        config: Arc<Config>,
        bans: Arc<dyn BanStore>,
        admins: Arc<dyn AdminStore>,
        files: Arc<dyn FileManager>,
    ) -> Self {
        Self {
            config,
            bans,
            admins,
            files,
        }
    }

    pub async fn can_resume(&self, server_id: &ServerId) -> Result<()> {
        if self.files.has_temp_save_files(server_id).await? {
            Ok(())
        } else {
            Err(Error::MissingFile(format!(
                "No save to resume in {}/{}",
                server_id, TEMP_SAVES_DIRECTORY
            )))
        }
    }

    /// Resolve a save inside one of the permitted save directories.
    pub async fn can_load_save(&self, server_id: &ServerId, directory: &str, file: &str) -> Result<PathBuf> {
        self.files.get_save_file(server_id, directory, file).await
    }

    pub async fn can_start_scenario(&self, name: &str) -> Result<()> {
        if self.files.scenario_exists(name).await? {
            Ok(())
        } else {
            Err(Error::MissingDirectory(format!("Scenario {}", name)))
        }
    }

    /// Run every preparation step and resolve the status.
    ///
    /// Panics raised by the steps are caught and reported as
    /// [`Error::Unexpected`] so the final status is always committed.
    #[tracing::instrument(skip(self, server), fields(server_id = %server.id()))]
    pub async fn prepare(
        &self,
        server: &mut LockedServer<'_>,
        mode: StartMode,
    ) -> Result<ProcessLaunchDescriptor> {
        let outcome = AssertUnwindSafe(self.run_steps(server, mode))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(result) => result,
            Err(panic) => Err(Error::Unexpected(panic_message(panic))),
        };

        match &result {
            Ok(_) => {
                server.transition(ServerStatus::Prepared, None);
            }
            Err(e) => {
                tracing::error!(error = %e, "Preparation failed");
                server.info(e.to_string());
                server.transition(ServerStatus::Errored, None);
            }
        }

        result
    }

    async fn run_steps(
        &self,
        server: &mut LockedServer<'_>,
        mode: StartMode,
    ) -> Result<ProcessLaunchDescriptor> {
        let id = server.id().clone();
        let paths = server.paths.clone();

        // The chat log is about to be rotated.
        server.close_chat_log();

        let start_args = match mode {
            StartMode::Resume => {
                self.files.ensure_scenario_directory_removed(&id).await?;
                vec!["--start-server-load-latest".to_string()]
            }
            StartMode::LoadSave { directory, save } => {
                self.files.ensure_scenario_directory_removed(&id).await?;
                let save = if directory == TEMP_SAVES_DIRECTORY {
                    save
                } else {
                    let copy = self.files.copy_save_to_temp(&id, &save).await?;
                    server.notify(Notification::FilesChanged {
                        server_id: Some(id.clone()),
                        directory: FileDirectory::TempSaves,
                    });
                    copy
                };
                vec!["--start-server".to_string(), save.display().to_string()]
            }
            StartMode::Scenario(name) => {
                self.files.ensure_scenario_directory_created(&id).await?;
                vec!["--start-server-load-scenario".to_string(), name]
            }
        };

        let mut tasks: Vec<JoinHandle<Result<()>>> = Vec::new();

        if server.extra_settings.build_bans_from_database_on_start {
            let bans = self.bans.clone();
            let path = paths.ban_list.clone();
            tasks.push(tokio::spawn(async move { bans.build_ban_list_file(&path).await }));
        }

        if server.extra_settings.build_admins_from_database_on_start {
            let admins = self.admins.clone();
            let path = paths.admin_list.clone();
            tasks.push(tokio::spawn(async move { admins.build_admin_list(&path).await }));
        }

        let files = self.files.clone();
        let log_id = id.clone();
        tasks.push(tokio::spawn(async move { files.rotate_logs(&log_id).await }));

        let files = self.files.clone();
        let log_id = id.clone();
        tasks.push(tokio::spawn(async move { files.rotate_chat_logs(&log_id).await }));

        let had_players = server.online_players.count() > 0;
        server.reset_transient();
        if had_players {
            server.players_changed();
        }

        let mut errors = Vec::new();
        let mut args = vec![id.to_string(), paths.executable.display().to_string()];
        args.extend(start_args);
        args.extend([
            "--server-settings".to_string(),
            paths.settings.display().to_string(),
            "--port".to_string(),
            server.port.to_string(),
        ]);

        if let Some(mod_pack) = server.extra_settings.selected_mod_pack.clone() {
            match self.files.mod_pack_directory(&mod_pack).await {
                Ok(Some(directory)) => {
                    args.extend(["--mod-directory".to_string(), directory.display().to_string()]);
                }
                Ok(None) => {
                    tracing::warn!(mod_pack = %mod_pack, "Selected mod pack no longer exists, clearing selection");
                    server.extra_settings.selected_mod_pack = None;
                }
                Err(e) => errors.push(e),
            }
        }

        for task in tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(e),
                Err(e) => errors.push(Error::Unexpected(format!("Preparation task failed: {}", e))),
            }
        }

        if !errors.is_empty() {
            return Err(Error::Preparation(errors));
        }

        Ok(ProcessLaunchDescriptor {
            program: self.config.wrapper_executable.clone(),
            args,
        })
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("Preparation panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("Preparation panicked: {}", message)
    } else {
        "Preparation panicked".to_string()
    }
}
