use super::{LockedServer, ServerController};
use crate::error::{Error, Result};
use crate::server::{KillReport, ServerId, ServerStatus, StartMode};
use crate::transport::spawn_output_reader;
use futures::FutureExt;

/// How a force-stop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceStopOutcome {
    /// The wrapper acknowledged in time; its status report finishes the stop
    Acknowledged,
    /// No acknowledgment; matching processes were killed
    Killed(KillReport),
    /// The server left `Stopping` while waiting, so nothing was killed.
    /// Carries the status found after the wait.
    AlreadyStopped(ServerStatus),
}

impl ServerController {
    /// Start the server from the newest save in its temporary save directory.
    #[tracing::instrument(skip(self, id), fields(server_id = %id))]
    pub async fn resume(&self, id: &str, user: Option<&str>) -> Result<()> {
        let server_id = self.server_id(id)?;
        self.inner.preparer.can_resume(&server_id).await?;
        self.start(&server_id, StartMode::Resume, user).await
    }

    /// Start the server from `file` in the save directory `directory`.
    #[tracing::instrument(skip(self, id), fields(server_id = %id))]
    pub async fn load(&self, id: &str, directory: &str, file: &str, user: Option<&str>) -> Result<()> {
        let server_id = self.server_id(id)?;
        let save = self
            .inner
            .preparer
            .can_load_save(&server_id, directory, file)
            .await?;

        let mode = StartMode::LoadSave {
            directory: directory.to_string(),
            save,
        };
        self.start(&server_id, mode, user).await
    }

    /// Start a fresh map from the scenario `name`.
    #[tracing::instrument(skip(self, id), fields(server_id = %id))]
    pub async fn start_scenario(&self, id: &str, name: &str, user: Option<&str>) -> Result<()> {
        let server_id = self.server_id(id)?;
        self.inner.preparer.can_start_scenario(name).await?;
        self.start(&server_id, StartMode::Scenario(name.to_string()), user)
            .await
    }

    /// Start the scenario `name`, stopping the running game first if needed.
    ///
    /// While running, the start is installed as the server's stop callback and
    /// a normal stop is requested; the scenario starts once the stop has been
    /// reported.
    #[tracing::instrument(skip(self, id), fields(server_id = %id))]
    pub async fn force_start_scenario(&self, id: &str, name: &str, user: Option<&str>) -> Result<()> {
        let server_id = self.server_id(id)?;
        self.inner.preparer.can_start_scenario(name).await?;

        let mut server = self.lock(server_id.as_str()).await?;
        let result = match server.status {
            ServerStatus::Running => {
                let scenario = name.to_string();
                let by = user.map(str::to_string);
                server.stop_callback = Some(Box::new(
                    move |controller: ServerController, server_id: ServerId| {
                        async move {
                            if let Err(e) = controller
                                .start_scenario(server_id.as_str(), &scenario, by.as_deref())
                                .await
                            {
                                tracing::error!(
                                    server_id = %server_id,
                                    scenario = %scenario,
                                    error = %e,
                                    "Failed to start scenario after stop"
                                );
                            }
                        }
                        .boxed()
                    },
                ));
                server.transition(ServerStatus::Stopping, user);
                Ok(true)
            }
            status if status.is_startable() => self
                .start_locked(&mut server, StartMode::Scenario(name.to_string()), user)
                .await
                .map(|_| false),
            status => Err(Error::InvalidState(status)),
        };

        let deferred = server.finish();
        self.perform(deferred).await;

        if result? {
            self.inner.collaborators.link.stop(&server_id).await?;
        }
        Ok(())
    }

    /// Ask the process to save and shut down.
    ///
    /// The status stays `Stopping` until the process reports it has stopped.
    #[tracing::instrument(skip(self, id), fields(server_id = %id))]
    pub async fn stop(&self, id: &str, user: Option<&str>) -> Result<()> {
        let server_id = self.server_id(id)?;

        let mut server = self.lock(server_id.as_str()).await?;
        if !server.status.is_stoppable() {
            return Err(Error::InvalidState(server.status));
        }
        server.transition(ServerStatus::Stopping, user);
        let deferred = server.finish();
        self.perform(deferred).await;

        self.inner.collaborators.link.stop(&server_id).await
    }

    /// Stop the process without waiting for it to save.
    ///
    /// The wrapper gets the configured force-stop timeout to acknowledge. If
    /// it does not, or cannot be reached, every process running the server's
    /// executable is killed and the server ends up `Killed` even when nothing
    /// was found. A server that left `Stopping` during the wait is left alone.
    #[tracing::instrument(skip(self, id), fields(server_id = %id))]
    pub async fn force_stop(&self, id: &str, user: Option<&str>) -> Result<ForceStopOutcome> {
        let server_id = self.server_id(id)?;

        let mut server = self.lock(server_id.as_str()).await?;
        let status = server.status;
        if !status.is_stoppable() && status != ServerStatus::Stopping {
            return Err(Error::InvalidState(status));
        }
        if status != ServerStatus::Stopping {
            server.transition(ServerStatus::Stopping, user);
        }
        let executable = server.paths.executable.clone();
        let deferred = server.finish();
        self.perform(deferred).await;

        let link = self.inner.collaborators.link.clone();
        let timeout = self.inner.config.force_stop_timeout();
        match tokio::time::timeout(timeout, link.force_stop(&server_id)).await {
            Ok(Ok(())) => {
                tracing::info!("Force stop acknowledged");
                return Ok(ForceStopOutcome::Acknowledged);
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Force stop request failed, killing process");
            }
            Err(_) => {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Force stop not acknowledged, killing process");
            }
        }

        let mut server = self.lock(server_id.as_str()).await?;
        // The process may have stopped, or even been restarted, during the wait.
        if server.status != ServerStatus::Stopping {
            tracing::info!(status = %server.status, "Server left Stopping during force stop, not killing");
            return Ok(ForceStopOutcome::AlreadyStopped(server.status));
        }
        server.transition(ServerStatus::Killing, user);
        let deferred = server.finish();
        self.perform(deferred).await;

        let killer = self.inner.collaborators.killer.clone();
        let report = tokio::task::spawn_blocking(move || killer.kill_matching(&executable))
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Kill scan failed");
                KillReport::default()
            });

        let mut server = self.lock(server_id.as_str()).await?;
        server.info(format!(
            "Killed {} of {} processes",
            report.killed, report.found
        ));
        if server.status == ServerStatus::Killing {
            self.apply_status(&mut server, ServerStatus::Killed, user);
        }
        let deferred = server.finish();
        self.perform(deferred).await;

        Ok(ForceStopOutcome::Killed(report))
    }

    /// Install game version `version`.
    ///
    /// Returns as soon as the status is `Updating`; the installation runs on a
    /// background task that moves the server to `Updated` or `Crashed`.
    #[tracing::instrument(skip(self, id), fields(server_id = %id))]
    pub async fn install(&self, id: &str, version: &str, user: Option<&str>) -> Result<()> {
        let server_id = self.server_id(id)?;

        let mut server = self.lock(server_id.as_str()).await?;
        if !server.status.is_updatable() {
            return Err(Error::InvalidState(server.status));
        }
        server.transition(ServerStatus::Updating, user);
        let deferred = server.finish();
        self.perform(deferred).await;

        let controller = self.clone();
        let version = version.to_string();
        let by = user.map(str::to_string);
        tokio::spawn(async move {
            let result = controller
                .inner
                .collaborators
                .updater
                .install(&server_id, &version)
                .await;

            let mut server = match controller.lock(server_id.as_str()).await {
                Ok(server) => server,
                Err(e) => {
                    tracing::error!(server_id = %server_id, error = %e, "Lost server after update");
                    return;
                }
            };

            match result {
                Ok(()) => {
                    server.info(format!("Installed version {}", version));
                    controller.apply_status(&mut server, ServerStatus::Updated, by.as_deref());
                }
                Err(e) => {
                    tracing::error!(server_id = %server_id, version = %version, error = %e, "Update failed");
                    server.info(format!("Failed to install version {}: {}", version, e));
                    controller.apply_status(&mut server, ServerStatus::Crashed, by.as_deref());
                }
            }

            let deferred = server.finish();
            controller.perform(deferred).await;
        });

        Ok(())
    }

    async fn start(&self, server_id: &ServerId, mode: StartMode, user: Option<&str>) -> Result<()> {
        let mut server = self.lock(server_id.as_str()).await?;

        // Another operation may have moved the server since the precondition check.
        let result = if server.status.is_startable() {
            self.start_locked(&mut server, mode, user).await
        } else {
            Err(Error::InvalidState(server.status))
        };

        let deferred = server.finish();
        self.perform(deferred).await;
        result
    }

    async fn start_locked(
        &self,
        server: &mut LockedServer<'_>,
        mode: StartMode,
        user: Option<&str>,
    ) -> Result<()> {
        server.transition(ServerStatus::Preparing, user);

        let descriptor = self.inner.preparer.prepare(server, mode).await?;
        let process = self.inner.runner.run(server, &descriptor)?;

        if let Some(output) = process.output {
            spawn_output_reader(self.clone(), server.id().clone(), output);
        }
        Ok(())
    }
}
