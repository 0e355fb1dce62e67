use super::{Action, LockedServer, ServerController};
use crate::error::Result;
use crate::events::{FileDirectory, Notification};
use crate::protocol::command;
use crate::server::ServerStatus;
use crate::services::RelayMessage;
use chrono::Utc;
use std::time::Instant;

impl ServerController {
    /// Record a status reported by the supervised process.
    ///
    /// A report equal to the current status only refreshes the report
    /// timestamp; anything else is applied as a transition together with its
    /// side effects.
    #[tracing::instrument(skip(self, id), fields(server_id = %id))]
    pub async fn on_status_reported(&self, id: &str, status: ServerStatus) -> Result<()> {
        let mut server = self.lock(id).await?;
        server.last_status_report = Some(Utc::now());

        if server.status == status {
            tracing::trace!(status = %status, "Status unchanged");
        } else {
            self.apply_status(&mut server, status, None);
        }

        let deferred = server.finish();
        self.perform(deferred).await;
        Ok(())
    }

    /// Transition to `new` and queue the effects of entering it.
    pub(crate) fn apply_status(&self, server: &mut LockedServer<'_>, new: ServerStatus, by: Option<&str>) {
        let old = server.transition(new, by);

        match new {
            ServerStatus::Running if old != ServerStatus::Running => {
                server.start_time = Some(Instant::now());
                server.relay(RelayMessage::ServerStarted);
                server.send_command(command::query_online_players());
                server.send_command(command::get_tracked_data_sets());
            }
            status if status.is_stopped() => {
                server.close_chat_log();
                clear_players(server);

                server.last_temp_files_checked = Some(Utc::now());
                let server_id = server.id().clone();
                server.notify(Notification::FilesChanged {
                    server_id: Some(server_id),
                    directory: FileDirectory::TempSaves,
                });

                if let Some(callback) = server.stop_callback.take() {
                    server.defer(Action::RunStopCallback(callback));
                }
            }
            ServerStatus::Crashed => {
                server.close_chat_log();
                clear_players(server);

                if old == ServerStatus::Running {
                    let uptime = server.start_time.map(|started| started.elapsed());
                    let alert = uptime.is_some_and(|uptime| uptime >= self.inner.config.crash_alert_cooldown());
                    server.relay(RelayMessage::Crashed { alert, uptime });
                }
            }
            _ => {}
        }
    }
}

fn clear_players(server: &mut LockedServer<'_>) {
    if server.online_players.count() > 0 {
        server.online_players.clear();
        server.players_changed();
    }
}
