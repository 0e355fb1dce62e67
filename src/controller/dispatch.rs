use super::{LockedServer, ServerController};
use crate::config::ServerExtraSettings;
use crate::error::{Error, Result};
use crate::events::{FileDirectory, Notification};
use crate::protocol::{
    BanLine, DataEntry, DataGetAllRequest, DataGetRequest, DecodedLine, OutputSignal,
    ProtocolEvent, TagKind, UnbanLine, command, decode_line, parse_ban_line, parse_json,
    parse_unban_line, player_name, split_callback, split_named,
};
use crate::server::{
    ControlMessage, LeaveOutcome, MessageKind, ServerId, ServerSettingsFile, ServerStatus,
};
use crate::services::{Audience, Ban, RelayMessage, Style};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User recorded for operations the scenario requests itself.
pub const SERVER_USER: &str = "<server>";

/// Serializable view of one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub server_id: ServerId,
    pub status: ServerStatus,
    pub port: u16,
    pub online_player_count: u32,
    pub online_players: Vec<String>,
    pub tracking_data_sets: Vec<String>,
    pub uptime_secs: Option<u64>,
    pub last_status_report: Option<DateTime<Utc>>,
    pub last_temp_files_checked: Option<DateTime<Utc>>,
    pub selected_mod_pack: Option<String>,
}

/// Work a protocol event needs once the lock is released
#[derive(Debug)]
enum Pending {
    Ban(BanLine),
    Unban(UnbanLine),
    DataGet {
        callback_id: String,
        request: DataGetRequest,
    },
    DataGetAll {
        callback_id: String,
        request: DataGetAllRequest,
    },
    DataSet(DataEntry),
    StartScenario(String),
}

impl ServerController {
    /// Handle one line of output from the server process.
    ///
    /// The line is always recorded as an `Output` message. A line that fails
    /// to decode is logged and dropped; it never affects later lines.
    pub async fn on_process_output(&self, id: &str, line: &str) -> Result<()> {
        let mut server = self.lock(id).await?;
        let server_id = server.id().clone();

        server.push_message(ControlMessage::new(server_id.clone(), MessageKind::Output, line));

        let pending = match decode_line(line) {
            DecodedLine::Untagged { signal } => {
                if let Some(signal) = signal {
                    handle_signal(&mut server, signal);
                }
                Ok(None)
            }
            DecodedLine::Tagged(event) => apply_event(&mut server, event),
        };

        let deferred = server.finish();
        self.perform(deferred).await;

        let pending = match pending {
            Ok(Some(pending)) => pending,
            Ok(None) => return Ok(()),
            Err(e) => {
                tracing::warn!(server_id = %server_id, line, error = %e, "Failed to decode protocol line");
                return Ok(());
            }
        };

        if let Err(e) = self.run_pending(&server_id, pending).await {
            tracing::warn!(server_id = %server_id, line, error = %e, "Failed to handle protocol event");
        }
        Ok(())
    }

    async fn run_pending(&self, server_id: &ServerId, pending: Pending) -> Result<()> {
        let collaborators = self.collaborators();

        match pending {
            // Bans issued by the controller come back as `<server>`; they are
            // already persisted and synced.
            Pending::Ban(line) if line.admin == SERVER_USER => {
                tracing::debug!(server_id = %server_id, username = %line.username, "Ignoring synced ban");
            }
            Pending::Unban(line) if line.admin == SERVER_USER => {
                tracing::debug!(server_id = %server_id, username = %line.username, "Ignoring synced unban");
            }
            Pending::Ban(line) => {
                let ban = Ban::new(&line.username, &line.admin, &line.reason);
                collaborators.bans.add_ban(ban).await?;
                self.sync_ban_command(Some(server_id), command::ban(&line.username, &line.reason))
                    .await;
            }
            Pending::Unban(line) => {
                collaborators
                    .bans
                    .remove_ban(&line.username, &line.admin)
                    .await?;
                self.sync_ban_command(Some(server_id), command::unban(&line.username))
                    .await;
            }
            Pending::DataGet {
                callback_id,
                request,
            } => {
                let value = collaborators
                    .data
                    .get_value(&request.data_set, &request.key)
                    .await?;
                let reply = command::data_get_callback(
                    &callback_id,
                    &request.data_set,
                    &request.key,
                    value.as_deref(),
                );
                collaborators.link.send_command(server_id, &reply).await?;
            }
            Pending::DataGetAll {
                callback_id,
                request,
            } => {
                let entries = collaborators.data.get_all_entries(&request.data_set).await?;
                let reply = command::data_get_all_callback(&callback_id, &request.data_set, &entries);
                collaborators.link.send_command(server_id, &reply).await?;
            }
            Pending::DataSet(entry) => {
                collaborators.data.update_entry(&entry, Some(server_id)).await?;
                self.fan_out_data_entry(&entry, Some(server_id)).await;
            }
            Pending::StartScenario(name) => {
                self.force_start_scenario(server_id.as_str(), &name, Some(SERVER_USER))
                    .await?;
            }
        }

        Ok(())
    }

    /// Ban `username` everywhere: persist it and issue `/ban` on every running
    /// server that syncs bans.
    #[tracing::instrument(skip(self))]
    pub async fn ban_player(&self, username: &str, admin: &str, reason: &str) -> Result<()> {
        self.collaborators()
            .bans
            .add_ban(Ban::new(username, admin, reason))
            .await?;
        self.sync_ban_command(None, command::ban(username, reason))
            .await;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn unban_player(&self, username: &str, admin: &str) -> Result<()> {
        self.collaborators().bans.remove_ban(username, admin).await?;
        self.sync_ban_command(None, command::unban(username)).await;
        Ok(())
    }

    /// Send `command` to every running server with ban sync enabled except
    /// `source`, taking one server lock at a time.
    async fn sync_ban_command(&self, source: Option<&ServerId>, command: String) {
        for server_id in self.server_ids() {
            if Some(&server_id) == source {
                continue;
            }

            let result = self
                .with_lock(server_id.as_str(), |server| {
                    if server.status == ServerStatus::Running && server.extra_settings.sync_bans {
                        server.send_command(command.clone());
                    }
                })
                .await;

            if let Err(e) = result {
                tracing::warn!(server_id = %server_id, error = %e, "Failed to sync ban");
            }
        }
    }

    /// Push a changed data entry to every running server tracking its data
    /// set, except `source`.
    pub async fn fan_out_data_entry(&self, entry: &DataEntry, source: Option<&ServerId>) {
        let data_set_command = command::data_set(entry);

        for server_id in self.server_ids() {
            if Some(&server_id) == source {
                continue;
            }

            let result = self
                .with_lock(server_id.as_str(), |server| {
                    if server.status == ServerStatus::Running
                        && server.tracking_data_sets.contains(&entry.data_set)
                    {
                        server.send_command(data_set_command.clone());
                    }
                })
                .await;

            if let Err(e) = result {
                tracing::warn!(server_id = %server_id, error = %e, "Failed to fan out data entry");
            }
        }
    }

    /// Pass a console command typed by `user` through to the process.
    #[tracing::instrument(skip(self, id), fields(server_id = %id))]
    pub async fn send_console_command(&self, id: &str, text: &str, user: Option<&str>) -> Result<()> {
        let mut server = self.lock(id).await?;
        let server_id = server.id().clone();
        let message = ControlMessage::new(server_id.clone(), MessageKind::Control, text).with_sender(user);
        server.push_message(message);
        let deferred = server.finish();
        self.perform(deferred).await;

        self.collaborators().link.send_command(&server_id, text).await
    }

    pub async fn status(&self, id: &str) -> Result<ServerStatus> {
        Ok(self.lock(id).await?.status)
    }

    pub async fn snapshot(&self, id: &str) -> Result<ServerSnapshot> {
        let server = self.lock(id).await?;

        let mut tracking_data_sets: Vec<String> = server.tracking_data_sets.iter().cloned().collect();
        tracking_data_sets.sort();

        let uptime_secs = match server.status {
            ServerStatus::Running => server.start_time.map(|started| started.elapsed().as_secs()),
            _ => None,
        };

        Ok(ServerSnapshot {
            server_id: server.id().clone(),
            status: server.status,
            port: server.port,
            online_player_count: server.online_players.count(),
            online_players: server.online_players.names(),
            tracking_data_sets,
            uptime_secs,
            last_status_report: server.last_status_report,
            last_temp_files_checked: server.last_temp_files_checked,
            selected_mod_pack: server.extra_settings.selected_mod_pack.clone(),
        })
    }

    /// Message history, oldest first
    pub async fn control_messages(&self, id: &str) -> Result<Vec<ControlMessage>> {
        Ok(self.lock(id).await?.control_messages.to_vec())
    }

    pub async fn online_players(&self, id: &str) -> Result<Vec<String>> {
        Ok(self.lock(id).await?.online_players.names())
    }

    /// Online players summed over every server, one lock at a time.
    pub async fn total_online_players(&self) -> u32 {
        let mut total = 0;
        for server_id in self.server_ids() {
            if let Ok(server) = self.lock(server_id.as_str()).await {
                total += server.online_players.count();
            }
        }
        total
    }

    /// The server settings file, read from disk on first use.
    pub async fn server_settings(&self, id: &str) -> Result<ServerSettingsFile> {
        let mut server = self.lock(id).await?;
        if let Some(settings) = &server.cached_settings {
            return Ok(settings.clone());
        }

        let path = server.paths.settings.clone();
        let settings = ServerSettingsFile::load(&path).await?;
        server.cached_settings = Some(settings.clone());
        Ok(settings)
    }

    /// Write the server settings file and refresh the cache.
    #[tracing::instrument(skip(self, id, settings), fields(server_id = %id))]
    pub async fn update_server_settings(&self, id: &str, settings: ServerSettingsFile) -> Result<()> {
        let mut server = self.lock(id).await?;
        let path = server.paths.settings.clone();
        if let Err(e) = settings.save(&path).await {
            server.cached_settings = None;
            return Err(e);
        }
        server.cached_settings = Some(settings);
        Ok(())
    }

    /// Admin names for a server, fetched from the admin store on first use.
    pub async fn admins(&self, id: &str) -> Result<Vec<String>> {
        let mut server = self.lock(id).await?;
        if let Some(admins) = &server.cached_admins {
            return Ok(admins.clone());
        }

        let admins = self.collaborators().admins.get_admins().await?;
        server.cached_admins = Some(admins.clone());
        Ok(admins)
    }

    /// Drop every server's cached admin list.
    pub async fn invalidate_admin_cache(&self) {
        for server_id in self.server_ids() {
            if let Err(e) = self
                .with_lock(server_id.as_str(), |server| server.cached_admins = None)
                .await
            {
                tracing::warn!(server_id = %server_id, error = %e, "Failed to invalidate admin cache");
            }
        }
    }

    pub async fn extra_settings(&self, id: &str) -> Result<ServerExtraSettings> {
        Ok(self.lock(id).await?.extra_settings.clone())
    }

    pub async fn set_extra_settings(&self, id: &str, settings: ServerExtraSettings) -> Result<()> {
        self.with_lock(id, |server| server.extra_settings = settings)
            .await
    }

    /// Select the mod pack used from the next start on; `None` runs without mods.
    pub async fn set_selected_mod_pack(&self, id: &str, mod_pack: Option<&str>) -> Result<()> {
        let selected = mod_pack.map(str::to_string);
        self.with_lock(id, |server| {
            server.extra_settings.selected_mod_pack = selected;
            let server_id = server.id().clone();
            server.notify(Notification::FilesChanged {
                server_id: Some(server_id),
                directory: FileDirectory::ModPacks,
            });
        })
        .await
    }
}

fn handle_signal(server: &mut LockedServer<'_>, signal: OutputSignal) {
    match signal {
        OutputSignal::SaveFinished => {
            server.last_temp_files_checked = Some(Utc::now());
            let server_id = server.id().clone();
            server.notify(Notification::FilesChanged {
                server_id: Some(server_id),
                directory: FileDirectory::TempSaves,
            });
        }
        OutputSignal::Desync => server.relay(RelayMessage::Desync),
    }
}

/// Apply the part of an event that only touches this server's state.
fn apply_event(server: &mut LockedServer<'_>, event: ProtocolEvent) -> Result<Option<Pending>> {
    let ProtocolEvent { tag, payload } = event;

    let pending = match tag {
        TagKind::Chat => {
            server.log_chat(&payload);
            if server.extra_settings.game_chat_to_relay {
                server.relay(RelayMessage::Chat(payload));
            }
            None
        }
        TagKind::Shout => {
            server.log_chat(&payload);
            if server.extra_settings.game_shout_to_relay {
                server.relay(RelayMessage::Shout(payload));
            }
            None
        }
        TagKind::Discord => relay_text(server, Audience::Public, Style::Plain, payload),
        TagKind::DiscordRaw => relay_text(server, Audience::Public, Style::Raw, payload),
        TagKind::DiscordBold => relay_text(server, Audience::Public, Style::Bold, payload),
        TagKind::DiscordEmbed => relay_text(server, Audience::Public, Style::Embed, payload),
        TagKind::DiscordEmbedRaw => relay_text(server, Audience::Public, Style::EmbedRaw, payload),
        TagKind::DiscordAdmin => relay_text(server, Audience::Admin, Style::Plain, payload),
        TagKind::DiscordAdminRaw => relay_text(server, Audience::Admin, Style::Raw, payload),
        TagKind::DiscordAdminEmbed => relay_text(server, Audience::Admin, Style::Embed, payload),
        TagKind::DiscordAdminEmbedRaw => relay_text(server, Audience::Admin, Style::EmbedRaw, payload),
        TagKind::DiscordNamed => relay_named(server, Style::Plain, &payload)?,
        TagKind::DiscordNamedRaw => relay_named(server, Style::Raw, &payload)?,
        TagKind::DiscordNamedBold => relay_named(server, Style::Bold, &payload)?,
        TagKind::DiscordNamedEmbed => relay_named(server, Style::Embed, &payload)?,
        TagKind::DiscordNamedEmbedRaw => relay_named(server, Style::EmbedRaw, &payload)?,
        TagKind::PlayerJoin => {
            let name = player_name(&payload)?;
            server.online_players.join(name);
            server.players_changed();
            None
        }
        TagKind::PlayerLeave => {
            let name = player_name(&payload)?;
            match server.online_players.leave(name) {
                LeaveOutcome::Left => server.players_changed(),
                LeaveOutcome::Unknown => {
                    tracing::debug!(server_id = %server.id(), player = name, "Unknown player left, querying players");
                    server.send_command(command::query_online_players());
                }
            }
            None
        }
        TagKind::QueryPlayers => {
            let names: Vec<String> = parse_json(tag, &payload)?;
            server.online_players.replace(&names);
            server.players_changed();
            None
        }
        TagKind::Ban => {
            if server.extra_settings.sync_bans {
                Some(Pending::Ban(parse_ban_line(&payload)?))
            } else {
                None
            }
        }
        TagKind::Unban => {
            if server.extra_settings.sync_bans {
                Some(Pending::Unban(parse_unban_line(&payload)?))
            } else {
                None
            }
        }
        TagKind::StartScenario => {
            if payload.is_empty() {
                return Err(Error::Protocol("Missing scenario name".to_string()));
            }
            Some(Pending::StartScenario(payload))
        }
        TagKind::Ping => {
            let (callback_id, body) = split_callback(&payload)?;
            server.send_command(command::ping_callback(callback_id, body));
            None
        }
        TagKind::DataGet => {
            let (callback_id, body) = split_callback(&payload)?;
            let request: DataGetRequest = parse_json(tag, body)?;
            Some(Pending::DataGet {
                callback_id: callback_id.to_string(),
                request,
            })
        }
        TagKind::DataGetAll => {
            let (callback_id, body) = split_callback(&payload)?;
            let request: DataGetAllRequest = parse_json(tag, body)?;
            Some(Pending::DataGetAll {
                callback_id: callback_id.to_string(),
                request,
            })
        }
        TagKind::DataSet => {
            let entry: DataEntry = parse_json(tag, &payload)?;
            Some(Pending::DataSet(entry))
        }
        TagKind::DataTracked => {
            let data_sets: Vec<String> = parse_json(tag, &payload)?;
            server.tracking_data_sets = data_sets.into_iter().collect();
            None
        }
    };

    Ok(pending)
}

fn relay_text(
    server: &mut LockedServer<'_>,
    audience: Audience,
    style: Style,
    text: String,
) -> Option<Pending> {
    server.relay(RelayMessage::Text {
        audience,
        style,
        text,
    });
    None
}

fn relay_named(server: &mut LockedServer<'_>, style: Style, payload: &str) -> Result<Option<Pending>> {
    let (channel, text) = split_named(payload)?;
    server.relay(RelayMessage::Text {
        audience: Audience::Named(channel.to_string()),
        style,
        text: text.to_string(),
    });
    Ok(None)
}
