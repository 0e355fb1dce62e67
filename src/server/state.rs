// src/server/state.rs
use crate::ServerController;
use crate::config::{ServerExtraSettings, ServerPaths};
use crate::server::ServerStatus;
use crate::server::settings::ServerSettingsFile;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::io::Write;
use std::time::Instant;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

/// Stable identifier of a configured server slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ServerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ServerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Continuation run once after the next successful stop.
pub type StopCallback =
    Box<dyn FnOnce(ServerController, ServerId) -> BoxFuture<'static, ()> + Send + Sync>;

/// Kind of a user-visible control message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A line printed by the server process
    Output,
    /// A synthesized status change line
    Status,
    /// A console command sent by a user
    Control,
    /// Anything the controller itself reports (kill counts, update results)
    Info,
}

/// One entry of a server's control message history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub server_id: ServerId,
    pub kind: MessageKind,
    pub message: String,
    pub sender: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ControlMessage {
    pub fn new(server_id: ServerId, kind: MessageKind, message: impl Into<String>) -> Self {
        Self {
            server_id,
            kind,
            message: message.into(),
            sender: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_sender(mut self, sender: Option<&str>) -> Self {
        self.sender = sender.map(str::to_string);
        self
    }

    /// Message recorded alongside every status transition.
    pub fn status_change(
        server_id: ServerId,
        old: ServerStatus,
        new: ServerStatus,
        by: Option<&str>,
    ) -> Self {
        let message = match by {
            Some(user) => format!("[STATUS] Change from {} to {} by: {}", old, new, user),
            None => format!("[STATUS] Change from {} to {}", old, new),
        };
        Self::new(server_id, MessageKind::Status, message).with_sender(by)
    }
}

/// Bounded message history; the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct ControlMessageHistory {
    capacity: usize,
    messages: VecDeque<ControlMessage>,
}

impl ControlMessageHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            messages: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, message: ControlMessage) {
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ControlMessage> {
        self.messages.iter()
    }

    pub fn to_vec(&self) -> Vec<ControlMessage> {
        self.messages.iter().cloned().collect()
    }
}

/// Result of a player leaving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// One session of a known player ended
    Left,
    /// The player was not known to be online; the map needs a re-query
    Unknown,
}

/// Online players keyed by name; one name may hold several sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnlinePlayers {
    sessions: HashMap<String, u32>,
    count: u32,
}

impl OnlinePlayers {
    pub fn join(&mut self, name: &str) {
        *self.sessions.entry(name.to_string()).or_insert(0) += 1;
        self.count += 1;
    }

    pub fn leave(&mut self, name: &str) -> LeaveOutcome {
        match self.sessions.get_mut(name) {
            Some(sessions) => {
                *sessions -= 1;
                if *sessions == 0 {
                    self.sessions.remove(name);
                }
                self.count = self.count.saturating_sub(1);
                LeaveOutcome::Left
            }
            None => LeaveOutcome::Unknown,
        }
    }

    /// Replace the whole map with the result of a player query.
    pub fn replace<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.clear();
        for name in names {
            self.join(name.as_ref());
        }
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn sessions(&self, name: &str) -> u32 {
        self.sessions.get(name).copied().unwrap_or(0)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Chat log writer, opened on the first chat line and closed on drop.
pub struct ChatLogger {
    appender: RollingFileAppender,
}

impl ChatLogger {
    pub fn open(paths: &ServerPaths) -> std::io::Result<Self> {
        std::fs::create_dir_all(&paths.chat_logs)?;
        let file_name = paths
            .current_chat_log
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("current.log");

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(file_name)
            .build(&paths.chat_logs)
            .map_err(std::io::Error::other)?;

        Ok(Self { appender })
    }

    pub fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        writeln!(
            self.appender,
            "{} {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            line
        )?;
        self.appender.flush()
    }
}

/// Mutable runtime record of one server slot.
///
/// Owned by the controller and only reachable through
/// [`LockedServer`](crate::controller::LockedServer), so every mutation happens
/// while the server's lock is held.
pub struct ServerRuntimeState {
    pub id: ServerId,
    pub paths: ServerPaths,
    pub port: u16,
    pub status: ServerStatus,
    pub start_time: Option<Instant>,
    pub last_temp_files_checked: Option<DateTime<Utc>>,
    pub last_status_report: Option<DateTime<Utc>>,
    pub online_players: OnlinePlayers,
    pub tracking_data_sets: HashSet<String>,
    pub control_messages: ControlMessageHistory,
    pub stop_callback: Option<StopCallback>,
    pub extra_settings: ServerExtraSettings,
    pub cached_settings: Option<ServerSettingsFile>,
    pub cached_admins: Option<Vec<String>>,
    pub chat_logger: Option<ChatLogger>,
}

impl ServerRuntimeState {
    pub fn new(
        id: ServerId,
        paths: ServerPaths,
        port: u16,
        extra_settings: ServerExtraSettings,
        control_message_capacity: usize,
    ) -> Self {
        Self {
            id,
            paths,
            port,
            status: ServerStatus::Unknown,
            start_time: None,
            last_temp_files_checked: None,
            last_status_report: None,
            online_players: OnlinePlayers::default(),
            tracking_data_sets: HashSet::new(),
            control_messages: ControlMessageHistory::new(control_message_capacity),
            stop_callback: None,
            extra_settings,
            cached_settings: None,
            cached_admins: None,
            chat_logger: None,
        }
    }

    /// Append a chat line, opening the chat log on first use.
    pub fn log_chat(&mut self, line: &str) {
        if self.chat_logger.is_none() {
            match ChatLogger::open(&self.paths) {
                Ok(logger) => self.chat_logger = Some(logger),
                Err(e) => {
                    tracing::warn!(server_id = %self.id, error = %e, "Failed to open chat log");
                    return;
                }
            }
        }

        if let Some(logger) = self.chat_logger.as_mut() {
            if let Err(e) = logger.write_line(line) {
                tracing::warn!(server_id = %self.id, error = %e, "Failed to write chat log");
            }
        }
    }

    /// Dispose of the chat log handle.
    pub fn close_chat_log(&mut self) {
        if self.chat_logger.take().is_some() {
            tracing::debug!(server_id = %self.id, "Closed chat log");
        }
    }

    /// Clear everything that only lives for one run of the process.
    pub fn reset_transient(&mut self) {
        self.tracking_data_sets.clear();
        self.online_players.clear();
        self.stop_callback = None;
        self.last_temp_files_checked = None;
    }
}
