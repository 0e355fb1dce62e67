//! Outbound notifications for the publish layer.
//!
//! Every state change the controller commits is described by a typed
//! [`Notification`] and broadcast through the [`EventHub`] after the server's
//! lock has been released. Consumers (a websocket fan-out, a test harness)
//! subscribe at wiring time and receive every notification published after
//! they subscribed.

use crate::server::{ControlMessage, ServerId, ServerStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Directory whose file list changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileDirectory {
    TempSaves,
    LocalSaves,
    GlobalSaves,
    Logs,
    ChatLogs,
    Scenarios,
    ModPacks,
}

/// Events published to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notification {
    /// A server moved from one status to another
    #[serde(rename = "status-changed")]
    StatusChanged {
        server_id: ServerId,
        new_status: ServerStatus,
        old_status: ServerStatus,
        by: Option<String>,
    },

    /// A control message was appended to a server's history
    #[serde(rename = "control-message")]
    ControlMessage { message: ControlMessage },

    /// A server's online player count changed
    #[serde(rename = "online-player-count")]
    OnlinePlayerCountChanged { server_id: ServerId, count: u32 },

    /// A directory's file list changed; `server_id` is `None` for shared directories
    #[serde(rename = "files-changed")]
    FilesChanged {
        server_id: Option<ServerId>,
        directory: FileDirectory,
    },
}

/// Broadcasts notifications to every subscriber.
///
/// Backed by a Tokio broadcast channel: slow subscribers lag and lose the
/// oldest messages instead of blocking publishers.
pub struct EventHub {
    sender: broadcast::Sender<Notification>,
}

impl EventHub {
    /// Create a hub buffering up to `capacity` notifications per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Get a new receiver for every notification published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Publish one notification. Having no subscribers is not an error.
    pub fn publish(&self, notification: Notification) {
        if let Err(e) = self.sender.send(notification) {
            tracing::trace!(notification = ?e.0, "No subscribers for notification");
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(1024)
    }
}
