use crate::error::Result;
use crate::server::ServerId;
use async_trait::async_trait;
use std::time::Duration;

/// Who a relayed message is addressed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// The server's public channel
    Public,
    /// The administrators' channel
    Admin,
    /// A channel chosen by the scenario
    Named(String),
}

/// How a relayed message is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Plain,
    Raw,
    Bold,
    Embed,
    EmbedRaw,
}

/// Messages sent to the chat relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    Chat(String),
    Shout(String),
    Text {
        audience: Audience,
        style: Style,
        text: String,
    },
    ServerStarted,
    /// The process crashed; `alert` is set when it had been up long enough
    /// that the crash is not part of a start-up crash loop.
    Crashed { alert: bool, uptime: Option<Duration> },
    Desync,
}

/// Chat relay and notification integration
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, server_id: &ServerId, message: RelayMessage) -> Result<()>;

    /// Publish the total number of online players across all servers.
    async fn update_presence(&self, online_players: u32) -> Result<()>;
}

/// Notifier that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, server_id: &ServerId, message: RelayMessage) -> Result<()> {
        tracing::trace!(server_id = %server_id, message = ?message, "Dropping relay message");
        Ok(())
    }

    async fn update_presence(&self, online_players: u32) -> Result<()> {
        tracing::trace!(online_players, "Dropping presence update");
        Ok(())
    }
}
