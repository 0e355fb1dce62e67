use crate::error::{Error, Result};
use crate::server::ServerId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};

/// Outbound channel to a supervised server process (or its wrapper).
///
/// Commands are delivered in the order they are sent. Status reports travel
/// the other way, through
/// [`ServerController::on_status_reported`](crate::ServerController::on_status_reported).
#[async_trait]
pub trait ProcessLink: Send + Sync {
    /// Deliver one console command line.
    async fn send_command(&self, server_id: &ServerId, command: &str) -> Result<()>;

    /// Ask the process to save and shut down.
    async fn stop(&self, server_id: &ServerId) -> Result<()>;

    /// Ask the wrapper to terminate the game immediately. Resolves once the
    /// wrapper acknowledges; callers bound the wait with a timeout.
    async fn force_stop(&self, server_id: &ServerId) -> Result<()>;
}

/// Message queued for a connected wrapper
#[derive(Debug)]
pub enum WrapperMessage {
    Command(String),
    Stop,
    /// Reply on the sender to acknowledge
    ForceStop(oneshot::Sender<()>),
}

/// [`ProcessLink`] backed by one queue per connected wrapper.
///
/// The wrapper side calls [`connect`](Self::connect) and drains the returned
/// receiver; sending to a server with no connected wrapper fails with
/// [`Error::Communication`].
pub struct ChannelLink {
    capacity: usize,
    wrappers: Mutex<HashMap<ServerId, mpsc::Sender<WrapperMessage>>>,
}

impl ChannelLink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            wrappers: Mutex::new(HashMap::new()),
        }
    }

    /// Register the wrapper of `server_id`, replacing any previous connection.
    pub fn connect(&self, server_id: ServerId) -> Result<mpsc::Receiver<WrapperMessage>> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let mut wrappers = self
            .wrappers
            .lock()
            .map_err(|_| Error::Communication("Failed to lock wrapper connections".to_string()))?;

        tracing::debug!(server_id = %server_id, "Wrapper connected");
        wrappers.insert(server_id, sender);
        Ok(receiver)
    }

    /// Forget the wrapper of `server_id`.
    pub fn disconnect(&self, server_id: &ServerId) -> Result<()> {
        let mut wrappers = self
            .wrappers
            .lock()
            .map_err(|_| Error::Communication("Failed to lock wrapper connections".to_string()))?;

        if wrappers.remove(server_id).is_some() {
            tracing::debug!(server_id = %server_id, "Wrapper disconnected");
        }
        Ok(())
    }

    async fn deliver(&self, server_id: &ServerId, message: WrapperMessage) -> Result<()> {
        // Clone the sender out so the lock is not held across the send.
        let sender = {
            let wrappers = self
                .wrappers
                .lock()
                .map_err(|_| Error::Communication("Failed to lock wrapper connections".to_string()))?;
            wrappers.get(server_id).cloned()
        }
        .ok_or_else(|| Error::Communication(format!("No wrapper connected for server {}", server_id)))?;

        sender
            .send(message)
            .await
            .map_err(|_| Error::Communication(format!("Wrapper for server {} went away", server_id)))
    }
}

impl Default for ChannelLink {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl ProcessLink for ChannelLink {
    async fn send_command(&self, server_id: &ServerId, command: &str) -> Result<()> {
        self.deliver(server_id, WrapperMessage::Command(command.to_string()))
            .await
    }

    async fn stop(&self, server_id: &ServerId) -> Result<()> {
        self.deliver(server_id, WrapperMessage::Stop).await
    }

    async fn force_stop(&self, server_id: &ServerId) -> Result<()> {
        let (ack, acknowledged) = oneshot::channel();
        self.deliver(server_id, WrapperMessage::ForceStop(ack)).await?;

        acknowledged.await.map_err(|_| {
            Error::Communication(format!(
                "Wrapper for server {} dropped the force stop acknowledgment",
                server_id
            ))
        })
    }
}
