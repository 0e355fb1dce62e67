//! Orchestration of every configured server.
//!
//! [`ServerController`] owns one [`ServerRuntimeState`] per server id, each
//! behind its own Tokio mutex, so operations on different servers never wait
//! on each other. State is only reachable through a [`LockedServer`] guard:
//! mutations happen while it is held, and the notifications and follow-up
//! actions it collects are dispatched after the mutex has been released.
//!
//! # Examples
//!
//! ```no_run
//! use factorio_controller::{Collaborators, Config, ServerController, Result};
//!
//! async fn run(config: Config, collaborators: Collaborators) -> Result<()> {
//!     let controller = ServerController::new(config, collaborators);
//!     let mut events = controller.subscribe();
//!
//!     controller.start_scenario("1", "freeplay", Some("admin")).await?;
//!
//!     while let Ok(notification) = events.recv().await {
//!         println!("{:?}", notification);
//!     }
//!     Ok(())
//! }
//! ```

mod dispatch;
mod lifecycle;
mod presence;
mod reconcile;

pub use dispatch::{SERVER_USER, ServerSnapshot};
pub use lifecycle::ForceStopOutcome;

use crate::config::{Config, ServerPaths};
use crate::error::{Error, Result};
use crate::events::{EventHub, Notification};
use crate::server::{
    ControlMessage, MessageKind, Preparer, ProcessKiller, ProcessLauncher, ProcessRunner,
    ServerId, ServerRuntimeState, ServerStatus, StopCallback,
};
use crate::services::{
    AdminStore, BanStore, DataStore, FileManager, Notifier, RelayMessage, ServerUpdater,
};
use crate::transport::ProcessLink;
use presence::PresenceDebouncer;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// External services the controller depends on
#[derive(Clone)]
pub struct Collaborators {
    pub bans: Arc<dyn BanStore>,
    pub admins: Arc<dyn AdminStore>,
    pub data: Arc<dyn DataStore>,
    pub files: Arc<dyn FileManager>,
    pub notifier: Arc<dyn Notifier>,
    pub link: Arc<dyn ProcessLink>,
    pub launcher: Arc<dyn ProcessLauncher>,
    pub killer: Arc<dyn ProcessKiller>,
    pub updater: Arc<dyn ServerUpdater>,
}

/// Supervises every configured server.
///
/// Cheap to clone; clones share the same servers.
#[derive(Clone)]
pub struct ServerController {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<Config>,
    servers: BTreeMap<ServerId, Mutex<ServerRuntimeState>>,
    events: EventHub,
    collaborators: Collaborators,
    preparer: Preparer,
    runner: ProcessRunner,
    presence: PresenceDebouncer,
}

impl fmt::Debug for ServerController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerController")
            .field("servers", &self.inner.servers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ServerController {
    /// Create a controller with one server slot per configured server.
    ///
    /// Every slot starts in [`ServerStatus::Unknown`].
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let config = Arc::new(config);

        let servers = config
            .servers
            .iter()
            .map(|(id, server)| {
                let server_id = ServerId::new(id.as_str());
                let state = ServerRuntimeState::new(
                    server_id.clone(),
                    ServerPaths::new(&config, id),
                    server.port,
                    server.settings.clone(),
                    config.control_message_capacity,
                );
                (server_id, Mutex::new(state))
            })
            .collect();

        let preparer = Preparer::new(
            config.clone(),
            collaborators.bans.clone(),
            collaborators.admins.clone(),
            collaborators.files.clone(),
        );
        let runner = ProcessRunner::new(collaborators.launcher.clone());
        let presence = PresenceDebouncer::new(config.presence_debounce());

        tracing::info!(servers = config.servers.len(), "Server controller created");

        Self {
            inner: Arc::new(Inner {
                config,
                servers,
                events: EventHub::default(),
                collaborators,
                preparer,
                runner,
                presence,
            }),
        }
    }

    /// Create a controller from a JSON or YAML configuration file.
    pub fn from_config_file(path: impl AsRef<Path>, collaborators: Collaborators) -> Result<Self> {
        let config = Config::from_file(path)?;
        Ok(Self::new(config, collaborators))
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Receive every notification published from now on.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Notification> {
        self.inner.events.subscribe()
    }

    /// Configured server ids in order
    pub fn server_ids(&self) -> Vec<ServerId> {
        self.inner.servers.keys().cloned().collect()
    }

    pub(crate) fn collaborators(&self) -> &Collaborators {
        &self.inner.collaborators
    }

    /// Look up a configured server id.
    pub(crate) fn server_id(&self, id: &str) -> Result<ServerId> {
        self.inner
            .servers
            .get_key_value(id)
            .map(|(key, _)| key.clone())
            .ok_or_else(|| Error::UnknownServerId(id.to_string()))
    }

    /// Acquire the lock of one server.
    ///
    /// Notifications and actions recorded on the guard are dispatched when it
    /// is released, never while the mutex is held.
    pub async fn lock(&self, id: &str) -> Result<LockedServer<'_>> {
        let (server_id, slot) = self
            .inner
            .servers
            .get_key_value(id)
            .ok_or_else(|| Error::UnknownServerId(id.to_string()))?;

        let guard = slot.lock().await;
        Ok(LockedServer {
            guard,
            effects: Effects {
                controller: self.clone(),
                server_id: server_id.clone(),
                notifications: Vec::new(),
                actions: Vec::new(),
            },
        })
    }

    /// Run `f` under the server's lock, then dispatch what it recorded.
    pub async fn with_lock<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut LockedServer<'_>) -> T,
    ) -> Result<T> {
        let mut server = self.lock(id).await?;
        let value = f(&mut server);
        let deferred = server.finish();
        self.perform(deferred).await;
        Ok(value)
    }

    /// Run the actions deferred by a released [`LockedServer`].
    ///
    /// Delivery failures are logged; they do not fail the operation that
    /// recorded them.
    pub async fn perform(&self, deferred: Deferred) {
        let Deferred { server_id, actions } = deferred;

        for action in actions {
            match action {
                Action::SendCommand(command) => {
                    if let Err(e) = self
                        .inner
                        .collaborators
                        .link
                        .send_command(&server_id, &command)
                        .await
                    {
                        tracing::warn!(server_id = %server_id, error = %e, "Failed to send command");
                    }
                }
                Action::Relay(message) => {
                    if let Err(e) = self
                        .inner
                        .collaborators
                        .notifier
                        .send(&server_id, message)
                        .await
                    {
                        tracing::warn!(server_id = %server_id, error = %e, "Failed to relay message");
                    }
                }
                Action::RunStopCallback(callback) => {
                    tracing::debug!(server_id = %server_id, "Running stop callback");
                    callback(self.clone(), server_id.clone()).await;
                }
                Action::RefreshPresence => {
                    self.inner.presence.trigger(self.clone());
                }
            }
        }
    }

    fn publish(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            self.inner.events.publish(notification);
        }
    }
}

/// Follow-up work recorded while a server's lock was held
pub(crate) enum Action {
    SendCommand(String),
    Relay(RelayMessage),
    RunStopCallback(StopCallback),
    RefreshPresence,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::SendCommand(command) => f.debug_tuple("SendCommand").field(command).finish(),
            Action::Relay(message) => f.debug_tuple("Relay").field(message).finish(),
            Action::RunStopCallback(_) => f.write_str("RunStopCallback"),
            Action::RefreshPresence => f.write_str("RefreshPresence"),
        }
    }
}

/// Actions left over by a released [`LockedServer`], to be passed to
/// [`ServerController::perform`].
#[must_use = "deferred actions do nothing unless performed"]
#[derive(Debug)]
pub struct Deferred {
    server_id: ServerId,
    actions: Vec<Action>,
}

impl Deferred {
    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Exclusive access to one server's runtime state.
///
/// Dereferences to [`ServerRuntimeState`]. Dropping the guard releases the
/// mutex and then publishes its notifications; actions still pending at that
/// point are spawned onto the runtime. [`finish`](Self::finish) releases it
/// and hands the actions back for the caller to await.
pub struct LockedServer<'a> {
    // Field order matters: the guard is dropped before the effects publish.
    guard: MutexGuard<'a, ServerRuntimeState>,
    effects: Effects,
}

struct Effects {
    controller: ServerController,
    server_id: ServerId,
    notifications: Vec<Notification>,
    actions: Vec<Action>,
}

impl Effects {
    fn take(&mut self) -> Deferred {
        self.controller
            .publish(std::mem::take(&mut self.notifications));

        Deferred {
            server_id: self.server_id.clone(),
            actions: std::mem::take(&mut self.actions),
        }
    }
}

impl Drop for Effects {
    fn drop(&mut self) {
        let deferred = self.take();
        if deferred.is_empty() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let controller = self.controller.clone();
                handle.spawn(async move { controller.perform(deferred).await });
            }
            Err(_) => {
                tracing::warn!(
                    server_id = %deferred.server_id,
                    actions = deferred.actions.len(),
                    "Dropping deferred actions outside of a runtime"
                );
            }
        }
    }
}

impl<'a> LockedServer<'a> {
    pub fn id(&self) -> &ServerId {
        &self.effects.server_id
    }

    pub fn controller(&self) -> &ServerController {
        &self.effects.controller
    }

    /// Release the lock and publish, returning the actions to perform.
    pub fn finish(self) -> Deferred {
        let LockedServer { guard, mut effects } = self;
        drop(guard);
        effects.take()
    }

    /// Move to `new`, recording the status notification and message.
    ///
    /// Returns the previous status.
    pub fn transition(&mut self, new: ServerStatus, by: Option<&str>) -> ServerStatus {
        let old = self.guard.status;
        self.guard.status = new;

        tracing::info!(
            server_id = %self.effects.server_id,
            from = %old,
            to = %new,
            by = by.unwrap_or("-"),
            "Status changed"
        );

        self.notify(Notification::StatusChanged {
            server_id: self.effects.server_id.clone(),
            new_status: new,
            old_status: old,
            by: by.map(str::to_string),
        });
        let message = ControlMessage::status_change(self.effects.server_id.clone(), old, new, by);
        self.push_message(message);

        old
    }

    /// Append to the message history and announce it.
    pub fn push_message(&mut self, message: ControlMessage) {
        self.guard.control_messages.push(message.clone());
        self.notify(Notification::ControlMessage { message });
    }

    /// Append an informational message from the controller.
    pub fn info(&mut self, text: impl Into<String>) {
        let message = ControlMessage::new(self.effects.server_id.clone(), MessageKind::Info, text);
        self.push_message(message);
    }

    pub fn notify(&mut self, notification: Notification) {
        self.effects.notifications.push(notification);
    }

    /// Queue a console command for delivery after release.
    pub fn send_command(&mut self, command: impl Into<String>) {
        self.defer(Action::SendCommand(command.into()));
    }

    /// Queue a message for the chat relay.
    pub fn relay(&mut self, message: RelayMessage) {
        self.defer(Action::Relay(message));
    }

    /// Announce the current player count and schedule a presence refresh.
    pub fn players_changed(&mut self) {
        let count = self.guard.online_players.count();
        self.notify(Notification::OnlinePlayerCountChanged {
            server_id: self.effects.server_id.clone(),
            count,
        });
        self.defer(Action::RefreshPresence);
    }

    pub(crate) fn defer(&mut self, action: Action) {
        self.effects.actions.push(action);
    }
}

impl Deref for LockedServer<'_> {
    type Target = ServerRuntimeState;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for LockedServer<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
