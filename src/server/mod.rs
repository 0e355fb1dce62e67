/// Per-server model and the process-facing building blocks.
///
/// This module holds the state every configured server carries and the pieces
/// the controller composes to start and stop game processes.
///
/// # Components
///
/// * `status` - [`ServerStatus`] and its startable/stoppable/updatable guards
/// * `state` - [`ServerRuntimeState`], control message history and online players
/// * `settings` - the server settings file handed to the game
/// * `preparer` - [`Preparer`], the steps that must finish before a launch
/// * `runner` - [`ProcessRunner`] and the [`ProcessLauncher`] seam
/// * `killer` - [`ProcessKiller`], the OS-level fallback of force-stop
///
/// # Examples
///
/// ```
/// use factorio_controller::server::ServerStatus;
///
/// assert!(ServerStatus::Crashed.is_startable());
/// assert!(ServerStatus::Running.is_stoppable());
/// assert!(!ServerStatus::Updating.is_updatable());
/// ```
pub mod killer;
pub mod preparer;
pub mod runner;
pub mod settings;
mod state;
mod status;

pub use killer::{KillReport, ProcessKiller, SysinfoKiller};
pub use preparer::{Preparer, StartMode};
pub use runner::{
    LaunchedProcess, OsProcessLauncher, ProcessLaunchDescriptor, ProcessLauncher, ProcessRunner,
};
pub use settings::{ServerSettingsFile, Visibility};
pub use state::{
    ChatLogger, ControlMessage, ControlMessageHistory, LeaveOutcome, MessageKind, OnlinePlayers,
    ServerId, ServerRuntimeState, StopCallback,
};
pub use status::ServerStatus;
