use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a server slot.
///
/// No transition graph is enforced; operations check the predicates below at
/// the call site, while holding the server's lock, and fail with
/// [`Error::InvalidState`](crate::Error::InvalidState) otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerStatus {
    Unknown,
    Stopped,
    Preparing,
    Prepared,
    WrapperStarting,
    Starting,
    Running,
    Stopping,
    Killing,
    Killed,
    Crashed,
    Updating,
    Updated,
    Errored,
}

impl ServerStatus {
    /// Every status, in declaration order.
    pub const ALL: [ServerStatus; 14] = [
        ServerStatus::Unknown,
        ServerStatus::Stopped,
        ServerStatus::Preparing,
        ServerStatus::Prepared,
        ServerStatus::WrapperStarting,
        ServerStatus::Starting,
        ServerStatus::Running,
        ServerStatus::Stopping,
        ServerStatus::Killing,
        ServerStatus::Killed,
        ServerStatus::Crashed,
        ServerStatus::Updating,
        ServerStatus::Updated,
        ServerStatus::Errored,
    ];

    /// True for idle and terminal states from which a start may begin.
    pub fn is_startable(self) -> bool {
        matches!(
            self,
            ServerStatus::Unknown
                | ServerStatus::Stopped
                | ServerStatus::Prepared
                | ServerStatus::Updated
                | ServerStatus::Crashed
                | ServerStatus::Errored
                | ServerStatus::Killed
        )
    }

    /// True while a process is being prepared, starting, or running.
    pub fn is_stoppable(self) -> bool {
        matches!(
            self,
            ServerStatus::Preparing
                | ServerStatus::Prepared
                | ServerStatus::WrapperStarting
                | ServerStatus::Starting
                | ServerStatus::Running
        )
    }

    /// Same idle set as [`is_startable`](Self::is_startable).
    pub fn is_updatable(self) -> bool {
        self.is_startable()
    }

    /// Statuses that mean the process has gone away after a stop request.
    pub fn is_stopped(self) -> bool {
        matches!(self, ServerStatus::Stopped | ServerStatus::Killed)
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl std::str::FromStr for ServerStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServerStatus::ALL
            .into_iter()
            .find(|status| status.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::Error::Protocol(format!("Unknown server status '{}'", s)))
    }
}
