use crate::controller::LockedServer;
use crate::error::{Error, Result};
use crate::server::ServerStatus;
use async_process::{Command, Stdio};
use futures_lite::io::AsyncRead;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Program and arguments for one server start.
///
/// The first two arguments are always the server id and the game executable;
/// the wrapper relies on that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessLaunchDescriptor {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Handle on a freshly started process
pub struct LaunchedProcess {
    pub pid: Option<u32>,
    /// Standard output, when the launcher captured it
    pub output: Option<Box<dyn AsyncRead + Send + Unpin>>,
}

impl fmt::Debug for LaunchedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchedProcess")
            .field("pid", &self.pid)
            .field("output", &self.output.is_some())
            .finish()
    }
}

/// Starts OS processes
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, descriptor: &ProcessLaunchDescriptor) -> Result<LaunchedProcess>;
}

/// [`ProcessLauncher`] spawning real processes with `async-process`.
///
/// Standard output is piped back for the output reader; the child is left
/// running when the handle is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsProcessLauncher;

impl ProcessLauncher for OsProcessLauncher {
    fn launch(&self, descriptor: &ProcessLaunchDescriptor) -> Result<LaunchedProcess> {
        let mut child = Command::new(&descriptor.program)
            .args(&descriptor.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                Error::ProcessStart(format!(
                    "Failed to start {}: {}",
                    descriptor.program.display(),
                    e
                ))
            })?;

        let output = child
            .stdout
            .take()
            .map(|stdout| Box::new(stdout) as Box<dyn AsyncRead + Send + Unpin>);

        Ok(LaunchedProcess {
            pid: Some(child.id()),
            output,
        })
    }
}

/// Launches a prepared server and records the outcome on its status.
#[derive(Clone)]
pub struct ProcessRunner {
    launcher: Arc<dyn ProcessLauncher>,
}

impl ProcessRunner {
    pub fn new(launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self { launcher }
    }

    /// Start the process described by `descriptor`.
    ///
    /// Moves the server to `WrapperStarting` on success and to `Errored` with
    /// [`Error::ProcessStart`] otherwise.
    pub fn run(
        &self,
        server: &mut LockedServer<'_>,
        descriptor: &ProcessLaunchDescriptor,
    ) -> Result<LaunchedProcess> {
        match self.launcher.launch(descriptor) {
            Ok(process) => {
                tracing::info!(server_id = %server.id(), pid = ?process.pid, "Process started");
                server.transition(ServerStatus::WrapperStarting, None);
                Ok(process)
            }
            Err(e) => {
                let error = match e {
                    Error::ProcessStart(_) => e,
                    other => Error::ProcessStart(other.to_string()),
                };
                tracing::error!(server_id = %server.id(), error = %error, "Process failed to start");
                server.info(error.to_string());
                server.transition(ServerStatus::Errored, None);
                Err(error)
            }
        }
    }
}
