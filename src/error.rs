/// Error handling module for the Factorio controller.
///
/// This module defines the error types used throughout the library.
/// Every public controller operation returns one of these as a typed result;
/// unanticipated internal faults are converted to [`Error::Unexpected`].
///
/// # Example
///
/// ```
/// use factorio_controller::error::{Error, Result};
///
/// fn handle_error(result: Result<()>) {
///     match result {
///         Ok(_) => println!("Operation succeeded"),
///         Err(Error::UnknownServerId(id)) => println!("Server '{}' is not configured", id),
///         Err(Error::InvalidState(status)) => println!("Not allowed while {}", status),
///         Err(e) => println!("Other error: {}", e),
///     }
/// }
/// ```
use crate::server::ServerStatus;
use thiserror::Error;

/// Errors that can occur in the factorio-controller library.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested server id is not one of the configured server slots.
    #[error("Unknown server id: {0}")]
    UnknownServerId(String),

    /// The operation is not permitted in the server's current status.
    ///
    /// Carries the status observed while holding the server's lock.
    #[error("Operation not permitted while server is {0}")]
    InvalidState(ServerStatus),

    /// A file required by a precondition does not exist.
    ///
    /// This error occurs when:
    /// - Resuming a server with no temporary saves
    /// - Loading a save file that is not present in the requested directory
    #[error("Missing file: {0}")]
    MissingFile(String),

    /// A directory required by a precondition does not exist.
    ///
    /// This error occurs when:
    /// - Starting a scenario that has no directory under the scenario root
    #[error("Missing directory: {0}")]
    MissingDirectory(String),

    /// A directory name is not one of the permitted names, or a path would
    /// resolve outside the server's base directory.
    #[error("Invalid directory: {0}")]
    InvalidDirectory(String),

    /// The OS process described by a launch descriptor could not be started.
    #[error("Failed to start process: {0}")]
    ProcessStart(String),

    /// A persistence collaborator exhausted its optimistic-concurrency retries.
    #[error("Persistence conflict: {0}")]
    PersistenceConflict(String),

    /// One or more preparation steps failed.
    ///
    /// All fan-out failures are collected, not just the first.
    #[error("Preparation failed: {}", join_errors(.0))]
    Preparation(Vec<Error>),

    /// A line of process output could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A command or signal could not be delivered to the server process.
    #[error("Communication error: {0}")]
    Communication(String),

    /// Failed to parse configuration from a file or string.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration parsed but contains invalid values.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// Any failure not covered by the categories above.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

/// Result type for factorio-controller operations.
pub type Result<T> = std::result::Result<T, Error>;
