//! Error hierarchy for the probe dispatch engine.
//!
//! Errors are grouped by the layer that produces them: configuration,
//! the per-VP daemon channel, roster ingestion and the scheduler surface.
//! Most runtime faults inside worker loops are logged and absorbed; only
//! the ones listed here ever cross an API boundary.

use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Settings could not be loaded or failed validation
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failures talking to an external probing daemon
    #[error(transparent)]
    Daemon(#[from] DaemonError),

    /// Monitor roster could not be read
    #[error(transparent)]
    Roster(#[from] RosterError),

    /// Misuse of the scheduler lifecycle or submission API
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// A spawned task panicked or was aborted
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// The daemon binary could not be launched
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Child was started without the expected stdio pipe
    #[error("Daemon {0} pipe is not available")]
    MissingPipe(&'static str),

    /// Writing a request line failed (typically a broken pipe)
    #[error("Failed to write request line: {0}")]
    Write(#[source] std::io::Error),

    /// Reading a completion line failed
    #[error("Failed to read completion line: {0}")]
    Read(#[source] std::io::Error),

    /// The daemon closed its output stream
    #[error("Daemon output stream closed")]
    StreamClosed,

    /// The clear-requests helper produced nothing within the allowed time
    #[error("Clear-requests command timed out after {0:?}")]
    ClearTimeout(Duration),
}

impl DaemonError {
    /// Whether a receive loop may keep waiting after this error.
    pub fn is_retriable(&self) -> bool {
        match self {
            DaemonError::Read(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("Failed to read roster at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Scheduler is already running")]
    AlreadyStarted,

    #[error("Scheduler has not been started")]
    NotStarted,

    /// Shutdown was already requested; new work would never be dispatched
    #[error("Scheduler has been stopped")]
    Stopped,

    /// Target line is not of the form `<vp> <destination>`
    #[error("Invalid probe target: {0:?}")]
    InvalidTarget(String),

    #[error("No probe targets supplied")]
    EmptyTargets,
}
