//! Errors raised while executing a command.

use std::io;

use thiserror::Error;

/// Failures that prevent a command from producing a normal result.
///
/// A command that runs and exits non-zero is not an error; its status is
/// carried by [`super::CommandOutput`].
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The shell could not be started.
    #[error("failed to start {shell}: {source}")]
    Spawn {
        /// Shell program that failed to start.
        shell: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The output pipe could not be created or read.
    #[error("failed to capture output: {source}")]
    Capture {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The output pipe stayed open after the command and its group were killed.
    #[error("output pipe held open by a detached process")]
    OutputHeld,
    /// Waiting for the child failed.
    #[error("failed to wait for command: {source}")]
    Wait {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The execution budget elapsed and the process group was killed.
    #[error("command timed out after {timeout_ms} ms")]
    TimedOut {
        /// Budget that elapsed, in milliseconds.
        timeout_ms: u64,
    },
    /// The listener cancelled the connection during shutdown.
    #[error("command cancelled by shutdown")]
    Cancelled,
}
