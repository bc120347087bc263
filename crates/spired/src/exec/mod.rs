//! Local command execution.
//!
//! Workers hand each request line to a [`CommandRunner`]. The production
//! runner, [`ShellRunner`], interprets the line with `<shell> -c`, captures
//! stdout and stderr through one shared pipe, and keeps the child inside a
//! process group that is killed and reaped on every exit path.

mod errors;
mod guard;
mod output;
mod shell;

use crate::transport::CancellationToken;

pub use self::errors::ExecutionError;
pub use self::shell::ShellRunner;

const EXEC_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::exec");

/// Upper bound on captured output; anything beyond is read and discarded.
pub const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Captured result of a command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Combined stdout and stderr, decoded lossily as UTF-8.
    pub data: String,
    /// Exit code, or `None` when the command was terminated by a signal.
    pub status: Option<i32>,
    /// Whether output beyond the capture limit was discarded.
    pub truncated: bool,
}

/// Executes one command line on behalf of a connection.
pub trait CommandRunner: Send + Sync {
    /// Runs `command` to completion, giving up when `cancellation` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] when the command cannot be started, exceeds
    /// its time budget, or is cancelled.
    fn run(
        &self,
        command: &str,
        cancellation: &CancellationToken,
    ) -> Result<CommandOutput, ExecutionError>;
}
