use std::io;
use std::thread;
use std::time::Duration;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

const SIGNAL_POLL: Duration = Duration::from_millis(50);

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until shutdown should proceed or `halted` reports that the
    /// listener has already stopped on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] when the notification source cannot be set up.
    fn wait(&self, halted: &dyn Fn() -> bool) -> Result<(), ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Shutdown listener that waits for termination signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self, halted: &dyn Fn() -> bool) -> Result<(), ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        loop {
            if let Some(signal) = signals.pending().next() {
                info!(
                    target: PROCESS_TARGET,
                    signal,
                    "shutdown signal received"
                );
                return Ok(());
            }
            if halted() {
                return Ok(());
            }
            thread::sleep(SIGNAL_POLL);
        }
    }
}
