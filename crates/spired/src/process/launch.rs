//! Supervises listener startup and shutdown sequencing.

use std::sync::Arc;

use spire_config::Config;
use tracing::{info, warn};

use crate::bootstrap::ConfigLoader;
use crate::exec::ShellRunner;
use crate::telemetry;
use crate::transport::{DrainReport, ListenerHandle, SocketListener};
use crate::worker::CommandWorker;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Runs the listener until a termination signal arrives.
///
/// # Errors
///
/// Returns [`LaunchError`] when configuration, telemetry, binding, or the
/// signal listener fail, or when the accept loop ends fatally.
pub fn run_listener(loader: &dyn ConfigLoader) -> Result<DrainReport, LaunchError> {
    run_listener_with(loader, &SystemShutdownSignal)
}

/// Runs the listener with an injected shutdown source.
///
/// # Errors
///
/// See [`run_listener`].
pub fn run_listener_with(
    loader: &dyn ConfigLoader,
    shutdown: &dyn ShutdownSignal,
) -> Result<DrainReport, LaunchError> {
    let config = loader.load()?;
    telemetry::initialise(&config)?;
    info!(
        target: PROCESS_TARGET,
        host = config.host(),
        port = config.port(),
        backlog = config.backlog(),
        shell = config.shell(),
        "starting listener"
    );
    let handle = start_listener(&config)?;
    let waited = shutdown.wait(&|| handle.is_finished());
    if let Err(error) = &waited {
        warn!(
            target: PROCESS_TARGET,
            error = %error,
            "shutdown signal listener failed; stopping"
        );
    }
    handle.shutdown();
    let report = handle.join()?;
    waited?;
    info!(
        target: PROCESS_TARGET,
        drained = report.drained,
        forced = report.forced,
        "shutdown sequence completed"
    );
    Ok(report)
}

/// Binds the configured address and starts accepting with the shell runner.
///
/// # Errors
///
/// Returns [`LaunchError::Listener`] when the address cannot be bound or the
/// accept loop cannot start.
pub fn start_listener(config: &Config) -> Result<ListenerHandle, LaunchError> {
    let listener = SocketListener::bind(config.host(), config.port(), config.backlog())?;
    let runner = Arc::new(ShellRunner::new(config.shell(), config.command_timeout()));
    let handler = Arc::new(CommandWorker::new(runner, config.request_timeout()));
    let handle = listener.start(handler, config.drain_timeout())?;
    info!(
        target: PROCESS_TARGET,
        addr = %handle.local_addr(),
        "listener ready"
    );
    Ok(handle)
}
