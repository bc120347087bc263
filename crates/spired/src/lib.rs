//! Listener side of spire.
//!
//! `spired` binds a TCP port and serves one shell command per connection:
//! each accepted connection gets its own worker thread that reads a single
//! request line, runs it through the configured shell, writes one response
//! line (see [`spire_wire`]), and closes. Shutdown is signal driven; the
//! accept loop stops first, in-flight connections are given a drain period,
//! and anything still running after that is cancelled and its process group
//! killed.
//!
//! Telemetry uses `tracing` with one target per module
//! (`spired::transport`, `spired::worker`, `spired::exec`,
//! `spired::process`).

mod bootstrap;
pub mod cli;
mod exec;
mod process;
mod telemetry;
mod transport;
mod worker;

pub use bootstrap::{ConfigLoader, StaticConfigLoader, SystemConfigLoader};
pub use exec::{CommandOutput, CommandRunner, ExecutionError, MAX_OUTPUT_BYTES, ShellRunner};
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_listener,
    run_listener_with, start_listener,
};
pub use telemetry::{TelemetryError, initialise as initialise_telemetry};
pub use transport::{
    CancellationToken, Connection, ConnectionHandler, DrainReport, ListenerError, ListenerHandle,
    SocketListener,
};
pub use worker::{CommandWorker, RequestError};

#[cfg(test)]
mod tests;
