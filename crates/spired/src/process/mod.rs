//! Listener process lifecycle: configuration, startup, and signal-driven
//! shutdown.

mod errors;
mod launch;
mod shutdown;

pub use errors::LaunchError;
pub use launch::{run_listener, run_listener_with, start_listener};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
