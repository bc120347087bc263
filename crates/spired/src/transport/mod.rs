//! TCP listener and per-connection dispatch.
//!
//! The transport module binds the listening socket, accepts connections on a
//! background thread, and hands each one to a [`ConnectionHandler`] running
//! on its own thread. In-flight connections are tracked by an owned registry
//! so shutdown can drain them and, past the deadline, close them.

mod connection;
mod errors;
mod listener;
#[cfg(test)]
mod listener_tests;
mod registry;
#[cfg(test)]
mod test_utils;
mod token;

pub use self::connection::{Connection, ConnectionHandler};
pub use self::errors::ListenerError;
pub use self::listener::{ListenerHandle, SocketListener};
pub use self::registry::DrainReport;
#[cfg(test)]
pub(crate) use self::test_utils::{BlockingHandler, BlockingProbe, CountingHandler};
pub use self::token::CancellationToken;

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
