//! Error types for socket listener operations.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced while binding or running the socket listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The host name could not be resolved.
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        /// Host as configured.
        host: String,
        /// Port as configured.
        port: u16,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },
    /// Resolution succeeded but produced no address.
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty {
        /// Host as configured.
        host: String,
        /// Port as configured.
        port: u16,
    },
    /// Creating or configuring the socket failed.
    #[error("failed to create TCP socket for {addr}: {source}")]
    Socket {
        /// Address the socket was meant for.
        addr: SocketAddr,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The address is in use or not permitted.
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        /// Address that could not be bound.
        addr: SocketAddr,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The bound socket refused to listen.
    #[error("failed to listen on {addr}: {source}")]
    Listen {
        /// Bound address.
        addr: SocketAddr,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// Switching the socket to non-blocking accept failed.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The listening socket became unusable while accepting.
    #[error("listening socket failed: {source}")]
    Accept {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The accept-loop thread could not be spawned.
    #[error("failed to spawn listener thread: {source}")]
    Spawn {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The accept-loop thread panicked.
    #[error("listener thread panicked")]
    ThreadPanic,
}

impl ListenerError {
    /// Returns true for failures to claim the configured address.
    #[must_use]
    pub const fn is_bind_error(&self) -> bool {
        matches!(
            self,
            Self::Resolve { .. }
                | Self::ResolveEmpty { .. }
                | Self::Socket { .. }
                | Self::BindTcp { .. }
                | Self::Listen { .. }
        )
    }
}
