//! Accepted connections and the handler seam workers implement.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use super::CancellationToken;

/// One accepted TCP stream, owned exclusively by the worker handling it.
#[derive(Debug)]
pub struct Connection {
    id: u64,
    peer: SocketAddr,
    stream: TcpStream,
    cancellation: CancellationToken,
}

impl Connection {
    pub(crate) const fn new(
        id: u64,
        peer: SocketAddr,
        stream: TcpStream,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            id,
            peer,
            stream,
            cancellation,
        }
    }

    /// Listener-assigned identifier, unique for the lifetime of the listener.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Address of the remote peer.
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Token set when the listener abandons its drain and forces shutdown.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Bounds each subsequent read; `None` blocks indefinitely.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the timeout cannot be applied.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.set_read_timeout(timeout)
    }

    /// Bounds each subsequent write; `None` blocks indefinitely.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the timeout cannot be applied.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.stream.set_write_timeout(timeout)
    }

    /// Shuts down one or both halves of the stream.
    ///
    /// # Errors
    ///
    /// Returns the OS error, typically `NotConnected` when the peer already left.
    pub fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        self.stream.shutdown(how)
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

/// Handles accepted socket connections.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handles a single connection. Implementations should avoid panicking.
    fn handle(&self, connection: Connection);
}
