//! Listener implementation for the command socket.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::{error, info, warn};

use super::registry::ConnectionRegistry;
use super::{
    CancellationToken, Connection, ConnectionHandler, DrainReport, LISTENER_TARGET, ListenerError,
};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
/// Time cancelled workers get to tell their peer before sockets are closed.
const CANCEL_GRACE: Duration = Duration::from_millis(500);

/// Listener bound to a TCP address, not yet accepting.
#[derive(Debug)]
pub struct SocketListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl SocketListener {
    /// Resolves `host:port`, binds with `SO_REUSEADDR` and starts listening.
    ///
    /// # Errors
    ///
    /// Returns a bind-class [`ListenerError`] when the address cannot be
    /// resolved or claimed.
    pub fn bind(host: &str, port: u16, backlog: u32) -> Result<Self, ListenerError> {
        let addr = resolve(host, port)?;
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(|source| ListenerError::Socket { addr, source })?;
        socket
            .set_reuse_address(true)
            .map_err(|source| ListenerError::Socket { addr, source })?;
        socket
            .bind(&SockAddr::from(addr))
            .map_err(|source| ListenerError::BindTcp { addr, source })?;
        let backlog = i32::try_from(backlog).unwrap_or(i32::MAX);
        socket
            .listen(backlog)
            .map_err(|source| ListenerError::Listen { addr, source })?;
        let listener = TcpListener::from(socket);
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::Listen { addr, source })?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address actually bound, including the kernel-chosen port for port 0.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts the accept loop on a background thread.
    ///
    /// After [`ListenerHandle::shutdown`], in-flight connections get
    /// `drain_timeout` to finish before they are cancelled and closed.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::NonBlocking`] or [`ListenerError::Spawn`] when
    /// the loop cannot be started.
    pub fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
        drain_timeout: Duration,
    ) -> Result<ListenerHandle, ListenerError> {
        self.listener
            .set_nonblocking(true)
            .map_err(|source| ListenerError::NonBlocking { source })?;
        let accepting = CancellationToken::new();
        let forced = CancellationToken::new();
        let active = Arc::new(AtomicUsize::new(0));
        let state = AcceptLoop {
            listener: self.listener,
            local_addr: self.local_addr,
            handler,
            accepting: accepting.clone(),
            forced: forced.clone(),
            drain_timeout,
            registry: ConnectionRegistry::new(Arc::clone(&active)),
        };
        let handle = thread::Builder::new()
            .name("spired-accept".to_owned())
            .spawn(move || state.run())
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(ListenerHandle {
            accepting,
            forced,
            active,
            local_addr: self.local_addr,
            handle: Some(handle),
        })
    }
}

/// Handle to the background listener thread.
#[derive(Debug)]
pub struct ListenerHandle {
    accepting: CancellationToken,
    forced: CancellationToken,
    active: Arc<AtomicUsize>,
    local_addr: SocketAddr,
    handle: Option<thread::JoinHandle<Result<DrainReport, ListenerError>>>,
}

impl ListenerHandle {
    /// Stops accepting and begins draining in-flight connections.
    pub fn shutdown(&self) {
        self.accepting.cancel();
    }

    /// Stops accepting and cancels in-flight connections without waiting.
    pub fn force(&self) {
        self.forced.cancel();
        self.accepting.cancel();
    }

    /// Address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of connections currently being handled.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether the accept loop has already exited, for example after a fatal
    /// accept error.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .is_none_or(thread::JoinHandle::is_finished)
    }

    /// Waits for the accept loop and its drain to finish.
    ///
    /// # Errors
    ///
    /// Returns the fatal accept error that ended the loop, or
    /// [`ListenerError::ThreadPanic`].
    pub fn join(mut self) -> Result<DrainReport, ListenerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| ListenerError::ThreadPanic)?,
            None => Ok(DrainReport::default()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.accepting.cancel();
    }
}

struct AcceptLoop {
    listener: TcpListener,
    local_addr: SocketAddr,
    handler: Arc<dyn ConnectionHandler>,
    accepting: CancellationToken,
    forced: CancellationToken,
    drain_timeout: Duration,
    registry: ConnectionRegistry,
}

impl AcceptLoop {
    fn run(mut self) -> Result<DrainReport, ListenerError> {
        info!(
            target: LISTENER_TARGET,
            addr = %self.local_addr,
            "socket listener active"
        );
        let outcome = self.accept_until_cancelled();
        let Self {
            listener,
            forced,
            drain_timeout,
            mut registry,
            ..
        } = self;
        // Closing the socket here makes new connection attempts fail fast
        // while the drain runs.
        drop(listener);
        let report = drain(&mut registry, &forced, drain_timeout);
        outcome.map(|()| report)
    }

    fn accept_until_cancelled(&mut self) -> Result<(), ListenerError> {
        let mut last_error = None::<io::ErrorKind>;
        while !self.accepting.is_cancelled() {
            self.registry.reap_finished();
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    last_error = None;
                    if let Err(error) = self.dispatch(stream, peer) {
                        warn!(
                            target: LISTENER_TARGET,
                            peer = %peer,
                            error = %error,
                            "failed to start connection worker"
                        );
                    }
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_BACKOFF);
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) if is_fatal_accept_error(&error) => {
                    error!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "listening socket is no longer usable"
                    );
                    return Err(ListenerError::Accept { source: error });
                }
                Err(error) => {
                    let kind = error.kind();
                    if last_error != Some(kind) {
                        warn!(
                            target: LISTENER_TARGET,
                            error = %error,
                            "socket accept error"
                        );
                    }
                    last_error = Some(kind);
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, stream: TcpStream, peer: SocketAddr) -> io::Result<()> {
        stream.set_nonblocking(false)?;
        let shutdown_handle = stream.try_clone()?;
        let id = self.registry.next_id();
        let connection = Connection::new(id, peer, stream, self.forced.clone());
        let notice = self.registry.notice(id);
        let handler = Arc::clone(&self.handler);
        let worker = thread::Builder::new()
            .name(format!("spired-conn-{id}"))
            .spawn(move || {
                let _notice = notice;
                handler.handle(connection);
            })?;
        self.registry.insert(id, peer, shutdown_handle, worker);
        Ok(())
    }
}

fn drain(
    registry: &mut ConnectionRegistry,
    forced: &CancellationToken,
    drain_timeout: Duration,
) -> DrainReport {
    let in_flight = registry.len();
    info!(
        target: LISTENER_TARGET,
        in_flight,
        drain_timeout_ms = u64::try_from(drain_timeout.as_millis()).unwrap_or(u64::MAX),
        "draining connections"
    );
    let drained = if forced.is_cancelled() {
        registry.reap_finished()
    } else {
        registry.wait_until(Instant::now() + drain_timeout)
    };
    let mut report = DrainReport { drained, forced: 0 };
    if registry.len() > 0 {
        forced.cancel();
        warn!(
            target: LISTENER_TARGET,
            remaining = registry.len(),
            "drain deadline elapsed; cancelling connections"
        );
        report.forced = registry.close_all(CANCEL_GRACE);
    }
    info!(
        target: LISTENER_TARGET,
        drained = report.drained,
        forced = report.forced,
        "socket listener stopped"
    );
    report
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    addrs.next().ok_or_else(|| ListenerError::ResolveEmpty {
        host: host.to_owned(),
        port,
    })
}

/// Errors meaning the listening descriptor itself is broken; retrying cannot help.
fn is_fatal_accept_error(error: &io::Error) -> bool {
    matches!(
        error.raw_os_error(),
        Some(libc::EBADF | libc::EINVAL | libc::ENOTSOCK | libc::EOPNOTSUPP)
    )
}
