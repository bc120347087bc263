//! In-flight connection bookkeeping owned by the accept loop.

use std::collections::BTreeMap;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::LISTENER_TARGET;

/// Outcome of draining in-flight connections at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Connections that finished on their own before the deadline.
    pub drained: usize,
    /// Connections closed by the listener after the deadline.
    pub forced: usize,
}

struct Entry {
    peer: SocketAddr,
    stream: TcpStream,
    worker: JoinHandle<()>,
}

/// Sends the connection id back to the registry when the worker finishes,
/// including when the handler panics.
pub(super) struct CompletionNotice {
    id: u64,
    sender: Sender<u64>,
}

impl Drop for CompletionNotice {
    fn drop(&mut self) {
        // The registry may already be gone when the listener thread exits first.
        drop(self.sender.send(self.id));
    }
}

/// Tracks every connection handed to a worker.
///
/// Only the accept-loop thread mutates the registry. Workers report completion
/// through the channel carried by [`CompletionNotice`].
pub(super) struct ConnectionRegistry {
    entries: BTreeMap<u64, Entry>,
    next_id: u64,
    sender: Sender<u64>,
    receiver: Receiver<u64>,
    active: Arc<AtomicUsize>,
}

impl ConnectionRegistry {
    pub(super) fn new(active: Arc<AtomicUsize>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            entries: BTreeMap::new(),
            next_id: 0,
            sender,
            receiver,
            active,
        }
    }

    /// Reserves the identifier for the next accepted connection.
    pub(super) const fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    pub(super) fn notice(&self, id: u64) -> CompletionNotice {
        CompletionNotice {
            id,
            sender: self.sender.clone(),
        }
    }

    pub(super) fn insert(
        &mut self,
        id: u64,
        peer: SocketAddr,
        stream: TcpStream,
        worker: JoinHandle<()>,
    ) {
        self.entries.insert(
            id,
            Entry {
                peer,
                stream,
                worker,
            },
        );
        self.publish();
        info!(
            target: LISTENER_TARGET,
            connection = id,
            peer = %peer,
            active = self.entries.len(),
            "connection accepted"
        );
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Joins every worker that has reported completion; returns how many.
    pub(super) fn reap_finished(&mut self) -> usize {
        let mut reaped = 0;
        while let Ok(id) = self.receiver.try_recv() {
            if self.complete(id) {
                reaped += 1;
            }
        }
        reaped
    }

    /// Waits until every worker finishes or `deadline` passes.
    ///
    /// Returns the number of workers that finished during the wait.
    pub(super) fn wait_until(&mut self, deadline: Instant) -> usize {
        let mut finished = self.reap_finished();
        while !self.entries.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.receiver.recv_timeout(remaining) {
                Ok(id) => {
                    if self.complete(id) {
                        finished += 1;
                    }
                }
                Err(RecvTimeoutError::Timeout) => break,
                // The registry holds a sender itself, so this only happens if
                // that invariant is broken; stop waiting rather than spin.
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        finished
    }

    /// Closes every remaining connection and joins its worker.
    ///
    /// Callers cancel the worker token first. Workers get `grace` to report
    /// the cancellation to their peer before the sockets are shut down.
    /// Returns the number of connections that were still open at the call.
    pub(super) fn close_all(&mut self, grace: Duration) -> usize {
        let forced = self.entries.len();
        self.wait_until(Instant::now() + grace);
        let entries = std::mem::take(&mut self.entries);
        for (id, entry) in &entries {
            if let Err(error) = entry.stream.shutdown(Shutdown::Both) {
                debug!(
                    target: LISTENER_TARGET,
                    connection = id,
                    error = %error,
                    "connection already closed"
                );
            }
        }
        for (id, entry) in entries {
            if entry.worker.join().is_err() {
                warn!(target: LISTENER_TARGET, connection = id, "worker panicked");
            }
            info!(
                target: LISTENER_TARGET,
                connection = id,
                peer = %entry.peer,
                "connection force-closed"
            );
        }
        self.publish();
        // Drop completion notices sent by the workers just joined.
        while self.receiver.try_recv().is_ok() {}
        forced
    }

    fn complete(&mut self, id: u64) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };
        if entry.worker.join().is_err() {
            warn!(target: LISTENER_TARGET, connection = id, "worker panicked");
        }
        self.publish();
        info!(
            target: LISTENER_TARGET,
            connection = id,
            peer = %entry.peer,
            active = self.entries.len(),
            "connection closed"
        );
        true
    }

    fn publish(&self) {
        self.active.store(self.entries.len(), Ordering::SeqCst);
    }
}
