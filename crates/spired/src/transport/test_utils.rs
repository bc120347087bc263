//! Test helpers for the transport module.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use std::thread;
use std::time::Duration;

use super::{Connection, ConnectionHandler};

pub(crate) struct CountingHandler {
    count: Arc<AtomicUsize>,
}

impl CountingHandler {
    pub(crate) fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            count: Arc::clone(&count),
        });
        (count, handler)
    }
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, _connection: Connection) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Holds every connection open until released or cancelled.
pub(crate) struct BlockingHandler {
    release: Arc<AtomicBool>,
    started: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
}

/// Shared observation points for a [`BlockingHandler`].
#[derive(Clone)]
pub(crate) struct BlockingProbe {
    pub(crate) release: Arc<AtomicBool>,
    pub(crate) started: Arc<AtomicUsize>,
    pub(crate) cancelled: Arc<AtomicUsize>,
}

impl BlockingHandler {
    pub(crate) fn new() -> (BlockingProbe, Arc<Self>) {
        let probe = BlockingProbe {
            release: Arc::new(AtomicBool::new(false)),
            started: Arc::new(AtomicUsize::new(0)),
            cancelled: Arc::new(AtomicUsize::new(0)),
        };
        let handler = Arc::new(Self {
            release: Arc::clone(&probe.release),
            started: Arc::clone(&probe.started),
            cancelled: Arc::clone(&probe.cancelled),
        });
        (probe, handler)
    }
}

impl ConnectionHandler for BlockingHandler {
    fn handle(&self, connection: Connection) {
        self.started.fetch_add(1, Ordering::SeqCst);
        loop {
            if self.release.load(Ordering::SeqCst) {
                return;
            }
            if connection.cancellation().is_cancelled() {
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}
