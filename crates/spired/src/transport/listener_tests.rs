//! Tests for the socket listener.

use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};

use super::listener::SocketListener;
use super::{BlockingHandler, BlockingProbe, ConnectionHandler, CountingHandler, DrainReport};

#[derive(Clone)]
struct CountingFixture {
    count: Arc<AtomicUsize>,
    handler: Arc<CountingHandler>,
}

#[fixture]
fn counting_fixture() -> CountingFixture {
    let (count, handler) = CountingHandler::new();
    CountingFixture { count, handler }
}

#[fixture]
fn listener() -> SocketListener {
    SocketListener::bind("127.0.0.1", 0, 5).expect("bind tcp listener")
}

fn wait_for(count: &AtomicUsize, expected: usize) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if count.load(Ordering::SeqCst) >= expected {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[rstest]
fn tcp_listener_accepts_connections(listener: SocketListener, counting_fixture: CountingFixture) {
    let addr = listener.local_addr();
    assert_ne!(addr.port(), 0, "ephemeral port should be resolved");
    let CountingFixture { count, handler } = counting_fixture;
    let handler: Arc<dyn ConnectionHandler> = handler;
    let handle = listener
        .start(handler, Duration::from_secs(1))
        .expect("start listener");

    TcpStream::connect(addr).expect("connect first client");
    TcpStream::connect(addr).expect("connect second client");

    assert!(wait_for(&count, 2), "expected two connections");
    handle.shutdown();
    let report = handle.join().expect("join listener");
    assert_eq!(report.forced, 0);
}

#[rstest]
fn bind_rejects_address_in_use(listener: SocketListener) {
    let port = listener.local_addr().port();
    let error = SocketListener::bind("127.0.0.1", port, 5).expect_err("port already bound");
    assert!(error.is_bind_error());
}

#[rstest]
fn shutdown_refuses_new_connections(listener: SocketListener) {
    let addr = listener.local_addr();
    let (_, handler) = CountingHandler::new();
    let handle = listener
        .start(handler, Duration::from_secs(1))
        .expect("start listener");

    handle.shutdown();
    handle.join().expect("join listener");

    assert!(TcpStream::connect(addr).is_err(), "socket should be closed");
}

#[rstest]
fn shutdown_waits_for_in_flight_connections(listener: SocketListener) {
    let addr = listener.local_addr();
    let (probe, handler) = BlockingHandler::new();
    let handle = listener
        .start(handler, Duration::from_secs(5))
        .expect("start listener");
    let _client = TcpStream::connect(addr).expect("connect client");
    assert!(wait_for(&probe.started, 1), "handler should start");
    let deadline = Instant::now() + Duration::from_secs(2);
    while handle.active_connections() < 1 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(handle.active_connections(), 1);

    handle.shutdown();
    release_after(&probe, Duration::from_millis(100));

    let report = handle.join().expect("join listener");
    assert_eq!(report, DrainReport { drained: 1, forced: 0 });
    assert_eq!(probe.cancelled.load(Ordering::SeqCst), 0);
}

#[rstest]
fn drain_deadline_cancels_in_flight_connections(listener: SocketListener) {
    let addr = listener.local_addr();
    let (probe, handler) = BlockingHandler::new();
    let handle = listener
        .start(handler, Duration::from_millis(100))
        .expect("start listener");
    let _client = TcpStream::connect(addr).expect("connect client");
    assert!(wait_for(&probe.started, 1), "handler should start");

    handle.shutdown();
    let report = handle.join().expect("join listener");

    assert_eq!(report, DrainReport { drained: 0, forced: 1 });
    assert_eq!(probe.cancelled.load(Ordering::SeqCst), 1);
}

#[rstest]
fn force_skips_the_drain(listener: SocketListener) {
    let addr = listener.local_addr();
    let (probe, handler) = BlockingHandler::new();
    let handle = listener
        .start(handler, Duration::from_secs(30))
        .expect("start listener");
    let _client = TcpStream::connect(addr).expect("connect client");
    assert!(wait_for(&probe.started, 1), "handler should start");

    let started = Instant::now();
    handle.force();
    let report = handle.join().expect("join listener");

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(report.forced, 1);
}

fn release_after(probe: &BlockingProbe, delay: Duration) {
    let release = Arc::clone(&probe.release);
    std::thread::spawn(move || {
        std::thread::sleep(delay);
        release.store(true, Ordering::SeqCst);
    });
}
