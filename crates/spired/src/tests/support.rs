//! Shared helpers for end-to-end listener tests.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use spire_wire::Response;

use crate::exec::ShellRunner;
use crate::transport::{ListenerHandle, SocketListener};
use crate::worker::CommandWorker;

/// Starts a listener on an ephemeral loopback port backed by `/bin/sh`.
pub(crate) fn start_shell_listener(drain_timeout: Duration) -> ListenerHandle {
    let listener = SocketListener::bind("127.0.0.1", 0, 16).expect("bind listener");
    let runner = Arc::new(ShellRunner::new("/bin/sh", Duration::from_secs(20)));
    let handler = Arc::new(CommandWorker::new(runner, Duration::from_secs(5)));
    listener
        .start(handler, drain_timeout)
        .expect("start listener")
}

/// Sends raw request bytes and decodes the single response line.
pub(crate) fn exchange(addr: SocketAddr, request: &[u8]) -> Response {
    let mut stream = TcpStream::connect(addr).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(30)))
        .expect("read timeout");
    stream.write_all(request).expect("write request");
    let mut received = Vec::new();
    stream.read_to_end(&mut received).expect("read response");
    Response::from_line(&received).expect("decode response")
}

/// Sends one command line.
pub(crate) fn send(addr: SocketAddr, command: &str) -> Response {
    exchange(addr, format!("{command}\n").as_bytes())
}
