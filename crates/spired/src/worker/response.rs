//! Writing the single response line and closing politely.

use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::time::{Duration, Instant};

use spire_wire::Response;

use crate::transport::Connection;

/// Longest time spent discarding unread request bytes after responding.
const LINGER: Duration = Duration::from_secs(1);
/// Most unread bytes discarded before the socket is closed regardless.
const LINGER_BYTES: usize = 4 * spire_wire::MAX_REQUEST_BYTES;

/// Serialises `response` as one terminated line and flushes it.
pub(crate) fn write_response(writer: &mut impl Write, response: &Response) -> io::Result<()> {
    let line = response.to_line().map_err(io::Error::other)?;
    writer.write_all(&line)?;
    writer.flush()
}

/// Half-closes the write side and discards input the peer is still sending.
///
/// Closing a socket with unread data makes the kernel send a reset, which can
/// destroy the response before the peer reads it; this applies to oversized
/// requests in particular.
pub(crate) fn linger_and_close(connection: &mut Connection, slice: Duration) -> io::Result<()> {
    connection.shutdown(Shutdown::Write)?;
    connection.set_read_timeout(Some(slice))?;
    let deadline = Instant::now() + LINGER;
    let mut discarded = 0_usize;
    let mut chunk = [0_u8; 4096];
    while discarded < LINGER_BYTES
        && Instant::now() < deadline
        && !connection.cancellation().is_cancelled()
    {
        match connection.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => discarded += read,
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) => {}
            Err(error) => return Err(error),
        }
    }
    Ok(())
}
