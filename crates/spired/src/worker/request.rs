//! Bounded, deadline-aware reading of the request line.

use std::io::{self, Read};
use std::time::Instant;

use thiserror::Error;

use crate::transport::CancellationToken;

/// Reasons a request line could not be obtained.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The line was blank or whitespace only.
    #[error("{}", spire_wire::EMPTY_REQUEST)]
    Empty,
    /// The line, including its terminator, exceeded the request limit.
    #[error("{}", spire_wire::REQUEST_TOO_LARGE)]
    Oversized,
    /// The line was not valid UTF-8.
    #[error("request is not valid UTF-8")]
    NotUtf8,
    /// The peer did not deliver a full line before the request deadline.
    #[error("request timed out")]
    TimedOut,
    /// The listener forced shutdown while the request was being read.
    #[error("request cancelled by shutdown")]
    Cancelled,
    /// Reading from the socket failed.
    #[error("failed to read request: {source}")]
    Io {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
}

impl RequestError {
    /// Whether the peer should be told about this failure.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::Io { .. })
    }
}

/// Reads one request line of at most `limit` bytes including the terminator.
///
/// The reader is expected to time out periodically (a socket read timeout)
/// so the deadline and the cancellation token are observed while the peer is
/// silent. Returns `Ok(None)` when the peer closes without sending anything.
/// A partial line ended by end-of-file is accepted as the request.
pub(crate) fn read_request(
    reader: &mut impl Read,
    limit: usize,
    deadline: Instant,
    cancellation: &CancellationToken,
) -> Result<Option<String>, RequestError> {
    let Some(raw) = read_raw_line(reader, limit, deadline, cancellation)? else {
        return Ok(None);
    };
    parse_line(raw).map(Some)
}

fn read_raw_line(
    reader: &mut impl Read,
    limit: usize,
    deadline: Instant,
    cancellation: &CancellationToken,
) -> Result<Option<Vec<u8>>, RequestError> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        let bytes_read = read_chunk(reader, &mut chunk, deadline, cancellation)?;
        if bytes_read == 0 {
            return Ok((!buffer.is_empty()).then_some(buffer));
        }
        let data = chunk.get(..bytes_read).unwrap_or_default();
        if let Some(pos) = data.iter().position(|byte| *byte == spire_wire::TERMINATOR) {
            if buffer.len() + pos + 1 > limit {
                return Err(RequestError::Oversized);
            }
            buffer.extend_from_slice(data.get(..pos).unwrap_or_default());
            return Ok(Some(buffer));
        }
        buffer.extend_from_slice(data);
        // Even a terminator arriving next would push the line past the limit.
        if buffer.len() >= limit {
            return Err(RequestError::Oversized);
        }
    }
}

fn read_chunk(
    reader: &mut impl Read,
    chunk: &mut [u8],
    deadline: Instant,
    cancellation: &CancellationToken,
) -> Result<usize, RequestError> {
    loop {
        if cancellation.is_cancelled() {
            return Err(RequestError::Cancelled);
        }
        match reader.read(chunk) {
            Ok(read) => return Ok(read),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                if Instant::now() >= deadline {
                    return Err(RequestError::TimedOut);
                }
            }
            Err(source) => return Err(RequestError::Io { source }),
        }
    }
}

fn parse_line(mut raw: Vec<u8>) -> Result<String, RequestError> {
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    let line = String::from_utf8(raw).map_err(|_| RequestError::NotUtf8)?;
    if line.trim().is_empty() {
        return Err(RequestError::Empty);
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use rstest::rstest;

    /// Reader that times out forever, like a silent peer.
    struct SilentPeer;

    impl Read for SilentPeer {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            std::thread::sleep(Duration::from_millis(5));
            Err(io::Error::from(io::ErrorKind::WouldBlock))
        }
    }

    fn read(input: &[u8], limit: usize) -> Result<Option<String>, RequestError> {
        let mut reader = input;
        read_request(
            &mut reader,
            limit,
            Instant::now() + Duration::from_secs(1),
            &CancellationToken::new(),
        )
    }

    #[rstest]
    #[case(b"echo hello\n".as_slice(), "echo hello")]
    #[case(b"echo hello\r\n".as_slice(), "echo hello")]
    #[case(b"echo tail".as_slice(), "echo tail")]
    #[case(b"  ls -l  \n".as_slice(), "  ls -l  ")]
    #[case(b"first\nsecond\n".as_slice(), "first")]
    fn reads_first_line(#[case] input: &[u8], #[case] expected: &str) {
        let line = read(input, 64).expect("read").expect("line present");
        assert_eq!(line, expected);
    }

    #[rstest]
    #[case(b"\n".as_slice())]
    #[case(b"   \t\n".as_slice())]
    #[case(b"\r\n".as_slice())]
    fn rejects_blank_lines(#[case] input: &[u8]) {
        assert!(matches!(read(input, 64), Err(RequestError::Empty)));
    }

    #[rstest]
    fn closed_without_data_yields_nothing() {
        assert!(matches!(read(b"", 64), Ok(None)));
    }

    #[rstest]
    #[case(7, true)]
    #[case(8, false)]
    fn limit_includes_terminator(#[case] limit: usize, #[case] oversized: bool) {
        let result = read(b"1234567\n", limit);
        assert_eq!(matches!(result, Err(RequestError::Oversized)), oversized);
    }

    #[rstest]
    fn unterminated_line_at_limit_is_oversized() {
        assert!(matches!(read(&[b'a'; 2048], 2048), Err(RequestError::Oversized)));
    }

    #[rstest]
    fn rejects_invalid_utf8() {
        assert!(matches!(read(b"\xff\xfe\n", 64), Err(RequestError::NotUtf8)));
    }

    #[rstest]
    fn silent_peer_times_out() {
        let result = read_request(
            &mut SilentPeer,
            64,
            Instant::now() + Duration::from_millis(50),
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(RequestError::TimedOut)));
    }

    #[rstest]
    fn cancellation_interrupts_reading() {
        let token = CancellationToken::new();
        token.cancel();
        let result = read_request(
            &mut SilentPeer,
            64,
            Instant::now() + Duration::from_secs(10),
            &token,
        );
        assert!(matches!(result, Err(RequestError::Cancelled)));
        assert!(!RequestError::Cancelled.is_reportable());
    }
}
