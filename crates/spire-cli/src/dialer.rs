//! One-shot request/response exchange with a listener.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use spire_wire::{MAX_RESPONSE_BYTES, Response, TERMINATOR};

use crate::errors::{DialError, ProtocolError};

/// Connects, sends one command line, and reads the single response line.
///
/// Every step shares one overall deadline; there is no retry.
#[derive(Debug, Clone, Copy)]
pub struct Dialer {
    timeout: Duration,
    response_limit: usize,
}

impl Dialer {
    /// Creates a dialer whose round trips must finish within `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            response_limit: MAX_RESPONSE_BYTES,
        }
    }

    /// Overrides the largest response line accepted.
    #[must_use]
    pub const fn with_response_limit(mut self, limit: usize) -> Self {
        self.response_limit = limit;
        self
    }

    /// Sends `command` to `host:port` and returns the listener's response.
    ///
    /// # Errors
    ///
    /// Returns [`DialError`] when the command spans lines, the listener cannot
    /// be reached, the deadline elapses, or the response is malformed.
    pub fn send(&self, host: &str, port: u16, command: &str) -> Result<Response, DialError> {
        if command.contains('\n') {
            return Err(DialError::MultiLineCommand);
        }
        let round_trip = RoundTrip {
            endpoint: format!("{host}:{port}"),
            deadline: Instant::now() + self.timeout,
            timeout: self.timeout,
        };
        let mut stream = round_trip.connect(host, port)?;
        round_trip.write_request(&mut stream, command)?;
        let line = round_trip.read_response(&mut stream, self.response_limit)?;
        parse_response(&line)
    }
}

struct RoundTrip {
    endpoint: String,
    deadline: Instant,
    timeout: Duration,
}

impl RoundTrip {
    fn remaining(&self) -> Result<Duration, DialError> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(self.timed_out());
        }
        Ok(remaining)
    }

    fn timed_out(&self) -> DialError {
        DialError::TimedOut {
            endpoint: self.endpoint.clone(),
            timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    fn connect(&self, host: &str, port: u16) -> Result<TcpStream, DialError> {
        let addresses: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| DialError::Resolve {
                endpoint: self.endpoint.clone(),
                source,
            })?
            .collect();
        let mut last_error = None;
        for address in addresses {
            match TcpStream::connect_timeout(&address, self.remaining()?) {
                Ok(stream) => return Ok(stream),
                Err(error) if is_timeout(&error) => return Err(self.timed_out()),
                Err(error) => last_error = Some(error),
            }
        }
        Err(match last_error {
            Some(source) => DialError::Connect {
                endpoint: self.endpoint.clone(),
                source,
            },
            None => DialError::ResolveEmpty {
                endpoint: self.endpoint.clone(),
            },
        })
    }

    fn write_request(&self, stream: &mut TcpStream, command: &str) -> Result<(), DialError> {
        let mut request = Vec::with_capacity(command.len() + 1);
        request.extend_from_slice(command.as_bytes());
        request.push(TERMINATOR);
        stream
            .set_write_timeout(Some(self.remaining()?))
            .map_err(|source| DialError::Send { source })?;
        match stream.write_all(&request).and_then(|()| stream.flush()) {
            Ok(()) => Ok(()),
            Err(error) if is_timeout(&error) => Err(self.timed_out()),
            Err(source) => Err(DialError::Send { source }),
        }
    }

    fn read_response(&self, stream: &mut TcpStream, limit: usize) -> Result<Vec<u8>, DialError> {
        let mut buffer = Vec::new();
        let mut chunk = [0_u8; 8192];
        loop {
            stream
                .set_read_timeout(Some(self.remaining()?))
                .map_err(|source| DialError::Receive { source })?;
            let read = match stream.read(&mut chunk) {
                Ok(0) => return Err(ProtocolError::Closed.into()),
                Ok(read) => read,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) if is_timeout(&error) => return Err(self.timed_out()),
                Err(source) => return Err(DialError::Receive { source }),
            };
            let data = chunk.get(..read).unwrap_or_default();
            if let Some(pos) = data.iter().position(|byte| *byte == TERMINATOR) {
                buffer.extend_from_slice(data.get(..pos).unwrap_or_default());
                return Ok(buffer);
            }
            buffer.extend_from_slice(data);
            if buffer.len() > limit {
                return Err(ProtocolError::Oversized { limit }.into());
            }
        }
    }
}

fn parse_response(line: &[u8]) -> Result<Response, DialError> {
    if std::str::from_utf8(line).is_err() {
        return Err(ProtocolError::NotUtf8.into());
    }
    Response::from_line(line).map_err(|source| ProtocolError::Malformed { source }.into())
}

fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
