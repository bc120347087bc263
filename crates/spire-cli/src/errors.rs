//! Error types surfaced by the dialer.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Violations of the response framing.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The listener closed the connection before the response terminator.
    #[error("connection closed before a complete response was received")]
    Closed,
    /// The response line exceeded the dialer's buffer limit.
    #[error("response exceeded {limit} bytes")]
    Oversized {
        /// Limit that was exceeded.
        limit: usize,
    },
    /// The response line was not valid UTF-8.
    #[error("response is not valid UTF-8")]
    NotUtf8,
    /// The response line was not a recognised message.
    #[error("malformed response: {source}")]
    Malformed {
        /// Underlying decoding error.
        #[source]
        source: serde_json::Error,
    },
}

/// Failures of a single dialer round trip.
#[derive(Debug, Error)]
pub enum DialError {
    /// The command contains a line break and cannot be framed as one line.
    #[error("command must be a single line")]
    MultiLineCommand,
    /// The listener address could not be resolved.
    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        /// Address as given.
        endpoint: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },
    /// Resolution produced no addresses.
    #[error("no addresses resolved for {endpoint}")]
    ResolveEmpty {
        /// Address as given.
        endpoint: String,
    },
    /// No resolved address accepted the connection.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// Address as given.
        endpoint: String,
        /// Error from the last address attempted.
        #[source]
        source: io::Error,
    },
    /// The round trip did not finish within the deadline.
    #[error("timed out after {timeout_ms} ms waiting for {endpoint}")]
    TimedOut {
        /// Address as given.
        endpoint: String,
        /// Deadline that elapsed.
        timeout_ms: u64,
    },
    /// Writing the request failed.
    #[error("failed to send request: {source}")]
    Send {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// Reading the response failed.
    #[error("failed to read response: {source}")]
    Receive {
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// The response violated the framing.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Errors reported by the `spire` binary.
#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("port must be between 1 and 65535")]
    InvalidPort,
    #[error(transparent)]
    Dial(#[from] DialError),
    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
    #[error("failed to read input: {0}")]
    Input(#[source] io::Error),
}
