//! Wire contract between the spire dialer and listener.
//!
//! A request is a single line of UTF-8 text terminated by [`TERMINATOR`] and
//! at most [`MAX_REQUEST_BYTES`] long including the terminator. The listener
//! answers with exactly one [`Response`], serialised as a JSON object on a
//! single line and terminated by [`TERMINATOR`]. Command output travels as a
//! JSON string, so multi-line output never collides with the framing.
//!
//! ```text
//! > echo hello
//! < {"kind":"output","data":"hello\n","status":0,"truncated":false}
//! >
//! < {"kind":"error","message":"empty request"}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Byte terminating every request and response line.
pub const TERMINATOR: u8 = b'\n';

/// Largest accepted request, including the terminator.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Largest response line a dialer will buffer before declaring a framing
/// violation.
///
/// Captured output is capped well below this; the headroom covers JSON
/// escaping of control characters.
pub const MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

/// Prefix that distinguishes diagnostics from command output when rendered.
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Diagnostic sent for blank request lines.
pub const EMPTY_REQUEST: &str = "empty request";

/// Diagnostic sent for request lines over [`MAX_REQUEST_BYTES`].
pub const REQUEST_TOO_LARGE: &str = "request too large";

/// Single response message sent by the listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Response {
    /// The command ran; `data` holds its combined stdout and stderr.
    Output {
        /// Captured output, decoded lossily as UTF-8.
        data: String,
        /// Exit code, or `None` when the process was terminated by a signal.
        status: Option<i32>,
        /// Set when output beyond the capture limit was discarded.
        #[serde(default)]
        truncated: bool,
    },
    /// The request was rejected or the command could not be executed.
    Error {
        /// Human-readable diagnostic without the [`ERROR_PREFIX`].
        message: String,
    },
}

impl Response {
    /// Builds an output response.
    #[must_use]
    pub fn output(data: impl Into<String>, status: Option<i32>, truncated: bool) -> Self {
        Self::Output {
            data: data.into(),
            status,
            truncated,
        }
    }

    /// Builds an error response.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Returns true for diagnostic responses.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Serialises the response as one terminated line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialisation fails.
    pub fn to_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(TERMINATOR);
        Ok(line)
    }

    /// Parses a response line, with or without its terminator.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not valid UTF-8 JSON matching
    /// [`Response`].
    pub fn from_line(line: &[u8]) -> Result<Self, serde_json::Error> {
        let body = line.strip_suffix(&[TERMINATOR]).unwrap_or(line);
        serde_json::from_slice(body)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output { data, .. } => formatter.write_str(data),
            Self::Error { message } => write!(formatter, "{ERROR_PREFIX}{message}"),
        }
    }
}
