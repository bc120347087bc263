//! Validation of host arguments before they reach the socket layer.

use thiserror::Error;

/// Errors raised when a host argument cannot be used as a socket address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostParseError {
    /// The host was empty or whitespace.
    #[error("host must not be empty")]
    Empty,
    /// The host contained whitespace or control characters.
    #[error("host '{0}' contains whitespace or control characters")]
    InvalidCharacters(String),
}

/// Validates a host name or IP literal supplied on the command line.
///
/// Resolution is deferred to bind or connect time; this only rejects values
/// that can never resolve. Surrounding brackets on IPv6 literals are removed
/// so `[::1]` and `::1` are equivalent.
pub fn parse_host(input: &str) -> Result<String, HostParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(HostParseError::Empty);
    }
    if trimmed
        .chars()
        .any(|ch| ch.is_whitespace() || ch.is_control())
    {
        return Err(HostParseError::InvalidCharacters(trimmed.to_owned()));
    }
    let unbracketed = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);
    Ok(unbracketed.to_owned())
}
