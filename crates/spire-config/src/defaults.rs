//! Built-in values used when no configuration layer sets a field.

use std::time::Duration;

use crate::logging::LogFormat;

/// Default address the listener binds and the dialer connects to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default TCP port shared by the listener and the dialer.
pub const DEFAULT_PORT: u16 = 9999;

/// Default number of pending connections queued by the kernel.
pub const DEFAULT_BACKLOG: u32 = 5;

/// Default shell used to interpret command lines.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Default execution budget for a single command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time a peer has to deliver its request line.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default grace period granted to in-flight connections on shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default overall deadline for one dialer round-trip.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// `tracing` directive applied when neither `--log-filter` nor
/// `SPIRE_LOG_FILTER` is given.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Borrowed [`DEFAULT_LOG_FILTER`].
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// [`DEFAULT_LOG_FILTER`] as the owned value serde fills into [`crate::Config`].
pub fn default_log_filter_string() -> String {
    default_log_filter().to_owned()
}

/// Listener logs are emitted as JSON unless configured otherwise.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Owned default host for serde.
pub fn default_host() -> String {
    DEFAULT_HOST.to_owned()
}

/// Default port for serde.
pub fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Default backlog for serde.
pub fn default_backlog() -> u32 {
    DEFAULT_BACKLOG
}

/// Owned default shell for serde.
pub fn default_shell() -> String {
    DEFAULT_SHELL.to_owned()
}

/// Default command timeout in milliseconds.
pub fn default_command_timeout_ms() -> u64 {
    millis(DEFAULT_COMMAND_TIMEOUT)
}

/// Default request timeout in milliseconds.
pub fn default_request_timeout_ms() -> u64 {
    millis(DEFAULT_REQUEST_TIMEOUT)
}

/// Default drain timeout in milliseconds.
pub fn default_drain_timeout_ms() -> u64 {
    millis(DEFAULT_DRAIN_TIMEOUT)
}

/// Default dial timeout in milliseconds.
pub fn default_dial_timeout_ms() -> u64 {
    millis(DEFAULT_DIAL_TIMEOUT)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
