//! Shared configuration for the spire listener and dialer.
//!
//! [`Config`] is loaded through `ortho_config`, which layers built-in
//! defaults, an optional TOML file (`--config-path`), `SPIRE_*` environment
//! variables, and command-line flags, in increasing order of precedence.
//! Both binaries agree on the same structure so an operator can point the
//! listener and the dialer at one file.

mod arguments;
mod defaults;
mod host;
mod logging;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use arguments::ConfigArguments;
pub use defaults::{
    DEFAULT_BACKLOG, DEFAULT_COMMAND_TIMEOUT, DEFAULT_DIAL_TIMEOUT, DEFAULT_DRAIN_TIMEOUT,
    DEFAULT_HOST, DEFAULT_LOG_FILTER, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SHELL,
    default_backlog, default_command_timeout_ms, default_dial_timeout_ms,
    default_drain_timeout_ms, default_host, default_log_filter, default_log_filter_string,
    default_log_format, default_port, default_request_timeout_ms, default_shell,
};
pub use host::{HostParseError, parse_host};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved configuration shared by `spired` and `spire`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SPIRE")]
pub struct Config {
    /// Host the listener binds and the dialer connects to.
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port shared by both roles.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Pending-connection queue length requested from the kernel.
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Shell used to interpret each command line (`<shell> -c <command>`).
    #[serde(default = "default_shell")]
    pub shell: String,
    /// Execution budget for one command, in milliseconds.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// Time a peer has to deliver its request line, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Grace period for in-flight connections on shutdown, in milliseconds.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    /// Overall deadline for one dialer round-trip, in milliseconds.
    #[serde(default = "default_dial_timeout_ms")]
    pub dial_timeout_ms: u64,
    /// `tracing` filter expression for the listener's logs.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Output format for the listener's logs.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            backlog: default_backlog(),
            shell: default_shell(),
            command_timeout_ms: default_command_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
            dial_timeout_ms: default_dial_timeout_ms(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Host the listener binds and the dialer connects to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port shared by both roles.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Pending-connection queue length.
    #[must_use]
    pub const fn backlog(&self) -> u32 {
        self.backlog
    }

    /// Shell used to interpret command lines.
    #[must_use]
    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Execution budget for one command.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Time a peer has to deliver its request line.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Grace period for in-flight connections on shutdown.
    #[must_use]
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Overall deadline for one dialer round-trip.
    #[must_use]
    pub const fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_published_constants() {
        let config = Config::default();
        assert_eq!(config.host(), DEFAULT_HOST);
        assert_eq!(config.port(), DEFAULT_PORT);
        assert_eq!(config.backlog(), DEFAULT_BACKLOG);
        assert_eq!(config.shell(), DEFAULT_SHELL);
        assert_eq!(config.command_timeout(), DEFAULT_COMMAND_TIMEOUT);
        assert_eq!(config.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.drain_timeout(), DEFAULT_DRAIN_TIMEOUT);
        assert_eq!(config.dial_timeout(), DEFAULT_DIAL_TIMEOUT);
        assert_eq!(config.log_filter(), default_log_filter());
        assert_eq!(config.log_format(), LogFormat::Json);
    }
}
