//! Structured logging for the listener.
//!
//! Events go to stderr so command output never mixes with diagnostics. The
//! subscriber is process-global; [`initialise`] installs it once and ignores
//! later calls.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::Subscriber;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;

use spire_config::{Config, LogFormat};

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Errors raised while installing the listener's log subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// `log_filter` is not a valid `tracing` directive list.
    #[error("invalid log filter '{expression}': {message}")]
    InvalidFilter {
        /// Expression taken from the configuration.
        expression: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Some other code already installed a global subscriber.
    #[error("failed to install log subscriber: {0}")]
    AlreadyInstalled(SetGlobalDefaultError),
}

/// Installs the stderr subscriber described by `config`.
///
/// Only the first successful call has an effect, so the binary and embedded
/// test listeners can both call it.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter does not parse or a foreign
/// subscriber is already in place.
pub fn initialise(config: &Config) -> Result<(), TelemetryError> {
    INSTALLED.get_or_try_init(|| install(config)).map(|_| ())
}

fn install(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter()).map_err(|error| {
        TelemetryError::InvalidFilter {
            expression: config.log_filter().to_owned(),
            message: error.to_string(),
        }
    })?;

    // Worker threads are named `spired-conn-<id>`, which ties events to a
    // connection without a span.
    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt()
                .json()
                .flatten_event(true)
                .with_env_filter(filter)
                .with_thread_names(true)
                .with_timer(UtcTime::rfc_3339())
                .with_writer(io::stderr)
                .finish(),
        ),
        LogFormat::Compact => Box::new(
            tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .with_thread_names(true)
                .with_timer(UtcTime::rfc_3339())
                .with_ansi(io::stderr().is_terminal())
                .with_writer(io::stderr)
                .finish(),
        ),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::AlreadyInstalled)
}
