//! Per-connection request handling.
//!
//! A [`CommandWorker`] reads one request line from its connection, runs it
//! through a [`CommandRunner`], writes exactly one response line, and closes
//! the connection. Every failure is reported to the peer or logged here;
//! nothing propagates back to the accept loop.

mod request;
mod response;

use std::sync::Arc;
use std::time::{Duration, Instant};

use spire_wire::Response;
use tracing::{debug, info, warn};

use crate::exec::{CommandOutput, CommandRunner};
use crate::transport::{Connection, ConnectionHandler};

pub use self::request::RequestError;
use self::request::read_request;
use self::response::{linger_and_close, write_response};

const WORKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::worker");

/// Read-timeout slice used so deadlines and cancellation are observed while
/// a peer is silent.
const READ_SLICE: Duration = Duration::from_millis(100);
/// Bound on writing the response to a peer that stopped reading.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// [`ConnectionHandler`] that executes one command per connection.
pub struct CommandWorker {
    runner: Arc<dyn CommandRunner>,
    request_timeout: Duration,
    request_limit: usize,
}

impl CommandWorker {
    /// Creates a worker that gives peers `request_timeout` to send their line.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, request_timeout: Duration) -> Self {
        Self {
            runner,
            request_timeout,
            request_limit: spire_wire::MAX_REQUEST_BYTES,
        }
    }

    fn respond_to(&self, connection: &mut Connection) -> Option<Response> {
        let deadline = Instant::now() + self.request_timeout;
        if let Err(error) = connection.set_read_timeout(Some(READ_SLICE)) {
            warn!(
                target: WORKER_TARGET,
                connection = connection.id(),
                error = %error,
                "failed to configure read timeout"
            );
            return None;
        }
        let cancellation = connection.cancellation().clone();
        let command = match read_request(connection, self.request_limit, deadline, &cancellation)
        {
            Ok(Some(command)) => command,
            Ok(None) => {
                debug!(
                    target: WORKER_TARGET,
                    connection = connection.id(),
                    "peer closed without a request"
                );
                return None;
            }
            Err(error) => {
                warn!(
                    target: WORKER_TARGET,
                    connection = connection.id(),
                    error = %error,
                    "request rejected"
                );
                return error
                    .is_reportable()
                    .then(|| Response::error(error.to_string()));
            }
        };
        debug!(
            target: WORKER_TARGET,
            connection = connection.id(),
            bytes = command.len(),
            "executing command"
        );
        Some(match self.runner.run(&command, &cancellation) {
            Ok(CommandOutput {
                data,
                status,
                truncated,
            }) => Response::output(data, status, truncated),
            Err(error) => {
                warn!(
                    target: WORKER_TARGET,
                    connection = connection.id(),
                    error = %error,
                    "command execution failed"
                );
                Response::error(format!("execution failed: {error}"))
            }
        })
    }
}

impl ConnectionHandler for CommandWorker {
    fn handle(&self, mut connection: Connection) {
        let Some(response) = self.respond_to(&mut connection) else {
            return;
        };
        if let Err(error) = connection
            .set_write_timeout(Some(WRITE_TIMEOUT))
            .and_then(|()| write_response(&mut connection, &response))
        {
            warn!(
                target: WORKER_TARGET,
                connection = connection.id(),
                error = %error,
                "failed to write response"
            );
            return;
        }
        info!(
            target: WORKER_TARGET,
            connection = connection.id(),
            peer = %connection.peer(),
            error = response.is_error(),
            "response sent"
        );
        if let Err(error) = linger_and_close(&mut connection, READ_SLICE) {
            debug!(
                target: WORKER_TARGET,
                connection = connection.id(),
                error = %error,
                "connection closed early"
            );
        }
    }
}
