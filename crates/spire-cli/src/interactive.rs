//! Line-by-line interactive session.

use std::io::{BufRead, Write};

use spire_wire::Response;

use crate::dialer::Dialer;
use crate::errors::AppError;

const PROMPT: &str = "spire> ";
const QUIT_WORDS: [&str; 2] = ["quit", "exit"];

/// Target listener for a session.
pub(crate) struct Endpoint<'a> {
    pub(crate) host: &'a str,
    pub(crate) port: u16,
}

/// Sends each input line as its own request until `quit`, `exit` or end of input.
///
/// Dial failures are reported and the session continues with the next line.
pub(crate) fn run_session<R, W, E>(
    dialer: &Dialer,
    endpoint: &Endpoint<'_>,
    input: R,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<(), AppError>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    prompt(stderr)?;
    for read in input.lines() {
        let line = read.map_err(AppError::Input)?;
        let command = line.trim_end_matches('\r');
        if QUIT_WORDS.contains(&command.trim()) {
            break;
        }
        if !command.trim().is_empty() {
            match dialer.send(endpoint.host, endpoint.port, command) {
                Ok(response) => render(&response, stdout, stderr)?,
                Err(error) => writeln!(stderr, "spire: {error}").map_err(AppError::Output)?,
            }
        }
        prompt(stderr)?;
    }
    Ok(())
}

fn prompt<E: Write>(stderr: &mut E) -> Result<(), AppError> {
    stderr
        .write_all(PROMPT.as_bytes())
        .and_then(|()| stderr.flush())
        .map_err(AppError::Output)
}

fn render<W: Write, E: Write>(
    response: &Response,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<(), AppError> {
    match response {
        Response::Output { data, .. } => {
            stdout.write_all(data.as_bytes()).map_err(AppError::Output)?;
            if !data.is_empty() && !data.ends_with('\n') {
                stdout.write_all(b"\n").map_err(AppError::Output)?;
            }
            stdout.flush().map_err(AppError::Output)
        }
        Response::Error { .. } => writeln!(stderr, "{response}").map_err(AppError::Output),
    }
}
