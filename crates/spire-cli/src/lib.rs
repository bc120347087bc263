//! Dialer side of spire.
//!
//! `spire` sends a single command line to a `spired` listener per connection
//! and renders the one response line it gets back: command output goes to
//! stdout and the process exits with the remote exit status, while
//! diagnostics go to stderr prefixed with `ERROR: `. Interactive mode repeats
//! the exchange for every line read from stdin.
//!
//! Configuration is shared with the listener through [`spire_config`].

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use spire_config::Config;
use spire_wire::Response;

mod cli;
mod config;
mod dialer;
mod errors;
mod interactive;

use cli::Cli;
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub use dialer::Dialer;
pub(crate) use errors::AppError;
pub use errors::{DialError, ProtocolError};
use interactive::{Endpoint, run_session};

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, R, W, E>(args: I, stdin: R, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdin, stdout, stderr, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
pub(crate) fn run_with_loader<I, R, W, E, L>(
    args: I,
    stdin: R,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(error) => return report_usage(&error, stdout, stderr),
    };
    let program = args
        .first()
        .cloned()
        .unwrap_or_else(|| OsString::from("spire"));
    let result = loader
        .load(&cli.config_arguments(program))
        .and_then(|config| execute(&cli, &config, stdin, stdout, stderr));
    match result {
        Ok(exit_code) => exit_code,
        Err(error) => {
            let _ = writeln!(stderr, "spire: {error}");
            ExitCode::FAILURE
        }
    }
}

fn execute<R, W, E>(
    cli: &Cli,
    config: &Config,
    stdin: R,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<ExitCode, AppError>
where
    R: BufRead,
    W: Write,
    E: Write,
{
    if config.port() == 0 {
        return Err(AppError::InvalidPort);
    }
    let dialer = Dialer::new(config.dial_timeout());
    let endpoint = Endpoint {
        host: config.host(),
        port: config.port(),
    };
    if let Some(command) = cli.command.as_deref() {
        let response = dialer.send(endpoint.host, endpoint.port, command)?;
        return emit_response(&response, stdout, stderr);
    }
    run_session(&dialer, &endpoint, stdin, stdout, stderr)?;
    Ok(ExitCode::SUCCESS)
}

fn emit_response<W: Write, E: Write>(
    response: &Response,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<ExitCode, AppError> {
    match response {
        Response::Output {
            data,
            status,
            truncated,
        } => {
            stdout
                .write_all(data.as_bytes())
                .and_then(|()| stdout.flush())
                .map_err(AppError::Output)?;
            if *truncated {
                let _ = writeln!(stderr, "spire: output truncated by the listener");
            }
            Ok(status.map_or(ExitCode::FAILURE, exit_code_from_status))
        }
        Response::Error { .. } => {
            writeln!(stderr, "{response}").map_err(AppError::Output)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn report_usage<W: Write, E: Write>(error: &clap::Error, stdout: &mut W, stderr: &mut E) -> ExitCode {
    let rendered = error.render();
    if matches!(
        error.kind(),
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
    ) {
        let _ = write!(stdout, "{rendered}");
        return ExitCode::SUCCESS;
    }
    let _ = write!(stderr, "{rendered}");
    ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(2))
}

fn exit_code_from_status(status: i32) -> ExitCode {
    u8::try_from(status).map_or(ExitCode::FAILURE, ExitCode::from)
}
