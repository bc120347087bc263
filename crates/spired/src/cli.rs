//! Command-line entry for the `spired` binary.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use spire_config::{ConfigArguments, LogFormat, parse_host};

use crate::bootstrap::{ConfigLoader, SystemConfigLoader};
use crate::process::{LaunchError, run_listener};
use crate::transport::DrainReport;

/// Flags accepted by `spired`; every one maps onto a configuration field.
#[derive(Debug, Parser)]
#[command(
    name = "spired",
    version,
    about = "Accepts one shell command per TCP connection and returns its output"
)]
pub(crate) struct Cli {
    /// Address to bind.
    #[arg(long, value_parser = parse_host)]
    host: Option<String>,
    /// Port to bind; 0 picks an ephemeral port.
    #[arg(long)]
    port: Option<u16>,
    /// Pending-connection queue length.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    backlog: Option<u32>,
    /// Shell used as `<shell> -c <command>`.
    #[arg(long)]
    shell: Option<String>,
    /// Execution budget per command, in milliseconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    command_timeout_ms: Option<u64>,
    /// Time a peer has to send its request line, in milliseconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    request_timeout_ms: Option<u64>,
    /// Grace period for in-flight connections on shutdown, in milliseconds.
    #[arg(long)]
    drain_timeout_ms: Option<u64>,
    /// Tracing filter expression, for example `info` or `spired=debug`.
    #[arg(long)]
    log_filter: Option<String>,
    /// Log output format.
    #[arg(long)]
    log_format: Option<LogFormat>,
    /// TOML configuration file.
    #[arg(long)]
    config_path: Option<PathBuf>,
}

impl Cli {
    /// Replays the parsed flags in the form the configuration loader expects.
    pub(crate) fn config_arguments(&self, program: OsString) -> Vec<OsString> {
        ConfigArguments::new(program)
            .path("--config-path", self.config_path.as_deref())
            .value("--host", self.host.as_deref())
            .value("--port", self.port)
            .value("--backlog", self.backlog)
            .value("--shell", self.shell.as_deref())
            .value("--command-timeout-ms", self.command_timeout_ms)
            .value("--request-timeout-ms", self.request_timeout_ms)
            .value("--drain-timeout-ms", self.drain_timeout_ms)
            .value("--log-filter", self.log_filter.as_deref())
            .value("--log-format", self.log_format)
            .into_vec()
    }
}

/// Runs `spired` with the production listener.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with(args, stdout, stderr, run_listener)
}

/// Runs `spired` with an injected listener runtime.
pub(crate) fn run_with<I, W, E, F>(args: I, stdout: &mut W, stderr: &mut E, launch: F) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    F: FnOnce(&dyn ConfigLoader) -> Result<DrainReport, LaunchError>,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let program = args
        .first()
        .cloned()
        .unwrap_or_else(|| OsString::from("spired"));
    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(error) => return report_usage(&error, stdout, stderr),
    };
    let loader = SystemConfigLoader::new(cli.config_arguments(program));
    match launch(&loader) {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(stderr, "spired: {error}");
            ExitCode::FAILURE
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
