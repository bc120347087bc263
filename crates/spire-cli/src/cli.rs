//! Command-line surface of the `spire` binary.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgGroup, Parser};
use spire_config::{ConfigArguments, parse_host};

/// Sends shell commands to a `spired` listener.
#[derive(Debug, Parser)]
#[command(name = "spire", version, about = "Sends one shell command per connection to a spired listener")]
#[command(group(ArgGroup::new("mode").required(true).args(["command", "interactive"])))]
pub(crate) struct Cli {
    /// Listener host.
    #[arg(long, value_parser = parse_host)]
    pub(crate) host: Option<String>,
    /// Listener port.
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub(crate) port: Option<u16>,
    /// Overall deadline for each round trip, in milliseconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) timeout_ms: Option<u64>,
    /// TOML configuration file.
    #[arg(long)]
    pub(crate) config_path: Option<PathBuf>,
    /// Command line to run remotely.
    #[arg(long, value_parser = parse_command)]
    pub(crate) command: Option<String>,
    /// Read commands from standard input, one per line.
    #[arg(long)]
    pub(crate) interactive: bool,
}

impl Cli {
    /// Replays configuration flags for the layered loader.
    pub(crate) fn config_arguments(&self, program: OsString) -> Vec<OsString> {
        ConfigArguments::new(program)
            .path("--config-path", self.config_path.as_deref())
            .value("--host", self.host.as_deref())
            .value("--port", self.port)
            .value("--dial-timeout-ms", self.timeout_ms)
            .into_vec()
    }
}

fn parse_command(input: &str) -> Result<String, String> {
    if input.contains('\n') {
        return Err(String::from("command must be a single line"));
    }
    Ok(input.to_owned())
}
