//! CLI entrypoint for the spire dialer.
//!
//! The binary delegates to [`spire_cli::run`], which parses arguments, loads
//! layered configuration, and performs one round trip per command.

use std::io::{self, StderrLock, StdinLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let stdin: StdinLock<'static> = io::stdin().lock();
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    spire_cli::run(std::env::args_os(), stdin, &mut stdout, &mut stderr)
}
