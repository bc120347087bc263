//! Entry point for the `spired` listener.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Unlocked handles: worker threads log to stderr while the listener runs.
    spired::cli::run(std::env::args_os(), &mut io::stdout(), &mut io::stderr())
}
