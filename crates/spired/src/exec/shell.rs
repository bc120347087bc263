//! Shell-backed [`CommandRunner`].

use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::guard::ChildGuard;
use super::output::{Captured, OutputCollector};
use super::{CommandOutput, CommandRunner, EXEC_TARGET, ExecutionError, MAX_OUTPUT_BYTES};
use crate::transport::CancellationToken;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Time allowed for background processes to release the output pipe after
/// the shell itself exits.
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// Runs each command line with `<shell> -c <line>`.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
    timeout: Duration,
    output_limit: usize,
}

impl ShellRunner {
    /// Creates a runner that kills commands exceeding `timeout`.
    #[must_use]
    pub fn new(shell: impl Into<String>, timeout: Duration) -> Self {
        Self {
            shell: shell.into(),
            timeout,
            output_limit: MAX_OUTPUT_BYTES,
        }
    }

    /// Overrides the captured-output limit.
    #[must_use]
    pub const fn with_output_limit(mut self, limit: usize) -> Self {
        self.output_limit = limit;
        self
    }

    fn spawn(&self, line: &str) -> Result<(ChildGuard, OutputCollector), ExecutionError> {
        let (reader, writer) = io::pipe().map_err(|source| ExecutionError::Capture { source })?;
        let stderr = writer
            .try_clone()
            .map_err(|source| ExecutionError::Capture { source })?;
        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(line)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(stderr)
            .process_group(0);
        let child = command.spawn().map_err(|source| ExecutionError::Spawn {
            shell: self.shell.clone(),
            source,
        })?;
        let guard = ChildGuard::new(child);
        // The command still holds the parent's copies of the write end; the
        // collector only sees end-of-file once they are closed.
        drop(command);
        let collector = OutputCollector::spawn(reader, self.output_limit)
            .map_err(|source| ExecutionError::Capture { source })?;
        Ok((guard, collector))
    }

    fn wait_for_exit(
        &self,
        guard: &mut ChildGuard,
        cancellation: &CancellationToken,
    ) -> Result<ExitStatus, ExecutionError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(status) = guard
                .try_wait()
                .map_err(|source| ExecutionError::Wait { source })?
            {
                return Ok(status);
            }
            if cancellation.is_cancelled() {
                guard.terminate();
                return Err(ExecutionError::Cancelled);
            }
            if Instant::now() >= deadline {
                guard.terminate();
                warn!(
                    target: EXEC_TARGET,
                    timeout_ms = millis(self.timeout),
                    "command timed out"
                );
                return Err(ExecutionError::TimedOut {
                    timeout_ms: millis(self.timeout),
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(
        &self,
        command: &str,
        cancellation: &CancellationToken,
    ) -> Result<CommandOutput, ExecutionError> {
        let started = Instant::now();
        let (mut guard, collector) = self.spawn(command)?;
        let status = self.wait_for_exit(&mut guard, cancellation)?;
        let captured = collect_output(&guard, &collector)?;
        // Group members that redirected their output away never touch the
        // pipe, so they are still running here.
        guard.terminate();
        debug!(
            target: EXEC_TARGET,
            status = ?status.code(),
            bytes = captured.bytes.len(),
            truncated = captured.truncated,
            elapsed_ms = millis(started.elapsed()),
            "command finished"
        );
        Ok(CommandOutput {
            data: String::from_utf8_lossy(&captured.bytes).into_owned(),
            status: status.code(),
            truncated: captured.truncated,
        })
    }
}

/// Reads the remaining output once the shell has exited, killing any
/// background processes that keep the pipe open past the grace period.
fn collect_output(
    guard: &ChildGuard,
    collector: &OutputCollector,
) -> Result<Captured, ExecutionError> {
    let result = match collector.wait(OUTPUT_GRACE) {
        Some(result) => result,
        None => {
            debug!(target: EXEC_TARGET, "killing processes holding the output pipe");
            guard.kill_group();
            collector
                .wait(OUTPUT_GRACE)
                .ok_or(ExecutionError::OutputHeld)?
        }
    };
    result.map_err(|source| ExecutionError::Capture { source })
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn runner() -> ShellRunner {
        ShellRunner::new("/bin/sh", Duration::from_secs(5))
    }

    #[rstest]
    fn captures_stdout(runner: ShellRunner) {
        let output = runner
            .run("echo hello", &CancellationToken::new())
            .expect("run echo");
        assert_eq!(output.data, "hello\n");
        assert_eq!(output.status, Some(0));
        assert!(!output.truncated);
    }

    #[rstest]
    fn interleaves_stderr_with_stdout(runner: ShellRunner) {
        let output = runner
            .run("echo out; echo err 1>&2; echo done", &CancellationToken::new())
            .expect("run mixed output");
        assert_eq!(output.data, "out\nerr\ndone\n");
    }

    #[rstest]
    fn reports_non_zero_status(runner: ShellRunner) {
        let output = runner
            .run("echo failing; exit 3", &CancellationToken::new())
            .expect("run failing command");
        assert_eq!(output.status, Some(3));
        assert_eq!(output.data, "failing\n");
    }

    #[rstest]
    fn unknown_command_is_output_not_error(runner: ShellRunner) {
        let output = runner
            .run("definitely-not-a-command-spire", &CancellationToken::new())
            .expect("shell reports the failure itself");
        assert_eq!(output.status, Some(127));
        assert!(!output.data.is_empty());
    }

    #[rstest]
    fn signal_termination_has_no_status(runner: ShellRunner) {
        let output = runner
            .run("kill -9 $$", &CancellationToken::new())
            .expect("run self-killing shell");
        assert_eq!(output.status, None);
    }

    #[rstest]
    fn missing_shell_is_a_spawn_error() {
        let runner = ShellRunner::new("/nonexistent/spire-shell", Duration::from_secs(1));
        let error = runner
            .run("true", &CancellationToken::new())
            .expect_err("spawn must fail");
        assert!(matches!(error, ExecutionError::Spawn { .. }));
    }

    #[rstest]
    fn truncates_large_output() {
        let runner = ShellRunner::new("/bin/sh", Duration::from_secs(5)).with_output_limit(16);
        let output = runner
            .run("yes spire | head -n 1000", &CancellationToken::new())
            .expect("run chatty command");
        assert_eq!(output.data.len(), 16);
        assert!(output.truncated);
        assert_eq!(output.status, Some(0));
    }

    #[rstest]
    fn times_out_long_commands() {
        let runner = ShellRunner::new("/bin/sh", Duration::from_millis(100));
        let started = Instant::now();
        let error = runner
            .run("sleep 10", &CancellationToken::new())
            .expect_err("command must time out");
        assert!(matches!(error, ExecutionError::TimedOut { timeout_ms: 100 }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[rstest]
    fn cancellation_stops_the_command(runner: ShellRunner) {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            trigger.cancel();
        });
        let started = Instant::now();
        let error = runner.run("sleep 10", &token).expect_err("must be cancelled");
        canceller.join().expect("join canceller");
        assert!(matches!(error, ExecutionError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[rstest]
    fn background_processes_do_not_hold_the_response(runner: ShellRunner) {
        let started = Instant::now();
        let output = runner
            .run("sleep 10 & echo started", &CancellationToken::new())
            .expect("run backgrounded command");
        assert_eq!(output.data, "started\n");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    fn is_running(pid: &str) -> bool {
        // A killed process may linger as a zombie until its new parent reaps it.
        std::fs::read_to_string(format!("/proc/{pid}/stat")).is_ok_and(|stat| {
            stat.rsplit_once(')')
                .is_some_and(|(_, rest)| !rest.trim_start().starts_with('Z'))
        })
    }

    #[rstest]
    fn background_processes_are_killed_when_the_command_finishes(runner: ShellRunner) {
        let output = runner
            .run(
                "sleep 30 >/dev/null 2>&1 & echo $!",
                &CancellationToken::new(),
            )
            .expect("run detached background job");
        let pid = output.data.trim().to_owned();
        assert!(!pid.is_empty(), "shell must report the job pid");

        let deadline = Instant::now() + Duration::from_secs(2);
        while is_running(&pid) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(!is_running(&pid), "background job {pid} outlived the command");
    }
}
