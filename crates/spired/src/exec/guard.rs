//! Scoped ownership of a child process and its process group.

use std::io;
use std::process::{Child, ExitStatus};

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tracing::{debug, warn};

use super::EXEC_TARGET;

/// Owns a child spawned as the leader of its own process group.
///
/// Dropping the guard kills the whole group, including background jobs the
/// shell left behind after exiting, and reaps the child if it is still
/// pending.
pub(super) struct ChildGuard {
    child: Child,
    group: Pid,
    reaped: bool,
}

impl ChildGuard {
    /// Wraps a child spawned with `process_group(0)`.
    pub(super) fn new(child: Child) -> Self {
        let group = Pid::from_raw(i32::try_from(child.id()).unwrap_or(i32::MAX));
        Self {
            child,
            group,
            reaped: false,
        }
    }

    /// Reaps the child if it has exited.
    pub(super) fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status)
    }

    /// Sends `SIGKILL` to every process in the group.
    pub(super) fn kill_group(&self) {
        match killpg(self.group, Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(error) => warn!(
                target: EXEC_TARGET,
                group = self.group.as_raw(),
                error = %error,
                "failed to signal process group"
            ),
        }
    }

    /// Kills the group and reaps the child unless it was already reaped.
    pub(super) fn terminate(&mut self) {
        self.kill_group();
        if self.reaped {
            return;
        }
        match self.child.wait() {
            Ok(status) => debug!(
                target: EXEC_TARGET,
                group = self.group.as_raw(),
                ?status,
                "terminated command"
            ),
            Err(error) => warn!(
                target: EXEC_TARGET,
                group = self.group.as_raw(),
                error = %error,
                "failed to reap command"
            ),
        }
        self.reaped = true;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}
