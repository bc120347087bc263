//! Background capture of a command's combined output.

use std::io::{self, PipeReader, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// Bytes read from the pipe, capped at the collector's limit.
#[derive(Debug, Default)]
pub(super) struct Captured {
    pub(super) bytes: Vec<u8>,
    pub(super) truncated: bool,
}

/// Reads a pipe to end-of-file on a dedicated thread.
///
/// The thread keeps reading past the limit so a chatty command never blocks
/// on a full pipe; the excess is discarded.
pub(super) struct OutputCollector {
    receiver: Receiver<io::Result<Captured>>,
}

impl OutputCollector {
    pub(super) fn spawn(reader: PipeReader, limit: usize) -> io::Result<Self> {
        let (sender, receiver) = mpsc::sync_channel(1);
        thread::Builder::new()
            .name("spired-output".to_owned())
            .spawn(move || {
                // The runner may have given up waiting; nothing to report to.
                drop(sender.send(collect(reader, limit)));
            })?;
        Ok(Self { receiver })
    }

    /// Waits up to `timeout` for end-of-file; `None` if the pipe is still open.
    pub(super) fn wait(&self, timeout: Duration) -> Option<io::Result<Captured>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "output collector stopped unexpectedly",
            ))),
        }
    }
}

fn collect(mut reader: impl Read, limit: usize) -> io::Result<Captured> {
    let mut captured = Captured::default();
    let mut chunk = [0_u8; 8192];
    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => return Ok(captured),
            Ok(read) => read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        };
        let room = limit.saturating_sub(captured.bytes.len());
        let data = chunk.get(..read).unwrap_or_default();
        if read > room {
            captured.truncated = true;
        }
        captured
            .bytes
            .extend_from_slice(data.get(..room.min(read)).unwrap_or_default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"hello\n".as_slice(), 64, b"hello\n".as_slice(), false)]
    #[case(b"0123456789".as_slice(), 4, b"0123".as_slice(), true)]
    #[case(b"".as_slice(), 4, b"".as_slice(), false)]
    #[case(b"abcd".as_slice(), 4, b"abcd".as_slice(), false)]
    fn collect_caps_output(
        #[case] input: &[u8],
        #[case] limit: usize,
        #[case] expected: &[u8],
        #[case] truncated: bool,
    ) {
        let captured = collect(input, limit).expect("collect");
        assert_eq!(captured.bytes, expected);
        assert_eq!(captured.truncated, truncated);
    }
}
