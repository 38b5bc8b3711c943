//! Pipe-backed child process channel.
//!
//! Spawns the configured executable with stdin, stdout and stderr redirected
//! to anonymous pipes. The parent's pipe ends are created close-on-exec by the
//! standard library, so the child inherits only its own three handles.
//!
//! Two reader threads drain stdout and stderr into one queue. That queue is
//! what [`read`](ChildProcessChannel::read) probes, which keeps reads
//! non-blocking on every platform without touching raw descriptors.
//!
//! ```text
//!  PlotSession ──write──▶ stdin ─▶ ┌──────────┐
//!                                  │ gnuplot  │
//!  PlotSession ◀──read─── queue ◀─ │ stdout   │ ◀── reader thread
//!                           ▲      │ stderr   │ ◀── reader thread
//!                           └──────└──────────┘
//! ```

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use gnugraph_config::GnuplotConfig;
use tracing::{debug, info, warn};

use super::{ChannelError, ChildProcessChannel, QUIT_COMMAND};

/// Size of each chunk pulled off the child's output pipes.
const PIPE_CHUNK_SIZE: usize = 4096;

/// Poll interval while waiting for the child to exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A running child process reached through OS pipes.
pub struct PipeChannel {
    label: String,
    executable: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    replies: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    readers: Vec<JoinHandle<()>>,
    read_buffer_size: usize,
    shutdown_timeout: Duration,
}

impl PipeChannel {
    /// Spawn the executable named in `config` and connect to its pipes.
    pub fn spawn(config: &GnuplotConfig) -> Result<Self, ChannelError> {
        let executable = config.executable.clone();
        let label = executable
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "child".to_string());

        let mut command = Command::new(&executable);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        detach(&mut command);

        let mut child = command.spawn().map_err(|source| ChannelError::Spawn {
            path: executable.clone(),
            source,
        })?;

        let pipes = (child.stdin.take(), child.stdout.take(), child.stderr.take());
        let (Some(stdin), Some(stdout), Some(stderr)) = pipes else {
            abandon(&mut child);
            return Err(ChannelError::MissingPipe("stdio"));
        };

        let (tx, replies) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        for (stream, source) in [
            ("stdout", Box::new(stdout) as Box<dyn Read + Send>),
            ("stderr", Box::new(stderr) as Box<dyn Read + Send>),
        ] {
            match spawn_reader(&label, stream, source, tx.clone()) {
                Ok(handle) => readers.push(handle),
                Err(e) => {
                    abandon(&mut child);
                    return Err(ChannelError::Io(e));
                }
            }
        }

        info!(
            channel = %label,
            path = %executable.display(),
            pid = child.id(),
            "Spawned child process"
        );

        Ok(Self {
            label,
            executable,
            child: Some(child),
            stdin: Some(stdin),
            replies,
            pending: VecDeque::new(),
            readers,
            read_buffer_size: config.read_buffer_size.max(1),
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// Path of the spawned executable.
    pub fn executable(&self) -> &PathBuf {
        &self.executable
    }

    /// OS process id of the child, while it is owned.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Move every chunk the reader threads have produced into `pending`.
    ///
    /// Nothing is discarded: output the caller never reads stays queued here
    /// until the channel is dropped.
    fn drain_ready(&mut self) {
        loop {
            match self.replies.try_recv() {
                Ok(chunk) => self.pending.extend(chunk),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Take at most one read buffer from `pending` without splitting a UTF-8 sequence.
    fn take_pending(&mut self) -> String {
        let mut take = self.pending.len().min(self.read_buffer_size);
        if take < self.pending.len() {
            let mut boundary = take;
            while boundary > 0 && is_continuation(self.pending[boundary]) {
                boundary -= 1;
            }
            if boundary > 0 {
                take = boundary;
            }
        }
        let bytes: Vec<u8> = self.pending.drain(..take).collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn wait_for_exit(&mut self, child: &mut Child) -> Result<(), ChannelError> {
        let deadline = Instant::now() + self.shutdown_timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                info!(channel = %self.label, %status, "Child process exited");
                return Ok(());
            }
            if Instant::now() >= deadline {
                break;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }

        warn!(
            channel = %self.label,
            timeout = ?self.shutdown_timeout,
            "Child ignored quit, killing it"
        );
        child.kill()?;
        let status = child.wait()?;
        debug!(channel = %self.label, %status, "Child process reaped");
        Ok(())
    }
}

impl ChildProcessChannel for PipeChannel {
    fn name(&self) -> &str {
        &self.label
    }

    fn write(&mut self, text: &str) -> Result<(), ChannelError> {
        let stdin = self.stdin.as_mut().ok_or(ChannelError::Closed)?;
        let bytes = text.as_bytes();
        let mut written = 0;
        while written < bytes.len() {
            match stdin.write(&bytes[written..]) {
                Ok(0) => {
                    return Err(ChannelError::Write {
                        written,
                        expected: bytes.len(),
                        source: ErrorKind::WriteZero.into(),
                    });
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(source) => {
                    return Err(ChannelError::Write {
                        written,
                        expected: bytes.len(),
                        source,
                    });
                }
            }
        }
        stdin.flush().map_err(|source| ChannelError::Write {
            written,
            expected: bytes.len(),
            source,
        })?;
        debug!(channel = %self.label, bytes = written, "Wrote to child");
        Ok(())
    }

    fn read(&mut self) -> Result<String, ChannelError> {
        self.drain_ready();
        if self.pending.is_empty() {
            return Ok(String::new());
        }
        let reply = self.take_pending();
        debug!(
            channel = %self.label,
            bytes = reply.len(),
            remaining = self.pending.len(),
            "Read reply"
        );
        Ok(reply)
    }

    fn read_within(&mut self, wait: Duration) -> Result<String, ChannelError> {
        self.drain_ready();
        if self.pending.is_empty() && !wait.is_zero() {
            match self.replies.recv_timeout(wait) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {}
            }
        }
        self.read()
    }

    fn is_alive(&mut self) -> bool {
        if self.stdin.is_none() {
            return false;
        }
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(None)) => true,
            Some(Ok(Some(_)) | Err(_)) | None => false,
        }
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin
                .write_all(QUIT_COMMAND.as_bytes())
                .and_then(|()| stdin.flush())
            {
                debug!(channel = %self.label, error = %e, "Could not send quit");
            }
            // Dropping stdin delivers EOF to the child.
        }

        let result = self.wait_for_exit(&mut child);

        // Helpers started by the child may keep the output pipes open; only
        // join readers that have already seen EOF and leave the rest detached.
        for handle in self.readers.drain(..) {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
        result
    }
}

impl Drop for PipeChannel {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(channel = %self.label, error = %e, "Failed to shut down child process");
        }
    }
}

impl std::fmt::Debug for PipeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeChannel")
            .field("label", &self.label)
            .field("executable", &self.executable)
            .field("pid", &self.id())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

/// Keep the child out of the terminal's foreground job and focus.
#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    command.creation_flags(DETACHED_PROCESS);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}

fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_reader(
    label: &str,
    stream: &'static str,
    source: Box<dyn Read + Send>,
    tx: Sender<Vec<u8>>,
) -> std::io::Result<JoinHandle<()>> {
    let label = label.to_string();
    thread::Builder::new()
        .name(format!("{label}-{stream}"))
        .spawn(move || reader_loop(&label, stream, source, &tx))
}

fn reader_loop(label: &str, stream: &str, mut source: Box<dyn Read + Send>, tx: &Sender<Vec<u8>>) {
    let mut buffer = [0u8; PIPE_CHUNK_SIZE];
    loop {
        match source.read(&mut buffer) {
            Ok(0) => {
                debug!(channel = %label, stream, "Reader reached EOF");
                break;
            }
            Ok(n) => {
                if tx.send(buffer[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                debug!(channel = %label, stream, error = %e, "Reader failed");
                break;
            }
        }
    }
}
