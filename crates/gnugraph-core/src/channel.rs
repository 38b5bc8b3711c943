//! Text transport to a child process.
//!
//! A [`ChildProcessChannel`] owns one child process and its pipes. The plot
//! session only ever talks to this trait, so the OS plumbing stays behind a
//! single seam and tests can substitute a recording double.
//!
//! ## Read semantics
//!
//! [`read`](ChildProcessChannel::read) never waits for the child. It returns
//! whatever reply bytes are already buffered, capped at one read buffer, or an
//! empty string when the child has been silent. A long reply can therefore
//! arrive split across several reads, and a read issued right after a write
//! usually returns nothing because the child has not answered yet. Use
//! [`read_within`](ChildProcessChannel::read_within) to give the child a bounded
//! amount of time to start answering.
//!
//! Replies are never dropped. Output the caller does not read keeps
//! accumulating in the channel, so a caller that flushes often without
//! reading should drain it with repeated reads.

/// Production channel backed by OS pipes to a spawned executable.
pub mod pipe;

use std::path::PathBuf;
use std::time::Duration;

pub use pipe::PipeChannel;

/// Command that asks the child to exit before its pipes are closed.
pub const QUIT_COMMAND: &str = "quit\n";

/// Errors from the child-process transport.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("failed to spawn {path}: {source}")]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("child process pipe unavailable: {0}")]
    MissingPipe(&'static str),

    #[error("write to child failed after {written} of {expected} bytes: {source}")]
    Write {
        written: usize,
        expected: usize,
        source: std::io::Error,
    },

    #[error("channel is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bidirectional text pipe to one child process.
pub trait ChildProcessChannel: Send {
    /// Human-readable name of this channel (used in logs).
    fn name(&self) -> &str;

    /// Send `text` to the child's standard input in one call.
    fn write(&mut self, text: &str) -> Result<(), ChannelError>;

    /// Return buffered reply text without waiting. Empty when nothing is pending.
    fn read(&mut self) -> Result<String, ChannelError>;

    /// Wait up to `wait` for reply text to appear, then behave like [`read`](Self::read).
    fn read_within(&mut self, wait: Duration) -> Result<String, ChannelError> {
        let _ = wait;
        self.read()
    }

    /// Whether the child is still accepting input.
    fn is_alive(&mut self) -> bool;

    /// Ask the child to quit and release every handle. Idempotent.
    fn close(&mut self) -> Result<(), ChannelError>;
}
