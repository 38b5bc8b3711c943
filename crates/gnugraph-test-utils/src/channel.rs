//! In-memory channel doubles.
//!
//! [`RecordingChannel`] stands in for a gnuplot child process: it records
//! every write and hands back scripted (or echoed) replies. Clone it before
//! boxing it into a session; the clone is a handle onto the same state.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::{Arc, Mutex, MutexGuard};

use gnugraph_config::GraphConfig;
use gnugraph_core::channel::QUIT_COMMAND;
use gnugraph_core::{ChannelError, ChildProcessChannel, PlotSession};

#[derive(Debug, Default)]
struct ChannelState {
    writes: Vec<String>,
    replies: VecDeque<String>,
    echo: bool,
    fail_writes: bool,
    closed: bool,
}

/// A [`ChildProcessChannel`] that records writes instead of spawning anything.
#[derive(Debug, Clone, Default)]
pub struct RecordingChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl RecordingChannel {
    /// A silent child: reads return only replies queued with [`queue_reply`](Self::queue_reply).
    pub fn new() -> Self {
        Self::default()
    }

    /// A child that echoes everything written to it, like `cat`.
    pub fn echoing() -> Self {
        let channel = Self::default();
        channel.state().echo = true;
        channel
    }

    fn state(&self) -> MutexGuard<'_, ChannelState> {
        // A panicking test thread must not hide the recorded writes.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every write so far, one entry per call.
    pub fn writes(&self) -> Vec<String> {
        self.state().writes.clone()
    }

    /// Every write so far, concatenated.
    pub fn transcript(&self) -> String {
        self.state().writes.concat()
    }

    /// Lines written so far, across all writes.
    pub fn lines(&self) -> Vec<String> {
        self.transcript().lines().map(str::to_string).collect()
    }

    /// Make the next read return `reply`.
    pub fn queue_reply(&self, reply: impl Into<String>) {
        self.state().replies.push_back(reply.into());
    }

    /// Make every subsequent write fail as if the pipe were broken.
    pub fn fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Forget recorded writes (replies stay queued).
    pub fn clear(&self) {
        self.state().writes.clear();
    }
}

impl ChildProcessChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn write(&mut self, text: &str) -> Result<(), ChannelError> {
        let mut state = self.state();
        if state.closed {
            return Err(ChannelError::Closed);
        }
        if state.fail_writes {
            return Err(ChannelError::Write {
                written: 0,
                expected: text.len(),
                source: ErrorKind::BrokenPipe.into(),
            });
        }
        state.writes.push(text.to_string());
        if state.echo {
            state.replies.push_back(text.to_string());
        }
        Ok(())
    }

    fn read(&mut self) -> Result<String, ChannelError> {
        Ok(self.state().replies.drain(..).collect())
    }

    fn is_alive(&mut self) -> bool {
        !self.state().closed
    }

    fn close(&mut self) -> Result<(), ChannelError> {
        let mut state = self.state();
        if !state.closed {
            state.writes.push(QUIT_COMMAND.to_string());
            state.closed = true;
        }
        Ok(())
    }
}

/// A session wired to a fresh [`RecordingChannel`], plus a handle to inspect it.
pub fn recording_session(config: &GraphConfig) -> (PlotSession, RecordingChannel) {
    let channel = RecordingChannel::new();
    let session = PlotSession::new(Box::new(channel.clone()), config);
    (session, channel)
}

/// Like [`recording_session`], but the channel echoes every write back.
pub fn echoing_session(config: &GraphConfig) -> (PlotSession, RecordingChannel) {
    let channel = RecordingChannel::echoing();
    let session = PlotSession::new(Box::new(channel.clone()), config);
    (session, channel)
}
