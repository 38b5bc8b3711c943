//! Diagnostic sink for transport and session problems.
//!
//! The session reports non-fatal failures (failed writes, conflicting output
//! modes, reply read errors) as `tracing` warnings and errors instead of
//! returning them. [`DiagnosticCollector`] is a `tracing` layer that keeps the
//! most recent of those events so a caller can check, after the fact, whether
//! the gnuplot pipe is still healthy.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// A captured warning or error.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Seconds since the collector was created.
    pub elapsed_secs: f64,
    /// `WARN` or `ERROR`.
    pub level: Level,
    /// Module path that emitted the event.
    pub target: String,
    /// The event message.
    pub message: String,
    /// Value of the `error` field, when the event carried one.
    pub error: Option<String>,
}

#[derive(Debug)]
struct DiagnosticBuffer {
    entries: Vec<Diagnostic>,
    capacity: usize,
    start_time: Instant,
}

impl DiagnosticBuffer {
    fn push(&mut self, level: Level, target: String, visitor: DiagnosticVisitor) {
        if self.entries.len() >= self.capacity {
            self.entries.remove(0);
        }
        self.entries.push(Diagnostic {
            elapsed_secs: self.start_time.elapsed().as_secs_f64(),
            level,
            target,
            message: visitor.message,
            error: visitor.error,
        });
    }
}

/// A `tracing` layer that records warn/error events from this crate.
///
/// Events from other crates and anything below `WARN` are ignored.
#[derive(Debug, Clone)]
pub struct DiagnosticCollector {
    buffer: Arc<Mutex<DiagnosticBuffer>>,
}

impl DiagnosticCollector {
    /// Create a collector that keeps at most `capacity` diagnostics.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(DiagnosticBuffer {
                entries: Vec::with_capacity(capacity.min(64)),
                capacity: capacity.max(1),
                start_time: Instant::now(),
            })),
        }
    }

    /// Get a reader handle for the captured diagnostics.
    pub fn reader(&self) -> DiagnosticReader {
        DiagnosticReader {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl<S: Subscriber> Layer<S> for DiagnosticCollector {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = *metadata.level();
        if level > Level::WARN || !metadata.target().starts_with(env!("CARGO_CRATE_NAME")) {
            return;
        }

        let mut visitor = DiagnosticVisitor::default();
        event.record(&mut visitor);

        if let Ok(mut buf) = self.buffer.lock() {
            buf.push(level, metadata.target().to_string(), visitor);
        }
    }
}

/// A read handle for captured diagnostics.
#[derive(Debug, Clone)]
pub struct DiagnosticReader {
    buffer: Arc<Mutex<DiagnosticBuffer>>,
}

impl DiagnosticReader {
    /// Snapshot of every captured diagnostic, oldest first.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.buffer
            .lock()
            .map(|buf| buf.entries.clone())
            .unwrap_or_default()
    }

    /// Whether any `ERROR` has been captured.
    pub fn has_errors(&self) -> bool {
        self.buffer
            .lock()
            .map(|buf| buf.entries.iter().any(|d| d.level == Level::ERROR))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct DiagnosticVisitor {
    message: String,
    error: Option<String>,
}

impl Visit for DiagnosticVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "error" => self.error = Some(format!("{value:?}")),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "error" => self.error = Some(value.to_string()),
            _ => {}
        }
    }
}
