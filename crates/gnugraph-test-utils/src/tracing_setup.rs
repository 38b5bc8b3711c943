//! Tracing helpers for tests.
//!
//! [`init_test_tracing`] prints session and pipe events through the test
//! harness. [`capture_diagnostics`] is for tests that assert on the warnings
//! and errors a session logs instead of returning.

use gnugraph_core::{DiagnosticCollector, DiagnosticReader};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Diagnostics kept by [`capture_diagnostics`]; tests never log more.
const CAPTURE_CAPACITY: usize = 64;

/// Install a global fmt subscriber writing through the test harness.
///
/// Honours `RUST_LOG` and defaults to `warn`. Only the first call installs
/// anything, and it does not conflict with `#[test_log::test]`.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Capture warn/error diagnostics on the current thread until the guard drops.
///
/// ```ignore
/// let (diagnostics, _guard) = capture_diagnostics();
/// session.enable_gif_output("a");
/// session.enable_gif_output("b");
/// assert_eq!(diagnostics.len(), 1);
/// ```
pub fn capture_diagnostics() -> (DiagnosticReader, DefaultGuard) {
    let collector = DiagnosticCollector::new(CAPTURE_CAPACITY);
    let reader = collector.reader();
    let guard = tracing_subscriber::registry().with(collector).set_default();
    (reader, guard)
}
