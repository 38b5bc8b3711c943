#![deny(unsafe_code)]

//! Shared test utilities for the gnugraph workspace.
//!
//! Provides a recording stand-in for the gnuplot child process, config
//! builders, and tracing helpers so that individual crate tests stay concise
//! and consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! gnugraph-test-utils = { workspace = true }
//! ```

pub mod channel;
pub mod config;
pub mod tracing_setup;

pub use channel::{RecordingChannel, echoing_session, recording_session};
pub use config::{TestConfigBuilder, TestOutputDir};
pub use tracing_setup::{capture_diagnostics, init_test_tracing};
