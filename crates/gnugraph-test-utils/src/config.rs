//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`GraphConfig`] values without
//! repeating boilerplate across crate boundaries.

use std::path::PathBuf;
use std::time::Duration;

use gnugraph_config::GraphConfig;
use tempfile::TempDir;

/// Fluent builder for [`GraphConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .executable("cat")
///     .reply_wait(Duration::from_millis(200))
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: GraphConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: GraphConfig::default(),
        }
    }

    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.gnuplot.executable = path.into();
        self
    }

    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.gnuplot.read_buffer_size = size;
        self
    }

    pub fn reply_wait(mut self, wait: Duration) -> Self {
        self.config.gnuplot.reply_wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.gnuplot.shutdown_timeout_ms =
            u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn line_style(mut self, style: &str) -> Self {
        self.config.session.line_style = style.to_string();
        self
    }

    pub fn precision(mut self, precision: usize) -> Self {
        self.config.session.precision = precision;
        self
    }

    pub fn output_directory(mut self, dir: &str) -> Self {
        self.config.output.directory = dir.to_string();
        self
    }

    pub fn build(self) -> GraphConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A temporary directory for file-output tests.
///
/// The directory is deleted when this value is dropped, even on panic.
pub struct TestOutputDir {
    /// `<tempdir>/output`, not created until the session asks for it.
    pub path: String,
    _temp_dir: TempDir,
}

impl TestOutputDir {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("output").to_string_lossy().into_owned();
        Self {
            path,
            _temp_dir: temp_dir,
        }
    }

    /// A config builder whose output directory points here.
    pub fn builder(&self) -> TestConfigBuilder {
        TestConfigBuilder::new().output_directory(&self.path)
    }
}

impl Default for TestOutputDir {
    fn default() -> Self {
        Self::new()
    }
}
