#![deny(unsafe_code)]

//! Configuration loading and validation for gnugraph.
//!
//! Loads TOML configuration files and validates them. [`GraphConfig`] is the
//! central configuration structure: where the gnuplot executable lives, how
//! the pipe transport reads replies, how the plot session formats data, and
//! where file-based output lands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Child process (gnuplot) configuration.
    #[serde(default)]
    pub gnuplot: GnuplotConfig,

    /// Plot session defaults.
    #[serde(default)]
    pub session: SessionConfig,

    /// File-based output configuration.
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the gnuplot child process is launched and read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GnuplotConfig {
    /// Path to the gnuplot executable. Spawned with no arguments.
    #[serde(default = "default_executable")]
    pub executable: PathBuf,

    /// Maximum number of reply bytes returned by a single read.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    /// How long a flush waits for the first reply chunk (0 = pure probe).
    #[serde(default)]
    pub reply_wait_ms: u64,

    /// How long teardown waits for gnuplot to exit after `quit` before killing it.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl Default for GnuplotConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            read_buffer_size: default_read_buffer_size(),
            reply_wait_ms: 0,
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl GnuplotConfig {
    /// Reply wait as a [`Duration`].
    pub fn reply_wait(&self) -> Duration {
        Duration::from_millis(self.reply_wait_ms)
    }

    /// Shutdown timeout as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn default_executable() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:/Program Files/gnuplot/bin/gnuplot.exe")
    } else {
        PathBuf::from("gnuplot")
    }
}

fn default_read_buffer_size() -> usize {
    4096
}

fn default_shutdown_timeout_ms() -> u64 {
    2000
}

/// Plot session defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// gnuplot `with` style applied to every line series (e.g. "lines", "points").
    #[serde(default = "default_line_style")]
    pub line_style: String,

    /// Significant digits used when formatting numbers.
    #[serde(default = "default_precision")]
    pub precision: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            line_style: default_line_style(),
            precision: default_precision(),
        }
    }
}

fn default_line_style() -> String {
    "lines".to_string()
}

fn default_precision() -> usize {
    12
}

/// File-based output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory that receives image-sequence frames. Created on demand.
    #[serde(default = "default_output_directory")]
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

fn default_output_directory() -> String {
    "output".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Highest precision that still round-trips an `f64`.
pub const MAX_PRECISION: usize = 17;

impl GraphConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "Loaded config file");
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: GraphConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gnuplot.executable.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "gnuplot.executable must not be empty".to_string(),
            ));
        }
        if self.gnuplot.read_buffer_size == 0 {
            return Err(ConfigError::Validation(
                "gnuplot.read_buffer_size must be non-zero".to_string(),
            ));
        }
        if self.session.line_style.trim().is_empty() {
            return Err(ConfigError::Validation(
                "session.line_style must not be empty".to_string(),
            ));
        }
        if self.session.precision == 0 || self.session.precision > MAX_PRECISION {
            return Err(ConfigError::Validation(format!(
                "session.precision must be in 1..={MAX_PRECISION}, got {}",
                self.session.precision
            )));
        }
        if self.output.directory.is_empty() {
            return Err(ConfigError::Validation(
                "output.directory must not be empty".to_string(),
            ));
        }
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }
        Ok(())
    }
}
