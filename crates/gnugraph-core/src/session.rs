//! Stateful plot builder on top of a [`ChildProcessChannel`].
//!
//! Series are queued with the `add_*` methods and sent to gnuplot in one
//! payload by a flush ([`plot`](PlotSession::plot) or
//! [`plot_3d`](PlotSession::plot_3d)). The session remembers whether the
//! current mode has already been set up, so only the first flush in a mode
//! declares every trace; later flushes send `replot` plus fresh data.
//!
//! ```text
//!                 first flush in mode            later flushes
//!  Uninitialized ───────────────────────▶ Ready ──────────────▶ Ready
//!        ▲        plot/splot + clauses            replot
//!        │
//!        └──── 2D ↔ 3D switch writes `clear` and resets setup
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use gnugraph_config::GraphConfig;
use tracing::{debug, error, info, warn};

use crate::channel::{ChannelError, ChildProcessChannel, PipeChannel};
use crate::format::{Formatter, Point2, Point3, Value};

/// Terminates one inline data block.
pub const SENTINEL_LINE: &str = "e\n";
/// Resets gnuplot's display context on a mode switch.
pub const CLEAR_COMMAND: &str = "clear\n";
/// Re-renders the declared traces with the data that follows.
pub const REPLOT_COMMAND: &str = "replot\n";
/// Closes the current output file.
pub const UNSET_OUTPUT_COMMAND: &str = "unset output\n";

const VECTOR_STYLE: &str = "vectors filled head lw 2";

/// Plot dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotMode {
    /// `plot` with `x y` records.
    TwoD,
    /// `splot` with `x y z` records.
    ThreeD,
}

impl fmt::Display for PlotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlotMode::TwoD => write!(f, "2d"),
            PlotMode::ThreeD => write!(f, "3d"),
        }
    }
}

/// File-based output for 3D plots. Only one may ever be configured.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Render to gnuplot's interactive terminal.
    #[default]
    None,
    /// Append every frame to the animated GIF `<name>.gif`.
    Gif { name: String },
    /// Write every frame to `<dir>/<name><frame>.png`.
    ImageSequence { name: String },
}

/// Errors raised when a caller breaks a session contract.
///
/// Transport failures are not reported here; they are logged and the session
/// carries on.
#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    #[error("series length mismatch: {xs} x values, {ys} y values")]
    LengthMismatch { xs: usize, ys: usize },

    #[error("sparse stride must be at least 1")]
    InvalidStride,

    #[error("nothing queued to plot")]
    NothingQueued,

    #[error("vector series can only be drawn by a 3D plot")]
    VectorsRequire3d,

    #[error("failed to create output directory {path}: {source}")]
    OutputDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// One queued trace: its title and its newline-separated records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    pub title: String,
    pub records: String,
}

impl Series {
    fn new(title: &str, records: String) -> Self {
        Self {
            title: title.to_string(),
            records,
        }
    }
}

/// A plotting session bound to one gnuplot child process.
pub struct PlotSession {
    channel: Box<dyn ChildProcessChannel>,
    formatter: Formatter,
    mode: PlotMode,
    initialized: bool,
    line_style: String,
    pending: Vec<Series>,
    pending_vectors: Vec<Series>,
    output: OutputMode,
    output_applied: bool,
    output_dir: String,
    frame_id: u32,
    reply_wait: Duration,
}

impl PlotSession {
    /// Build a session around an already-open channel.
    pub fn new(channel: Box<dyn ChildProcessChannel>, config: &GraphConfig) -> Self {
        Self {
            channel,
            formatter: Formatter::new(config.session.precision),
            mode: PlotMode::TwoD,
            initialized: false,
            line_style: config.session.line_style.clone(),
            pending: Vec::new(),
            pending_vectors: Vec::new(),
            output: OutputMode::None,
            output_applied: false,
            output_dir: config.output.directory.clone(),
            frame_id: 1,
            reply_wait: config.gnuplot.reply_wait(),
        }
    }

    /// Spawn the configured gnuplot executable and open a session on it.
    pub fn launch(config: &GraphConfig) -> Result<Self, PlotError> {
        let channel = PipeChannel::spawn(&config.gnuplot)?;
        Ok(Self::new(Box::new(channel), config))
    }

    // ── State accessors ─────────────────────────────────────────────

    pub fn mode(&self) -> PlotMode {
        self.mode
    }

    /// Whether the current mode's setup directive has been sent.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn line_style(&self) -> &str {
        &self.line_style
    }

    pub fn output_mode(&self) -> &OutputMode {
        &self.output
    }

    /// Number of the image-sequence frame currently being written.
    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    /// Series queued for the next flush, vector series excluded.
    pub fn pending_series(&self) -> &[Series] {
        &self.pending
    }

    pub fn pending_vector_series(&self) -> &[Series] {
        &self.pending_vectors
    }

    /// Set the `with` style used by the next setup directive.
    pub fn set_line_style(&mut self, style: impl Into<String>) {
        self.line_style = style.into();
    }

    // ── Queueing ────────────────────────────────────────────────────

    /// Queue an `x y` series.
    pub fn add_series(&mut self, xs: &[f64], ys: &[f64], title: &str) -> Result<(), PlotError> {
        if xs.len() != ys.len() {
            return Err(PlotError::LengthMismatch {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        let mut records = String::new();
        for (&x, &y) in xs.iter().zip(ys) {
            records.push_str(&self.formatter.format_all(&[Value::Scalar(x), Value::Scalar(y)]));
            records.push('\n');
        }
        self.pending.push(Series::new(title, records));
        Ok(())
    }

    /// Queue a single 2D point as its own series.
    pub fn add_point_2d(&mut self, point: Point2, title: &str) {
        let records = self.record(Value::Point2(point));
        self.pending.push(Series::new(title, records));
    }

    /// Queue a single 3D point as its own series.
    pub fn add_point_3d(&mut self, point: Point3, title: &str) {
        let records = self.record(Value::Point3(point));
        self.pending.push(Series::new(title, records));
    }

    /// Queue a 3D polyline, one record per point.
    pub fn add_line_series_3d(&mut self, points: &[Point3], title: &str) {
        let records = points
            .iter()
            .map(|&p| self.record(Value::Point3(p)))
            .collect();
        self.pending.push(Series::new(title, records));
    }

    /// Queue every `stride`-th point of a 3D polyline plus the full tail after
    /// the last sampled index, so the newest samples are never decimated.
    pub fn add_sparse_line_series_3d(
        &mut self,
        points: &[Point3],
        stride: usize,
        title: &str,
    ) -> Result<(), PlotError> {
        let indices = sparse_indices(points.len(), stride).ok_or(PlotError::InvalidStride)?;
        let records = indices
            .into_iter()
            .map(|i| self.record(Value::Point3(points[i])))
            .collect();
        self.pending.push(Series::new(title, records));
        Ok(())
    }

    /// Queue an arrow from `origin` along `direction`. Only a 3D flush draws it.
    pub fn add_vector_series_3d(&mut self, origin: Point3, direction: Point3, title: &str) {
        let mut records = self
            .formatter
            .format_all(&[Value::Point3(origin), Value::Point3(direction)]);
        records.push('\n');
        self.pending_vectors.push(Series::new(title, records));
    }

    fn record(&self, value: Value<'_>) -> String {
        let mut line = self.formatter.format(value);
        line.push('\n');
        line
    }

    // ── Flushing ────────────────────────────────────────────────────

    /// Send every queued series as a 2D plot and return the child's reply.
    pub fn plot(&mut self) -> Result<String, PlotError> {
        self.flush(PlotMode::TwoD)
    }

    /// Send every queued series and vector as a 3D plot and return the child's reply.
    pub fn plot_3d(&mut self) -> Result<String, PlotError> {
        self.flush(PlotMode::ThreeD)
    }

    /// Queue preformatted record text verbatim and plot it in 2D.
    pub fn plot_raw(&mut self, text: &str) -> Result<String, PlotError> {
        self.pending.push(Series::new("", text.to_string()));
        self.plot()
    }

    /// Queue an `x y` series and plot it.
    pub fn plot_series(&mut self, xs: &[f64], ys: &[f64], title: &str) -> Result<String, PlotError> {
        self.add_series(xs, ys, title)?;
        self.plot()
    }

    /// Plot a single untitled 2D point.
    pub fn plot_point(&mut self, point: Point2) -> Result<String, PlotError> {
        self.add_point_2d(point, "");
        self.plot()
    }

    /// Plot a single untitled 3D point.
    pub fn plot_point_3d(&mut self, point: Point3) -> Result<String, PlotError> {
        self.add_point_3d(point, "");
        self.plot_3d()
    }

    /// Queue a 3D polyline and plot it.
    pub fn plot_line_3d(&mut self, points: &[Point3], title: &str) -> Result<String, PlotError> {
        self.add_line_series_3d(points, title);
        self.plot_3d()
    }

    /// Queue several untitled 3D polylines and plot them together.
    pub fn plot_lines_3d(&mut self, lines: &[Vec<Point3>]) -> Result<String, PlotError> {
        for line in lines {
            self.add_line_series_3d(line, "");
        }
        self.plot_3d()
    }

    /// Replot a growing prefix of the series once per sample.
    ///
    /// Returns every reply concatenated.
    pub fn animate(&mut self, xs: &[f64], ys: &[f64]) -> Result<String, PlotError> {
        if xs.len() != ys.len() {
            return Err(PlotError::LengthMismatch {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        let mut replies = String::new();
        for end in 1..=xs.len() {
            replies.push_str(&self.plot_series(&xs[..end], &ys[..end], "")?);
        }
        Ok(replies)
    }

    /// Replot a growing prefix of a 3D polyline once per point.
    pub fn animate_line_3d(&mut self, points: &[Point3]) -> Result<String, PlotError> {
        let mut replies = String::new();
        for end in 1..=points.len() {
            replies.push_str(&self.plot_line_3d(&points[..end], "")?);
        }
        Ok(replies)
    }

    fn flush(&mut self, mode: PlotMode) -> Result<String, PlotError> {
        if self.pending.is_empty() && self.pending_vectors.is_empty() {
            return Err(PlotError::NothingQueued);
        }
        if mode == PlotMode::TwoD && !self.pending_vectors.is_empty() {
            return Err(PlotError::VectorsRequire3d);
        }

        if self.mode != mode {
            debug!(from = %self.mode, to = %mode, "Switching plot mode");
            self.mode = mode;
            self.initialized = false;
            self.send(CLEAR_COMMAND);
        }

        let mut payload = String::new();
        if self.initialized {
            payload.push_str(REPLOT_COMMAND);
        } else {
            if mode == PlotMode::ThreeD {
                self.apply_output(&mut payload);
            }
            payload.push_str(&self.setup_directive(mode));
            self.initialized = true;
        }

        let series = self.pending.len() + self.pending_vectors.len();
        for s in self.pending.drain(..).chain(self.pending_vectors.drain(..)) {
            payload.push_str(&s.records);
            payload.push_str(SENTINEL_LINE);
        }
        debug!(%mode, series, bytes = payload.len(), "Flushing plot");
        self.send(&payload);

        if self.output_applied && matches!(self.output, OutputMode::ImageSequence { .. }) {
            self.frame_id = self.frame_id.saturating_add(1);
            let directive = self.frame_directive();
            self.send(&directive);
        }

        Ok(self.read_reply_within(self.reply_wait))
    }

    /// The `plot`/`splot` command declaring one trace per queued series.
    fn setup_directive(&self, mode: PlotMode) -> String {
        let (command, columns) = match mode {
            PlotMode::TwoD => ("plot", "1:2"),
            PlotMode::ThreeD => ("splot", "1:2:3"),
        };
        let mut clauses: Vec<String> = self
            .pending
            .iter()
            .map(|s| clause(columns, &s.title, &self.line_style))
            .collect();
        if mode == PlotMode::ThreeD {
            clauses.extend(
                self.pending_vectors
                    .iter()
                    .map(|s| clause("1:2:3:4:5:6", &s.title, VECTOR_STYLE)),
            );
        }
        format!("{command} {}\n", clauses.join(", "))
    }

    // ── File output ─────────────────────────────────────────────────

    /// Render 3D plots into the animated GIF `<name>.gif`.
    ///
    /// Ignored with a warning when an output mode is already configured.
    pub fn enable_gif_output(&mut self, name: &str) {
        if self.reject_output_change("gif", name) {
            return;
        }
        self.output = OutputMode::Gif {
            name: name.to_string(),
        };
        info!(name, "GIF output enabled");
    }

    /// Render each 3D flush into its own numbered PNG in the output directory.
    ///
    /// Creates the directory. Ignored with a warning when an output mode is
    /// already configured.
    pub fn enable_image_sequence_output(&mut self, name: &str) -> Result<(), PlotError> {
        if self.reject_output_change("image-sequence", name) {
            return Ok(());
        }
        std::fs::create_dir_all(&self.output_dir).map_err(|source| PlotError::OutputDirectory {
            path: PathBuf::from(&self.output_dir),
            source,
        })?;
        self.output = OutputMode::ImageSequence {
            name: name.to_string(),
        };
        info!(name, dir = %self.output_dir, "Image sequence output enabled");
        Ok(())
    }

    /// Close the current output file and return the child's reply.
    pub fn close_output(&mut self) -> String {
        self.send(UNSET_OUTPUT_COMMAND);
        self.read_reply_within(self.reply_wait)
    }

    fn reject_output_change(&self, requested: &str, name: &str) -> bool {
        if self.output == OutputMode::None {
            return false;
        }
        warn!(
            requested,
            name,
            active = ?self.output,
            "Output mode already configured, ignoring request"
        );
        true
    }

    fn apply_output(&mut self, payload: &mut String) {
        if self.output_applied {
            return;
        }
        match &self.output {
            OutputMode::None => return,
            OutputMode::Gif { name } => {
                payload.push_str("set terminal gif animate delay .001\n");
                payload.push_str(&format!("set output '{name}.gif'\n"));
            }
            OutputMode::ImageSequence { .. } => {
                payload.push_str("set terminal pngcairo\n");
                payload.push_str(&self.frame_directive());
            }
        }
        self.output_applied = true;
    }

    /// `set output` naming the current frame, zero-padded to at least five digits.
    fn frame_directive(&self) -> String {
        let name = match &self.output {
            OutputMode::ImageSequence { name } => name.as_str(),
            OutputMode::None | OutputMode::Gif { .. } => "",
        };
        format!(
            "set output '{}/{}{:05}.png'\n",
            self.output_dir, name, self.frame_id
        )
    }

    // ── Transport ───────────────────────────────────────────────────

    /// Return reply text that is already buffered, without waiting.
    ///
    /// A reply may be split across calls; keep reading to collect the rest.
    pub fn read_reply(&mut self) -> String {
        match self.channel.read() {
            Ok(reply) => reply,
            Err(e) => {
                error!(channel = %self.channel.name(), error = %e, "Reading reply failed");
                String::new()
            }
        }
    }

    /// Wait up to `wait` for reply text, then return what is buffered.
    pub fn read_reply_within(&mut self, wait: Duration) -> String {
        match self.channel.read_within(wait) {
            Ok(reply) => reply,
            Err(e) => {
                error!(channel = %self.channel.name(), error = %e, "Reading reply failed");
                String::new()
            }
        }
    }

    /// Whether the child process still accepts commands.
    pub fn is_alive(&mut self) -> bool {
        self.channel.is_alive()
    }

    /// Send `quit` to the child and release the channel now rather than on drop.
    pub fn shutdown(mut self) -> Result<(), ChannelError> {
        self.channel.close()
    }

    fn send(&mut self, text: &str) {
        if let Err(e) = self.channel.write(text) {
            error!(channel = %self.channel.name(), error = %e, "Write to child failed");
        }
    }
}

impl Drop for PlotSession {
    fn drop(&mut self) {
        if let Err(e) = self.channel.close() {
            warn!(channel = %self.channel.name(), error = %e, "Failed to close channel");
        }
    }
}

impl fmt::Debug for PlotSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlotSession")
            .field("channel", &self.channel.name())
            .field("mode", &self.mode)
            .field("initialized", &self.initialized)
            .field("line_style", &self.line_style)
            .field("pending", &self.pending.len())
            .field("pending_vectors", &self.pending_vectors.len())
            .field("output", &self.output)
            .field("frame_id", &self.frame_id)
            .finish_non_exhaustive()
    }
}

fn clause(columns: &str, title: &str, style: &str) -> String {
    format!(
        "'-' using {columns} title '{}' with {style}",
        title.replace('\'', "''")
    )
}

/// Indices kept by sparse sampling: `0, stride, 2*stride, …` and then every
/// index after the last sample. `None` when `stride` is zero.
pub(crate) fn sparse_indices(len: usize, stride: usize) -> Option<Vec<usize>> {
    if stride == 0 {
        return None;
    }
    let mut indices: Vec<usize> = (0..len).step_by(stride).collect();
    if let Some(&last) = indices.last() {
        indices.extend(last + 1..len);
    }
    Some(indices)
}
