#![deny(unsafe_code)]

//! gnugraph core: drive an external gnuplot process through pipes.
//!
//! Numbers are turned into gnuplot's inline record text by the [`Formatter`],
//! shipped to a child process through a [`ChildProcessChannel`], and
//! organised into traces by the stateful [`PlotSession`].
//!
//! ```no_run
//! use gnugraph_config::GraphConfig;
//! use gnugraph_core::PlotSession;
//!
//! # fn main() -> Result<(), gnugraph_core::PlotError> {
//! let mut session = PlotSession::launch(&GraphConfig::default())?;
//! session.add_series(&[1.0, 2.0, 3.0], &[1.0, 4.0, 9.0], "squares")?;
//! let reply = session.plot()?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

/// Child process transport: the channel trait and its pipe implementation.
pub mod channel;
/// Warn/error capture layer for transport and session diagnostics.
pub mod diagnostics;
/// Number-to-record text formatting.
pub mod format;
/// Plot session state machine.
pub mod session;

pub use channel::{ChannelError, ChildProcessChannel, PipeChannel};
pub use diagnostics::{Diagnostic, DiagnosticCollector, DiagnosticReader};
pub use format::{Formatter, Point2, Point3, Value};
pub use session::{OutputMode, PlotError, PlotMode, PlotSession, Series};
