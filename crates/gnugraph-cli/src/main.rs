#![deny(unsafe_code)]

//! gnugraph CLI: demo plots rendered by a gnuplot child process.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use gnugraph_config::GraphConfig;
use gnugraph_core::{DiagnosticCollector, DiagnosticReader, PlotSession, Point3};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DIAGNOSTIC_CAPACITY: usize = 256;

/// Points used by the `line3d` and `vector` demos.
const STAIRCASE: [Point3; 6] = [
    [1.0, 1.0, 1.0],
    [2.0, 2.0, 2.0],
    [3.0, 4.0, 4.0],
    [4.0, 8.0, 8.0],
    [5.0, 16.0, 16.0],
    [5.0, 32.0, 32.0],
];

/// gnugraph: plot numeric data through gnuplot.
#[derive(Parser)]
#[command(name = "gnugraph", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "gnugraph.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print captured warnings and errors before exiting.
    #[arg(long)]
    diagnostics: bool,

    /// Wait for ENTER before closing the plot window.
    #[arg(long)]
    pause: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Demo(Demo),

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[derive(Debug, Clone, Subcommand)]
enum Demo {
    /// Plot preformatted `x y` records for the first ten squares.
    Raw,

    /// Plot y = sqrt(x) for 200 samples.
    Sqrt {
        /// Redraw once per sample instead of once.
        #[arg(long)]
        animate: bool,
    },

    /// Plot a 3D polyline.
    Line3d,

    /// Plot y = sqrt(x) and y = x^(1/3) together.
    Compare,

    /// Plot a 3D polyline with an arrow.
    Vector,

    /// Plot a 200-point 3D spiral.
    Spiral {
        /// Keep every N-th point (plus the tail).
        #[arg(long, value_name = "N")]
        sparse: Option<usize>,

        /// Animate into `<NAME>.gif`.
        #[arg(long, value_name = "NAME", conflicts_with = "frames")]
        gif: Option<String>,

        /// Animate into numbered PNGs in the output directory.
        #[arg(long, value_name = "NAME")]
        frames: Option<String>,
    },
}

impl Demo {
    fn name(&self) -> &'static str {
        match self {
            Demo::Raw => "raw",
            Demo::Sqrt { .. } => "sqrt",
            Demo::Line3d => "line3d",
            Demo::Compare => "compare",
            Demo::Vector => "vector",
            Demo::Spiral { .. } => "spiral",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config).await?;
    let collector = DiagnosticCollector::new(DIAGNOSTIC_CAPACITY);
    let diagnostics = collector.reader();
    init_tracing(cli.verbose, &config.logging.level, collector);
    if !cli.config.exists() {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Demo(demo) => cmd_demo(demo, config, cli.pause).await?,
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
    }

    if cli.diagnostics {
        print_diagnostics(&diagnostics);
    }
    Ok(())
}

fn init_tracing(verbose: u8, level: &str, collector: DiagnosticCollector) {
    let default = match verbose {
        0 => level,
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // The collector sits outside the filter so it sees warnings at any verbosity.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .with(collector)
        .init();
}

async fn cmd_demo(demo: Demo, config: GraphConfig, pause: bool) -> Result<()> {
    // The session blocks on pipe I/O and on stdin.
    tokio::task::spawn_blocking(move || run_demo(&demo, &config, pause)).await?
}

fn run_demo(demo: &Demo, config: &GraphConfig, pause: bool) -> Result<()> {
    let mut session = PlotSession::launch(config)?;
    info!(demo = demo.name(), executable = %config.gnuplot.executable.display(), "Running demo");

    let reply = draw(demo, &mut session)?;
    println!("{}:\n{reply}", demo.name());

    if pause {
        press_enter()?;
    }
    session.shutdown()?;
    Ok(())
}

/// Send one demo to the session and return everything gnuplot replied.
fn draw(demo: &Demo, session: &mut PlotSession) -> Result<String> {
    let reply = match demo {
        Demo::Raw => {
            let records: String = (1..=10).map(|i| format!("{i} {}\n", i * i)).collect();
            session.plot_raw(&records)?
        }
        Demo::Sqrt { animate } => {
            let (xs, ys) = sampled(f64::sqrt);
            if *animate {
                session.animate(&xs, &ys)?
            } else {
                session.plot_series(&xs, &ys, "y = sqrt(x)")?
            }
        }
        Demo::Line3d => session.plot_line_3d(&STAIRCASE, "")?,
        Demo::Compare => {
            let (xs, sqrt) = sampled(f64::sqrt);
            let (_, cbrt) = sampled(f64::cbrt);
            session.add_series(&xs, &sqrt, "y = sqrt(x)")?;
            session.add_series(&xs, &cbrt, "y = x^(1/3)")?;
            session.plot()?
        }
        Demo::Vector => {
            session.add_line_series_3d(&STAIRCASE, "");
            session.add_vector_series_3d([1.0, 1.0, 1.0], [1.0, 0.0, 0.0], "");
            session.plot_3d()?
        }
        Demo::Spiral { sparse, gif, frames } => {
            let points = spiral(200);
            if let Some(name) = gif {
                session.enable_gif_output(name);
            }
            if let Some(name) = frames {
                session.enable_image_sequence_output(name)?;
            }
            if gif.is_some() || frames.is_some() {
                let mut replies = String::new();
                for end in 1..=points.len() {
                    queue_spiral(session, &points[..end], *sparse)?;
                    replies.push_str(&session.plot_3d()?);
                }
                replies.push_str(&session.close_output());
                replies
            } else {
                queue_spiral(session, &points, *sparse)?;
                session.plot_3d()?
            }
        }
    };
    Ok(reply)
}

fn queue_spiral(session: &mut PlotSession, points: &[Point3], sparse: Option<usize>) -> Result<()> {
    match sparse {
        Some(stride) => session.add_sparse_line_series_3d(points, stride, "")?,
        None => session.add_line_series_3d(points, ""),
    }
    Ok(())
}

fn sampled(f: fn(f64) -> f64) -> (Vec<f64>, Vec<f64>) {
    let xs: Vec<f64> = (0..200).map(f64::from).collect();
    let ys = xs.iter().map(|&x| f(x)).collect();
    (xs, ys)
}

fn spiral(n: u32) -> Vec<Point3> {
    (0..n)
        .map(|i| {
            let t = f64::from(i);
            [(t / 20.0).cos(), (t / 30.0).sin(), (t / 50.0).cos()]
        })
        .collect()
}

fn press_enter() -> Result<()> {
    println!("Press ENTER to continue . . .");
    std::io::stdin().read_line(&mut String::new())?;
    Ok(())
}

fn print_diagnostics(reader: &DiagnosticReader) {
    if reader.is_empty() {
        eprintln!("No diagnostics.");
        return;
    }
    for d in reader.entries() {
        match &d.error {
            Some(error) => eprintln!(
                "[{:>8.3}s] {:<5} {}: {} ({error})",
                d.elapsed_secs, d.level, d.target, d.message
            ),
            None => eprintln!(
                "[{:>8.3}s] {:<5} {}: {}",
                d.elapsed_secs, d.level, d.target, d.message
            ),
        }
    }
}

fn cmd_config(config_path: &Path, config: &GraphConfig, show: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

async fn load_config(path: &Path) -> Result<GraphConfig> {
    if path.exists() {
        GraphConfig::load(path).await.map_err(|e| anyhow::anyhow!(e))
    } else {
        Ok(GraphConfig::default())
    }
}
