mod app;
mod source;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use crawl_graph_view::{
    Framing, GraphSession, JsonLinesRenderer, LayoutConfig, ScheduleConfig, SessionConfig,
    StreamState,
};
use tracing_subscriber::EnvFilter;

use source::GraphSource;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FramingArg {
    /// Back-to-back JSON objects, optionally separated by whitespace.
    Concatenated,
    /// One JSON object per line.
    Lines,
}

impl From<FramingArg> for Framing {
    fn from(value: FramingArg) -> Self {
        match value {
            FramingArg::Concatenated => Framing::Concatenated,
            FramingArg::Lines => Framing::Lines,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Graph stream to read; `-` for stdin. Ignored with --server.
    #[arg(default_value = "-")]
    input: String,

    /// Crawl server base URL to stream the graph of --job from.
    #[arg(long, requires = "job")]
    server: Option<String>,

    #[arg(long)]
    job: Option<String>,

    /// Run without a window and write layout frames as JSON lines.
    #[arg(long)]
    headless: bool,

    /// Frame file for --headless; stdout when omitted.
    #[arg(long, requires = "headless")]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = FramingArg::Concatenated)]
    framing: FramingArg,

    #[arg(long, default_value_t = 8 * 1024)]
    chunk_size: usize,

    #[arg(long, default_value_t = 50)]
    node_step: usize,

    #[arg(long, default_value_t = 100)]
    edge_step: usize,

    /// Smoothing term of the progress estimate.
    #[arg(long, default_value_t = 1_000.0)]
    smoothing: f32,

    #[arg(long, default_value_t = 4_000.0)]
    repulsion: f32,

    #[arg(long, default_value_t = 60.0)]
    link_distance: f32,

    #[arg(long, default_value_t = 0.05)]
    spring: f32,

    /// Upper bound on layout ticks after the stream ends in headless mode.
    #[arg(long, default_value_t = 600)]
    settle_ticks: usize,
}

impl Args {
    fn source(&self) -> GraphSource {
        match (&self.server, &self.job) {
            (Some(base_url), Some(job_id)) => GraphSource::Server {
                base_url: base_url.clone(),
                job_id: job_id.clone(),
            },
            _ if self.input == "-" => GraphSource::Stdin,
            _ => GraphSource::File(PathBuf::from(&self.input)),
        }
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            job_id: self.job.clone().unwrap_or_else(|| "local".to_owned()),
            framing: self.framing.into(),
            layout: LayoutConfig {
                repulsion_strength: self.repulsion,
                link_distance: self.link_distance,
                spring_strength: self.spring,
                ..LayoutConfig::default()
            },
            schedule: ScheduleConfig {
                node_step: self.node_step,
                edge_step: self.edge_step,
                smoothing: self.smoothing,
                ..ScheduleConfig::default()
            },
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_headless(args: &Args) -> Result<StreamState> {
    let source = args.source();
    let reader = source.open()?;
    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("failed to create frame file {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let mut session = GraphSession::new(args.session_config());
    let mut renderer = JsonLinesRenderer::new(writer);

    let state = match session.run_stream(reader, args.chunk_size, &mut renderer) {
        Ok(state) => state,
        Err(error) => {
            tracing::warn!(%source, error = %error, "graph stream ended abnormally");
            session.state()
        }
    };

    let ticks = session.settle(args.settle_ticks, &mut renderer);
    let size = session.store().size();
    tracing::info!(
        state = state.label(),
        nodes = size.nodes,
        edges = size.edges,
        dangling = session.store().dangling_edge_count(),
        ticks,
        frames = renderer.frames(),
        "headless run finished"
    );

    renderer.finish().context("failed to write layout frames")?;
    Ok(state)
}

fn run_viewer(args: Args) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };
    let source = args.source();
    let config = args.session_config();
    let chunk_size = args.chunk_size;

    if let Err(error) = eframe::run_native(
        "crawl-graph-view",
        options,
        Box::new(move |cc| Ok(Box::new(app::GraphViewerApp::new(cc, source, config, chunk_size)))),
    ) {
        bail!("viewer failed: {error}");
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing();

    if args.headless {
        return match run_headless(&args) {
            Ok(StreamState::Done | StreamState::Cancelled) => ExitCode::SUCCESS,
            Ok(state) => {
                tracing::error!(state = state.label(), "graph stream did not complete");
                ExitCode::FAILURE
            }
            Err(error) => {
                tracing::error!("{error:#}");
                ExitCode::FAILURE
            }
        };
    }

    match run_viewer(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("{error:#}");
            ExitCode::FAILURE
        }
    }
}
