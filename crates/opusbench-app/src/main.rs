//! # opusbench
//!
//! Decodes an audio file one slice per frame, from memory or streamed from
//! disk, and reports how much faster than real time the decoder ran.

mod config;
mod driver;
mod host;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::BenchConfig;
use host::TerminalHost;
use opusbench_core::StartSignal;
use opusbench_decode::{BenchEngine, FileSystem, SymphoniaBackend};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "opusbench")]
#[command(about = "Frame-sliced audio decode benchmark")]
#[command(version)]
struct Args {
    /// Audio file to decode
    file: Option<PathBuf>,

    /// Load the whole file into memory before decoding
    #[arg(long)]
    memory: bool,

    /// Stream the file through a seekable handle
    #[arg(long)]
    stream: bool,

    /// Run the selected sessions this many times
    #[arg(long, value_name = "N")]
    repeat: Option<u32>,

    /// Scratch buffer capacity in frames per channel
    #[arg(long, value_name = "N")]
    scratch_frames: Option<usize>,

    /// Tick rate while not decoding
    #[arg(long, value_name = "N")]
    idle_fps: Option<u32>,

    /// Print one JSON line per session instead of the text display
    #[arg(long)]
    json: bool,

    /// Config file (defaults to config.json in the platform config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Args {
    /// Apply command-line values on top of `config`.
    fn merge_into(self, config: &mut BenchConfig) {
        if let Some(file) = self.file {
            config.file = Some(file);
        }
        if let Some(repeat) = self.repeat {
            config.repeat = repeat;
        }
        if let Some(frames) = self.scratch_frames {
            config.scratch_frames = frames;
        }
        if let Some(fps) = self.idle_fps {
            config.idle_fps = fps;
        }

        let mut signals = Vec::new();
        if self.memory {
            signals.push(StartSignal::Memory);
        }
        if self.stream {
            signals.push(StartSignal::Stream);
        }
        if !signals.is_empty() {
            config.signals = signals;
        }
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for --json
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opusbench=info,opusbench_decode=info".into()),
        )
        .init();

    let args = Args::parse();
    let json = args.json;

    let mut config = BenchConfig::load(args.config.as_deref())?;
    args.merge_into(&mut config);
    config.validate()?;

    let settings = config.engine_settings()?;
    info!(
        "Starting opusbench v{} on {}",
        env!("CARGO_PKG_VERSION"),
        settings.path.display()
    );

    let backend = settings
        .path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or_else(SymphoniaBackend::new, SymphoniaBackend::with_extension);
    let mut engine = BenchEngine::new(settings, Box::new(FileSystem::default()), Box::new(backend));

    let stdout = std::io::stdout();
    let mut host = TerminalHost::new(stdout.lock(), config.idle_fps).quiet(json);
    let outcome = driver::run(&mut engine, &mut host, config.schedule());

    if json {
        let mut out = host.into_inner();
        for line in outcome.json_lines() {
            writeln!(out, "{line}").context("Failed to write results")?;
        }
    }

    let failed = outcome.failures().count();
    if failed > 0 {
        bail!("{failed} of {} sessions failed", outcome.sessions());
    }
    Ok(())
}
