use anyhow::{Context, Result};
use clap::Parser;
use itch_inspect::open_input;
use itch_inspect::render::{LogRenderer, TerminalRenderer, restore_terminal};
use itch_inspect::replay::{ReplayConfig, ReplaySummary, StepPlayer};
use itch_inspect::snapshot::{TrailingSnapshot, parse_snapshots};
use itch_inspect::telemetry::init_tracing;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(version, about = "Replay a book snapshot log as an animated depth histogram")]
struct Args {
    /// Snapshot log written by itch-parser --book-out
    input: PathBuf,

    /// First snapshot shown; earlier ones are session warm-up
    #[arg(long, env = "REPLAY_START_OFFSET", default_value_t = ReplayConfig::DEFAULT_START_OFFSET)]
    start_offset: usize,

    /// Show every Nth snapshot
    #[arg(long, env = "REPLAY_STRIDE", default_value_t = ReplayConfig::DEFAULT_STRIDE)]
    stride: usize,

    /// Pause between frames, in milliseconds
    #[arg(long, env = "REPLAY_DELAY_MS", default_value_t = ReplayConfig::DEFAULT_DELAY.as_millis() as u64)]
    delay_ms: u64,

    /// Keep the last snapshot even when the log does not end with a delimiter
    #[arg(long, default_value_t = false)]
    seal_trailing: bool,

    /// Log frames instead of drawing them
    #[arg(long, default_value_t = false)]
    headless: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    // Logging to stderr would tear the chart, so the terminal UI stays quiet
    // unless a log file is given.
    let filter = if args.headless || args.log_file.is_some() { "info" } else { "warn" };
    init_tracing(filter, args.log_file.as_deref()).context("init logging")?;

    let trailing = if args.seal_trailing { TrailingSnapshot::Seal } else { TrailingSnapshot::Discard };
    let file = open_input(&args.input)?;
    let snapshots = parse_snapshots(BufReader::new(file), trailing).with_context(|| format!("parse {:?}", args.input))?;
    info!(snapshots = snapshots.len(), "snapshot log loaded");

    let config = ReplayConfig {
        start_offset: args.start_offset,
        stride: args.stride,
        delay: Duration::from_millis(args.delay_ms),
    };

    let summary: ReplaySummary = if args.headless {
        let mut player = StepPlayer::new(config, LogRenderer::default())?;
        player.run(&snapshots)?
    } else {
        ctrlc::set_handler(|| {
            restore_terminal();
            std::process::exit(130);
        })
        .context("install Ctrl+C handler")?;
        let title = args.input.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let mut player = StepPlayer::new(config, TerminalRenderer::new(title)?)?;
        player.run(&snapshots)?
    };

    info!(steps = summary.steps, last_index = ?summary.last_index, "replay finished");
    Ok(())
}
