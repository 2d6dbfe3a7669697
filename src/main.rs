use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use itch_inspect::capture::{BookTap, Capture};
use itch_inspect::frame::FrameDecoder;
use itch_inspect::telemetry::init_tracing;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(version, about = "Decode a framed ITCH 5.0 capture and rebuild the order book")]
struct Args {
    /// Capture file to read (length-prefixed ITCH messages)
    input: PathBuf,

    /// Stock symbol whose book and executions are dumped (e.g., AAPL)
    #[arg(long, env = "ITCH_STOCK")]
    stock: Option<String>,

    /// Snapshot log output; defaults to dumps/STOCK_book.csv when --stock is set
    #[arg(long, env = "BOOK_OUT", requires = "stock")]
    book_out: Option<PathBuf>,

    /// Dump a snapshot after this many messages touching the stock
    #[arg(long, env = "SNAPSHOT_EVERY", default_value_t = 10_000)]
    snapshot_every: u64,

    /// Execution price output; defaults to dumps/STOCK_executions.csv when --stock is set
    #[arg(long, env = "EXECUTIONS_OUT", requires = "stock")]
    executions_out: Option<PathBuf>,

    /// Stock directory dump (CSV)
    #[arg(long, env = "INSTRUMENTS_OUT")]
    instruments_out: Option<PathBuf>,

    /// Market participant position dump (CSV)
    #[arg(long, env = "PARTICIPANTS_OUT")]
    participants_out: Option<PathBuf>,

    /// Resting orders of every stock at the end of the capture (CSV)
    #[arg(long, env = "ORDERS_OUT")]
    orders_out: Option<PathBuf>,
}

fn create_output(path: &Path) -> Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("open {:?}", path))?;
    Ok(BufWriter::with_capacity(1 << 20, file)) // 1 MiB buffer
}

fn default_dump(stock: &str, suffix: &str) -> PathBuf {
    let mut p = PathBuf::from("dumps");
    p.push(format!("{}_{}.csv", stock.to_uppercase(), suffix));
    p
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();
    let args = Args::parse();
    init_tracing("info", None).context("init logging")?;

    let decoder = FrameDecoder::open(&args.input).with_context(|| format!("open {:?}", args.input))?;
    let mut capture = Capture::new();

    let mut tap = match &args.stock {
        Some(stock) => {
            let path = args.book_out.clone().unwrap_or_else(|| default_dump(stock, "book"));
            info!(stock = %stock, path = ?path, every = args.snapshot_every, "dumping book snapshots");
            Some(BookTap::new(stock.clone(), args.snapshot_every, create_output(&path)?))
        }
        None => None,
    };

    let started = Instant::now();
    let summary = capture
        .process(decoder, |c, m| match tap.as_mut() {
            Some(t) => t.observe(c, m),
            None => Ok(()),
        })
        .with_context(|| format!("decode {:?}", args.input))?;

    if let Some(tap) = tap {
        let written = tap.written();
        let locate = tap.locate();
        tap.finish(&capture).context("write book snapshots")?;
        match locate {
            Some(locate) => info!(locate, snapshots = written + 1, "book snapshots written"),
            None => warn!(stock = ?args.stock, "stock never appeared in the directory"),
        }
    }

    if let Some(stock) = &args.stock {
        match capture.instruments.locate_of(stock) {
            Some(locate) => {
                let path = args.executions_out.clone().unwrap_or_else(|| default_dump(stock, "executions"));
                let mut w = create_output(&path)?;
                capture.book.write_executions(&mut w, locate).context("write executions")?;
                w.flush()?;
                info!(path = ?path, "execution prices written");
            }
            None => warn!(stock = %stock, "no executions written"),
        }
    }

    if let Some(path) = &args.instruments_out {
        let mut w = create_output(path)?;
        capture.instruments.write_csv(&mut w).context("write instrument table")?;
        w.flush()?;
        info!(path = ?path, "instrument table written");
    }
    if let Some(path) = &args.participants_out {
        let mut w = create_output(path)?;
        capture.participants.write_csv(&mut w).context("write participant table")?;
        w.flush()?;
        info!(path = ?path, "participant table written");
    }
    if let Some(path) = &args.orders_out {
        let mut w = create_output(path)?;
        capture.book.write_orders(&mut w).context("write order book")?;
        w.flush()?;
        info!(path = ?path, "order book written");
    }

    for (kind, count) in &summary.by_kind {
        debug!(kind = %kind, count, "messages by type");
    }
    info!(
        frames = summary.frames,
        messages = summary.messages,
        empty_frames = summary.empty_frames,
        instruments = capture.instruments.len(),
        participants = capture.participants.len(),
        resting_orders = capture.book.order_count(),
        executions = capture.book.executions().len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "parsed capture"
    );
    if let Some(kind) = summary.stopped_at {
        warn!(kind = %(kind as char), "stopped at unknown message type");
    }
    Ok(())
}
