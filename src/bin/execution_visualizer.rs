use anyhow::{Context, Result};
use clap::Parser;
use itch_inspect::execution::{bounds, parse_prices};
use itch_inspect::open_input;
use itch_inspect::render::{draw_prices, enter_terminal, restore_terminal, run_until_quit};
use itch_inspect::telemetry::init_tracing;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(version, about = "Plot execution prices written by itch-parser --executions-out")]
struct Args {
    /// Execution price file (one integer price x 10^4 per line)
    input: PathBuf,

    /// Print a summary instead of drawing the chart
    #[arg(long, default_value_t = false)]
    headless: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let filter = if args.headless || args.log_file.is_some() { "info" } else { "warn" };
    init_tracing(filter, args.log_file.as_deref()).context("init logging")?;

    let file = open_input(&args.input)?;
    let prices = parse_prices(BufReader::new(file)).with_context(|| format!("parse {:?}", args.input))?;
    let (lo, hi) = bounds(&prices).unwrap_or_default();
    info!(executions = prices.len(), low = lo, high = hi, "execution prices loaded");

    if args.headless {
        if let (Some(first), Some(last)) = (prices.first(), prices.last()) {
            info!(first, last, change = last - first, "execution range");
        }
        return Ok(());
    }

    ctrlc::set_handler(|| {
        restore_terminal();
        std::process::exit(130);
    })
    .context("install Ctrl+C handler")?;
    let title = args.input.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let mut terminal = enter_terminal()?;
    let result = run_until_quit(|| draw_prices(&mut terminal, &title, &prices));
    restore_terminal();
    Ok(result?)
}
