//! Renderers for the depth replay and the execution price plot.
//!
//! [`TerminalRenderer`] draws both book sides as stepped outlines on a
//! ratatui chart in the alternate screen. [`LogRenderer`] is the headless
//! counterpart that reports each frame through `tracing`.
use crate::buckets::BucketRange;
use crate::error::Result;
use crate::replay::{Renderer, Side};
use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    style::{Color, Style},
    symbols,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType},
};
use std::io::{self, Stdout};
use std::time::Duration;
use tracing::info;

pub type Term = Terminal<CrosstermBackend<Stdout>>;

/// Switch stdout to the alternate screen.
pub fn enter_terminal() -> Result<Term> {
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, Hide)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

/// Leave the alternate screen and raw mode. Safe to call more than once.
pub fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen, Show);
}

/// Redraw with `draw` until `q`, `Esc` or Ctrl+C is pressed.
pub fn run_until_quit<F: FnMut() -> Result<()>>(mut draw: F) -> Result<()> {
    enable_raw_mode()?;
    let result = quit_loop(&mut draw);
    disable_raw_mode()?;
    result
}

fn quit_loop<F: FnMut() -> Result<()>>(draw: &mut F) -> Result<()> {
    loop {
        draw()?;
        if !event::poll(Duration::from_millis(250))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                _ => {}
            }
        }
    }
}

fn span_labels(lo: f64, hi: f64) -> Vec<String> {
    let mid = (lo + hi) / 2.0;
    vec![format!("{lo:.0}"), format!("{mid:.0}"), format!("{hi:.0}")]
}

/// Depth chart in the terminal's alternate screen.
pub struct TerminalRenderer {
    terminal: Term,
    title: String,
    buy: BucketRange,
    sell: BucketRange,
    frames: usize,
}

impl TerminalRenderer {
    pub fn new(title: impl Into<String>) -> Result<Self> {
        Ok(Self {
            terminal: enter_terminal()?,
            title: title.into(),
            buy: BucketRange::empty(),
            sell: BucketRange::empty(),
            frames: 0,
        })
    }
}

impl Renderer for TerminalRenderer {
    fn present(&mut self, side: Side, range: &BucketRange) -> Result<()> {
        match side {
            Side::Buy => self.buy = range.clone(),
            Side::Sell => self.sell = range.clone(),
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.frames += 1;
        let buy_pts = self.buy.outline();
        let sell_pts = self.sell.outline();
        let x_lo = self.buy.edges[0].min(self.sell.edges[0]) as f64;
        let x_hi = self.buy.edges.last().copied().unwrap_or(1).max(self.sell.edges.last().copied().unwrap_or(1)) as f64;
        let y_hi = self.buy.peak().max(self.sell.peak()).max(1) as f64;
        let title = format!(" {} | frame {} ", self.title, self.frames);

        let datasets = vec![
            Dataset::default()
                .name("buy")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Green))
                .data(&buy_pts),
            Dataset::default()
                .name("sell")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Red))
                .data(&sell_pts),
        ];
        let chart = Chart::new(datasets)
            .block(Block::default().borders(Borders::ALL).title(title))
            .x_axis(Axis::default().title("price bucket").bounds([x_lo, x_hi]).labels(span_labels(x_lo, x_hi)))
            .y_axis(Axis::default().title("volume").bounds([0.0, y_hi]).labels(span_labels(0.0, y_hi)));
        self.terminal.draw(|frame| frame.render_widget(chart, frame.area()))?;
        Ok(())
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        restore_terminal();
    }
}

/// Headless renderer: one log line per flushed frame.
#[derive(Debug, Default)]
pub struct LogRenderer {
    buy: Option<BucketRange>,
    sell: Option<BucketRange>,
    frames: usize,
}

impl LogRenderer {
    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl Renderer for LogRenderer {
    fn present(&mut self, side: Side, range: &BucketRange) -> Result<()> {
        let slot = match side {
            Side::Buy => &mut self.buy,
            Side::Sell => &mut self.sell,
        };
        *slot = Some(range.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.frames += 1;
        let describe = |r: &Option<BucketRange>| match r {
            Some(r) => format!("{}..{} peak {}", r.edges[0], r.edges[r.edges.len() - 1], r.peak()),
            None => "-".to_string(),
        };
        info!(frame = self.frames, buy = %describe(&self.buy), sell = %describe(&self.sell), "depth frame");
        Ok(())
    }
}

/// Draw an execution price series as a single line chart.
pub fn draw_prices(terminal: &mut Term, title: &str, prices: &[f64]) -> Result<()> {
    let points: Vec<(f64, f64)> = prices.iter().enumerate().map(|(i, p)| (i as f64, *p)).collect();
    let (lo, hi) = crate::execution::bounds(prices).unwrap_or((0.0, 1.0));
    let pad = ((hi - lo) * 0.05).max(0.01);
    let x_hi = points.len().saturating_sub(1).max(1) as f64;

    let dataset = Dataset::default()
        .name("price")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&points);
    let chart = Chart::new(vec![dataset])
        .block(Block::default().borders(Borders::ALL).title(format!(" {title} | {} executions | q to quit ", prices.len())))
        .x_axis(Axis::default().title("execution").bounds([0.0, x_hi]).labels(span_labels(0.0, x_hi)))
        .y_axis(
            Axis::default()
                .title("price")
                .bounds([lo - pad, hi + pad])
                .labels(vec![format!("{:.2}", lo - pad), format!("{:.2}", hi + pad)]),
        );
    terminal.draw(|frame| frame.render_widget(chart, frame.area()))?;
    Ok(())
}
