//! Capture replay: frames in, rebuilt market state out.
use crate::book::OrderBook;
use crate::error::Result;
use crate::frame::Frame;
use crate::instruments::{InstrumentTable, ParticipantTable};
use crate::itch::Message;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{debug, warn};

/// Whether decoding should go on after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// An unrecognized message type was met; the rest of the capture is not
    /// interpretable.
    Stop { kind: u8 },
}

/// Counters for a processed capture.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub frames: u64,
    pub empty_frames: u64,
    pub messages: u64,
    pub by_kind: BTreeMap<char, u64>,
    pub stopped_at: Option<u8>,
}

/// Market state rebuilt from a capture.
#[derive(Debug, Default)]
pub struct Capture {
    pub instruments: InstrumentTable,
    pub participants: ParticipantTable,
    pub book: OrderBook,
}

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one decoded message.
    pub fn apply(&mut self, msg: &Message) -> Result<Flow> {
        match msg {
            Message::SystemEvent { header, event_code } => {
                debug!(event = %(*event_code as char), time = %header.time(), "system event");
            }
            Message::StockDirectory(m) => self.instruments.register(m),
            Message::TradingAction { header, trading_state, reason, .. } => {
                self.instruments.set_trading_state(header.stock_locate, *trading_state, *reason)?
            }
            Message::RegShoRestriction { header, action, .. } => {
                self.instruments.set_reg_sho(header.stock_locate, *action)?
            }
            Message::ParticipantPosition(m) => self.participants.update(m),
            Message::AddOrder(m) => self.book.add(m),
            Message::OrderCancel { order_ref, cancelled_shares, .. } => {
                self.book.cancel(*order_ref, *cancelled_shares)?
            }
            Message::OrderDelete { order_ref, .. } => self.book.delete(*order_ref)?,
            Message::OrderReplace(m) => self.book.replace(m)?,
            Message::OrderExecuted(m) => self.book.execute(m)?,
            Message::OrderExecutedWithPrice(m) => self.book.execute_with_price(m)?,
            Message::Trade(m) => self.book.trade(m),
            Message::CrossTrade(m) => self.book.cross(m),
            Message::Skipped { .. } => {}
            Message::Unknown { kind } => return Ok(Flow::Stop { kind: *kind }),
        }
        Ok(Flow::Continue)
    }

    /// Decode and apply every frame, calling `tap` after each applied message.
    pub fn process<I, F>(&mut self, frames: I, mut tap: F) -> Result<Summary>
    where
        I: IntoIterator<Item = Result<Frame>>,
        F: FnMut(&Capture, &Message) -> Result<()>,
    {
        let mut summary = Summary::default();
        for frame in frames {
            let frame = frame?;
            summary.frames += 1;
            if frame.payload.is_empty() {
                summary.empty_frames += 1;
                continue;
            }
            let msg = Message::decode(&frame.payload)?;
            if let Flow::Stop { kind } = self.apply(&msg)? {
                warn!(offset = frame.offset, kind = %(kind as char), "unknown message type, stopping");
                summary.stopped_at = Some(kind);
                break;
            }
            summary.messages += 1;
            *summary.by_kind.entry(msg.kind() as char).or_insert(0) += 1;
            tap(self, &msg)?;
        }
        Ok(summary)
    }
}

/// Periodic snapshot dump of one stock's resting orders.
///
/// The locate is resolved from the stock directory as soon as the symbol is
/// registered. A snapshot is written after every `every` messages that touch
/// the stock.
pub struct BookTap<W> {
    symbol: String,
    locate: Option<u16>,
    every: u64,
    seen: u64,
    written: usize,
    out: W,
}

impl<W: Write> BookTap<W> {
    pub fn new(symbol: impl Into<String>, every: u64, out: W) -> Self {
        Self { symbol: symbol.into(), locate: None, every: every.max(1), seen: 0, written: 0, out }
    }

    pub fn locate(&self) -> Option<u16> {
        self.locate
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn observe(&mut self, capture: &Capture, msg: &Message) -> Result<()> {
        let locate = match self.locate {
            Some(l) => l,
            None => match capture.instruments.locate_of(&self.symbol) {
                Some(l) => {
                    self.locate = Some(l);
                    l
                }
                None => return Ok(()),
            },
        };
        if msg.header().map(|h| h.stock_locate) != Some(locate) {
            return Ok(());
        }
        self.seen += 1;
        if self.seen % self.every == 0 {
            capture.book.write_snapshot(&mut self.out, locate)?;
            self.written += 1;
        }
        Ok(())
    }

    /// Write a closing snapshot and hand back the sink.
    pub fn finish(mut self, capture: &Capture) -> Result<W> {
        if let Some(locate) = self.locate {
            capture.book.write_snapshot(&mut self.out, locate)?;
            self.written += 1;
        }
        self.out.flush()?;
        Ok(self.out)
    }
}
