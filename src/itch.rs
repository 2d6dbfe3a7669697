//! ITCH 5.0 message decoding.
//!
//! Every frame payload starts with a one byte message type followed by a
//! fixed-size big-endian body. The body always opens with the common
//! [`Header`]. Only the message types needed to rebuild the order book, the
//! instrument directory and the participant table are decoded into typed
//! structs; the remaining administrative types are reported as
//! [`Message::Skipped`].
use crate::error::{Error, Result};
use std::fmt;
use time::{Duration, Time};

/// Fields shared by every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub stock_locate: u16,
    pub tracking_number: u16,
    /// Nanoseconds since midnight.
    pub timestamp: u64,
}

impl Header {
    pub fn time(&self) -> String {
        format_timestamp(self.timestamp)
    }
}

/// Right-padded ASCII field.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Alpha<const N: usize>(pub [u8; N]);

impl<const N: usize> Alpha<N> {
    /// Build from a string, padding with spaces and cutting at `N` bytes.
    pub fn new(s: &str) -> Self {
        let mut out = [b' '; N];
        for (dst, src) in out.iter_mut().zip(s.bytes()) {
            *dst = src;
        }
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("").trim_end()
    }
}

impl<const N: usize> fmt::Debug for Alpha<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl<const N: usize> fmt::Display for Alpha<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Stock = Alpha<8>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDirectory {
    pub header: Header,
    pub stock: Stock,
    pub market_category: u8,
    pub financial_status: u8,
    pub round_lot_size: u32,
    pub round_lots_only: bool,
    pub issue_classification: u8,
    pub issue_sub_type: Alpha<2>,
    pub authenticity: u8,
    pub short_sale_threshold: u8,
    pub ipo_flag: u8,
    pub luld_reference_price_tier: u8,
    pub etp_flag: u8,
    pub etp_leverage_factor: u32,
    pub inverse_indicator: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantPosition {
    pub header: Header,
    pub mpid: Alpha<4>,
    pub stock: Stock,
    pub primary_market_maker: bool,
    pub market_maker_mode: u8,
    pub participant_state: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOrder {
    pub header: Header,
    pub order_ref: u64,
    /// `b'B'` or `b'S'`.
    pub side: u8,
    pub shares: u32,
    pub stock: Stock,
    /// Price in 1/10000 units.
    pub price: u32,
    /// MPID of an attributed (`F`) order.
    pub attribution: Option<Alpha<4>>,
}

impl AddOrder {
    /// Attribution, `NSDQ` for anonymous orders.
    pub fn mpid(&self) -> &str {
        self.attribution.as_ref().map_or("NSDQ", |a| a.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReplace {
    pub header: Header,
    pub original_ref: u64,
    pub new_ref: u64,
    pub shares: u32,
    pub price: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderExecuted {
    pub header: Header,
    pub order_ref: u64,
    pub executed_shares: u32,
    pub match_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderExecutedWithPrice {
    pub header: Header,
    pub order_ref: u64,
    pub executed_shares: u32,
    pub match_number: u64,
    pub printable: bool,
    pub execution_price: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub header: Header,
    pub order_ref: u64,
    pub side: u8,
    pub shares: u32,
    pub stock: Stock,
    pub price: u32,
    pub match_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossTrade {
    pub header: Header,
    pub shares: u64,
    pub stock: Stock,
    pub cross_price: u32,
    pub match_number: u64,
    pub cross_type: u8,
}

/// A decoded frame payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    SystemEvent { header: Header, event_code: u8 },
    StockDirectory(StockDirectory),
    TradingAction { header: Header, stock: Stock, trading_state: u8, reason: Alpha<4> },
    RegShoRestriction { header: Header, stock: Stock, action: u8 },
    ParticipantPosition(ParticipantPosition),
    AddOrder(AddOrder),
    OrderCancel { header: Header, order_ref: u64, cancelled_shares: u32 },
    OrderDelete { header: Header, order_ref: u64 },
    OrderReplace(OrderReplace),
    OrderExecuted(OrderExecuted),
    OrderExecutedWithPrice(OrderExecutedWithPrice),
    Trade(Trade),
    CrossTrade(CrossTrade),
    /// Recognized type that carries nothing the book needs (V, K, I, J).
    Skipped { kind: u8 },
    /// Type byte outside the supported set.
    Unknown { kind: u8 },
}

/// Expected body length (after the type byte) for each decoded type.
fn body_len(kind: u8) -> Option<usize> {
    Some(match kind {
        b'S' => 11,
        b'R' => 38,
        b'H' => 24,
        b'Y' => 19,
        b'L' => 25,
        b'A' => 35,
        b'F' => 39,
        b'X' => 22,
        b'D' => 18,
        b'U' => 34,
        b'E' => 30,
        b'C' => 35,
        b'P' => 43,
        b'Q' => 39,
        _ => return None,
    })
}

/// Bounds-checked big-endian reader over a validated body.
struct Body<'a> {
    bytes: &'a [u8],
    off: usize,
}

impl<'a> Body<'a> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut tmp = [0u8; N];
        tmp.copy_from_slice(&self.bytes[self.off..self.off + N]);
        self.off += N;
        tmp
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn flag(&mut self) -> bool {
        self.u8() == b'Y'
    }

    fn u16(&mut self) -> u16 {
        u16::from_be_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_be_bytes(self.take())
    }

    fn u48(&mut self) -> u64 {
        let b: [u8; 6] = self.take();
        let mut tmp = [0u8; 8];
        tmp[2..].copy_from_slice(&b);
        u64::from_be_bytes(tmp)
    }

    fn u64(&mut self) -> u64 {
        u64::from_be_bytes(self.take())
    }

    fn alpha<const N: usize>(&mut self) -> Alpha<N> {
        Alpha(self.take())
    }

    fn skip(&mut self, n: usize) {
        self.off += n;
    }

    fn header(&mut self) -> Header {
        Header { stock_locate: self.u16(), tracking_number: self.u16(), timestamp: self.u48() }
    }
}

impl Message {
    /// Decode one frame payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let Some((&kind, body)) = payload.split_first() else {
            return Err(Error::MalformedMessage { kind: '?', expected: 1, actual: 0 });
        };
        let Some(expected) = body_len(kind) else {
            return Ok(match kind {
                b'V' | b'K' | b'I' | b'J' => Message::Skipped { kind },
                _ => Message::Unknown { kind },
            });
        };
        if body.len() != expected {
            return Err(Error::MalformedMessage { kind: kind as char, expected, actual: body.len() });
        }

        let mut b = Body { bytes: body, off: 0 };
        let header = b.header();
        let msg = match kind {
            b'S' => Message::SystemEvent { header, event_code: b.u8() },
            b'R' => Message::StockDirectory(StockDirectory {
                header,
                stock: b.alpha(),
                market_category: b.u8(),
                financial_status: b.u8(),
                round_lot_size: b.u32(),
                round_lots_only: b.flag(),
                issue_classification: b.u8(),
                issue_sub_type: b.alpha(),
                authenticity: b.u8(),
                short_sale_threshold: b.u8(),
                ipo_flag: b.u8(),
                luld_reference_price_tier: b.u8(),
                etp_flag: b.u8(),
                etp_leverage_factor: b.u32(),
                inverse_indicator: b.flag(),
            }),
            b'H' => {
                let stock = b.alpha();
                let trading_state = b.u8();
                b.skip(1); // reserved
                Message::TradingAction { header, stock, trading_state, reason: b.alpha() }
            }
            b'Y' => Message::RegShoRestriction { header, stock: b.alpha(), action: b.u8() },
            b'L' => Message::ParticipantPosition(ParticipantPosition {
                header,
                mpid: b.alpha(),
                stock: b.alpha(),
                primary_market_maker: b.flag(),
                market_maker_mode: b.u8(),
                participant_state: b.u8(),
            }),
            b'A' | b'F' => Message::AddOrder(AddOrder {
                header,
                order_ref: b.u64(),
                side: b.u8(),
                shares: b.u32(),
                stock: b.alpha(),
                price: b.u32(),
                attribution: (kind == b'F').then(|| b.alpha()),
            }),
            b'X' => Message::OrderCancel { header, order_ref: b.u64(), cancelled_shares: b.u32() },
            b'D' => Message::OrderDelete { header, order_ref: b.u64() },
            b'U' => Message::OrderReplace(OrderReplace {
                header,
                original_ref: b.u64(),
                new_ref: b.u64(),
                shares: b.u32(),
                price: b.u32(),
            }),
            b'E' => Message::OrderExecuted(OrderExecuted {
                header,
                order_ref: b.u64(),
                executed_shares: b.u32(),
                match_number: b.u64(),
            }),
            b'C' => Message::OrderExecutedWithPrice(OrderExecutedWithPrice {
                header,
                order_ref: b.u64(),
                executed_shares: b.u32(),
                match_number: b.u64(),
                printable: b.flag(),
                execution_price: b.u32(),
            }),
            b'P' => Message::Trade(Trade {
                header,
                order_ref: b.u64(),
                side: b.u8(),
                shares: b.u32(),
                stock: b.alpha(),
                price: b.u32(),
                match_number: b.u64(),
            }),
            b'Q' => Message::CrossTrade(CrossTrade {
                header,
                shares: b.u64(),
                stock: b.alpha(),
                cross_price: b.u32(),
                match_number: b.u64(),
                cross_type: b.u8(),
            }),
            _ => unreachable!("body_len covers every decoded type"),
        };
        Ok(msg)
    }

    /// Wire type byte.
    pub fn kind(&self) -> u8 {
        match self {
            Message::SystemEvent { .. } => b'S',
            Message::StockDirectory(_) => b'R',
            Message::TradingAction { .. } => b'H',
            Message::RegShoRestriction { .. } => b'Y',
            Message::ParticipantPosition(_) => b'L',
            Message::AddOrder(m) if m.attribution.is_some() => b'F',
            Message::AddOrder(_) => b'A',
            Message::OrderCancel { .. } => b'X',
            Message::OrderDelete { .. } => b'D',
            Message::OrderReplace(_) => b'U',
            Message::OrderExecuted(_) => b'E',
            Message::OrderExecutedWithPrice(_) => b'C',
            Message::Trade(_) => b'P',
            Message::CrossTrade(_) => b'Q',
            Message::Skipped { kind } | Message::Unknown { kind } => *kind,
        }
    }

    pub fn header(&self) -> Option<&Header> {
        Some(match self {
            Message::SystemEvent { header, .. }
            | Message::TradingAction { header, .. }
            | Message::RegShoRestriction { header, .. }
            | Message::OrderCancel { header, .. }
            | Message::OrderDelete { header, .. } => header,
            Message::StockDirectory(m) => &m.header,
            Message::ParticipantPosition(m) => &m.header,
            Message::AddOrder(m) => &m.header,
            Message::OrderReplace(m) => &m.header,
            Message::OrderExecuted(m) => &m.header,
            Message::OrderExecutedWithPrice(m) => &m.header,
            Message::Trade(m) => &m.header,
            Message::CrossTrade(m) => &m.header,
            Message::Skipped { .. } | Message::Unknown { .. } => return None,
        })
    }
}

/// Render nanoseconds since midnight as `HH:MM:SS.mmm.uuu.nnn`.
pub fn format_timestamp(ns: u64) -> String {
    let t = Time::MIDNIGHT + Duration::nanoseconds(ns as i64);
    let sub = t.nanosecond();
    format!(
        "{:02}:{:02}:{:02}.{:03}.{:03}.{:03}",
        t.hour(),
        t.minute(),
        t.second(),
        sub / 1_000_000,
        sub / 1_000 % 1_000,
        sub % 1_000
    )
}


#[cfg(test)]
mod tests {
    use super::wire;
    use super::*;

    #[test]
    fn decodes_add_order() {
        let mut p = wire::add(7, 42, b'B', 300, "AAPL", 1_234_500);
        p[5..11].copy_from_slice(&[0, 0, 0, 0, 0x01, 0x00]);
        let Message::AddOrder(m) = Message::decode(&p).unwrap() else { panic!("not an add") };
        assert_eq!(m.header.stock_locate, 7);
        assert_eq!(m.header.timestamp, 256);
        assert_eq!(m.order_ref, 42);
        assert_eq!(m.side, b'B');
        assert_eq!(m.shares, 300);
        assert_eq!(m.stock.as_str(), "AAPL");
        assert_eq!(m.price, 1_234_500);
        assert_eq!(m.mpid(), "NSDQ");
        assert!(m.attribution.is_none());
    }

    #[test]
    fn decodes_attributed_add() {
        let mut p = wire::add(1, 9, b'S', 10, "MSFT", 5);
        p[0] = b'F';
        p.extend_from_slice(b"GSCO");
        let msg = Message::decode(&p).unwrap();
        assert_eq!(msg.kind(), b'F');
        let Message::AddOrder(m) = msg else { panic!("not an add") };
        assert_eq!(m.mpid(), "GSCO");
    }

    #[test]
    fn decodes_directory() {
        let Message::StockDirectory(d) = Message::decode(&wire::directory(3, "ZVZZT")).unwrap() else {
            panic!("not a directory message")
        };
        assert_eq!(d.stock.as_str(), "ZVZZT");
        assert_eq!(d.market_category, b'Q');
        assert_eq!(d.round_lot_size, 100);
        assert!(!d.round_lots_only);
        assert_eq!(d.issue_sub_type.as_str(), "Z");
    }

    #[test]
    fn decodes_cross_trade_with_wide_shares() {
        let p = wire::cross(2, 5_000_000_000, "SPY", 4_000_000, 77);
        let Message::CrossTrade(q) = Message::decode(&p).unwrap() else { panic!("not a cross") };
        assert_eq!(q.shares, 5_000_000_000);
        assert_eq!(q.cross_price, 4_000_000);
        assert_eq!(q.match_number, 77);
        assert_eq!(q.cross_type, b'O');
    }

    #[test]
    fn wrong_length_is_malformed() {
        let mut p = wire::delete(1, 1);
        p.push(0);
        assert!(matches!(
            Message::decode(&p),
            Err(Error::MalformedMessage { kind: 'D', expected: 18, actual: 19 })
        ));
        assert!(Message::decode(&[]).is_err());
    }

    #[test]
    fn administrative_and_unknown_types() {
        assert_eq!(Message::decode(b"V123").unwrap(), Message::Skipped { kind: b'V' });
        assert_eq!(Message::decode(b"z").unwrap(), Message::Unknown { kind: b'z' });
        assert!(Message::decode(b"J").unwrap().header().is_none());
    }

    #[test]
    fn timestamp_formatting() {
        let ns = ((13 * 60 + 5) * 60 + 9) * 1_000_000_000 + 123_456_789;
        assert_eq!(format_timestamp(ns), "13:05:09.123.456.789");
        assert_eq!(format_timestamp(0), "00:00:00.000.000.000");
    }
}
