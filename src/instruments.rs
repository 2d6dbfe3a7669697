//! Stock directory and market participant tables.
use crate::error::{Error, Result};
use crate::itch::{Alpha, ParticipantPosition, Stock, StockDirectory};
use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use tracing::warn;

/// Header line of [`InstrumentTable::write_csv`].
pub const INSTRUMENT_HEADER: &str = "Stock Locate,Stock,Market Category,Financial Status Indicator,Round Lot Size,\
Round Lots Only,Issue Classification,Issue Sub Type,Authenticity,Short Sale Threshold,IPO Flag,\
LULD Reference Price Tier,ETP Flag,ETP Leverage Factor,Inverse Indicator";

/// Header line of [`ParticipantTable::write_csv`].
pub const PARTICIPANT_HEADER: &str = "MPID,Stock,Primary Market Maker,Market Maker Mode,Market Participant State";

/// Directory entry plus the latest trading state for one stock locate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub directory: StockDirectory,
    pub trading_state: Option<u8>,
    pub trading_reason: Option<Alpha<4>>,
    pub reg_sho_action: Option<u8>,
}

#[derive(Debug, Default)]
pub struct InstrumentTable {
    by_locate: HashMap<u16, Instrument>,
    by_symbol: HashMap<String, u16>,
}

impl InstrumentTable {
    /// Register a stock. A locate that is already known keeps its first entry.
    pub fn register(&mut self, m: &StockDirectory) {
        let locate = m.header.stock_locate;
        if let Some(existing) = self.by_locate.get(&locate) {
            warn!(locate, existing = %existing.directory.stock, duplicate = %m.stock, "duplicate stock locate");
            return;
        }
        self.by_symbol.insert(m.stock.as_str().to_string(), locate);
        self.by_locate.insert(
            locate,
            Instrument { directory: m.clone(), trading_state: None, trading_reason: None, reg_sho_action: None },
        );
    }

    pub fn set_trading_state(&mut self, locate: u16, state: u8, reason: Alpha<4>) -> Result<()> {
        let entry = self.by_locate.get_mut(&locate).ok_or(Error::UnknownInstrument(locate))?;
        entry.trading_state = Some(state);
        entry.trading_reason = Some(reason);
        Ok(())
    }

    pub fn set_reg_sho(&mut self, locate: u16, action: u8) -> Result<()> {
        let entry = self.by_locate.get_mut(&locate).ok_or(Error::UnknownInstrument(locate))?;
        entry.reg_sho_action = Some(action);
        Ok(())
    }

    pub fn locate_of(&self, symbol: &str) -> Option<u16> {
        self.by_symbol.get(symbol.trim()).copied()
    }

    pub fn get(&self, locate: u16) -> Option<&Instrument> {
        self.by_locate.get(&locate)
    }

    /// Registered locates in ascending order.
    pub fn locates(&self) -> Vec<u16> {
        let mut out: Vec<u16> = self.by_locate.keys().copied().collect();
        out.sort_unstable();
        out
    }

    /// Dump the directory as CSV, one row per locate.
    pub fn write_csv<W: Write>(&self, w: &mut W) -> Result<()> {
        writeln!(w, "{INSTRUMENT_HEADER}")?;
        for locate in self.locates() {
            let Some(i) = self.get(locate) else { continue };
            let d = &i.directory;
            writeln!(
                w,
                "{},\"{}\",\"{}\",\"{}\",{},{},\"{}\",\"{}\",\"{}\",\"{}\",\"{}\",\"{}\",\"{}\",{},{}",
                locate,
                d.stock,
                d.market_category as char,
                d.financial_status as char,
                d.round_lot_size,
                d.round_lots_only,
                d.issue_classification as char,
                d.issue_sub_type,
                d.authenticity as char,
                d.short_sale_threshold as char,
                d.ipo_flag as char,
                d.luld_reference_price_tier as char,
                d.etp_flag as char,
                d.etp_leverage_factor,
                d.inverse_indicator,
            )?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_locate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_locate.is_empty()
    }
}

/// Flags reported for one (participant, stock) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantFlags {
    pub primary_market_maker: bool,
    pub market_maker_mode: u8,
    pub participant_state: u8,
}

#[derive(Debug, Default)]
pub struct ParticipantTable {
    positions: HashMap<(Alpha<4>, Stock), ParticipantFlags>,
}

impl ParticipantTable {
    pub fn update(&mut self, m: &ParticipantPosition) {
        self.positions.insert(
            (m.mpid, m.stock),
            ParticipantFlags {
                primary_market_maker: m.primary_market_maker,
                market_maker_mode: m.market_maker_mode,
                participant_state: m.participant_state,
            },
        );
    }

    pub fn get(&self, mpid: &str, stock: &str) -> Option<&ParticipantFlags> {
        self.positions.get(&(Alpha::new(mpid), Alpha::new(stock)))
    }

    /// Participants registered for a stock.
    pub fn makers_of(&self, stock: &str) -> Vec<&str> {
        let key = Stock::new(stock);
        let mut out: Vec<&str> = self.positions.keys().filter(|(_, s)| *s == key).map(|(m, _)| m.as_str()).collect();
        out.sort_unstable();
        out
    }

    /// Stocks with at least one registered participant, sorted.
    pub fn stocks(&self) -> Vec<&str> {
        let set: BTreeSet<&str> = self.positions.keys().map(|(_, s)| s.as_str()).collect();
        set.into_iter().collect()
    }

    /// Dump every position as CSV, grouped by stock.
    pub fn write_csv<W: Write>(&self, w: &mut W) -> Result<()> {
        writeln!(w, "{PARTICIPANT_HEADER}")?;
        for stock in self.stocks() {
            for mpid in self.makers_of(stock) {
                let Some(f) = self.get(mpid, stock) else { continue };
                writeln!(
                    w,
                    "{},{},{},{},{}",
                    mpid,
                    stock,
                    if f.primary_market_maker { "Yes" } else { "No" },
                    f.market_maker_mode as char,
                    f.participant_state as char,
                )?;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itch::{Message, wire};

    fn directory(locate: u16, stock: &str) -> StockDirectory {
        match Message::decode(&wire::directory(locate, stock)).unwrap() {
            Message::StockDirectory(d) => d,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn registers_and_resolves_symbols() {
        let mut t = InstrumentTable::default();
        t.register(&directory(5, "AAPL"));
        t.register(&directory(6, "MSFT"));
        assert_eq!(t.locate_of("AAPL"), Some(5));
        assert_eq!(t.get(6).unwrap().directory.stock.as_str(), "MSFT");
        assert_eq!(t.locates(), vec![5, 6]);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn duplicate_locate_keeps_first() {
        let mut t = InstrumentTable::default();
        t.register(&directory(5, "AAPL"));
        t.register(&directory(5, "GOOG"));
        assert_eq!(t.get(5).unwrap().directory.stock.as_str(), "AAPL");
        assert_eq!(t.locate_of("GOOG"), None);
    }

    #[test]
    fn state_updates_require_known_locate() {
        let mut t = InstrumentTable::default();
        t.register(&directory(1, "AAPL"));
        t.set_trading_state(1, b'T', Alpha::new("")).unwrap();
        t.set_reg_sho(1, b'0').unwrap();
        let i = t.get(1).unwrap();
        assert_eq!(i.trading_state, Some(b'T'));
        assert_eq!(i.reg_sho_action, Some(b'0'));
        assert!(matches!(t.set_reg_sho(2, b'1'), Err(Error::UnknownInstrument(2))));
    }

    #[test]
    fn participants_keyed_by_mpid_and_stock() {
        let mut p = ParticipantTable::default();
        let header = crate::itch::Header { stock_locate: 1, tracking_number: 0, timestamp: 0 };
        for mpid in ["GSCO", "ABCD"] {
            p.update(&ParticipantPosition {
                header,
                mpid: Alpha::new(mpid),
                stock: Stock::new("AAPL"),
                primary_market_maker: mpid == "GSCO",
                market_maker_mode: b'N',
                participant_state: b'A',
            });
        }
        assert!(p.get("GSCO", "AAPL").unwrap().primary_market_maker);
        assert_eq!(p.makers_of("AAPL"), vec!["ABCD", "GSCO"]);
        assert!(p.get("GSCO", "MSFT").is_none());
    }

    #[test]
    fn directory_csv_rows() {
        let mut t = InstrumentTable::default();
        t.register(&directory(9, "MSFT"));
        t.register(&directory(2, "AAPL"));
        let mut out = Vec::new();
        t.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], INSTRUMENT_HEADER);
        assert_eq!(lines[0].split(',').count(), lines[1].split(',').count());
        assert_eq!(
            lines[1],
            "2,\"AAPL\",\"Q\",\"N\",100,false,\"C\",\"Z\",\"P\",\" \",\"N\",\"N\",\"N\",0,false"
        );
        assert!(lines[2].starts_with("9,\"MSFT\","));
    }

    #[test]
    fn participant_csv_grouped_by_stock() {
        let mut p = ParticipantTable::default();
        let header = crate::itch::Header { stock_locate: 1, tracking_number: 0, timestamp: 0 };
        for (mpid, stock) in [("GSCO", "MSFT"), ("ABCD", "MSFT"), ("GSCO", "AAPL")] {
            p.update(&ParticipantPosition {
                header,
                mpid: Alpha::new(mpid),
                stock: Stock::new(stock),
                primary_market_maker: stock == "AAPL",
                market_maker_mode: b'N',
                participant_state: b'A',
            });
        }
        assert_eq!(p.stocks(), vec!["AAPL", "MSFT"]);
        let mut out = Vec::new();
        p.write_csv(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("{PARTICIPANT_HEADER}\nGSCO,AAPL,Yes,N,A\nABCD,MSFT,No,N,A\nGSCO,MSFT,No,N,A\n")
        );
    }
}
