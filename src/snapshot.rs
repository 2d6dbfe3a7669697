//! Snapshot log parsing.
//!
//! The log is the textual book dump written by `itch-parser --book-out`: a
//! delimiter line containing `Side` opens every snapshot, followed by
//! comma-separated order lines `side,order_ref,price,volume`. Each snapshot is
//! folded into per-side histograms keyed by `price div 1000`.
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::io::BufRead;

/// Price bucket width in price ticks.
pub const BUCKET_WIDTH: i64 = 1000;

/// Substring that marks a snapshot delimiter line.
pub const DELIMITER: &str = "Side";

/// Bucket key to cumulative volume.
pub type BucketMap = BTreeMap<i64, i64>;

/// Depth histograms of one sealed snapshot.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BookSnapshot {
    pub buy_buckets: BucketMap,
    pub sell_buckets: BucketMap,
}

impl BookSnapshot {
    pub fn is_empty(&self) -> bool {
        self.buy_buckets.is_empty() && self.sell_buckets.is_empty()
    }
}

/// What to do with the accumulator still open when the input ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TrailingSnapshot {
    /// Drop it. Only delimiter lines seal a snapshot.
    #[default]
    Discard,
    /// Seal it as a final snapshot if any update line reached it.
    Seal,
}

/// Bucket key for a price in ticks (floor division).
pub fn bucket_of(price: i64) -> i64 {
    price.div_euclid(BUCKET_WIDTH)
}

/// Incremental line-by-line accumulator.
#[derive(Debug, Default)]
pub struct SnapshotParser {
    trailing: TrailingSnapshot,
    current: BookSnapshot,
    dirty: bool,
    line: usize,
}

impl SnapshotParser {
    pub fn new(trailing: TrailingSnapshot) -> Self {
        Self { trailing, ..Self::default() }
    }

    /// Feed one line (with or without its newline). Returns the sealed snapshot
    /// when `line` is a delimiter.
    pub fn feed(&mut self, line: &str) -> Result<Option<BookSnapshot>> {
        self.line += 1;
        if line.contains(DELIMITER) {
            self.dirty = false;
            return Ok(Some(std::mem::take(&mut self.current)));
        }
        if line.trim().is_empty() {
            return Ok(None);
        }

        let mut fields = line.split(',');
        let side = fields.next().unwrap_or_default();
        let _order_ref = fields.next();
        let price = self.integer(fields.next(), "price")?;
        let volume = self.integer(fields.next(), "volume")?;

        let buckets = match side {
            "B" => &mut self.current.buy_buckets,
            "S" => &mut self.current.sell_buckets,
            _ => return Ok(None),
        };
        let line_no = self.line;
        let slot = buckets.entry(bucket_of(price)).or_insert(0);
        *slot = slot.checked_add(volume).ok_or_else(|| Error::MalformedLine {
            line: line_no,
            reason: format!("volume {volume} overflows bucket total"),
        })?;
        self.dirty = true;
        Ok(None)
    }

    /// Close the input, applying the trailing policy.
    pub fn finish(self) -> Option<BookSnapshot> {
        match self.trailing {
            TrailingSnapshot::Seal if self.dirty => Some(self.current),
            _ => None,
        }
    }

    fn integer(&self, field: Option<&str>, name: &str) -> Result<i64> {
        let raw = field.ok_or_else(|| Error::MalformedLine {
            line: self.line,
            reason: format!("missing {name} field"),
        })?;
        raw.trim().parse().map_err(|_| Error::MalformedLine {
            line: self.line,
            reason: format!("{name} {:?} is not an integer", raw.trim()),
        })
    }
}

/// Read a whole snapshot log into memory.
pub fn parse_snapshots<R: BufRead>(reader: R, trailing: TrailingSnapshot) -> Result<Vec<BookSnapshot>> {
    let mut parser = SnapshotParser::new(trailing);
    let mut out = Vec::new();
    for line in reader.lines() {
        if let Some(snapshot) = parser.feed(&line?)? {
            out.push(snapshot);
        }
    }
    out.extend(parser.finish());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LOG: &str = "B,x,1500,10\nS,x,1500,5\nSide\nB,x,1600,20\n";

    #[test]
    fn delimiter_seals_and_trailing_is_discarded() {
        let snaps = parse_snapshots(LOG.as_bytes(), TrailingSnapshot::Discard).unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].buy_buckets, BucketMap::from([(1, 10)]));
        assert_eq!(snaps[0].sell_buckets, BucketMap::from([(1, 5)]));
    }

    #[test]
    fn seal_policy_keeps_trailing_snapshot() {
        let snaps = parse_snapshots(LOG.as_bytes(), TrailingSnapshot::Seal).unwrap();
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[1].buy_buckets, BucketMap::from([(1, 20)]));
        assert!(snaps[1].sell_buckets.is_empty());
    }

    #[test]
    fn seal_policy_ignores_clean_end() {
        let log = "Side,Order Ref. Number,Price,Volume\nB,1,2000,3\nSide,Order Ref. Number,Price,Volume\n";
        let snaps = parse_snapshots(log.as_bytes(), TrailingSnapshot::Seal).unwrap();
        assert_eq!(snaps.len(), 2);
        assert!(snaps[0].is_empty());
        assert_eq!(snaps[1].buy_buckets, BucketMap::from([(2, 3)]));
    }

    #[test]
    fn volumes_accumulate_per_bucket() {
        let log = "B,1,1000,1\nB,2,1999,2\nB,3,2000,4\nS,4,5000,7\nX,5,5000,9\nSide\n";
        let snaps = parse_snapshots(log.as_bytes(), TrailingSnapshot::Discard).unwrap();
        assert_eq!(snaps[0].buy_buckets, BucketMap::from([(1, 3), (2, 4)]));
        assert_eq!(snaps[0].sell_buckets, BucketMap::from([(5, 7)]));
    }

    #[test]
    fn negative_prices_floor() {
        assert_eq!(bucket_of(-1), -1);
        assert_eq!(bucket_of(999), 0);
        assert_eq!(bucket_of(-1000), -1);
    }

    #[test]
    fn non_integer_price_is_fatal() {
        let log = "Side\nB,1,12.5,3\n";
        match parse_snapshots(log.as_bytes(), TrailingSnapshot::Discard) {
            Err(Error::MalformedLine { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed line, got {other:?}"),
        }
    }

    #[test]
    fn unknown_side_still_validates_numbers() {
        let mut parser = SnapshotParser::new(TrailingSnapshot::Discard);
        assert!(parser.feed("Q,1,100,2").unwrap().is_none());
        assert!(parser.feed("Q,1,abc,2").is_err());
    }

    #[test]
    fn short_line_is_fatal() {
        let mut parser = SnapshotParser::new(TrailingSnapshot::Discard);
        assert!(matches!(parser.feed("B,1,100"), Err(Error::MalformedLine { .. })));
    }

    #[test]
    fn bucket_total_overflow_is_fatal() {
        let log = "B,1,1000,9223372036854775807\nB,2,1000,1\nSide\n";
        match parse_snapshots(log.as_bytes(), TrailingSnapshot::Discard) {
            Err(Error::MalformedLine { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed line, got {other:?}"),
        }
    }

    #[test]
    fn side_token_must_match_exactly() {
        let log = " B,1,1000,4\nb,2,1000,4\nS ,3,1000,4\nB,4,1000,1\nSide\n";
        let snaps = parse_snapshots(log.as_bytes(), TrailingSnapshot::Discard).unwrap();
        assert_eq!(snaps[0].buy_buckets, BucketMap::from([(1, 1)]));
        assert!(snaps[0].sell_buckets.is_empty());
    }

    #[test]
    fn blank_lines_are_skipped() {
        let log = "B,1,1000,1\n\n   \nSide\n";
        let snaps = parse_snapshots(log.as_bytes(), TrailingSnapshot::Discard).unwrap();
        assert_eq!(snaps[0].buy_buckets, BucketMap::from([(1, 1)]));
    }

    proptest! {
        #[test]
        fn bucket_sums_match_side_volumes(
            lines in proptest::collection::vec(
                (prop_oneof![Just("B"), Just("S"), Just("Z")], 0i64..10_000_000, 0i64..100_000),
                0..50,
            )
        ) {
            let mut log = String::new();
            for (side, price, volume) in &lines {
                log.push_str(&format!("{side},0,{price},{volume}\n"));
            }
            log.push_str("Side\n");
            let snaps = parse_snapshots(log.as_bytes(), TrailingSnapshot::Discard).unwrap();
            prop_assert_eq!(snaps.len(), 1);

            let expect = |s: &str| lines.iter().filter(|l| l.0 == s).map(|l| l.2).sum::<i64>();
            prop_assert_eq!(snaps[0].buy_buckets.values().sum::<i64>(), expect("B"));
            prop_assert_eq!(snaps[0].sell_buckets.values().sum::<i64>(), expect("S"));
        }
    }
}
