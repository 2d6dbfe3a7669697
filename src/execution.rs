//! Execution price files: one integer price (× 10⁴) per line.
use crate::error::{Error, Result};
use std::io::BufRead;

/// Fixed-point scale of ITCH prices.
pub const PRICE_SCALE: f64 = 10_000.0;

/// Read every price, converted to decimal units.
pub fn parse_prices<R: BufRead>(reader: R) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }
        let ticks: i64 = raw.parse().map_err(|_| Error::MalformedLine {
            line: i + 1,
            reason: format!("price {raw:?} is not an integer"),
        })?;
        out.push(ticks as f64 / PRICE_SCALE);
    }
    Ok(out)
}

/// Lowest and highest price, `None` for an empty series.
pub fn bounds(prices: &[f64]) -> Option<(f64, f64)> {
    prices.iter().fold(None, |acc, &p| match acc {
        None => Some((p, p)),
        Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
    })
}
