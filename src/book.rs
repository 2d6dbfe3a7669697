//! Order-by-order book rebuilt from ITCH messages.
//!
//! This module keeps every resting order keyed by its order reference number
//! (`OrderBook`) plus the executions seen so far keyed by match number. It
//! applies the book-changing message types:
//! - add (A/F), cancel (X), delete (D) and replace (U)
//! - executions against resting orders (E, C)
//! - trades reported without a resting order (P, Q)
//!
//! The per-stock dumps written by [`OrderBook::write_snapshot`] and
//! [`OrderBook::write_executions`] are the text inputs of the two visualizers.
use crate::error::{Error, Result};
use crate::itch::{AddOrder, CrossTrade, OrderExecuted, OrderExecutedWithPrice, OrderReplace, Trade};
use std::collections::HashMap;
use std::io::Write;

/// Header line that opens every dumped snapshot.
pub const SNAPSHOT_HEADER: &str = "Side,Order Ref. Number,Price,Volume";

/// Header line of the full book dump.
pub const ORDERS_HEADER: &str = "Order Reference Number,Side,Stock Locate,Price,Volume";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    /// `b'B'` or `b'S'`.
    pub side: u8,
    pub stock_locate: u16,
    /// Price in 1/10000 units.
    pub price: u32,
    pub shares: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Execution {
    pub match_number: u64,
    pub stock_locate: u16,
    pub price: u32,
    pub shares: u64,
    /// Cross type for Q trades, `b' '` otherwise.
    pub cross_type: u8,
}

#[derive(Debug, Default)]
pub struct OrderBook {
    orders: HashMap<u64, Order>,
    executions: Vec<Execution>,
    by_match: HashMap<u64, usize>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order(&self, order_ref: u64) -> Option<&Order> {
        self.orders.get(&order_ref)
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Executions in the order their match numbers were first seen.
    pub fn executions(&self) -> &[Execution] {
        &self.executions
    }

    pub fn add(&mut self, m: &AddOrder) {
        self.orders.insert(
            m.order_ref,
            Order { side: m.side, stock_locate: m.header.stock_locate, price: m.price, shares: m.shares },
        );
    }

    /// Partial cancel; the order leaves the book when nothing is left.
    pub fn cancel(&mut self, order_ref: u64, cancelled: u32) -> Result<()> {
        self.reduce(order_ref, cancelled).map(|_| ())
    }

    pub fn delete(&mut self, order_ref: u64) -> Result<()> {
        self.orders.remove(&order_ref).map(|_| ()).ok_or(Error::UnknownOrder(order_ref))
    }

    /// Move an order to a new reference with new price and size, keeping its side.
    pub fn replace(&mut self, m: &OrderReplace) -> Result<()> {
        let old = self.orders.remove(&m.original_ref).ok_or(Error::UnknownOrder(m.original_ref))?;
        self.orders.insert(
            m.new_ref,
            Order { side: old.side, stock_locate: m.header.stock_locate, price: m.price, shares: m.shares },
        );
        Ok(())
    }

    /// Execution at the resting order's price.
    pub fn execute(&mut self, m: &OrderExecuted) -> Result<()> {
        let order = self.reduce(m.order_ref, m.executed_shares)?;
        self.record(m.match_number, order.stock_locate, order.price, m.executed_shares as u64, b' ');
        Ok(())
    }

    /// Execution at an explicit price. Non-printable executions reduce the
    /// order but are not recorded as trades.
    pub fn execute_with_price(&mut self, m: &OrderExecutedWithPrice) -> Result<()> {
        let order = self.reduce(m.order_ref, m.executed_shares)?;
        if m.printable {
            self.record(m.match_number, order.stock_locate, m.execution_price, m.executed_shares as u64, b' ');
        }
        Ok(())
    }

    /// Trade against a non-displayed order.
    pub fn trade(&mut self, m: &Trade) {
        self.record(m.match_number, m.header.stock_locate, m.price, m.shares as u64, b' ');
    }

    pub fn cross(&mut self, m: &CrossTrade) {
        self.record(m.match_number, m.header.stock_locate, m.cross_price, m.shares, m.cross_type);
    }

    /// Resting orders of one stock, sorted by order reference.
    pub fn orders_for(&self, stock_locate: u16) -> Vec<(u64, Order)> {
        let mut out: Vec<(u64, Order)> = self
            .orders
            .iter()
            .filter(|(_, o)| o.stock_locate == stock_locate)
            .map(|(r, o)| (*r, *o))
            .collect();
        out.sort_unstable_by_key(|(r, _)| *r);
        out
    }

    /// Write one snapshot of a stock's resting orders in snapshot log format.
    pub fn write_snapshot<W: Write>(&self, w: &mut W, stock_locate: u16) -> Result<()> {
        writeln!(w, "{SNAPSHOT_HEADER}")?;
        for (order_ref, o) in self.orders_for(stock_locate) {
            writeln!(w, "{},{},{},{}", o.side as char, order_ref, o.price, o.shares)?;
        }
        Ok(())
    }

    /// Write every resting order of every stock, sorted by order reference.
    pub fn write_orders<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut refs: Vec<u64> = self.orders.keys().copied().collect();
        refs.sort_unstable();
        writeln!(w, "{ORDERS_HEADER}")?;
        for order_ref in refs {
            let o = &self.orders[&order_ref];
            writeln!(w, "{},{},{},{},{}", order_ref, o.side as char, o.stock_locate, o.price, o.shares)?;
        }
        Ok(())
    }

    /// Write the execution prices of a stock, one per line, in arrival order.
    pub fn write_executions<W: Write>(&self, w: &mut W, stock_locate: u16) -> Result<()> {
        for e in self.executions.iter().filter(|e| e.stock_locate == stock_locate) {
            writeln!(w, "{}", e.price)?;
        }
        Ok(())
    }

    fn reduce(&mut self, order_ref: u64, shares: u32) -> Result<Order> {
        let order = self.orders.get_mut(&order_ref).ok_or(Error::UnknownOrder(order_ref))?;
        order.shares = order.shares.saturating_sub(shares);
        let snapshot = *order;
        if snapshot.shares == 0 {
            self.orders.remove(&order_ref);
        }
        Ok(snapshot)
    }

    fn record(&mut self, match_number: u64, stock_locate: u16, price: u32, shares: u64, cross_type: u8) {
        if let Some(&idx) = self.by_match.get(&match_number) {
            self.executions[idx].shares += shares;
            return;
        }
        self.by_match.insert(match_number, self.executions.len());
        self.executions.push(Execution { match_number, stock_locate, price, shares, cross_type });
    }
}
