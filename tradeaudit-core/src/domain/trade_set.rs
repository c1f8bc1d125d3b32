//! TradeSet: the immutable, canonically ordered working set of one analysis run.

use rust_decimal::Decimal;
use serde::Serialize;

use super::trade::{Direction, TradeRecord};

/// Trades ordered by `close_time` ascending.
///
/// The ordering is established once, with a stable sort, so trades closing at
/// the same instant keep their input order. There is no mutable access.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradeSet {
    trades: Vec<TradeRecord>,
}

impl TradeSet {
    pub fn new(mut trades: Vec<TradeRecord>) -> Self {
        trades.sort_by_key(|t| t.close_time());
        Self { trades }
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TradeRecord> {
        self.trades.iter()
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Borrowed view of every trade, in canonical order.
    pub fn refs(&self) -> Vec<&TradeRecord> {
        self.trades.iter().collect()
    }

    /// Borrowed view of the trades on one side, in canonical order.
    pub fn by_direction(&self, direction: Direction) -> Vec<&TradeRecord> {
        self.trades
            .iter()
            .filter(|t| t.direction() == direction)
            .collect()
    }

    /// Per-trade PnL in canonical order.
    pub fn pnls(&self) -> Vec<Decimal> {
        self.trades.iter().map(TradeRecord::pnl).collect()
    }

    /// Sum of PnL. Each trade is bounded by [`MAX_ABS_AMOUNT`], so the sum
    /// cannot overflow.
    ///
    /// [`MAX_ABS_AMOUNT`]: super::trade::MAX_ABS_AMOUNT
    pub fn total_pnl(&self) -> Decimal {
        self.trades.iter().map(TradeRecord::pnl).sum()
    }
}

impl<'a> IntoIterator for &'a TradeSet {
    type Item = &'a TradeRecord;
    type IntoIter = std::slice::Iter<'a, TradeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.trades.iter()
    }
}

impl FromIterator<TradeRecord> for TradeSet {
    fn from_iter<I: IntoIterator<Item = TradeRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
