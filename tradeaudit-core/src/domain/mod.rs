//! Domain types for tradeaudit

pub mod metric;
pub mod trade;
pub mod trade_set;

pub use metric::MetricValue;
pub use trade::{Direction, TradeError, TradeInput, TradeRecord, MAX_ABS_AMOUNT};
pub use trade_set::TradeSet;
