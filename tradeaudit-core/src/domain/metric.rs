//! MetricValue: a metric result that may be degenerate.

use serde::{Deserialize, Serialize};

/// Outcome of a metric computation.
///
/// Degenerate inputs become explicit variants instead of NaN or a
/// divide-by-zero fault, so one bad metric never poisons a report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum MetricValue {
    /// A finite number.
    Value(f64),
    /// Positive infinity, e.g. profit factor with no losing trades.
    Infinite,
    /// Numerically degenerate, e.g. a ratio over zero variance.
    Undefined,
    /// Not enough data to compute anything.
    NoData,
}

impl MetricValue {
    /// Wrap a float, mapping non-finite results to the matching marker.
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            MetricValue::Value(value)
        } else if value == f64::INFINITY {
            MetricValue::Infinite
        } else {
            MetricValue::Undefined
        }
    }

    /// The finite value, if any.
    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, MetricValue::Infinite)
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, MetricValue::Value(_) | MetricValue::Infinite)
    }
}
