//! Risk metrics: leverage distribution and leverage-bucketed performance.

use serde::{Deserialize, Serialize};
use tradeaudit_core::config::AnalysisConfig;
use tradeaudit_core::domain::{MetricValue, TradeRecord, TradeSet};

use crate::metrics::{mean_f64, percentile_sorted, sorted_f64, PerformanceMetrics};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverageStats {
    pub mean: MetricValue,
    pub median: MetricValue,
    pub min: MetricValue,
    pub max: MetricValue,
}

impl LeverageStats {
    pub fn compute(leverages: &[f64]) -> Self {
        if leverages.is_empty() {
            return Self {
                mean: MetricValue::NoData,
                median: MetricValue::NoData,
                min: MetricValue::NoData,
                max: MetricValue::NoData,
            };
        }
        let sorted = sorted_f64(leverages);
        Self {
            mean: MetricValue::from_f64(mean_f64(leverages)),
            median: MetricValue::from_f64(percentile_sorted(&sorted, 50.0)),
            min: MetricValue::from_f64(sorted[0]),
            max: MetricValue::from_f64(sorted[sorted.len() - 1]),
        }
    }
}

/// One histogram bucket `[lower, upper)`; the last bucket has no upper edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverageBucket {
    pub label: String,
    pub lower: f64,
    pub upper: Option<f64>,
    pub metrics: PerformanceMetrics,
}

impl LeverageBucket {
    pub fn contains(&self, leverage: f64) -> bool {
        leverage >= self.lower && self.upper.map_or(true, |u| leverage < u)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub leverage: LeverageStats,
    pub histogram: Vec<LeverageBucket>,
    pub high_leverage_threshold: f64,
    /// Trades with `leverage >= high_leverage_threshold`.
    pub high_leverage: PerformanceMetrics,
    pub normal_leverage: PerformanceMetrics,
}

impl RiskMetrics {
    pub fn compute(set: &TradeSet, config: &AnalysisConfig) -> Self {
        let trades = set.refs();
        let leverages: Vec<f64> = trades.iter().map(|t| t.leverage()).collect();
        let threshold = config.high_leverage_threshold;

        let (high, normal): (Vec<&TradeRecord>, Vec<&TradeRecord>) =
            trades.iter().copied().partition(|t| is_high_leverage(t, threshold));

        Self {
            leverage: LeverageStats::compute(&leverages),
            histogram: histogram(&trades, &config.leverage_bucket_edges),
            high_leverage_threshold: threshold,
            high_leverage: PerformanceMetrics::compute(&high),
            normal_leverage: PerformanceMetrics::compute(&normal),
        }
    }
}

pub fn is_high_leverage(trade: &TradeRecord, threshold: f64) -> bool {
    trade.leverage() >= threshold
}

/// Bucket trades by leverage using ascending upper edges.
///
/// Edges `[10, 20]` give buckets `<10`, `10-20` and `20+`. Every bucket is
/// reported, including empty ones.
pub fn histogram(trades: &[&TradeRecord], edges: &[f64]) -> Vec<LeverageBucket> {
    let mut bounds: Vec<(f64, Option<f64>)> = Vec::with_capacity(edges.len() + 1);
    let mut lower = 0.0;
    for &edge in edges {
        bounds.push((lower, Some(edge)));
        lower = edge;
    }
    bounds.push((lower, None));

    bounds
        .into_iter()
        .map(|(lower, upper)| {
            let label = match upper {
                Some(u) if lower == 0.0 => format!("<{u}"),
                Some(u) => format!("{lower}-{u}"),
                None => format!("{lower}+"),
            };
            let mut bucket = LeverageBucket {
                label,
                lower,
                upper,
                metrics: PerformanceMetrics::compute(&[]),
            };
            let members: Vec<&TradeRecord> = trades
                .iter()
                .copied()
                .filter(|t| bucket.contains(t.leverage()))
                .collect();
            bucket.metrics = PerformanceMetrics::compute(&members);
            bucket
        })
        .collect()
}
