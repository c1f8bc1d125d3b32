//! Holding-time metrics: scalp / standard / swing categories, trade types,
//! fixed duration brackets and duration stats.

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tradeaudit_core::config::AnalysisConfig;
use tradeaudit_core::domain::{Direction, MetricValue, TradeRecord, TradeSet};

use crate::metrics::{mean_f64, percentile_sorted, population_std_dev, sorted_f64, PerformanceMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationCategory {
    /// Shorter than `scalp_max_duration`.
    Scalp,
    Standard,
    /// Longer than `swing_min_duration`.
    Swing,
}

impl DurationCategory {
    pub const ALL: [DurationCategory; 3] = [
        DurationCategory::Scalp,
        DurationCategory::Standard,
        DurationCategory::Swing,
    ];

    pub fn classify(duration: Duration, scalp_max: Duration, swing_min: Duration) -> Self {
        if duration < scalp_max {
            DurationCategory::Scalp
        } else if duration > swing_min {
            DurationCategory::Swing
        } else {
            DurationCategory::Standard
        }
    }
}

/// Setup type: high leverage takes priority, then the duration category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeType {
    Scalp,
    Standard,
    Swing,
    /// Leverage at or above `high_leverage_threshold`, whatever the hold.
    HighLeverage,
}

impl TradeType {
    pub const ALL: [TradeType; 4] = [
        TradeType::Scalp,
        TradeType::Standard,
        TradeType::Swing,
        TradeType::HighLeverage,
    ];

    pub fn classify(trade: &TradeRecord, config: &AnalysisConfig) -> Self {
        if trade.leverage() >= config.high_leverage_threshold {
            return TradeType::HighLeverage;
        }
        match DurationCategory::classify(
            trade.duration(),
            config.scalp_max_duration(),
            config.swing_min_duration(),
        ) {
            DurationCategory::Scalp => TradeType::Scalp,
            DurationCategory::Standard => TradeType::Standard,
            DurationCategory::Swing => TradeType::Swing,
        }
    }
}

/// Fixed holding-time brackets, independent of the configured categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DurationBracket {
    #[serde(rename = "0-5 min")]
    UnderFive,
    #[serde(rename = "5-15 min")]
    FiveToFifteen,
    #[serde(rename = "15-60 min")]
    FifteenToSixty,
    #[serde(rename = "60+ min")]
    SixtyPlus,
}

impl DurationBracket {
    pub const ALL: [DurationBracket; 4] = [
        DurationBracket::UnderFive,
        DurationBracket::FiveToFifteen,
        DurationBracket::FifteenToSixty,
        DurationBracket::SixtyPlus,
    ];

    /// Lower bounds inclusive: exactly 5 minutes is `5-15 min`.
    pub fn classify(minutes: f64) -> Self {
        if minutes < 5.0 {
            DurationBracket::UnderFive
        } else if minutes < 15.0 {
            DurationBracket::FiveToFifteen
        } else if minutes < 60.0 {
            DurationBracket::FifteenToSixty
        } else {
            DurationBracket::SixtyPlus
        }
    }
}

/// Distribution of holding times, in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    pub count: usize,
    pub mean_minutes: MetricValue,
    pub median_minutes: MetricValue,
    pub min_minutes: MetricValue,
    pub max_minutes: MetricValue,
    pub stdev_minutes: MetricValue,
}

impl DurationStats {
    pub fn compute(trades: &[&TradeRecord]) -> Self {
        let minutes: Vec<f64> = trades.iter().map(|t| t.duration_minutes()).collect();
        if minutes.is_empty() {
            return Self {
                count: 0,
                mean_minutes: MetricValue::NoData,
                median_minutes: MetricValue::NoData,
                min_minutes: MetricValue::NoData,
                max_minutes: MetricValue::NoData,
                stdev_minutes: MetricValue::NoData,
            };
        }
        let sorted = sorted_f64(&minutes);
        Self {
            count: minutes.len(),
            mean_minutes: MetricValue::from_f64(mean_f64(&minutes)),
            median_minutes: MetricValue::from_f64(percentile_sorted(&sorted, 50.0)),
            min_minutes: MetricValue::from_f64(sorted[0]),
            max_minutes: MetricValue::from_f64(sorted[sorted.len() - 1]),
            stdev_minutes: MetricValue::from_f64(population_std_dev(&minutes)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMetrics {
    pub category: DurationCategory,
    pub durations: DurationStats,
    pub metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTypeMetrics {
    pub trade_type: TradeType,
    /// `None` for the all-directions row.
    pub direction: Option<Direction>,
    pub durations: DurationStats,
    pub metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketMetrics {
    pub bracket: DurationBracket,
    pub metrics: PerformanceMetrics,
}

/// Trades held at least the median duration against the shorter ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatienceSplit {
    pub median_minutes: MetricValue,
    pub patient_count: usize,
    pub patient_pnl: Decimal,
    pub quick_count: usize,
    pub quick_pnl: Decimal,
}

impl PatienceSplit {
    pub fn compute(trades: &[&TradeRecord]) -> Self {
        let minutes: Vec<f64> = trades.iter().map(|t| t.duration_minutes()).collect();
        if minutes.is_empty() {
            return Self {
                median_minutes: MetricValue::NoData,
                patient_count: 0,
                patient_pnl: Decimal::ZERO,
                quick_count: 0,
                quick_pnl: Decimal::ZERO,
            };
        }
        let median = percentile_sorted(&sorted_f64(&minutes), 50.0);
        let (patient, quick): (Vec<&TradeRecord>, Vec<&TradeRecord>) =
            trades.iter().copied().partition(|t| t.duration_minutes() >= median);
        Self {
            median_minutes: MetricValue::from_f64(median),
            patient_count: patient.len(),
            patient_pnl: patient.iter().map(|t| t.pnl()).sum(),
            quick_count: quick.len(),
            quick_pnl: quick.iter().map(|t| t.pnl()).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationMetrics {
    pub overall: DurationStats,
    /// One entry per category, in scalp / standard / swing order.
    pub categories: Vec<CategoryMetrics>,
    /// Non-empty trade types, in scalp / standard / swing / high-leverage order.
    pub trade_types: Vec<TradeTypeMetrics>,
    /// Non-empty (trade type, direction) pairs, long before short.
    pub trade_types_by_direction: Vec<TradeTypeMetrics>,
    /// Non-empty brackets, shortest first.
    pub brackets: Vec<BracketMetrics>,
    pub patience: PatienceSplit,
    pub winners: DurationStats,
    pub losers: DurationStats,
}

impl DurationMetrics {
    pub fn compute(set: &TradeSet, config: &AnalysisConfig) -> Self {
        let trades = set.refs();
        let scalp_max = config.scalp_max_duration();
        let swing_min = config.swing_min_duration();

        let categories = DurationCategory::ALL
            .iter()
            .map(|&category| {
                let members: Vec<&TradeRecord> = trades
                    .iter()
                    .copied()
                    .filter(|t| DurationCategory::classify(t.duration(), scalp_max, swing_min) == category)
                    .collect();
                CategoryMetrics {
                    category,
                    durations: DurationStats::compute(&members),
                    metrics: PerformanceMetrics::compute(&members),
                }
            })
            .collect();

        let types: Vec<TradeType> = trades.iter().map(|t| TradeType::classify(t, config)).collect();
        let type_row = |trade_type: TradeType, direction: Option<Direction>| {
            let members: Vec<&TradeRecord> = trades
                .iter()
                .zip(&types)
                .filter(|(t, ty)| **ty == trade_type && direction.map_or(true, |d| t.direction() == d))
                .map(|(t, _)| *t)
                .collect();
            (!members.is_empty()).then(|| TradeTypeMetrics {
                trade_type,
                direction,
                durations: DurationStats::compute(&members),
                metrics: PerformanceMetrics::compute(&members),
            })
        };
        let trade_types = TradeType::ALL
            .iter()
            .filter_map(|&ty| type_row(ty, None))
            .collect();
        let trade_types_by_direction = TradeType::ALL
            .iter()
            .flat_map(|&ty| [Direction::Long, Direction::Short].map(|d| (ty, d)))
            .filter_map(|(ty, d)| type_row(ty, Some(d)))
            .collect();

        let brackets = DurationBracket::ALL
            .iter()
            .filter_map(|&bracket| {
                let members: Vec<&TradeRecord> = trades
                    .iter()
                    .copied()
                    .filter(|t| DurationBracket::classify(t.duration_minutes()) == bracket)
                    .collect();
                (!members.is_empty()).then(|| BracketMetrics {
                    bracket,
                    metrics: PerformanceMetrics::compute(&members),
                })
            })
            .collect();

        let winners: Vec<&TradeRecord> = trades.iter().copied().filter(|t| t.is_win()).collect();
        let losers: Vec<&TradeRecord> = trades.iter().copied().filter(|t| t.is_loss()).collect();

        Self {
            overall: DurationStats::compute(&trades),
            categories,
            trade_types,
            trade_types_by_direction,
            brackets,
            patience: PatienceSplit::compute(&trades),
            winners: DurationStats::compute(&winners),
            losers: DurationStats::compute(&losers),
        }
    }
}
