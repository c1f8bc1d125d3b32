//! Performance metrics: pure functions over a slice of trades.
//!
//! Every metric is a pure function: trades (or their PnL in canonical order)
//! in, value out. Degenerate inputs return a [`MetricValue`] marker instead of
//! dividing by zero. Money sums stay in `Decimal`; ratios and moments are `f64`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tradeaudit_core::domain::{MetricValue, TradeRecord};

/// Aggregate performance metrics for a set of trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub trade_count: usize,
    pub win_count: usize,
    pub loss_count: usize,
    pub breakeven_count: usize,

    pub total_pnl: Decimal,
    pub gross_profit: Decimal,
    /// Magnitude of the summed losing PnL.
    pub gross_loss: Decimal,
    pub profit_factor: MetricValue,
    pub win_rate: MetricValue,
    pub expectancy: MetricValue,
    pub avg_win: MetricValue,
    /// Magnitude of the mean losing PnL.
    pub avg_loss: MetricValue,
    pub payoff_ratio: MetricValue,

    /// Largest peak-to-trough decline of cumulative PnL, from an origin of 0.
    pub max_drawdown: MetricValue,
    pub avg_drawdown: MetricValue,
    /// Highest point of the cumulative PnL curve, origin included.
    pub peak_equity: Decimal,
    pub recovery_factor: MetricValue,
    pub sharpe: MetricValue,

    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,

    pub total_fees: Decimal,
    /// PnL before fees.
    pub gross_pnl: Decimal,
    /// Fees as a fraction of `|gross_pnl|`.
    pub fee_share: MetricValue,
}

impl PerformanceMetrics {
    /// Compute every metric. `trades` must be in canonical (close-time) order
    /// for the path-dependent metrics to be meaningful.
    pub fn compute(trades: &[&TradeRecord]) -> Self {
        let pnls: Vec<Decimal> = trades.iter().map(|t| t.pnl()).collect();
        let pnls_f64: Vec<f64> = pnls.iter().map(|p| to_f64(*p)).collect();

        let wins: Vec<Decimal> = pnls.iter().copied().filter(|p| *p > Decimal::ZERO).collect();
        let losses: Vec<Decimal> = pnls.iter().copied().filter(|p| *p < Decimal::ZERO).collect();
        let gross_profit: Decimal = wins.iter().sum();
        let gross_loss: Decimal = -losses.iter().sum::<Decimal>();
        let total_pnl: Decimal = pnls.iter().sum();
        let total_fees: Decimal = trades.iter().map(|t| t.fees()).sum();
        let gross_pnl = total_pnl + total_fees;

        let drawdown = DrawdownProfile::from_pnls(&pnls);
        let avg_win = mean_decimal(&wins);
        let avg_loss = mean_decimal(&losses).map(|v| v.abs());

        Self {
            trade_count: trades.len(),
            win_count: wins.len(),
            loss_count: losses.len(),
            breakeven_count: trades.len() - wins.len() - losses.len(),
            total_pnl,
            gross_profit,
            gross_loss,
            profit_factor: profit_factor(&pnls),
            win_rate: win_rate(&pnls),
            expectancy: expectancy(&pnls_f64),
            avg_win: option_metric(avg_win),
            avg_loss: option_metric(avg_loss),
            payoff_ratio: payoff_ratio(avg_win, avg_loss),
            max_drawdown: drawdown.max_drawdown_metric(),
            avg_drawdown: drawdown.avg_drawdown_metric(),
            peak_equity: drawdown.peak_equity,
            recovery_factor: recovery_factor(total_pnl, &drawdown),
            sharpe: sharpe_ratio(&pnls_f64),
            max_consecutive_wins: max_consecutive(&pnls, true),
            max_consecutive_losses: max_consecutive(&pnls, false),
            total_fees,
            gross_pnl,
            fee_share: ratio(to_f64(total_fees), to_f64(gross_pnl.abs()), trades.is_empty()),
        }
    }
}

// ─── Drawdown ───────────────────────────────────────────────────────

/// Drawdown statistics of the cumulative PnL curve.
///
/// The curve starts at 0 before the first trade, so a losing first trade is
/// already a drawdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawdownProfile {
    pub point_count: usize,
    pub max_drawdown: Decimal,
    pub peak_equity: Decimal,
    underwater_points: usize,
    underwater_sum: f64,
}

impl DrawdownProfile {
    pub fn from_pnls(pnls: &[Decimal]) -> Self {
        let mut equity = Decimal::ZERO;
        let mut peak = Decimal::ZERO;
        let mut max_dd = Decimal::ZERO;
        let mut underwater_points = 0;
        let mut underwater_sum = 0.0;

        for pnl in pnls {
            equity += *pnl;
            if equity > peak {
                peak = equity;
            }
            let dd = peak - equity;
            if dd > Decimal::ZERO {
                underwater_points += 1;
                underwater_sum += to_f64(dd);
                if dd > max_dd {
                    max_dd = dd;
                }
            }
        }

        Self {
            point_count: pnls.len(),
            max_drawdown: max_dd,
            peak_equity: peak,
            underwater_points,
            underwater_sum,
        }
    }

    pub fn max_drawdown_metric(&self) -> MetricValue {
        if self.point_count == 0 {
            MetricValue::NoData
        } else {
            MetricValue::Value(to_f64(self.max_drawdown))
        }
    }

    /// Mean depth over the points below the running peak; 0 when never underwater.
    pub fn avg_drawdown_metric(&self) -> MetricValue {
        if self.point_count == 0 {
            MetricValue::NoData
        } else if self.underwater_points == 0 {
            MetricValue::Value(0.0)
        } else {
            MetricValue::Value(self.underwater_sum / self.underwater_points as f64)
        }
    }
}

/// Cumulative PnL after each trade.
pub fn equity_curve(pnls: &[Decimal]) -> Vec<Decimal> {
    pnls.iter()
        .scan(Decimal::ZERO, |equity, pnl| {
            *equity += *pnl;
            Some(*equity)
        })
        .collect()
}

/// Maximum drawdown magnitude, measured from an origin of 0.
pub fn max_drawdown(pnls: &[Decimal]) -> Decimal {
    DrawdownProfile::from_pnls(pnls).max_drawdown
}

// ─── Individual metric functions ────────────────────────────────────

/// Gross profit / |gross loss|.
///
/// `Infinite` when there are no losing trades, `NoData` on empty input.
pub fn profit_factor(pnls: &[Decimal]) -> MetricValue {
    if pnls.is_empty() {
        return MetricValue::NoData;
    }
    let gross_profit: Decimal = pnls.iter().filter(|p| **p > Decimal::ZERO).sum();
    let gross_loss: Decimal = -pnls.iter().filter(|p| **p < Decimal::ZERO).sum::<Decimal>();
    if gross_loss.is_zero() {
        return MetricValue::Infinite;
    }
    MetricValue::from_f64(to_f64(gross_profit) / to_f64(gross_loss))
}

/// Fraction of trades with positive PnL.
pub fn win_rate(pnls: &[Decimal]) -> MetricValue {
    if pnls.is_empty() {
        return MetricValue::NoData;
    }
    let wins = pnls.iter().filter(|p| **p > Decimal::ZERO).count();
    MetricValue::Value(wins as f64 / pnls.len() as f64)
}

/// Mean PnL per trade.
pub fn expectancy(pnls: &[f64]) -> MetricValue {
    if pnls.is_empty() {
        return MetricValue::NoData;
    }
    MetricValue::from_f64(mean_f64(pnls))
}

/// mean(pnl) / population stdev(pnl), per trade, not annualized.
///
/// `Undefined` when the deviation is zero (including a single trade).
pub fn sharpe_ratio(pnls: &[f64]) -> MetricValue {
    if pnls.is_empty() {
        return MetricValue::NoData;
    }
    let std = population_std_dev(pnls);
    if std < 1e-15 {
        return MetricValue::Undefined;
    }
    MetricValue::from_f64(mean_f64(pnls) / std)
}

/// Average win / average loss magnitude.
pub fn payoff_ratio(avg_win: Option<Decimal>, avg_loss: Option<Decimal>) -> MetricValue {
    match (avg_win, avg_loss) {
        (None, None) => MetricValue::NoData,
        (Some(_), None) => MetricValue::Infinite,
        (None, Some(_)) => MetricValue::Value(0.0),
        (Some(w), Some(l)) => {
            if l.is_zero() {
                MetricValue::Infinite
            } else {
                MetricValue::from_f64(to_f64(w) / to_f64(l))
            }
        }
    }
}

/// Total PnL / max drawdown; `Infinite` when there was no drawdown.
fn recovery_factor(total_pnl: Decimal, drawdown: &DrawdownProfile) -> MetricValue {
    if drawdown.point_count == 0 {
        return MetricValue::NoData;
    }
    if drawdown.max_drawdown.is_zero() {
        return MetricValue::Infinite;
    }
    MetricValue::from_f64(to_f64(total_pnl) / to_f64(drawdown.max_drawdown))
}

/// Longest run of wins (`winners = true`) or losses. A breakeven trade ends both.
pub fn max_consecutive(pnls: &[Decimal], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;

    for pnl in pnls {
        let hit = if winners {
            *pnl > Decimal::ZERO
        } else {
            *pnl < Decimal::ZERO
        };
        if hit {
            current += 1;
            if current > max_streak {
                max_streak = current;
            }
        } else {
            current = 0;
        }
    }
    max_streak
}

/// Mean PnL over each trailing window of `window` trades.
///
/// Empty when there are fewer trades than the window.
pub fn rolling_expectancy(pnls: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || pnls.len() < window {
        return Vec::new();
    }
    pnls.windows(window).map(mean_f64).collect()
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn mean_decimal(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<Decimal>() / Decimal::from(values.len()))
}

fn option_metric(value: Option<Decimal>) -> MetricValue {
    value.map_or(MetricValue::NoData, |v| MetricValue::Value(to_f64(v)))
}

fn ratio(numerator: f64, denominator: f64, empty: bool) -> MetricValue {
    if empty {
        MetricValue::NoData
    } else if denominator.abs() < 1e-15 {
        MetricValue::Undefined
    } else {
        MetricValue::from_f64(numerator / denominator)
    }
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Linear-interpolated percentile of an ascending slice, `p` in [0, 100].
pub(crate) fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

pub(crate) fn sorted_f64(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}
