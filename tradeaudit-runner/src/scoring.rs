//! Discipline scoring.
//!
//! Two views of discipline:
//! - [`DisciplineScore`]: one composite in [0, 100] from four weighted
//!   sub-scores (profit factor, win rate, drawdown control, behavior).
//! - [`TradeDisciplineReport`]: a per-trade score starting at 100 with
//!   penalties for short holds and behavioral flags, plus a label per trade.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tradeaudit_core::behavior::{BehaviorReport, TradeFlags};
use tradeaudit_core::config::AnalysisConfig;
use tradeaudit_core::domain::{MetricValue, TradeRecord, TradeSet};

use crate::metrics::{mean_f64, percentile_sorted, sorted_f64, to_f64, PerformanceMetrics};

// ─── Composite score ────────────────────────────────────────────────

/// Normalized sub-score weights actually applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppliedWeights {
    pub profit_factor: f64,
    pub win_rate: f64,
    pub drawdown: f64,
    pub behavior: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Final score, clamped into [0, 100].
    pub score: f64,
    /// Weighted sum before clamping.
    pub raw_score: f64,
    pub profit_factor_score: f64,
    pub win_rate_score: f64,
    pub drawdown_score: f64,
    pub behavior_score: f64,
    pub weights: AppliedWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DisciplineScore {
    Scored(ScoreBreakdown),
    NotApplicable,
}

impl DisciplineScore {
    pub fn compute(
        metrics: &PerformanceMetrics,
        behavior: &BehaviorReport,
        config: &AnalysisConfig,
    ) -> Self {
        if metrics.trade_count == 0 {
            return DisciplineScore::NotApplicable;
        }
        let Some([w_pf, w_wr, w_dd, w_bh]) = config.weights.normalized() else {
            return DisciplineScore::NotApplicable;
        };

        let profit_factor_score =
            profit_factor_score(metrics.profit_factor, config.profit_factor_target);
        let win_rate_score = 100.0 * metrics.win_rate.value().unwrap_or(0.0);
        let drawdown_score = drawdown_score(metrics.max_drawdown, metrics.peak_equity);
        let behavior_score = 100.0 * (1.0 - behavior.flagged_fraction());

        let raw_score = w_pf * profit_factor_score
            + w_wr * win_rate_score
            + w_dd * drawdown_score
            + w_bh * behavior_score;

        DisciplineScore::Scored(ScoreBreakdown {
            score: raw_score.clamp(0.0, 100.0),
            raw_score,
            profit_factor_score,
            win_rate_score,
            drawdown_score,
            behavior_score,
            weights: AppliedWeights {
                profit_factor: w_pf,
                win_rate: w_wr,
                drawdown: w_dd,
                behavior: w_bh,
            },
        })
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            DisciplineScore::Scored(b) => Some(b.score),
            DisciplineScore::NotApplicable => None,
        }
    }
}

/// `100 * min(pf, target) / target`; infinite maps to 100, degenerate to 0.
pub fn profit_factor_score(profit_factor: MetricValue, target: f64) -> f64 {
    match profit_factor {
        MetricValue::Infinite => 100.0,
        MetricValue::Value(pf) if pf.is_finite() && target > 0.0 => {
            100.0 * pf.clamp(0.0, target) / target
        }
        _ => 0.0,
    }
}

/// `100 * (1 - min(1, max_dd / peak_equity))`.
pub fn drawdown_score(max_drawdown: MetricValue, peak_equity: Decimal) -> f64 {
    let dd = match max_drawdown {
        MetricValue::Value(dd) => dd,
        _ => return 0.0,
    };
    if dd <= 0.0 {
        return 100.0;
    }
    let peak = to_f64(peak_equity);
    if peak <= 0.0 {
        return 0.0;
    }
    100.0 * (1.0 - (dd / peak).min(1.0))
}

// ─── Per-trade discipline ───────────────────────────────────────────

pub const SHORT_HOLD_PENALTY: u32 = 30;
pub const REVENGE_PENALTY: u32 = 20;
pub const IMPULSIVE_PENALTY: u32 = 10;
pub const OVERTRADING_PENALTY: u32 = 10;

/// Below this many trades the short-hold penalty is not applied.
const SHORT_HOLD_MIN_TRADES: usize = 6;
const SHORT_HOLD_PERCENTILE: f64 = 20.0;

const DESTRUCTIVE_BELOW: u32 = 40;
const FALSE_GOOD_BELOW: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeLabel {
    /// Score below 40.
    Destructive,
    /// A win with a score below 60.
    FalseGood,
    Healthy,
}

impl TradeLabel {
    pub fn classify(score: u32, is_win: bool) -> Self {
        if score < DESTRUCTIVE_BELOW {
            TradeLabel::Destructive
        } else if is_win && score < FALSE_GOOD_BELOW {
            TradeLabel::FalseGood
        } else {
            TradeLabel::Healthy
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeDiscipline {
    /// Position in the canonical trade order.
    pub index: usize,
    pub score: u32,
    pub short_hold: bool,
    pub label: TradeLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDisciplineReport {
    pub trades: Vec<TradeDiscipline>,
    pub average_score: MetricValue,
    pub median_score: MetricValue,
    pub destructive_count: usize,
    pub false_good_count: usize,
    pub healthy_count: usize,
}

impl TradeDisciplineReport {
    pub fn compute(set: &TradeSet, behavior: &BehaviorReport) -> Self {
        let trades = set.trades();
        let cutoff = short_hold_cutoff(trades);

        let scored: Vec<TradeDiscipline> = trades
            .iter()
            .zip(&behavior.flags)
            .enumerate()
            .map(|(index, (trade, flags))| {
                let short_hold = cutoff.is_some_and(|c| trade.duration_minutes() <= c);
                let score = trade_score(short_hold, flags);
                TradeDiscipline {
                    index,
                    score,
                    short_hold,
                    label: TradeLabel::classify(score, trade.is_win()),
                }
            })
            .collect();

        let scores: Vec<f64> = scored.iter().map(|t| t.score as f64).collect();
        let count = |label| scored.iter().filter(|t| t.label == label).count();
        let (average_score, median_score) = if scores.is_empty() {
            (MetricValue::NoData, MetricValue::NoData)
        } else {
            (
                MetricValue::from_f64(mean_f64(&scores)),
                MetricValue::from_f64(percentile_sorted(&sorted_f64(&scores), 50.0)),
            )
        };

        Self {
            destructive_count: count(TradeLabel::Destructive),
            false_good_count: count(TradeLabel::FalseGood),
            healthy_count: count(TradeLabel::Healthy),
            trades: scored,
            average_score,
            median_score,
        }
    }
}

/// 20th percentile of holding time in minutes, when the set is large enough.
fn short_hold_cutoff(trades: &[TradeRecord]) -> Option<f64> {
    if trades.len() < SHORT_HOLD_MIN_TRADES {
        return None;
    }
    let minutes: Vec<f64> = trades.iter().map(TradeRecord::duration_minutes).collect();
    Some(percentile_sorted(&sorted_f64(&minutes), SHORT_HOLD_PERCENTILE))
}

fn trade_score(short_hold: bool, flags: &TradeFlags) -> u32 {
    let penalty = [
        (short_hold, SHORT_HOLD_PENALTY),
        (flags.revenge, REVENGE_PENALTY),
        (flags.impulsive, IMPULSIVE_PENALTY),
        (flags.overtrading, OVERTRADING_PENALTY),
    ]
    .iter()
    .filter(|(hit, _)| *hit)
    .map(|(_, p)| p)
    .sum::<u32>();
    100u32.saturating_sub(penalty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use rust_decimal_macros::dec;
    use tradeaudit_core::behavior::BehaviorDetector;
    use tradeaudit_core::config::ScoreWeights;
    use tradeaudit_core::domain::{Direction, TradeInput};

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn trade(open_offset_min: i64, minutes: i64, pnl: Decimal) -> TradeRecord {
        let open = base() + Duration::minutes(open_offset_min);
        TradeRecord::new(TradeInput {
            asset: "BTC".into(),
            direction: Direction::Long,
            open_time: open,
            close_time: open + Duration::minutes(minutes),
            entry_price: dec!(1),
            exit_price: dec!(1),
            quantity: dec!(1),
            leverage: 2.0,
            pnl: Some(pnl),
            fees: Decimal::ZERO,
        })
        .unwrap()
    }

    fn analyze(set: &TradeSet, config: &AnalysisConfig) -> (PerformanceMetrics, BehaviorReport) {
        let metrics = PerformanceMetrics::compute(&set.refs());
        let behavior = BehaviorDetector::from_config(config).scan(set);
        (metrics, behavior)
    }

    #[test]
    fn empty_set_not_applicable() {
        let config = AnalysisConfig::default();
        let (m, b) = analyze(&TradeSet::default(), &config);
        assert_eq!(DisciplineScore::compute(&m, &b, &config), DisciplineScore::NotApplicable);
    }

    #[test]
    fn composite_of_three_trade_example() {
        let config = AnalysisConfig::default();
        let set = TradeSet::new(vec![
            trade(0, 30, dec!(-10)),
            trade(40, 30, dec!(-10)),
            trade(80, 30, dec!(50)),
        ]);
        let (m, b) = analyze(&set, &config);
        let DisciplineScore::Scored(s) = DisciplineScore::compute(&m, &b, &config) else {
            panic!("expected a score");
        };
        // pf 2.5 of target 3
        assert!((s.profit_factor_score - 250.0 / 3.0).abs() < 1e-9);
        assert!((s.win_rate_score - 100.0 / 3.0).abs() < 1e-9);
        // max dd 20 against a peak of 30
        assert!((s.drawdown_score - 100.0 / 3.0).abs() < 1e-9);
        assert!((s.behavior_score - 100.0).abs() < 1e-9);
        let expected = 0.25 * (250.0 / 3.0 + 100.0 / 3.0 + 100.0 / 3.0 + 100.0);
        assert!((s.raw_score - expected).abs() < 1e-9);
        assert!((s.score - expected).abs() < 1e-9);
    }

    #[test]
    fn weights_are_normalized() {
        let config = AnalysisConfig {
            weights: ScoreWeights {
                weight_profit_factor: 0.0,
                weight_win_rate: 2.0,
                weight_drawdown: 0.0,
                weight_behavior: 0.0,
            },
            ..Default::default()
        };
        let set = TradeSet::new(vec![trade(0, 30, dec!(1)), trade(60, 30, dec!(-1))]);
        let (m, b) = analyze(&set, &config);
        let s = DisciplineScore::compute(&m, &b, &config);
        assert!((s.score().unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn sub_score_normalizations() {
        assert_eq!(profit_factor_score(MetricValue::Infinite, 3.0), 100.0);
        assert_eq!(profit_factor_score(MetricValue::Value(6.0), 3.0), 100.0);
        assert_eq!(profit_factor_score(MetricValue::Undefined, 3.0), 0.0);
        assert_eq!(drawdown_score(MetricValue::Value(0.0), dec!(0)), 100.0);
        assert_eq!(drawdown_score(MetricValue::Value(5.0), dec!(0)), 0.0);
        assert_eq!(drawdown_score(MetricValue::Value(50.0), dec!(10)), 0.0);
        assert_eq!(drawdown_score(MetricValue::Value(5.0), dec!(10)), 50.0);
    }

    #[test]
    fn all_losses_score_stays_in_range() {
        let config = AnalysisConfig::default();
        let set = TradeSet::new((0..8).map(|i| trade(i * 2, 1, dec!(-3))).collect());
        let (m, b) = analyze(&set, &config);
        let score = DisciplineScore::compute(&m, &b, &config).score().unwrap();
        assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn per_trade_penalties_and_labels() {
        let config = AnalysisConfig::default();
        // holds of 60, 50, 1, 70, 80, 90 minutes: the 20th percentile is 50,
        // and the fourth trade opens 2 minutes after the third closes
        let set = TradeSet::new(vec![
            trade(0, 60, dec!(1)),
            trade(120, 50, dec!(1)),
            trade(240, 1, dec!(2)),
            trade(243, 70, dec!(-1)),
            trade(400, 80, dec!(1)),
            trade(520, 90, dec!(1)),
        ]);
        let b = BehaviorDetector::from_config(&config).scan(&set);
        let report = TradeDisciplineReport::compute(&set, &b);

        assert_eq!(report.trades.len(), 6);
        let short: Vec<bool> = report.trades.iter().map(|t| t.short_hold).collect();
        assert_eq!(short, vec![false, true, true, false, false, false]);

        let t2 = &report.trades[2];
        assert_eq!(t2.score, 70);
        assert_eq!(t2.label, TradeLabel::Healthy);

        let t3 = &report.trades[3];
        assert_eq!(t3.score, 90);

        assert_eq!(report.healthy_count, 6);
        assert_eq!(report.average_score, MetricValue::Value(530.0 / 6.0));
    }

    #[test]
    fn short_hold_needs_more_than_five_trades() {
        let config = AnalysisConfig::default();
        let set = TradeSet::new(vec![trade(0, 1, dec!(1)), trade(60, 60, dec!(1))]);
        let b = BehaviorDetector::from_config(&config).scan(&set);
        let report = TradeDisciplineReport::compute(&set, &b);
        assert!(report.trades.iter().all(|t| !t.short_hold && t.score == 100));
    }

    #[test]
    fn labels() {
        assert_eq!(TradeLabel::classify(30, true), TradeLabel::Destructive);
        assert_eq!(TradeLabel::classify(30, false), TradeLabel::Destructive);
        assert_eq!(TradeLabel::classify(50, true), TradeLabel::FalseGood);
        assert_eq!(TradeLabel::classify(50, false), TradeLabel::Healthy);
        assert_eq!(TradeLabel::classify(60, true), TradeLabel::Healthy);
    }

    #[test]
    fn all_penalties_stack_to_thirty() {
        let flags = TradeFlags {
            revenge: true,
            impulsive: true,
            overtrading: true,
            preceding_loss_streak: 9,
        };
        assert_eq!(trade_score(true, &flags), 30);
        assert_eq!(trade_score(false, &TradeFlags::default()), 100);
    }

    #[test]
    fn composite_bottoms_out_at_zero() {
        let config = AnalysisConfig::default();
        // twelve losers on one day: every trade is overtrading, equity never peaks above 0
        let set = TradeSet::new((0..12).map(|i| trade(i * 30, 5, dec!(-1000000))).collect());
        let (m, b) = analyze(&set, &config);
        let DisciplineScore::Scored(s) = DisciplineScore::compute(&m, &b, &config) else {
            panic!("expected a score");
        };
        assert_eq!(s.profit_factor_score, 0.0);
        assert_eq!(s.win_rate_score, 0.0);
        assert_eq!(s.drawdown_score, 0.0);
        assert_eq!(s.behavior_score, 0.0);
        assert_eq!(s.score, 0.0);
    }

    #[test]
    fn composite_tops_out_at_one_hundred() {
        let config = AnalysisConfig {
            weights: ScoreWeights {
                weight_profit_factor: 0.1,
                weight_win_rate: 0.2,
                weight_drawdown: 0.3,
                weight_behavior: 0.7,
            },
            ..Default::default()
        };
        let set = TradeSet::new((0..4).map(|i| trade(i * 600, 30, dec!(5))).collect());
        let (m, b) = analyze(&set, &config);
        let DisciplineScore::Scored(s) = DisciplineScore::compute(&m, &b, &config) else {
            panic!("expected a score");
        };
        assert!((s.raw_score - 100.0).abs() < 1e-9);
        assert!(s.score <= 100.0);
        assert!((s.score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn drawdown_far_beyond_peak_scores_zero() {
        assert_eq!(drawdown_score(MetricValue::Value(1e12), dec!(1)), 0.0);
        assert_eq!(drawdown_score(MetricValue::NoData, dec!(1)), 0.0);
    }
}
