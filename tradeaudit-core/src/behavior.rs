//! Behavioral pattern detector.
//!
//! One forward pass over the canonically ordered trade set flags three
//! patterns per trade:
//! - **revenge**: at least `revenge_threshold` consecutive losses precede it
//! - **impulsive**: opened less than `impulsive_gap` after the previous close
//! - **overtrading**: closed on a calendar day with more than
//!   `overtrading_threshold` trades
//!
//! The scan is a left fold over an explicit [`DetectorState`]. Zero-PnL trades
//! neither extend nor reset a streak. The flags then roll up into a
//! [`Tiltmeter`], a 0-100 session gauge with alerts.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::domain::{MetricValue, TradeRecord, TradeSet};

/// Loss-streak lengths whose follow-up trades are summarized.
pub const FOLLOW_UP_STREAKS: [u32; 3] = [1, 2, 3];

/// Flags attached to one trade, index-aligned with the trade set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeFlags {
    pub revenge: bool,
    pub impulsive: bool,
    pub overtrading: bool,
    /// Consecutive losses immediately before this trade.
    pub preceding_loss_streak: u32,
}

impl TradeFlags {
    /// True when any negative flag is set.
    pub fn any(&self) -> bool {
        self.revenge || self.impulsive || self.overtrading
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvertradingDay {
    pub date: NaiveDate,
    pub trade_count: usize,
}

/// PnL of trades taken right after exactly `streak` consecutive losses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossFollowUp {
    pub streak: u32,
    pub trade_count: usize,
    pub total_pnl: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSummary {
    pub revenge_count: usize,
    pub impulsive_count: usize,
    /// Trades closed on an overtrading day.
    pub overtrading_trade_count: usize,
    pub overtrading_days: Vec<OvertradingDay>,
    pub flagged_count: usize,
    pub flagged_fraction: MetricValue,
    pub revenge_pnl: Decimal,
    pub impulsive_pnl: Decimal,
    pub overtrading_pnl: Decimal,
    pub active_days: usize,
    pub avg_trades_per_day: MetricValue,
    pub max_win_streak: u32,
    pub max_loss_streak: u32,
    pub loss_follow_ups: Vec<LossFollowUp>,
}

/// Per-trade flags plus their aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorReport {
    pub flags: Vec<TradeFlags>,
    pub summary: BehaviorSummary,
    pub tilt: Tiltmeter,
}

impl BehaviorReport {
    /// Fraction of trades carrying any flag, 0 on an empty set.
    pub fn flagged_fraction(&self) -> f64 {
        self.summary.flagged_fraction.value().unwrap_or(0.0)
    }
}

/// Running state carried through the fold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectorState {
    pub loss_streak: u32,
    pub win_streak: u32,
    pub max_loss_streak: u32,
    pub max_win_streak: u32,
    pub prev_close: Option<NaiveDateTime>,
}

impl DetectorState {
    /// Fold one trade's outcome into the streak counters.
    fn after(self, trade: &TradeRecord) -> Self {
        let mut next = self;
        if trade.is_win() {
            next.win_streak += 1;
            next.loss_streak = 0;
        } else if trade.is_loss() {
            next.loss_streak += 1;
            next.win_streak = 0;
        }
        next.max_win_streak = next.max_win_streak.max(next.win_streak);
        next.max_loss_streak = next.max_loss_streak.max(next.loss_streak);
        next.prev_close = Some(trade.close_time());
        next
    }
}

/// Threshold set for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BehaviorDetector {
    revenge_threshold: u32,
    overtrading_threshold: u32,
    impulsive_gap: Duration,
}

impl BehaviorDetector {
    pub fn new(revenge_threshold: u32, overtrading_threshold: u32, impulsive_gap: Duration) -> Self {
        Self {
            revenge_threshold,
            overtrading_threshold,
            impulsive_gap,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.revenge_threshold,
            config.overtrading_threshold,
            config.impulsive_gap(),
        )
    }

    /// Flag every trade of the set.
    pub fn scan(&self, set: &TradeSet) -> BehaviorReport {
        let trades = set.trades();
        let day_counts = trades_per_day(trades);

        let mut flags = Vec::with_capacity(trades.len());
        let state = trades
            .iter()
            .fold(DetectorState::default(), |state, trade| {
                flags.push(self.flag(&state, trade, &day_counts));
                state.after(trade)
            });

        let summary = self.summarize(trades, &flags, &day_counts, &state);
        let tilt = Tiltmeter::compute(trades, &summary, self.overtrading_threshold);
        BehaviorReport {
            flags,
            summary,
            tilt,
        }
    }

    fn flag(
        &self,
        state: &DetectorState,
        trade: &TradeRecord,
        day_counts: &BTreeMap<NaiveDate, usize>,
    ) -> TradeFlags {
        let impulsive = state
            .prev_close
            .is_some_and(|prev| trade.open_time().signed_duration_since(prev) < self.impulsive_gap);
        let day_count = day_counts
            .get(&trade.calendar_day())
            .copied()
            .unwrap_or(0);
        TradeFlags {
            revenge: state.loss_streak >= self.revenge_threshold,
            impulsive,
            overtrading: day_count > self.overtrading_threshold as usize,
            preceding_loss_streak: state.loss_streak,
        }
    }

    fn summarize(
        &self,
        trades: &[TradeRecord],
        flags: &[TradeFlags],
        day_counts: &BTreeMap<NaiveDate, usize>,
        state: &DetectorState,
    ) -> BehaviorSummary {
        let pnl_where = |pred: fn(&TradeFlags) -> bool| -> Decimal {
            trades
                .iter()
                .zip(flags)
                .filter(|(_, f)| pred(f))
                .map(|(t, _)| t.pnl())
                .sum()
        };

        let flagged_count = flags.iter().filter(|f| f.any()).count();
        let overtrading_days = day_counts
            .iter()
            .filter(|(_, n)| **n > self.overtrading_threshold as usize)
            .map(|(&date, &trade_count)| OvertradingDay { date, trade_count })
            .collect();

        let loss_follow_ups = FOLLOW_UP_STREAKS
            .iter()
            .map(|&streak| {
                let (trade_count, total_pnl) = trades
                    .iter()
                    .zip(flags)
                    .filter(|(_, f)| f.preceding_loss_streak == streak)
                    .fold((0, Decimal::ZERO), |(n, sum), (t, _)| (n + 1, sum + t.pnl()));
                LossFollowUp {
                    streak,
                    trade_count,
                    total_pnl,
                }
            })
            .collect();

        let ratio = |num: usize, den: usize| {
            if den == 0 {
                MetricValue::NoData
            } else {
                MetricValue::Value(num as f64 / den as f64)
            }
        };

        BehaviorSummary {
            revenge_count: flags.iter().filter(|f| f.revenge).count(),
            impulsive_count: flags.iter().filter(|f| f.impulsive).count(),
            overtrading_trade_count: flags.iter().filter(|f| f.overtrading).count(),
            overtrading_days,
            flagged_count,
            flagged_fraction: ratio(flagged_count, trades.len()),
            revenge_pnl: pnl_where(|f| f.revenge),
            impulsive_pnl: pnl_where(|f| f.impulsive),
            overtrading_pnl: pnl_where(|f| f.overtrading),
            active_days: day_counts.len(),
            avg_trades_per_day: ratio(trades.len(), day_counts.len()),
            max_win_streak: state.max_win_streak,
            max_loss_streak: state.max_loss_streak,
            loss_follow_ups,
        }
    }
}

// ─── Tiltmeter ──────────────────────────────────────────────────────

/// Trades at the end of the set checked for a fresh losing run.
pub const TILT_RECENT_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiltStatus {
    /// No trades to judge.
    Neutral,
    /// 80 and above.
    Excellent,
    /// 60 to 79.
    Good,
    /// 40 to 59.
    Warning,
    Tilt,
}

impl TiltStatus {
    pub fn classify(score: u32) -> Self {
        if score >= 80 {
            TiltStatus::Excellent
        } else if score >= 60 {
            TiltStatus::Good
        } else if score >= 40 {
            TiltStatus::Warning
        } else {
            TiltStatus::Tilt
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiltAlert {
    /// More than 20% of trades are revenge trades.
    RevengeTrading,
    /// More than 10% of trades are revenge trades.
    RevengeTendency,
    /// Average trades per active day above 1.5x the overtrading threshold.
    SevereOvertrading,
    /// Average trades per active day above the overtrading threshold.
    OvertradingTendency,
    /// More than 30% of trades are impulsive.
    ImpulsiveTrading,
    /// More than 15% of trades are impulsive.
    FrequentImpulsive,
    /// At least 4 of the last 5 trades lost.
    RecentLosingStreak,
}

/// Session gauge: 100 is fully disciplined, 0 is full tilt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tiltmeter {
    pub score: u32,
    pub status: TiltStatus,
    pub alerts: Vec<TiltAlert>,
    /// Percent of trades flagged revenge.
    pub revenge_pct: MetricValue,
    pub avg_trades_per_day: MetricValue,
    /// Percent of trades flagged impulsive.
    pub impulsive_pct: MetricValue,
    /// Losses among the last [`TILT_RECENT_WINDOW`] trades.
    pub recent_losses: usize,
}

impl Tiltmeter {
    /// Score the session from its behavior summary and most recent trades.
    pub fn compute(trades: &[TradeRecord], summary: &BehaviorSummary, overtrading_threshold: u32) -> Self {
        if trades.is_empty() {
            return Self {
                score: 100,
                status: TiltStatus::Neutral,
                alerts: Vec::new(),
                revenge_pct: MetricValue::NoData,
                avg_trades_per_day: MetricValue::NoData,
                impulsive_pct: MetricValue::NoData,
                recent_losses: 0,
            };
        }

        let pct = |n: usize| 100.0 * n as f64 / trades.len() as f64;
        let revenge_pct = pct(summary.revenge_count);
        let impulsive_pct = pct(summary.impulsive_count);
        let per_day = summary.avg_trades_per_day.value().unwrap_or(0.0);
        let tendency = overtrading_threshold as f64;
        let recent_losses = trades
            .iter()
            .rev()
            .take(TILT_RECENT_WINDOW)
            .filter(|t| t.is_loss())
            .count();

        let mut penalty = 0u32;
        let mut alerts = Vec::new();
        let mut hit = |points: u32, alert: Option<TiltAlert>| {
            penalty += points;
            alerts.extend(alert);
        };

        if revenge_pct > 20.0 {
            hit(25, Some(TiltAlert::RevengeTrading));
        } else if revenge_pct > 10.0 {
            hit(15, Some(TiltAlert::RevengeTendency));
        }
        if per_day > tendency * 1.5 {
            hit(20, Some(TiltAlert::SevereOvertrading));
        } else if per_day > tendency {
            hit(10, Some(TiltAlert::OvertradingTendency));
        }
        if impulsive_pct > 30.0 {
            hit(20, Some(TiltAlert::ImpulsiveTrading));
        } else if impulsive_pct > 15.0 {
            hit(10, Some(TiltAlert::FrequentImpulsive));
        }
        if recent_losses >= 4 {
            hit(15, Some(TiltAlert::RecentLosingStreak));
        } else if recent_losses >= 3 {
            hit(8, None);
        }

        let score = 100u32.saturating_sub(penalty);
        Self {
            score,
            status: TiltStatus::classify(score),
            alerts,
            revenge_pct: MetricValue::Value(revenge_pct),
            avg_trades_per_day: summary.avg_trades_per_day,
            impulsive_pct: MetricValue::Value(impulsive_pct),
            recent_losses,
        }
    }
}

fn trades_per_day(trades: &[TradeRecord]) -> BTreeMap<NaiveDate, usize> {
    let mut counts = BTreeMap::new();
    for trade in trades {
        *counts.entry(trade.calendar_day()).or_insert(0) += 1;
    }
    counts
}
