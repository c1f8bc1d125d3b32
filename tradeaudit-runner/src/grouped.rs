//! Grouped metrics: directional, temporal and per-asset breakdowns, plus the
//! PnL cross tables (asset x hour, direction x hour, asset x direction).
//!
//! Each group runs the full [`PerformanceMetrics`] over its members. Members
//! keep canonical order, so path metrics inside a group are well-defined.
//! Only groups with at least one trade appear.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tradeaudit_core::config::AnalysisConfig;
use tradeaudit_core::domain::{Direction, TradeRecord, TradeSet};

use crate::metrics::PerformanceMetrics;

/// Partition trades by key, keeping each group in input order.
pub fn group_by<'a, K, F>(trades: &[&'a TradeRecord], key: F) -> BTreeMap<K, Vec<&'a TradeRecord>>
where
    K: Ord,
    F: Fn(&TradeRecord) -> K,
{
    let mut groups: BTreeMap<K, Vec<&'a TradeRecord>> = BTreeMap::new();
    for &trade in trades {
        groups.entry(key(trade)).or_default().push(trade);
    }
    groups
}

fn metrics_by<K, F>(trades: &[&TradeRecord], key: F) -> BTreeMap<K, PerformanceMetrics>
where
    K: Ord,
    F: Fn(&TradeRecord) -> K,
{
    group_by(trades, key)
        .into_iter()
        .map(|(k, members)| (k, PerformanceMetrics::compute(&members)))
        .collect()
}

// ─── Directional ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionalMetrics {
    pub long: PerformanceMetrics,
    pub short: PerformanceMetrics,
}

impl DirectionalMetrics {
    pub fn compute(set: &TradeSet) -> Self {
        Self {
            long: PerformanceMetrics::compute(&set.by_direction(Direction::Long)),
            short: PerformanceMetrics::compute(&set.by_direction(Direction::Short)),
        }
    }
}

// ─── Temporal ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekdayMetrics {
    pub weekday: Weekday,
    pub metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalMetrics {
    /// Keyed by hour of day of the close (0-23).
    pub by_hour: BTreeMap<u32, PerformanceMetrics>,
    /// Keyed by session name; uncovered hours land in `unassigned`.
    pub by_session: BTreeMap<String, PerformanceMetrics>,
    pub by_day: BTreeMap<NaiveDate, PerformanceMetrics>,
    /// Monday first.
    pub by_weekday: Vec<WeekdayMetrics>,
    /// Hours with negative total PnL, worst first.
    pub toxic_hours: Vec<u32>,
    /// Hours with positive total PnL, best first.
    pub profitable_hours: Vec<u32>,
}

impl TemporalMetrics {
    pub fn compute(set: &TradeSet, config: &AnalysisConfig) -> Self {
        let trades = set.refs();
        let by_weekday = metrics_by(&trades, |t| t.weekday().num_days_from_monday())
            .into_iter()
            .filter_map(|(n, metrics)| {
                weekday_from_monday(n).map(|weekday| WeekdayMetrics { weekday, metrics })
            })
            .collect();

        let by_hour = metrics_by(&trades, TradeRecord::hour);
        let hour_totals: Vec<(u32, Decimal)> =
            by_hour.iter().map(|(&h, m)| (h, m.total_pnl)).collect();

        Self {
            toxic_hours: ranked_keys(&hour_totals, |pnl| pnl < Decimal::ZERO, false),
            profitable_hours: ranked_keys(&hour_totals, |pnl| pnl > Decimal::ZERO, true),
            by_hour,
            by_session: metrics_by(&trades, |t| config.session_for_hour(t.hour()).to_string()),
            by_day: metrics_by(&trades, TradeRecord::calendar_day),
            by_weekday,
        }
    }
}

/// Keys whose total passes `keep`, sorted by total (descending when `best_first`),
/// ties broken by key.
fn ranked_keys<K, F>(totals: &[(K, Decimal)], keep: F, best_first: bool) -> Vec<K>
where
    K: Ord + Clone,
    F: Fn(Decimal) -> bool,
{
    let mut kept: Vec<&(K, Decimal)> = totals.iter().filter(|(_, pnl)| keep(*pnl)).collect();
    kept.sort_by(|(ka, a), (kb, b)| {
        let by_pnl = if best_first { b.cmp(a) } else { a.cmp(b) };
        by_pnl.then_with(|| ka.cmp(kb))
    });
    kept.into_iter().map(|(k, _)| k.clone()).collect()
}

fn weekday_from_monday(n: u32) -> Option<Weekday> {
    const WEEK: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];
    WEEK.get(n as usize).copied()
}

// ─── Per-asset ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPnl {
    pub asset: String,
    pub trade_count: usize,
    pub total_pnl: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMetrics {
    pub by_asset: BTreeMap<String, PerformanceMetrics>,
    /// Assets with negative total PnL, worst first.
    pub toxic_assets: Vec<AssetPnl>,
    /// Assets with positive total PnL, best first.
    pub profitable_assets: Vec<AssetPnl>,
}

impl AssetMetrics {
    pub fn compute(set: &TradeSet) -> Self {
        let by_asset = metrics_by(&set.refs(), |t| t.asset().to_string());

        let totals: Vec<AssetPnl> = by_asset
            .iter()
            .map(|(asset, m)| AssetPnl {
                asset: asset.clone(),
                trade_count: m.trade_count,
                total_pnl: m.total_pnl,
            })
            .collect();

        let mut toxic_assets: Vec<AssetPnl> = totals
            .iter()
            .filter(|a| a.total_pnl < Decimal::ZERO)
            .cloned()
            .collect();
        toxic_assets.sort_by(|a, b| a.total_pnl.cmp(&b.total_pnl).then(a.asset.cmp(&b.asset)));

        let mut profitable_assets: Vec<AssetPnl> = totals
            .into_iter()
            .filter(|a| a.total_pnl > Decimal::ZERO)
            .collect();
        profitable_assets.sort_by(|a, b| b.total_pnl.cmp(&a.total_pnl).then(a.asset.cmp(&b.asset)));

        Self {
            by_asset,
            toxic_assets,
            profitable_assets,
        }
    }
}

// ─── Cross tables ───────────────────────────────────────────────────

/// Summed PnL over two grouping keys. Absent cells had no trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossAnalysis {
    /// asset → close hour → PnL.
    pub asset_hour: BTreeMap<String, BTreeMap<u32, Decimal>>,
    /// `LONG` / `SHORT` → close hour → PnL.
    pub direction_hour: BTreeMap<String, BTreeMap<u32, Decimal>>,
    /// asset → `LONG` / `SHORT` → PnL.
    pub asset_direction: BTreeMap<String, BTreeMap<String, Decimal>>,
}

impl CrossAnalysis {
    pub fn compute(set: &TradeSet) -> Self {
        let mut cross = Self::default();
        for trade in set {
            let direction = trade.direction().to_string();
            let pnl = trade.pnl();
            *cross
                .asset_hour
                .entry(trade.asset().to_string())
                .or_default()
                .entry(trade.hour())
                .or_default() += pnl;
            *cross
                .direction_hour
                .entry(direction.clone())
                .or_default()
                .entry(trade.hour())
                .or_default() += pnl;
            *cross
                .asset_direction
                .entry(trade.asset().to_string())
                .or_default()
                .entry(direction)
                .or_default() += pnl;
        }
        cross
    }
}
