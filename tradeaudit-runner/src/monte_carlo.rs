//! Monte Carlo robustness test: is the observed drawdown a property of the
//! trades, or of the order they were taken in?
//!
//! The multiset of per-trade PnL is held fixed. Each trial draws a uniform
//! permutation, rebuilds the equity path and records its final equity and max
//! drawdown. The historical drawdown is then ranked against the resulting
//! distribution.
//!
//! Trial `i` draws from its own RNG stream `("monte_carlo", i)` of the seed
//! hierarchy, so the result does not depend on how rayon schedules trials.

use rand::seq::SliceRandom;
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tradeaudit_core::config::AnalysisConfig;
use tradeaudit_core::domain::MetricValue;
use tradeaudit_core::rng::{RngHierarchy, MONTE_CARLO_STREAM};

use crate::metrics::{equity_curve, mean_f64, percentile_sorted, sorted_f64, to_f64, DrawdownProfile};

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    /// Number of permutation trials (default 1000).
    pub trials: usize,
    /// Master seed; `None` draws one from OS entropy.
    pub seed: Option<u64>,
    /// Percentile at or above which the observed drawdown is flagged.
    pub tail_percentile: f64,
    /// Keep each trial's equity curve.
    pub retain_curves: bool,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self::from_analysis(&AnalysisConfig::default())
    }
}

impl MonteCarloConfig {
    pub fn from_analysis(config: &AnalysisConfig) -> Self {
        Self {
            trials: config.monte_carlo_trials,
            seed: config.monte_carlo_seed,
            tail_percentile: config.monte_carlo_tail_percentile,
            retain_curves: config.monte_carlo_retain_curves,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// One permutation's outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub trial: usize,
    pub final_equity: Decimal,
    pub max_drawdown: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equity_curve: Option<Vec<Decimal>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobustnessVerdict {
    /// The observed drawdown is deeper than the tail of reorderings.
    OrderDependentDamage,
    /// The observed drawdown is shallower than most reorderings.
    FavorableSequencing,
    Typical,
    NotApplicable,
}

impl RobustnessVerdict {
    pub fn classify(percentile: f64, tail_percentile: f64) -> Self {
        if percentile >= tail_percentile {
            RobustnessVerdict::OrderDependentDamage
        } else if percentile <= 100.0 - tail_percentile {
            RobustnessVerdict::FavorableSequencing
        } else {
            RobustnessVerdict::Typical
        }
    }
}

/// Max drawdown across trials; `worst` is the deepest, `best` the shallowest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownDistribution {
    pub mean: f64,
    pub median: f64,
    pub p5: f64,
    pub p95: f64,
    pub worst: f64,
    pub best: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalEquitySummary {
    pub min: Decimal,
    pub max: Decimal,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloReport {
    /// Master seed actually used; replaying with it reproduces the report.
    pub seed: u64,
    pub trials: usize,
    pub trade_count: usize,
    pub actual_max_drawdown: MetricValue,
    /// Mid-rank percentile of the observed drawdown among the trials.
    pub percentile: MetricValue,
    pub tail_percentile: f64,
    pub verdict: RobustnessVerdict,
    pub drawdown_distribution: Option<DrawdownDistribution>,
    pub final_equity: Option<FinalEquitySummary>,
    /// Every trial ended at the historical total PnL.
    pub final_equity_invariant: bool,
    pub simulations: Vec<SimulationResult>,
}

// ─── Simulation ─────────────────────────────────────────────────────

/// Run one permutation trial.
pub fn simulate_trial(
    pnls: &[Decimal],
    hierarchy: &RngHierarchy,
    trial: usize,
    retain_curve: bool,
) -> SimulationResult {
    let mut rng = hierarchy.rng_for(MONTE_CARLO_STREAM, trial as u64);
    let mut order = pnls.to_vec();
    order.shuffle(&mut rng);

    let profile = DrawdownProfile::from_pnls(&order);
    SimulationResult {
        trial,
        final_equity: order.iter().sum(),
        max_drawdown: profile.max_drawdown,
        equity_curve: retain_curve.then(|| equity_curve(&order)),
    }
}

/// Mid-rank percentile of `actual` within `samples`:
/// `100 * (#below + 0.5 * #equal) / n`.
pub fn mid_rank_percentile(samples: &[Decimal], actual: Decimal) -> MetricValue {
    if samples.is_empty() {
        return MetricValue::NoData;
    }
    let below = samples.iter().filter(|s| **s < actual).count();
    let equal = samples.iter().filter(|s| **s == actual).count();
    MetricValue::Value(100.0 * (below as f64 + 0.5 * equal as f64) / samples.len() as f64)
}

/// Permutation test over the canonically ordered PnL sequence.
pub fn run_monte_carlo(pnls: &[Decimal], config: &MonteCarloConfig) -> MonteCarloReport {
    let hierarchy = config
        .seed
        .map_or_else(RngHierarchy::from_entropy, RngHierarchy::new);

    if pnls.is_empty() {
        return MonteCarloReport {
            seed: hierarchy.master_seed(),
            trials: 0,
            trade_count: 0,
            actual_max_drawdown: MetricValue::NoData,
            percentile: MetricValue::NoData,
            tail_percentile: config.tail_percentile,
            verdict: RobustnessVerdict::NotApplicable,
            drawdown_distribution: None,
            final_equity: None,
            final_equity_invariant: true,
            simulations: Vec::new(),
        };
    }

    let actual = DrawdownProfile::from_pnls(pnls).max_drawdown;
    let total: Decimal = pnls.iter().sum();

    let simulations: Vec<SimulationResult> = (0..config.trials)
        .into_par_iter()
        .map(|trial| simulate_trial(pnls, &hierarchy, trial, config.retain_curves))
        .collect();

    let drawdowns: Vec<Decimal> = simulations.iter().map(|s| s.max_drawdown).collect();
    let percentile = mid_rank_percentile(&drawdowns, actual);
    let verdict = percentile
        .value()
        .map_or(RobustnessVerdict::NotApplicable, |p| {
            RobustnessVerdict::classify(p, config.tail_percentile)
        });
    let final_equity_invariant = simulations.iter().all(|s| s.final_equity == total);

    debug!(
        trials = simulations.len(),
        seed = hierarchy.master_seed(),
        ?verdict,
        "monte carlo finished"
    );

    MonteCarloReport {
        seed: hierarchy.master_seed(),
        trials: simulations.len(),
        trade_count: pnls.len(),
        actual_max_drawdown: MetricValue::Value(to_f64(actual)),
        percentile,
        tail_percentile: config.tail_percentile,
        verdict,
        drawdown_distribution: drawdown_distribution(&drawdowns),
        final_equity: final_equity_summary(&simulations),
        final_equity_invariant,
        simulations,
    }
}

fn drawdown_distribution(drawdowns: &[Decimal]) -> Option<DrawdownDistribution> {
    if drawdowns.is_empty() {
        return None;
    }
    let values: Vec<f64> = drawdowns.iter().map(|d| to_f64(*d)).collect();
    let sorted = sorted_f64(&values);
    Some(DrawdownDistribution {
        mean: mean_f64(&values),
        median: percentile_sorted(&sorted, 50.0),
        p5: percentile_sorted(&sorted, 5.0),
        p95: percentile_sorted(&sorted, 95.0),
        worst: sorted[sorted.len() - 1],
        best: sorted[0],
    })
}

fn final_equity_summary(simulations: &[SimulationResult]) -> Option<FinalEquitySummary> {
    let min = simulations.iter().map(|s| s.final_equity).min()?;
    let max = simulations.iter().map(|s| s.final_equity).max()?;
    let values: Vec<f64> = simulations.iter().map(|s| to_f64(s.final_equity)).collect();
    Some(FinalEquitySummary {
        min,
        max,
        mean: mean_f64(&values),
    })
}
