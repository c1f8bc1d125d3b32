//! Analysis runner: validates configuration, fans the components out and
//! assembles the report.
//!
//! Two entry points:
//! - `run_analysis()`: takes an in-memory trade set. The engine contract.
//! - `run_analysis_from_csv()`: loads a normalized trade CSV first. Used by the CLI.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, info_span, warn};
use tradeaudit_core::behavior::{BehaviorDetector, BehaviorReport};
use tradeaudit_core::config::{AnalysisConfig, ConfigError};
use tradeaudit_core::domain::TradeSet;
use tradeaudit_core::rng::RngHierarchy;

use crate::clustering::{extract_trade_dna, ClusteringResult};
use crate::data_loader::{load_trades, LoadError};
use crate::duration::DurationMetrics;
use crate::grouped::{AssetMetrics, CrossAnalysis, DirectionalMetrics, TemporalMetrics};
use crate::metrics::{rolling_expectancy, to_f64, PerformanceMetrics};
use crate::monte_carlo::{run_monte_carlo, MonteCarloConfig, MonteCarloReport};
use crate::risk::RiskMetrics;
use crate::scoring::{DisciplineScore, TradeDisciplineReport};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("load error: {0}")]
    Load(#[from] LoadError),
}

/// Current schema version of the serialized report.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Every calculator output for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsBundle {
    pub global: PerformanceMetrics,
    pub rolling_expectancy: Vec<f64>,
    pub directional: DirectionalMetrics,
    pub temporal: TemporalMetrics,
    pub assets: AssetMetrics,
    pub cross: CrossAnalysis,
    pub risk: RiskMetrics,
    pub duration: DurationMetrics,
}

impl MetricsBundle {
    pub fn compute(set: &TradeSet, config: &AnalysisConfig) -> Self {
        let pnls: Vec<f64> = set.pnls().into_iter().map(to_f64).collect();
        Self {
            global: PerformanceMetrics::compute(&set.refs()),
            rolling_expectancy: rolling_expectancy(&pnls, config.rolling_window),
            directional: DirectionalMetrics::compute(set),
            temporal: TemporalMetrics::compute(set, config),
            assets: AssetMetrics::compute(set),
            cross: CrossAnalysis::compute(set),
            risk: RiskMetrics::compute(set, config),
            duration: DurationMetrics::compute(set, config),
        }
    }
}

/// Complete result of one analysis run. The sole handoff to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Effective configuration, with the Monte Carlo seed resolved.
    pub config: AnalysisConfig,
    pub trade_count: usize,
    pub metrics: MetricsBundle,
    pub behavior: BehaviorReport,
    pub discipline: DisciplineScore,
    pub trade_discipline: TradeDisciplineReport,
    /// `None` on an empty trade set.
    pub clustering: Option<ClusteringResult>,
    pub monte_carlo: MonteCarloReport,
}

/// Run the full analysis over an in-memory trade set.
///
/// Configuration is validated before any computation. Metrics, behavior,
/// clustering and Monte Carlo run concurrently; the discipline scores are
/// derived once they join.
pub fn run_analysis(set: &TradeSet, config: &AnalysisConfig) -> Result<AnalysisReport, RunError> {
    config.validate()?;

    let span = info_span!("run_analysis", trades = set.len());
    let _guard = span.enter();

    let mut config = config.clone();
    if config.monte_carlo_seed.is_none() {
        let seed = RngHierarchy::from_entropy().master_seed();
        info!(seed, "no monte carlo seed configured, drew one from entropy");
        config.monte_carlo_seed = Some(seed);
    }
    if set.is_empty() {
        warn!("empty trade set, ratio metrics will report no data");
    }
    info!(
        trials = config.monte_carlo_trials,
        clusters = config.cluster_count,
        "starting analysis"
    );

    // Worker threads do not inherit the entered span; each branch re-enters it.
    let config = &config;
    let span = &span;
    let ((metrics, behavior), (clustering, monte_carlo)) = rayon::join(
        || {
            rayon::join(
                || span.in_scope(|| MetricsBundle::compute(set, config)),
                || span.in_scope(|| BehaviorDetector::from_config(config).scan(set)),
            )
        },
        || {
            rayon::join(
                || span.in_scope(|| extract_trade_dna(set, config)),
                || {
                    span.in_scope(|| {
                        run_monte_carlo(&set.pnls(), &MonteCarloConfig::from_analysis(config))
                    })
                },
            )
        },
    );
    debug!(
        flagged = behavior.summary.flagged_count,
        "metrics, behavior, clustering and monte carlo joined"
    );

    let discipline = DisciplineScore::compute(&metrics.global, &behavior, config);
    let trade_discipline = TradeDisciplineReport::compute(set, &behavior);

    info!(
        score = discipline.score(),
        verdict = ?monte_carlo.verdict,
        "analysis complete"
    );

    Ok(AnalysisReport {
        schema_version: SCHEMA_VERSION,
        config: config.clone(),
        trade_count: set.len(),
        metrics,
        behavior,
        discipline,
        trade_discipline,
        clustering,
        monte_carlo,
    })
}

/// Load a normalized trade CSV and analyze it.
pub fn run_analysis_from_csv(path: &Path, config: &AnalysisConfig) -> Result<AnalysisReport, RunError> {
    config.validate()?;
    let set = load_trades(path)?;
    run_analysis(&set, config)
}
