//! tradeaudit runner: metric calculators, scoring, clustering and robustness.
//!
//! This crate builds on `tradeaudit-core` to provide:
//! - CSV loading of normalized trade files
//! - Global, directional, temporal, per-asset, risk and duration metrics
//! - Composite and per-trade discipline scores
//! - Trade DNA extraction via seeded k-means
//! - Monte Carlo sequence-robustness testing
//! - The `run_analysis` orchestrator and its JSON-serializable report

pub mod clustering;
pub mod data_loader;
pub mod duration;
pub mod grouped;
pub mod metrics;
pub mod monte_carlo;
pub mod risk;
pub mod runner;
pub mod scoring;

pub use clustering::{extract_trade_dna, ClusterProfile, ClusteringResult, TradeDna};
pub use data_loader::{load_trades, read_trades, LoadError};
pub use duration::{DurationBracket, DurationCategory, DurationMetrics, PatienceSplit, TradeType};
pub use grouped::{AssetMetrics, CrossAnalysis, DirectionalMetrics, TemporalMetrics};
pub use metrics::PerformanceMetrics;
pub use monte_carlo::{run_monte_carlo, MonteCarloConfig, MonteCarloReport, RobustnessVerdict};
pub use risk::RiskMetrics;
pub use runner::{run_analysis, run_analysis_from_csv, AnalysisReport, MetricsBundle, RunError};
pub use scoring::{DisciplineScore, TradeDisciplineReport, TradeLabel};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn performance_metrics_is_send_sync() {
        assert_send::<PerformanceMetrics>();
        assert_sync::<PerformanceMetrics>();
    }

    #[test]
    fn analysis_report_is_send_sync() {
        assert_send::<AnalysisReport>();
        assert_sync::<AnalysisReport>();
    }

    #[test]
    fn component_results_are_send_sync() {
        assert_send::<ClusteringResult>();
        assert_sync::<ClusteringResult>();
        assert_send::<MonteCarloReport>();
        assert_sync::<MonteCarloReport>();
        assert_send::<MetricsBundle>();
        assert_sync::<MetricsBundle>();
    }

    #[test]
    fn error_types_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
        assert_send::<LoadError>();
        assert_sync::<LoadError>();
    }
}
