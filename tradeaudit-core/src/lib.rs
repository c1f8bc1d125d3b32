//! tradeaudit core: domain types, run configuration and the behavioral detector.
//!
//! This crate holds everything the analytics engine shares:
//! - Trade records and the canonically ordered trade set
//! - `MetricValue`, the degenerate-aware metric result
//! - Run-scoped configuration with validation
//! - Deterministic RNG hierarchy for clustering and Monte Carlo
//! - Behavioral pattern detector (revenge, impulsive, overtrading)

pub mod behavior;
pub mod config;
pub mod domain;
pub mod rng;

pub use behavior::{BehaviorDetector, BehaviorReport, BehaviorSummary, Tiltmeter, TradeFlags};
pub use config::{AnalysisConfig, ConfigError, ScoreWeights, SessionWindow};
pub use domain::{Direction, MetricValue, TradeError, TradeInput, TradeRecord, TradeSet};
pub use rng::RngHierarchy;
