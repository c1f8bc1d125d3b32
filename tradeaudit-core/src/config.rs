//! Run-scoped analysis configuration.
//!
//! Every threshold the engine uses lives here rather than in a constant, so
//! detectors can be exercised against varied policies. The config is plain
//! serde data loaded from TOML; [`AnalysisConfig::validate`] must pass before
//! any computation starts.

use std::collections::HashSet;
use std::path::Path;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid `{field}`: {constraint} (got {value})")]
    Invalid {
        field: &'static str,
        constraint: &'static str,
        value: String,
    },
    #[error("read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl ConfigError {
    fn invalid(field: &'static str, constraint: &'static str, value: impl ToString) -> Self {
        ConfigError::Invalid {
            field,
            constraint,
            value: value.to_string(),
        }
    }
}

/// A named trading session: hours `[start_hour, end_hour)` of the close.
///
/// Wraps past midnight when `end_hour < start_hour` (e.g. 17 → 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWindow {
    pub name: String,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl SessionWindow {
    pub fn new(name: &str, start_hour: u32, end_hour: u32) -> Self {
        Self {
            name: name.to_string(),
            start_hour,
            end_hour,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour < self.end_hour {
            (self.start_hour..self.end_hour).contains(&hour)
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Upper bound for every `*_secs` threshold: 100 years.
///
/// Keeps the `Duration` conversions and comparisons against trade timestamps
/// in range.
pub const MAX_DURATION_SECS: i64 = 100 * 366 * 24 * 60 * 60;

/// Label for hours no session window covers.
pub const UNASSIGNED_SESSION: &str = "unassigned";

/// Discipline score weights. Normalized to sum to 1 before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub weight_profit_factor: f64,
    pub weight_win_rate: f64,
    pub weight_drawdown: f64,
    pub weight_behavior: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            weight_profit_factor: 0.25,
            weight_win_rate: 0.25,
            weight_drawdown: 0.25,
            weight_behavior: 0.25,
        }
    }
}

impl ScoreWeights {
    /// Weights scaled to sum to 1, in the order
    /// (profit factor, win rate, drawdown, behavior).
    ///
    /// Returns `None` when every weight is zero.
    pub fn normalized(&self) -> Option<[f64; 4]> {
        let raw = [
            self.weight_profit_factor,
            self.weight_win_rate,
            self.weight_drawdown,
            self.weight_behavior,
        ];
        let total: f64 = raw.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return None;
        }
        Some(raw.map(|w| w / total))
    }
}

/// Configuration for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    // ── Behavioral detector ──
    /// Consecutive losses before a trade counts as revenge.
    pub revenge_threshold: u32,
    /// Trades per calendar day above which the day is overtrading.
    pub overtrading_threshold: u32,
    /// Gap between the previous close and the next open below which a trade is impulsive.
    pub impulsive_gap_secs: i64,

    // ── Duration / risk categories ──
    pub scalp_max_duration_secs: i64,
    pub swing_min_duration_secs: i64,
    pub high_leverage_threshold: f64,
    /// Upper edges of the leverage histogram buckets; the last bucket is open-ended.
    pub leverage_bucket_edges: Vec<f64>,

    // ── Temporal grouping ──
    pub sessions: Vec<SessionWindow>,

    // ── Clustering ──
    pub cluster_count: usize,
    pub cluster_max_iterations: usize,
    pub clustering_seed: u64,

    // ── Monte Carlo ──
    pub monte_carlo_trials: usize,
    /// Master seed; `None` draws one from OS entropy and reports it.
    pub monte_carlo_seed: Option<u64>,
    /// Percentile at or above which the observed drawdown is order-dependent damage.
    pub monte_carlo_tail_percentile: f64,
    /// Keep every trial's equity curve in the result.
    pub monte_carlo_retain_curves: bool,

    // ── Metrics ──
    pub rolling_window: usize,

    // ── Discipline score ──
    /// Profit factor mapped to a full profit-factor sub-score.
    pub profit_factor_target: f64,
    pub weights: ScoreWeights,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            revenge_threshold: 5,
            overtrading_threshold: 10,
            impulsive_gap_secs: 5 * 60,
            scalp_max_duration_secs: 5 * 60,
            swing_min_duration_secs: 60 * 60,
            high_leverage_threshold: 50.0,
            leverage_bucket_edges: vec![10.0, 20.0, 50.0, 100.0],
            sessions: vec![
                SessionWindow::new("asia", 1, 9),
                SessionWindow::new("europe", 9, 17),
                SessionWindow::new("us", 17, 1),
            ],
            cluster_count: 4,
            cluster_max_iterations: 100,
            clustering_seed: 42,
            monte_carlo_trials: 1000,
            monte_carlo_seed: None,
            monte_carlo_tail_percentile: 95.0,
            monte_carlo_retain_curves: false,
            rolling_window: 20,
            profit_factor_target: 3.0,
            weights: ScoreWeights::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string. Missing keys take defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn impulsive_gap(&self) -> Duration {
        Duration::seconds(self.impulsive_gap_secs)
    }

    pub fn scalp_max_duration(&self) -> Duration {
        Duration::seconds(self.scalp_max_duration_secs)
    }

    pub fn swing_min_duration(&self) -> Duration {
        Duration::seconds(self.swing_min_duration_secs)
    }

    /// Session label for an hour of day; first matching window wins.
    pub fn session_for_hour(&self, hour: u32) -> &str {
        self.sessions
            .iter()
            .find(|s| s.contains(hour))
            .map(|s| s.name.as_str())
            .unwrap_or(UNASSIGNED_SESSION)
    }

    /// Check every field against its constraint.
    ///
    /// The first violation is returned with the offending field named.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.revenge_threshold < 1 {
            return Err(ConfigError::invalid(
                "revenge_threshold",
                "must be >= 1",
                self.revenge_threshold,
            ));
        }
        if self.overtrading_threshold < 1 {
            return Err(ConfigError::invalid(
                "overtrading_threshold",
                "must be >= 1",
                self.overtrading_threshold,
            ));
        }
        for (field, secs) in [
            ("impulsive_gap_secs", self.impulsive_gap_secs),
            ("scalp_max_duration_secs", self.scalp_max_duration_secs),
            ("swing_min_duration_secs", self.swing_min_duration_secs),
        ] {
            if secs < 0 {
                return Err(ConfigError::invalid(field, "must be >= 0", secs));
            }
            if secs > MAX_DURATION_SECS {
                return Err(ConfigError::invalid(
                    field,
                    "must not exceed 100 years in seconds",
                    secs,
                ));
            }
        }
        if self.scalp_max_duration_secs > self.swing_min_duration_secs {
            return Err(ConfigError::invalid(
                "scalp_max_duration_secs",
                "must not exceed swing_min_duration_secs",
                self.scalp_max_duration_secs,
            ));
        }
        if !(self.high_leverage_threshold.is_finite() && self.high_leverage_threshold > 0.0) {
            return Err(ConfigError::invalid(
                "high_leverage_threshold",
                "must be finite and > 0",
                self.high_leverage_threshold,
            ));
        }
        self.validate_leverage_edges()?;
        self.validate_sessions()?;
        if self.cluster_count < 1 {
            return Err(ConfigError::invalid(
                "cluster_count",
                "must be >= 1",
                self.cluster_count,
            ));
        }
        if self.cluster_max_iterations < 1 {
            return Err(ConfigError::invalid(
                "cluster_max_iterations",
                "must be >= 1",
                self.cluster_max_iterations,
            ));
        }
        if self.monte_carlo_trials < 1 {
            return Err(ConfigError::invalid(
                "monte_carlo_trials",
                "must be >= 1",
                self.monte_carlo_trials,
            ));
        }
        let tail = self.monte_carlo_tail_percentile;
        if !(tail.is_finite() && tail > 50.0 && tail <= 100.0) {
            return Err(ConfigError::invalid(
                "monte_carlo_tail_percentile",
                "must be in (50, 100]",
                tail,
            ));
        }
        if self.rolling_window < 1 {
            return Err(ConfigError::invalid(
                "rolling_window",
                "must be >= 1",
                self.rolling_window,
            ));
        }
        if !(self.profit_factor_target.is_finite() && self.profit_factor_target > 0.0) {
            return Err(ConfigError::invalid(
                "profit_factor_target",
                "must be finite and > 0",
                self.profit_factor_target,
            ));
        }
        self.validate_weights()
    }

    fn validate_leverage_edges(&self) -> Result<(), ConfigError> {
        let edges = &self.leverage_bucket_edges;
        if let Some(bad) = edges.iter().find(|e| !(e.is_finite() && **e > 0.0)) {
            return Err(ConfigError::invalid(
                "leverage_bucket_edges",
                "every edge must be finite and > 0",
                bad,
            ));
        }
        if edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ConfigError::invalid(
                "leverage_bucket_edges",
                "must be strictly increasing",
                format!("{edges:?}"),
            ));
        }
        Ok(())
    }

    fn validate_sessions(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for session in &self.sessions {
            if session.name.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "sessions.name",
                    "must not be empty",
                    "\"\"",
                ));
            }
            if !names.insert(session.name.as_str()) {
                return Err(ConfigError::invalid(
                    "sessions.name",
                    "must be unique",
                    &session.name,
                ));
            }
            if session.start_hour > 23 || session.end_hour > 23 {
                return Err(ConfigError::invalid(
                    "sessions.start_hour/end_hour",
                    "hours must be in 0..=23",
                    format!("{}..{}", session.start_hour, session.end_hour),
                ));
            }
            if session.start_hour == session.end_hour {
                return Err(ConfigError::invalid(
                    "sessions.start_hour/end_hour",
                    "start and end must differ",
                    session.start_hour,
                ));
            }
        }
        Ok(())
    }

    fn validate_weights(&self) -> Result<(), ConfigError> {
        let w = &self.weights;
        for (field, value) in [
            ("weights.weight_profit_factor", w.weight_profit_factor),
            ("weights.weight_win_rate", w.weight_win_rate),
            ("weights.weight_drawdown", w.weight_drawdown),
            ("weights.weight_behavior", w.weight_behavior),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::invalid(field, "must be finite and >= 0", value));
            }
        }
        if w.normalized().is_none() {
            return Err(ConfigError::invalid(
                "weights",
                "at least one weight must be > 0",
                "all zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invalid(config: &AnalysisConfig, expected_field: &str) {
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected invalid `{expected_field}`, got {other:?}"),
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.revenge_threshold, 5);
        assert_eq!(config.overtrading_threshold, 10);
        assert_eq!(config.impulsive_gap(), Duration::minutes(5));
        assert_eq!(config.scalp_max_duration(), Duration::minutes(5));
        assert_eq!(config.swing_min_duration(), Duration::minutes(60));
        assert_eq!(config.monte_carlo_trials, 1000);
        assert!(config.monte_carlo_seed.is_none());
        assert!((3..=5).contains(&config.cluster_count));
    }

    #[test]
    fn zero_trials_rejected() {
        let config = AnalysisConfig {
            monte_carlo_trials: 0,
            ..Default::default()
        };
        assert_invalid(&config, "monte_carlo_trials");
    }

    #[test]
    fn zero_thresholds_rejected() {
        let config = AnalysisConfig {
            revenge_threshold: 0,
            ..Default::default()
        };
        assert_invalid(&config, "revenge_threshold");

        let config = AnalysisConfig {
            overtrading_threshold: 0,
            ..Default::default()
        };
        assert_invalid(&config, "overtrading_threshold");

        let config = AnalysisConfig {
            cluster_count: 0,
            ..Default::default()
        };
        assert_invalid(&config, "cluster_count");
    }

    #[test]
    fn scalp_longer_than_swing_rejected() {
        let config = AnalysisConfig {
            scalp_max_duration_secs: 7200,
            ..Default::default()
        };
        assert_invalid(&config, "scalp_max_duration_secs");
    }

    #[test]
    fn out_of_range_durations_rejected() {
        let config = AnalysisConfig {
            impulsive_gap_secs: i64::MAX,
            swing_min_duration_secs: i64::MAX,
            ..Default::default()
        };
        assert_invalid(&config, "impulsive_gap_secs");

        let config = AnalysisConfig {
            swing_min_duration_secs: MAX_DURATION_SECS + 1,
            ..Default::default()
        };
        assert_invalid(&config, "swing_min_duration_secs");

        let config = AnalysisConfig {
            impulsive_gap_secs: MAX_DURATION_SECS,
            swing_min_duration_secs: MAX_DURATION_SECS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.swing_min_duration().num_seconds(), MAX_DURATION_SECS);
    }

    #[test]
    fn toml_with_huge_gap_is_rejected() {
        let err = AnalysisConfig::from_toml("impulsive_gap_secs = 9223372036854775807").unwrap_err();
        assert!(err.to_string().contains("impulsive_gap_secs"));
    }

    #[test]
    fn negative_or_all_zero_weights_rejected() {
        let mut config = AnalysisConfig::default();
        config.weights.weight_drawdown = -1.0;
        assert_invalid(&config, "weights.weight_drawdown");

        let config = AnalysisConfig {
            weights: ScoreWeights {
                weight_profit_factor: 0.0,
                weight_win_rate: 0.0,
                weight_drawdown: 0.0,
                weight_behavior: 0.0,
            },
            ..Default::default()
        };
        assert_invalid(&config, "weights");
    }

    #[test]
    fn weights_normalize_to_one() {
        let weights = ScoreWeights {
            weight_profit_factor: 2.0,
            weight_win_rate: 1.0,
            weight_drawdown: 1.0,
            weight_behavior: 0.0,
        };
        let n = weights.normalized().unwrap();
        assert!((n.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((n[0] - 0.5).abs() < 1e-12);
        assert_eq!(n[3], 0.0);
    }

    #[test]
    fn unsorted_leverage_edges_rejected() {
        let config = AnalysisConfig {
            leverage_bucket_edges: vec![10.0, 5.0],
            ..Default::default()
        };
        assert_invalid(&config, "leverage_bucket_edges");
    }

    #[test]
    fn bad_sessions_rejected() {
        let config = AnalysisConfig {
            sessions: vec![SessionWindow::new("asia", 1, 25)],
            ..Default::default()
        };
        assert_invalid(&config, "sessions.start_hour/end_hour");

        let config = AnalysisConfig {
            sessions: vec![SessionWindow::new("a", 1, 5), SessionWindow::new("a", 5, 9)],
            ..Default::default()
        };
        assert_invalid(&config, "sessions.name");
    }

    #[test]
    fn tail_percentile_range() {
        let config = AnalysisConfig {
            monte_carlo_tail_percentile: 40.0,
            ..Default::default()
        };
        assert_invalid(&config, "monte_carlo_tail_percentile");
    }

    #[test]
    fn session_windows_wrap_midnight() {
        let config = AnalysisConfig::default();
        assert_eq!(config.session_for_hour(0), "us");
        assert_eq!(config.session_for_hour(1), "asia");
        assert_eq!(config.session_for_hour(8), "asia");
        assert_eq!(config.session_for_hour(9), "europe");
        assert_eq!(config.session_for_hour(17), "us");
        assert_eq!(config.session_for_hour(23), "us");
    }

    #[test]
    fn uncovered_hours_are_unassigned() {
        let config = AnalysisConfig {
            sessions: vec![SessionWindow::new("morning", 6, 12)],
            ..Default::default()
        };
        assert_eq!(config.session_for_hour(13), UNASSIGNED_SESSION);
        assert_eq!(config.session_for_hour(6), "morning");
    }

    #[test]
    fn partial_toml_takes_defaults() {
        let config = AnalysisConfig::from_toml(
            r#"
            revenge_threshold = 3
            monte_carlo_seed = 7

            [weights]
            weight_behavior = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.revenge_threshold, 3);
        assert_eq!(config.monte_carlo_seed, Some(7));
        assert_eq!(config.overtrading_threshold, 10);
        assert_eq!(config.weights.weight_behavior, 0.5);
        assert_eq!(config.weights.weight_win_rate, 0.25);
    }

    #[test]
    fn toml_validation_runs_on_load() {
        let err = AnalysisConfig::from_toml("monte_carlo_trials = 0").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("monte_carlo_trials"), "message was: {msg}");
        assert!(msg.contains(">= 1"), "message was: {msg}");
    }

    #[test]
    fn toml_roundtrip() {
        let config = AnalysisConfig {
            monte_carlo_seed: Some(11),
            ..Default::default()
        };
        let text = config.to_toml().unwrap();
        let back = AnalysisConfig::from_toml(&text).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(
            AnalysisConfig::from_toml("revenge_threshold = \"five\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
