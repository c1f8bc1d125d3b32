//! Trade clustering and Trade DNA extraction.
//!
//! Each trade becomes a six-dimensional feature vector (duration, leverage,
//! direction, hour as a sine/cosine pair, PnL), z-scored per feature. K-means
//! with k-means++ seeding groups the vectors; the cluster with the highest
//! mean PnL is the Trade DNA, reported back in original units.
//!
//! The whole procedure is a deterministic function of the trades, the cluster
//! count and the seed.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use rand::rngs::StdRng;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tradeaudit_core::config::AnalysisConfig;
use tradeaudit_core::domain::{Direction, MetricValue, TradeRecord, TradeSet};
use tradeaudit_core::rng::{RngHierarchy, KMEANS_INIT_STREAM};

use crate::metrics::to_f64;

pub const DIM: usize = 6;
pub const FEATURE_NAMES: [&str; DIM] = [
    "duration_minutes",
    "leverage",
    "direction",
    "hour_sin",
    "hour_cos",
    "pnl",
];

pub type Point = [f64; DIM];

const TOP_ASSETS: usize = 3;

// ─── Features ───────────────────────────────────────────────────────

/// Raw (unscaled) feature vector of one trade.
pub fn raw_features(trade: &TradeRecord) -> Point {
    let angle = TAU * trade.fractional_hour() / 24.0;
    [
        trade.duration_minutes(),
        trade.leverage(),
        trade.direction().sign() as f64,
        angle.sin(),
        angle.cos(),
        trade.pnl_f64(),
    ]
}

/// Per-feature z-score transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub means: Point,
    pub stds: Point,
}

impl FeatureScaler {
    /// Fit means and population deviations. `points` must be non-empty.
    pub fn fit(points: &[Point]) -> Self {
        let n = points.len().max(1) as f64;
        let mut means = [0.0; DIM];
        for p in points {
            for (m, v) in means.iter_mut().zip(p) {
                *m += v / n;
            }
        }
        let mut stds = [0.0; DIM];
        for p in points {
            for d in 0..DIM {
                stds[d] += (p[d] - means[d]).powi(2) / n;
            }
        }
        for s in &mut stds {
            *s = s.sqrt();
        }
        Self { means, stds }
    }

    /// Scale a point; a zero-deviation feature maps to 0.
    pub fn transform(&self, p: &Point) -> Point {
        std::array::from_fn(|d| {
            if self.stds[d] < 1e-12 {
                0.0
            } else {
                (p[d] - self.means[d]) / self.stds[d]
            }
        })
    }

    pub fn inverse(&self, p: &Point) -> Point {
        std::array::from_fn(|d| self.means[d] + p[d] * self.stds[d])
    }
}

// ─── K-means ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansOutcome {
    pub assignments: Vec<usize>,
    pub centroids: Vec<Point>,
    pub iterations: usize,
    pub converged: bool,
}

fn squared_distance(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index of the nearest centroid; ties go to the lowest index.
fn nearest(point: &Point, centroids: &[Point]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let dist = squared_distance(point, c);
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

/// k-means++ seeding: first centroid uniform, each next one drawn with
/// probability proportional to its squared distance from the chosen set.
///
/// When `k` equals the number of points every point seeds its own centroid.
pub fn kmeans_plus_plus(points: &[Point], k: usize, rng: &mut StdRng) -> Vec<Point> {
    if points.is_empty() || k == 0 {
        return Vec::new();
    }
    if k >= points.len() {
        return points.to_vec();
    }

    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())]);
    let mut dist: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = dist.iter().sum();
        let pick = if total <= 0.0 {
            rng.gen_range(0..points.len())
        } else {
            let target = rng.gen::<f64>() * total;
            let mut acc = 0.0;
            let mut chosen = points.len() - 1;
            for (i, d) in dist.iter().enumerate() {
                acc += d;
                if *d > 0.0 && acc >= target {
                    chosen = i;
                    break;
                }
            }
            chosen
        };
        let centroid = points[pick];
        for (d, p) in dist.iter_mut().zip(points) {
            *d = d.min(squared_distance(p, &centroid));
        }
        centroids.push(centroid);
    }
    centroids
}

/// Mean of each cluster's members; an empty cluster keeps its centroid.
fn recompute(points: &[Point], assignments: &[usize], previous: &[Point]) -> Vec<Point> {
    let mut sums = vec![[0.0; DIM]; previous.len()];
    let mut counts = vec![0usize; previous.len()];
    for (p, &c) in points.iter().zip(assignments) {
        counts[c] += 1;
        for (s, v) in sums[c].iter_mut().zip(p) {
            *s += v;
        }
    }
    sums.into_iter()
        .zip(counts)
        .zip(previous)
        .map(|((sum, n), prev)| {
            if n == 0 {
                *prev
            } else {
                sum.map(|s| s / n as f64)
            }
        })
        .collect()
}

/// Lloyd iterations until assignments stop changing or `max_iterations` is hit.
///
/// With `k >= points.len()` every point is its own cluster, duplicates
/// included, and no iteration runs. Otherwise identical points can leave a
/// cluster empty; it keeps its seed centroid and a member count of 0.
pub fn kmeans(points: &[Point], k: usize, max_iterations: usize, rng: &mut StdRng) -> KMeansOutcome {
    if k >= points.len() {
        return KMeansOutcome {
            assignments: (0..points.len()).collect(),
            centroids: points.to_vec(),
            iterations: 0,
            converged: true,
        };
    }
    let mut centroids = kmeans_plus_plus(points, k, rng);
    let mut assignments: Vec<usize> = Vec::new();
    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        iterations += 1;
        let next: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();
        if next == assignments {
            converged = true;
            break;
        }
        centroids = recompute(points, &next, &centroids);
        assignments = next;
    }

    KMeansOutcome {
        assignments,
        centroids,
        iterations,
        converged,
    }
}

// ─── Profiles ───────────────────────────────────────────────────────

/// A centroid expressed in original units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidProfile {
    pub duration_minutes: f64,
    pub leverage: f64,
    /// Mean of +1 (long) / -1 (short), in [-1, 1].
    pub direction_bias: f64,
    /// Circular mean hour; undefined when the members cancel out.
    pub hour_of_day: MetricValue,
    pub pnl: f64,
}

impl CentroidProfile {
    pub fn from_raw(raw: &Point) -> Self {
        let (sin, cos) = (raw[3], raw[4]);
        let hour_of_day = if sin.hypot(cos) < 1e-9 {
            MetricValue::Undefined
        } else {
            MetricValue::from_f64((sin.atan2(cos) / TAU * 24.0).rem_euclid(24.0))
        };
        Self {
            duration_minutes: raw[0],
            leverage: raw[1],
            direction_bias: raw[2].clamp(-1.0, 1.0),
            hour_of_day,
            pnl: raw[5],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetCount {
    pub asset: String,
    pub trade_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub id: usize,
    /// Centroid in z-scored feature space, ordered as `FEATURE_NAMES`.
    pub centroid: Vec<f64>,
    pub profile: CentroidProfile,
    pub member_count: usize,
    pub total_pnl: Decimal,
    pub mean_pnl: MetricValue,
    pub win_rate: MetricValue,
    /// `None` when longs and shorts are balanced or the cluster is empty.
    pub dominant_direction: Option<Direction>,
    pub dominant_session: Option<String>,
    /// Most traded assets, by count then name.
    pub top_assets: Vec<AssetCount>,
}

impl ClusterProfile {
    fn build(
        id: usize,
        centroid: &Point,
        scaler: &FeatureScaler,
        members: &[&TradeRecord],
        config: &AnalysisConfig,
    ) -> Self {
        let total_pnl: Decimal = members.iter().map(|t| t.pnl()).sum();
        let n = members.len();
        let (mean_pnl, win_rate) = if n == 0 {
            (MetricValue::NoData, MetricValue::NoData)
        } else {
            let wins = members.iter().filter(|t| t.is_win()).count();
            (
                MetricValue::from_f64(to_f64(total_pnl) / n as f64),
                MetricValue::Value(wins as f64 / n as f64),
            )
        };

        let longs = members
            .iter()
            .filter(|t| t.direction() == Direction::Long)
            .count();
        let dominant_direction = match longs.cmp(&(n - longs)) {
            std::cmp::Ordering::Greater => Some(Direction::Long),
            std::cmp::Ordering::Less => Some(Direction::Short),
            std::cmp::Ordering::Equal => None,
        };

        let dominant_session = counts_by(members, |t| config.session_for_hour(t.hour()).to_string())
            .into_iter()
            .next()
            .map(|(session, _)| session);

        let top_assets = counts_by(members, |t| t.asset().to_string())
            .into_iter()
            .take(TOP_ASSETS)
            .map(|(asset, trade_count)| AssetCount { asset, trade_count })
            .collect();

        Self {
            id,
            centroid: centroid.to_vec(),
            profile: CentroidProfile::from_raw(&scaler.inverse(centroid)),
            member_count: n,
            total_pnl,
            mean_pnl,
            win_rate,
            dominant_direction,
            dominant_session,
            top_assets,
        }
    }
}

/// Count members per key, most frequent first, ties by key.
fn counts_by<F>(members: &[&TradeRecord], key: F) -> Vec<(String, usize)>
where
    F: Fn(&TradeRecord) -> String,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for &t in members {
        *counts.entry(key(t)).or_insert(0) += 1;
    }
    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    counts
}

/// The most profitable cluster's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDna {
    pub cluster_id: usize,
    pub profile: CentroidProfile,
    pub member_count: usize,
    pub win_rate: MetricValue,
    pub mean_pnl: MetricValue,
    pub total_pnl: Decimal,
    pub dominant_direction: Option<Direction>,
    pub dominant_session: Option<String>,
    pub top_assets: Vec<AssetCount>,
}

impl From<&ClusterProfile> for TradeDna {
    fn from(c: &ClusterProfile) -> Self {
        Self {
            cluster_id: c.id,
            profile: c.profile.clone(),
            member_count: c.member_count,
            win_rate: c.win_rate,
            mean_pnl: c.mean_pnl,
            total_pnl: c.total_pnl,
            dominant_direction: c.dominant_direction,
            dominant_session: c.dominant_session.clone(),
            top_assets: c.top_assets.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    pub requested_clusters: usize,
    pub effective_clusters: usize,
    pub iterations: usize,
    pub converged: bool,
    pub seed: u64,
    pub feature_names: Vec<String>,
    pub scaler: FeatureScaler,
    /// Cluster id per trade, in canonical order.
    pub assignments: Vec<usize>,
    pub clusters: Vec<ClusterProfile>,
    pub dna: TradeDna,
}

/// Cluster the set and extract its Trade DNA. `None` on an empty set.
pub fn extract_trade_dna(set: &TradeSet, config: &AnalysisConfig) -> Option<ClusteringResult> {
    if set.is_empty() {
        return None;
    }
    let requested = config.cluster_count;
    let effective = requested.min(set.len());
    if effective < requested {
        warn!(
            requested,
            effective,
            trades = set.len(),
            "cluster count reduced to trade count"
        );
    }

    let raw: Vec<Point> = set.iter().map(raw_features).collect();
    let scaler = FeatureScaler::fit(&raw);
    let points: Vec<Point> = raw.iter().map(|p| scaler.transform(p)).collect();

    let mut rng = RngHierarchy::new(config.clustering_seed).rng_for(KMEANS_INIT_STREAM, 0);
    let outcome = kmeans(&points, effective, config.cluster_max_iterations, &mut rng);
    debug!(
        iterations = outcome.iterations,
        converged = outcome.converged,
        "k-means finished"
    );

    let trades = set.trades();
    let clusters: Vec<ClusterProfile> = outcome
        .centroids
        .iter()
        .enumerate()
        .map(|(id, centroid)| {
            let members: Vec<&TradeRecord> = trades
                .iter()
                .zip(&outcome.assignments)
                .filter(|(_, c)| **c == id)
                .map(|(t, _)| t)
                .collect();
            ClusterProfile::build(id, centroid, &scaler, &members, config)
        })
        .collect();

    let best = best_cluster(&clusters)?;
    let dna = TradeDna::from(best);

    Some(ClusteringResult {
        requested_clusters: requested,
        effective_clusters: effective,
        iterations: outcome.iterations,
        converged: outcome.converged,
        seed: config.clustering_seed,
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        scaler,
        assignments: outcome.assignments,
        clusters,
        dna,
    })
}

/// Non-empty cluster with the highest mean PnL; ties go to the lowest id.
fn best_cluster(clusters: &[ClusterProfile]) -> Option<&ClusterProfile> {
    clusters
        .iter()
        .filter_map(|c| c.mean_pnl.value().map(|m| (c, m)))
        .fold(None, |best: Option<(&ClusterProfile, f64)>, (c, m)| match best {
            Some((_, bm)) if bm >= m => best,
            _ => Some((c, m)),
        })
        .map(|(c, _)| c)
}
