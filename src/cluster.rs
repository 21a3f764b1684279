//! # Cluster Engine
//!
//! Seeded k-means over the four raw audio features.
//!
//! ## Algorithm
//!
//! 1. **Seeding**: k-means++ driven by a `StdRng` built from a fixed seed
//! 2. **Lloyd iterations**: assign each point to its nearest centroid, then
//!    move each centroid to the mean of its members
//! 3. **Restarts**: several seeded runs, keeping the one with the lowest inertia
//!
//! Features are not rescaled. Tempo (roughly 40-200 BPM) therefore dominates
//! the distance and the clusters mostly separate tracks by tempo.
//!
//! ## Determinism
//!
//! Every random draw comes from the seeded generator and ties always resolve
//! to the lowest cluster index, so identical input produces identical output.
//! The assignment step runs through rayon, whose indexed `collect` keeps input
//! order.
//!
//! ## More Clusters Than Points
//!
//! When `k` exceeds the number of distinct points, k-means++ stops seeding
//! once every point coincides with a centroid. The surplus clusters are empty
//! and [`ClusterAssignment`] only counts them, so memory stays proportional to
//! the input however large `k` is.

use crate::error::PipelineError;
use crate::features::FeatureSet;
use crate::track::FeatureVector;
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

type Point = [f64; FeatureVector::DIMENSIONS];

/// Parameters for a clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    /// Number of clusters requested.
    pub k: usize,
    pub seed: u64,
    /// Independent seeded restarts; the lowest-inertia run wins.
    pub restarts: usize,
    pub max_iterations: usize,
    /// Stop once no centroid moves further than this (squared distance).
    pub tolerance: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            k: 2,
            seed: 42,
            restarts: 10,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }
}

impl ClusterConfig {
    #[must_use]
    pub fn with_k(k: usize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }
}

/// Cluster index → ordered track ids for exactly `k` clusters.
///
/// Only the clusters that received a centroid are stored; every index past
/// them up to `k` is an empty cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterAssignment {
    clusters: Vec<Vec<String>>,
    cluster_count: usize,
}

impl ClusterAssignment {
    /// Build directly from per-cluster id lists.
    #[must_use]
    pub fn from_clusters(clusters: Vec<Vec<String>>) -> Self {
        let cluster_count = clusters.len();
        Self {
            clusters,
            cluster_count,
        }
    }

    /// Number of clusters, empty ones included.
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    /// Members of cluster `index`, `None` when `index >= cluster_count()`.
    #[must_use]
    pub fn cluster(&self, index: usize) -> Option<&[String]> {
        if index >= self.cluster_count {
            return None;
        }
        Some(self.clusters.get(index).map_or(&[], Vec::as_slice))
    }

    /// `(index, ids)` for the stored clusters in ascending index order. The
    /// unstored tail is empty and not yielded.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.clusters.iter().map(Vec::as_slice).enumerate()
    }

    /// Only the clusters with at least one member.
    pub fn non_empty(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.iter().filter(|(_, ids)| !ids.is_empty())
    }

    #[must_use]
    pub fn total_tracks(&self) -> usize {
        self.clusters.iter().map(Vec::len).sum()
    }
}

/// Raw k-means output over plain vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    /// Cluster index per input point.
    pub labels: Vec<usize>,
    /// At most `min(k, distinct points)` centroids.
    pub centroids: Vec<FeatureVector>,
    /// Sum of squared distances from each point to its centroid.
    pub inertia: f64,
}

/// Cluster a [`FeatureSet`], mapping labels back to its track ids.
///
/// # Errors
///
/// [`PipelineError::InvalidClusterCount`] if `config.k` is zero.
pub fn cluster_tracks(
    features: &FeatureSet,
    config: &ClusterConfig,
) -> Result<ClusterAssignment, PipelineError> {
    let fit = kmeans(&features.vectors, config)?;

    let mut clusters = vec![Vec::new(); fit.centroids.len()];
    for (track_id, &label) in features.track_ids.iter().zip(&fit.labels) {
        clusters[label].push(track_id.clone());
    }

    let sizes: Vec<usize> = clusters.iter().map(Vec::len).collect();
    debug!("Cluster sizes {sizes:?} of {}, inertia {:.3}", config.k, fit.inertia);
    Ok(ClusterAssignment {
        clusters,
        cluster_count: config.k,
    })
}

/// Run seeded k-means on `vectors`.
///
/// An empty input yields an empty fit.
///
/// # Errors
///
/// [`PipelineError::InvalidClusterCount`] if `config.k` is zero.
pub fn kmeans(
    vectors: &[FeatureVector],
    config: &ClusterConfig,
) -> Result<KMeansFit, PipelineError> {
    if config.k == 0 {
        return Err(PipelineError::InvalidClusterCount(0));
    }
    if vectors.is_empty() {
        return Ok(KMeansFit {
            labels: Vec::new(),
            centroids: Vec::new(),
            inertia: 0.0,
        });
    }

    let points: Vec<Point> = vectors.iter().map(FeatureVector::as_array).collect();
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut best: Option<(Vec<usize>, Vec<Point>, f64)> = None;
    for restart in 0..config.restarts.max(1) {
        let (labels, centroids, inertia) = lloyd(&points, config, &mut rng);
        trace!("Restart {restart}: inertia {inertia:.4}");
        // Strict comparison keeps the earliest run on ties.
        if best.as_ref().map_or(true, |(_, _, best_inertia)| inertia < *best_inertia) {
            best = Some((labels, centroids, inertia));
        }
    }

    let (labels, centroids, inertia) = best.unwrap_or_default();
    Ok(KMeansFit {
        labels,
        centroids: centroids
            .into_iter()
            .map(|[d, e, v, t]| FeatureVector::new(d, e, v, t))
            .collect(),
        inertia,
    })
}

/// One seeded run: k-means++ seeding followed by Lloyd iterations.
fn lloyd(
    points: &[Point],
    config: &ClusterConfig,
    rng: &mut StdRng,
) -> (Vec<usize>, Vec<Point>, f64) {
    let mut centroids = seed_centroids(points, config.k, rng);
    let mut labels = assign(points, &centroids);

    for iteration in 0..config.max_iterations {
        let updated = update_centroids(points, &labels, &centroids);
        let shift = centroids
            .iter()
            .zip(&updated)
            .map(|(old, new)| distance_sq(old, new))
            .fold(0.0, f64::max);
        centroids = updated;

        let relabeled = assign(points, &centroids);
        let converged = relabeled == labels && shift <= config.tolerance;
        labels = relabeled;
        if converged {
            trace!("Converged after {} iterations", iteration + 1);
            break;
        }
    }

    let inertia = points
        .iter()
        .zip(&labels)
        .map(|(point, &label)| distance_sq(point, &centroids[label]))
        .sum();
    (labels, centroids, inertia)
}

/// k-means++ seeding: the first centroid uniformly, each next one with
/// probability proportional to its squared distance from the nearest chosen
/// centroid. Stops early once every point coincides with a centroid, so at
/// most `min(k, distinct points)` centroids come back.
fn seed_centroids(points: &[Point], k: usize, rng: &mut StdRng) -> Vec<Point> {
    let mut centroids = Vec::with_capacity(k.min(points.len()));
    centroids.push(points[rng.gen_range(0..points.len())]);

    let mut nearest: Vec<f64> = points.iter().map(|p| distance_sq(p, &centroids[0])).collect();

    while centroids.len() < k {
        let total: f64 = nearest.iter().sum();
        if total <= 0.0 {
            trace!("All points covered by {} centroids", centroids.len());
            break;
        }

        let mut target = rng.gen::<f64>() * total;
        let mut chosen = points.len() - 1;
        for (index, &weight) in nearest.iter().enumerate() {
            if weight > 0.0 && target < weight {
                chosen = index;
                break;
            }
            target -= weight;
        }

        let centroid = points[chosen];
        for (distance, point) in nearest.iter_mut().zip(points) {
            *distance = distance.min(distance_sq(point, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

/// Nearest centroid per point; ties go to the lower index.
fn assign(points: &[Point], centroids: &[Point]) -> Vec<usize> {
    points
        .par_iter()
        .map(|point| {
            let mut best = 0;
            let mut best_distance = distance_sq(point, &centroids[0]);
            for (index, centroid) in centroids.iter().enumerate().skip(1) {
                let distance = distance_sq(point, centroid);
                if distance < best_distance {
                    best = index;
                    best_distance = distance;
                }
            }
            best
        })
        .collect()
}

/// Mean of each cluster's members. Empty clusters keep their centroid.
fn update_centroids(points: &[Point], labels: &[usize], centroids: &[Point]) -> Vec<Point> {
    let mut sums = vec![[0.0; FeatureVector::DIMENSIONS]; centroids.len()];
    let mut counts = vec![0_usize; centroids.len()];

    for (point, &label) in points.iter().zip(labels) {
        for (sum, value) in sums[label].iter_mut().zip(point) {
            *sum += value;
        }
        counts[label] += 1;
    }

    sums.into_iter()
        .zip(counts)
        .zip(centroids)
        .map(|((sum, count), previous)| {
            if count == 0 {
                *previous
            } else {
                #[allow(clippy::cast_precision_loss)]
                let n = count as f64;
                sum.map(|s| s / n)
            }
        })
        .collect()
}

#[inline]
fn distance_sq(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}
