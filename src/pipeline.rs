//! # Clustering Pipeline
//!
//! The single entry point the front end calls:
//!
//! ```text
//! current user → collect tracks → fetch features → cluster → materialize
//! ```
//!
//! Stages run one after another on the calling thread. Recoverable losses
//! (failed feature batches, tracks without features) shrink the working set
//! and are reported in [`PipelineReport::discarded`]; only whole-stage
//! failures become a [`PipelineError`]. Degenerate input ends the run early
//! with [`PipelineOutcome::NothingCreated`].

use crate::catalog::CatalogClient;
use crate::cluster::{self, ClusterAssignment, ClusterConfig};
use crate::collector;
use crate::error::PipelineError;
use crate::features::{self, Discard};
use crate::materializer;
use crate::track::{SongSource, TimeRange};
use log::{info, warn};
use std::fmt;

/// Knobs for a pipeline run beyond source selection.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub cluster: ClusterConfig,
    pub time_range: TimeRange,
    /// Cluster but do not create anything in the catalog.
    pub dry_run: bool,
}

impl PipelineOptions {
    #[must_use]
    pub fn with_cluster_count(cluster_count: usize) -> Self {
        Self {
            cluster: ClusterConfig::with_k(cluster_count),
            ..Self::default()
        }
    }
}

/// Why a run finished without creating playlists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// The selected sources returned no tracks.
    NoTracks,
    /// No track resolved to a feature vector.
    NoFeatures,
    /// Clustering produced only empty clusters.
    NoNonEmptyClusters,
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTracks => write!(f, "no songs found in the selected category"),
            Self::NoFeatures => write!(f, "none of the selected songs have audio features"),
            Self::NoNonEmptyClusters => write!(f, "clustering produced no non-empty clusters"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Playlists created, in cluster order.
    Created(Vec<String>),
    /// Dry run: playlists that would have been created.
    Planned(Vec<String>),
    NothingCreated(EmptyReason),
}

/// Everything a run produced, for display and for tests.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub outcome: PipelineOutcome,
    pub tracks_collected: usize,
    pub discarded: Vec<Discard>,
    pub assignment: Option<ClusterAssignment>,
}

impl PipelineReport {
    fn empty(reason: EmptyReason, tracks_collected: usize, discarded: Vec<Discard>) -> Self {
        Self {
            outcome: PipelineOutcome::NothingCreated(reason),
            tracks_collected,
            discarded,
            assignment: None,
        }
    }

    /// Names of the created playlists (empty for dry runs and empty outcomes).
    #[must_use]
    pub fn created_playlists(&self) -> &[String] {
        match &self.outcome {
            PipelineOutcome::Created(names) => names,
            _ => &[],
        }
    }
}

/// Run the whole pipeline with default options and `cluster_count` clusters.
///
/// # Errors
///
/// See [`run_pipeline`].
pub fn run_clustering_pipeline<C: CatalogClient + ?Sized>(
    client: &C,
    selection: SongSource,
    cluster_count: usize,
) -> Result<PipelineReport, PipelineError> {
    run_pipeline(client, selection, &PipelineOptions::with_cluster_count(cluster_count))
}

/// Run the whole pipeline.
///
/// # Errors
///
/// - [`PipelineError::InvalidClusterCount`] when `k` is zero
/// - [`PipelineError::NotAuthenticated`] when the catalog rejects the session
/// - [`PipelineError::Collection`] when a listing page fails
/// - [`PipelineError::Materialization`] when creating or filling a playlist fails
pub fn run_pipeline<C: CatalogClient + ?Sized>(
    client: &C,
    selection: SongSource,
    options: &PipelineOptions,
) -> Result<PipelineReport, PipelineError> {
    if options.cluster.k == 0 {
        return Err(PipelineError::InvalidClusterCount(0));
    }

    let user_id = client
        .current_user_id()
        .map_err(|e| PipelineError::NotAuthenticated {
            reason: format!("{e:#}"),
        })?;
    info!(
        "Running clustering pipeline for user {user_id} ({selection} songs, k={})",
        options.cluster.k
    );

    let tracks = collector::collect_tracks(client, selection, options.time_range)?;
    if tracks.is_empty() {
        return Ok(PipelineReport::empty(EmptyReason::NoTracks, 0, Vec::new()));
    }

    let feature_set = features::fetch_features(client, &tracks);
    if feature_set.is_empty() {
        return Ok(PipelineReport::empty(
            EmptyReason::NoFeatures,
            tracks.len(),
            feature_set.discarded,
        ));
    }
    if feature_set.len() < options.cluster.k {
        warn!(
            "Requested {} clusters for {} tracks; some clusters will be empty",
            options.cluster.k,
            feature_set.len()
        );
    }

    let assignment = cluster::cluster_tracks(&feature_set, &options.cluster)?;

    let outcome = if assignment.non_empty().next().is_none() {
        PipelineOutcome::NothingCreated(EmptyReason::NoNonEmptyClusters)
    } else if options.dry_run {
        PipelineOutcome::Planned(materializer::planned_playlists(&assignment))
    } else {
        PipelineOutcome::Created(materializer::materialize_playlists(
            client,
            &assignment,
            &user_id,
        )?)
    };

    Ok(PipelineReport {
        outcome,
        tracks_collected: tracks.len(),
        discarded: feature_set.discarded,
        assignment: Some(assignment),
    })
}
