//! # Feature Fetcher
//!
//! Resolves tracks to [`FeatureVector`]s through batched lookups.
//!
//! Lookups are lossy on purpose: a batch that fails is skipped, not retried,
//! and a track the catalog has no features for is dropped. Every drop is
//! recorded as a [`Discard`] so callers can see what was lost and why.

use crate::catalog::CatalogClient;
use crate::track::{FeatureVector, Track};
use log::{debug, info, warn};
use std::fmt;

/// Ids per feature lookup; the catalog's per-request maximum.
pub const FEATURE_BATCH_SIZE: usize = 100;

/// Why a track did not make it to clustering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// The source record carried no usable id.
    MissingIdentifier,
    /// The lookup batch containing the track failed.
    BatchFailed { batch: usize, message: String },
    /// The catalog returned no features (unavailable or deleted track).
    Unavailable,
    /// Features came back with non-finite values.
    InvalidFeatures,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingIdentifier => write!(f, "missing identifier"),
            Self::BatchFailed { batch, message } => {
                write!(f, "feature batch {batch} failed: {message}")
            }
            Self::Unavailable => write!(f, "no features available"),
            Self::InvalidFeatures => write!(f, "invalid feature values"),
        }
    }
}

/// A dropped track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discard {
    /// Index of the track in the fetcher's input.
    pub position: usize,
    pub track_id: String,
    pub reason: DiscardReason,
}

/// Result of a feature fetch: survivors in input order plus the discard log.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    pub track_ids: Vec<String>,
    pub vectors: Vec<FeatureVector>,
    pub discarded: Vec<Discard>,
}

impl FeatureSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Survivors as `(track_id, vector)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureVector)> {
        self.track_ids.iter().map(String::as_str).zip(self.vectors.iter())
    }

    /// Number of discards with the given reason kind.
    #[must_use]
    pub fn discarded_count(&self, matches: impl Fn(&DiscardReason) -> bool) -> usize {
        self.discarded.iter().filter(|d| matches(&d.reason)).count()
    }

    fn keep(&mut self, track_id: &str, vector: FeatureVector) {
        self.track_ids.push(track_id.to_string());
        self.vectors.push(vector);
    }

    fn discard(&mut self, position: usize, track_id: &str, reason: DiscardReason) {
        debug!("Dropping track {position} ({track_id:?}): {reason}");
        self.discarded.push(Discard {
            position,
            track_id: track_id.to_string(),
            reason,
        });
    }
}

/// Look up features for `tracks`.
///
/// Tracks without an id are dropped before batching. `track_ids[i]` in the
/// result always belongs to `vectors[i]`.
pub fn fetch_features<C: CatalogClient + ?Sized>(client: &C, tracks: &[Track]) -> FeatureSet {
    let mut set = FeatureSet::default();

    let mut lookups: Vec<(usize, &str)> = Vec::with_capacity(tracks.len());
    for (position, track) in tracks.iter().enumerate() {
        if track.has_identifier() {
            lookups.push((position, track.id.as_str()));
        } else {
            set.discard(position, &track.id, DiscardReason::MissingIdentifier);
        }
    }

    for (batch_index, batch) in lookups.chunks(FEATURE_BATCH_SIZE).enumerate() {
        let ids: Vec<String> = batch.iter().map(|(_, id)| (*id).to_string()).collect();
        debug!("Requesting features for batch {batch_index} ({} ids)", ids.len());

        let results = match client.get_audio_features(&ids) {
            Ok(results) if results.len() == ids.len() => results,
            Ok(results) => {
                let message = format!("expected {} results, got {}", ids.len(), results.len());
                warn!("Skipping feature batch {batch_index}: {message}");
                drop_batch(&mut set, batch, batch_index, &message);
                continue;
            }
            Err(e) => {
                let message = format!("{e:#}");
                warn!("Skipping feature batch {batch_index}: {message}");
                drop_batch(&mut set, batch, batch_index, &message);
                continue;
            }
        };

        for (&(position, id), result) in batch.iter().zip(results) {
            match result {
                Some(vector) if vector.is_finite() => set.keep(id, vector),
                Some(_) => set.discard(position, id, DiscardReason::InvalidFeatures),
                None => set.discard(position, id, DiscardReason::Unavailable),
            }
        }
    }

    info!(
        "Resolved features for {} of {} tracks ({} dropped)",
        set.len(),
        tracks.len(),
        set.discarded.len()
    );
    set
}

fn drop_batch(set: &mut FeatureSet, batch: &[(usize, &str)], batch_index: usize, message: &str) {
    for &(position, id) in batch {
        set.discard(
            position,
            id,
            DiscardReason::BatchFailed {
                batch: batch_index,
                message: message.to_string(),
            },
        );
    }
}
