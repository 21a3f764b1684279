//! Failures that abort a pipeline run.
//!
//! Anything recoverable (a failed feature batch, a track without features)
//! never shows up here; it lands in the discard log instead.

use crate::track::SongSource;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// No usable session: token missing, expired or rejected.
    #[error("not authenticated with the music catalog: {reason}")]
    NotAuthenticated { reason: String },

    #[error("cluster count must be a positive integer (got {0})")]
    InvalidClusterCount(usize),

    /// A page request failed while collecting tracks.
    #[error("failed to collect {source_kind} tracks at offset {offset}")]
    Collection {
        source_kind: SongSource,
        offset: usize,
        #[source]
        source: anyhow::Error,
    },

    /// Playlist creation or insertion failed. Playlists listed in `created`
    /// were made earlier in the same run and are left in place.
    #[error("failed to materialize playlist for cluster {}", .cluster + 1)]
    Materialization {
        cluster: usize,
        created: Vec<String>,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    /// Playlists that exist in the catalog despite the failure.
    #[must_use]
    pub fn created_playlists(&self) -> &[String] {
        match self {
            Self::Materialization { created, .. } => created,
            _ => &[],
        }
    }
}
