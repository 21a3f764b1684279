//! # Playlist Materializer
//!
//! Turns a [`ClusterAssignment`] into private playlists in the catalog.
//!
//! This is the only stage with side effects that outlive the run. There is no
//! undo: if a later cluster fails, playlists created for earlier clusters stay
//! in the catalog and are reported back through the error.

use crate::catalog::CatalogClient;
use crate::cluster::ClusterAssignment;
use crate::error::PipelineError;
use anyhow::Context;
use log::{debug, info};

/// Maximum tracks per insertion call.
pub const INSERT_BATCH_SIZE: usize = 100;

/// Deterministic display name for cluster `index` (zero-based).
#[must_use]
pub fn playlist_name(index: usize) -> String {
    format!("Cluster {} Playlist", index + 1)
}

/// Create one private playlist per non-empty cluster, in ascending index
/// order, and fill it in batches. Returns the created names in order.
///
/// # Errors
///
/// The first creation or insertion failure stops materialization and is
/// returned as [`PipelineError::Materialization`], listing the playlists
/// already created.
pub fn materialize_playlists<C: CatalogClient + ?Sized>(
    client: &C,
    assignment: &ClusterAssignment,
    user_id: &str,
) -> Result<Vec<String>, PipelineError> {
    let mut created = Vec::new();

    for (index, track_ids) in assignment.non_empty() {
        let name = playlist_name(index);
        match create_and_fill(client, user_id, &name, track_ids) {
            Ok(()) => {
                info!("Created \"{name}\" with {} tracks", track_ids.len());
                created.push(name);
            }
            Err(source) => {
                return Err(PipelineError::Materialization {
                    cluster: index,
                    created,
                    source,
                });
            }
        }
    }

    Ok(created)
}

/// Names [`materialize_playlists`] would create, without touching the catalog.
#[must_use]
pub fn planned_playlists(assignment: &ClusterAssignment) -> Vec<String> {
    assignment
        .non_empty()
        .map(|(index, _)| playlist_name(index))
        .collect()
}

fn create_and_fill<C: CatalogClient + ?Sized>(
    client: &C,
    user_id: &str,
    name: &str,
    track_ids: &[String],
) -> anyhow::Result<()> {
    let playlist = client
        .create_playlist(user_id, name, false)
        .with_context(|| format!("Failed to create playlist \"{name}\""))?;
    debug!("Playlist \"{name}\" created with id {}", playlist.id);

    for (batch_index, batch) in track_ids.chunks(INSERT_BATCH_SIZE).enumerate() {
        client
            .add_items_to_playlist(&playlist.id, batch)
            .with_context(|| {
                format!(
                    "Failed to add batch {batch_index} ({} tracks) to playlist \"{name}\"",
                    batch.len()
                )
            })?;
        debug!("Added {} tracks to \"{name}\"", batch.len());
    }

    Ok(())
}
