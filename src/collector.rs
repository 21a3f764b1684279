//! # Track Collector
//!
//! Pages through the user's listening history and normalizes every record
//! into a [`Track`]. No deduplication: a track that is both liked and a top
//! track appears twice.

use crate::catalog::{CatalogClient, Page};
use crate::error::PipelineError;
use crate::track::{SongSource, TimeRange, Track};
use anyhow::Result;
use log::{debug, info};

/// Items requested per listing page.
pub const PAGE_SIZE: usize = 50;

/// Collect tracks from every source in `selection`, liked before top.
///
/// # Errors
///
/// A failed page request aborts collection with [`PipelineError::Collection`].
pub fn collect_tracks<C: CatalogClient + ?Sized>(
    client: &C,
    selection: SongSource,
    time_range: TimeRange,
) -> Result<Vec<Track>, PipelineError> {
    let mut tracks = Vec::new();

    if selection.includes_liked() {
        let liked = paginate(SongSource::Liked, |offset| {
            client.list_saved_tracks(PAGE_SIZE, offset)
        })?;
        info!("Collected {} liked tracks", liked.len());
        tracks.extend(liked);
    }

    if selection.includes_top() {
        let top = paginate(SongSource::Top, |offset| {
            client.list_top_tracks(PAGE_SIZE, offset, time_range)
        })?;
        info!("Collected {} top tracks ({time_range})", top.len());
        tracks.extend(top);
    }

    Ok(tracks)
}

/// Drive one paginated listing to exhaustion.
fn paginate<F>(source_kind: SongSource, mut fetch_page: F) -> Result<Vec<Track>, PipelineError>
where
    F: FnMut(usize) -> Result<Page>,
{
    let mut tracks = Vec::new();
    let mut offset = 0;

    loop {
        let page = fetch_page(offset).map_err(|source| PipelineError::Collection {
            source_kind,
            offset,
            source,
        })?;
        debug!(
            "{source_kind} page at offset {offset}: {} items, has_next={}",
            page.items.len(),
            page.has_next
        );

        tracks.extend(page.items.into_iter().map(|record| record.into_track()));

        if !page.has_next {
            break;
        }
        offset += PAGE_SIZE;
    }

    Ok(tracks)
}
