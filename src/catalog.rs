//! # Catalog Client Interface
//!
//! The pipeline never talks HTTP directly. Everything it needs from the music
//! catalog goes through [`CatalogClient`], which is passed explicitly into each
//! run. The production implementation is [`crate::spotify::SpotifyClient`];
//! tests substitute an in-memory double.

use crate::track::{FeatureVector, RawTrackRecord, TimeRange};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One page of a paginated listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<RawTrackRecord>,
    /// `false` once the catalog reports there is no next page.
    pub has_next: bool,
}

/// A playlist as returned by the catalog after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistHandle {
    pub id: String,
    pub name: String,
}

/// Operations the pipeline consumes from the music catalog.
///
/// All calls are blocking. Implementations report transport and service
/// failures as errors; the pipeline decides which of them are fatal.
pub trait CatalogClient {
    /// The authenticated user's id.
    ///
    /// # Errors
    ///
    /// Fails when the session is missing, expired or rejected.
    fn current_user_id(&self) -> Result<String>;

    /// One page of the user's saved tracks.
    ///
    /// # Errors
    ///
    /// Returns an error if the page request fails.
    fn list_saved_tracks(&self, page_size: usize, offset: usize) -> Result<Page>;

    /// One page of the user's top tracks for `time_range`.
    ///
    /// # Errors
    ///
    /// Returns an error if the page request fails.
    fn list_top_tracks(
        &self,
        page_size: usize,
        offset: usize,
        time_range: TimeRange,
    ) -> Result<Page>;

    /// Features for a batch of ids, same length and order as `ids`. `None`
    /// marks a track the catalog has no features for.
    ///
    /// # Errors
    ///
    /// The whole batch fails as a unit on transport or service errors.
    fn get_audio_features(&self, ids: &[String]) -> Result<Vec<Option<FeatureVector>>>;

    /// Create a playlist owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog refuses or the request fails.
    fn create_playlist(&self, user_id: &str, name: &str, public: bool) -> Result<PlaylistHandle>;

    /// Append tracks to a playlist.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog refuses or the request fails.
    fn add_items_to_playlist(&self, playlist_id: &str, track_ids: &[String]) -> Result<()>;
}
