//! # Spotify Web API Adapter
//!
//! Blocking [`CatalogClient`] implementation over the Spotify Web API.
//!
//! Obtaining the access token (the OAuth authorization-code exchange) is out
//! of scope: the client is built from a token that already exists, taken from
//! the configuration file or `CADENCE_ACCESS_TOKEN`. There is no refresh. An
//! expired token surfaces as a 401 on the first call, which the pipeline
//! reports as not authenticated.
//!
//! ## Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | current user | `GET /me` |
//! | saved tracks | `GET /me/tracks?limit&offset` |
//! | top tracks | `GET /me/top/tracks?limit&offset&time_range` |
//! | features | `GET /audio-features?ids=a,b,c` |
//! | create playlist | `POST /users/{id}/playlists` |
//! | add tracks | `POST /playlists/{id}/tracks` |

use crate::catalog::{CatalogClient, Page, PlaylistHandle};
use crate::config::Settings;
use crate::error::PipelineError;
use crate::track::{FeatureVector, RawTrackRecord, TimeRange};
use anyhow::{Context, Result};
use log::trace;
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct SpotifyClient {
    client: Client,
    base_url: String,
    access_token: String,
}

#[derive(Deserialize)]
struct UserProfile {
    id: String,
}

#[derive(Deserialize)]
struct Paging {
    #[serde(default)]
    items: Vec<RawTrackRecord>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct AudioFeaturesResponse {
    audio_features: Vec<Option<AudioFeatures>>,
}

#[derive(Deserialize)]
struct AudioFeatures {
    danceability: f64,
    energy: f64,
    valence: f64,
    tempo: f64,
}

#[derive(Serialize)]
struct CreatePlaylistRequest<'a> {
    name: &'a str,
    public: bool,
}

#[derive(Serialize)]
struct AddItemsRequest {
    uris: Vec<String>,
}

impl SpotifyClient {
    /// Build a client with an explicit token.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, access_token: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }

    /// Build a client from settings, failing closed without a token.
    ///
    /// # Errors
    ///
    /// [`PipelineError::NotAuthenticated`] if no non-empty token is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self, PipelineError> {
        let token = settings
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PipelineError::NotAuthenticated {
                reason: format!(
                    "no access token configured; set {} or add access_token to the config file",
                    crate::config::TOKEN_ENV_VAR
                ),
            })?;

        Self::new(
            &settings.api_base_url,
            token,
            Duration::from_secs(settings.request_timeout_secs),
        )
        .map_err(|e| PipelineError::NotAuthenticated {
            reason: format!("{e:#}"),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send an authorized request and decode a JSON body.
    fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .with_context(|| format!("Request for {what} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            anyhow::bail!("{what} failed with status {status}: {}", body.trim());
        }

        response
            .json()
            .with_context(|| format!("Failed to decode {what} response"))
    }

    fn page(&self, request: RequestBuilder, what: &str) -> Result<Page> {
        let paging: Paging = self.send_json(request, what)?;
        trace!("{what}: {} items, next={:?}", paging.items.len(), paging.next);
        Ok(Page {
            items: paging.items,
            has_next: paging.next.is_some(),
        })
    }
}

/// Playlist item URI for a bare track id.
fn track_uri(id: &str) -> String {
    if id.starts_with("spotify:") {
        id.to_string()
    } else {
        format!("spotify:track:{id}")
    }
}

impl CatalogClient for SpotifyClient {
    fn current_user_id(&self) -> Result<String> {
        let profile: UserProfile =
            self.send_json(self.client.get(self.url("/me")), "current user")?;
        Ok(profile.id)
    }

    fn list_saved_tracks(&self, page_size: usize, offset: usize) -> Result<Page> {
        let request = self
            .client
            .get(self.url("/me/tracks"))
            .query(&[("limit", page_size), ("offset", offset)]);
        self.page(request, "saved tracks")
    }

    fn list_top_tracks(
        &self,
        page_size: usize,
        offset: usize,
        time_range: TimeRange,
    ) -> Result<Page> {
        let request = self.client.get(self.url("/me/top/tracks")).query(&[
            ("limit", page_size.to_string()),
            ("offset", offset.to_string()),
            ("time_range", time_range.as_str().to_string()),
        ]);
        self.page(request, "top tracks")
    }

    fn get_audio_features(&self, ids: &[String]) -> Result<Vec<Option<FeatureVector>>> {
        let request = self
            .client
            .get(self.url("/audio-features"))
            .query(&[("ids", ids.join(","))]);
        let response: AudioFeaturesResponse = self.send_json(request, "audio features")?;

        Ok(response
            .audio_features
            .into_iter()
            .map(|features| {
                features.map(|f| FeatureVector::new(f.danceability, f.energy, f.valence, f.tempo))
            })
            .collect())
    }

    fn create_playlist(&self, user_id: &str, name: &str, public: bool) -> Result<PlaylistHandle> {
        let request = self
            .client
            .post(self.url(&format!("/users/{user_id}/playlists")))
            .json(&CreatePlaylistRequest { name, public });
        self.send_json(request, "playlist creation")
    }

    fn add_items_to_playlist(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let request = self
            .client
            .post(self.url(&format!("/playlists/{playlist_id}/tracks")))
            .json(&AddItemsRequest {
                uris: track_ids.iter().map(|id| track_uri(id)).collect(),
            });
        let _snapshot: serde_json::Value = self.send_json(request, "playlist insertion")?;
        Ok(())
    }
}
