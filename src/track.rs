//! # Track Data Model
//!
//! Shared types that flow between the pipeline stages:
//!
//! - [`RawTrackRecord`] - a track as the catalog returns it, in either of its two shapes
//! - [`Track`] - the normalized track every stage after collection works with
//! - [`FeatureVector`] - the four audio features used for clustering
//! - [`SongSource`] / [`TimeRange`] - which parts of the listening history to read
//!
//! Saved-track listings wrap each track under a `"track"` key while top-track
//! listings return the track object directly. [`RawTrackRecord::into_track`]
//! is the only place that knows about the difference.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Track object as it appears inside catalog listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A listing item before normalization.
///
/// Untagged so both `{"track": {...}}` and `{...}` deserialize. The wrapped
/// variant is tried first and requires the `track` key to be present (it may
/// be null); a flat object never has one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTrackRecord {
    Wrapped {
        #[serde(deserialize_with = "required_nullable")]
        track: Option<TrackObject>,
    },
    Flat(TrackObject),
}

// `Option` fields are normally allowed to be absent; going through
// `deserialize_with` makes the key mandatory while still accepting null.
fn required_nullable<'de, D>(deserializer: D) -> Result<Option<TrackObject>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<TrackObject>::deserialize(deserializer)
}

impl RawTrackRecord {
    /// Convenience constructor for a flat record with an id.
    pub fn flat(id: impl Into<String>) -> Self {
        Self::Flat(TrackObject {
            id: Some(id.into()),
            name: None,
        })
    }

    /// Convenience constructor for a record wrapped under `"track"`.
    pub fn wrapped(id: impl Into<String>) -> Self {
        Self::Wrapped {
            track: Some(TrackObject {
                id: Some(id.into()),
                name: None,
            }),
        }
    }

    /// Normalize into a [`Track`]. A missing id (or a wrapper with a null
    /// track, which happens for removed local files) becomes an empty id.
    #[must_use]
    pub fn into_track(self) -> Track {
        let object = match self {
            Self::Wrapped { track } => track.unwrap_or_default(),
            Self::Flat(object) => object,
        };
        Track {
            id: object.id.unwrap_or_default(),
            name: object.name,
        }
    }
}

/// A track after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Catalog identifier. Empty when the source record carried none.
    pub id: String,
    pub name: Option<String>,
}

impl Track {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    /// Whether the track can be looked up at all.
    #[must_use]
    pub fn has_identifier(&self) -> bool {
        !self.id.trim().is_empty()
    }
}

/// Audio features of a single track.
///
/// The first three components are in `[0, 1]`; tempo is in beats per minute.
/// Values are used exactly as the catalog reports them, so tempo dominates
/// Euclidean distances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub danceability: f64,
    pub energy: f64,
    pub valence: f64,
    pub tempo: f64,
}

impl FeatureVector {
    pub const DIMENSIONS: usize = 4;

    #[must_use]
    pub const fn new(danceability: f64, energy: f64, valence: f64, tempo: f64) -> Self {
        Self {
            danceability,
            energy,
            valence,
            tempo,
        }
    }

    #[must_use]
    pub const fn as_array(&self) -> [f64; Self::DIMENSIONS] {
        [self.danceability, self.energy, self.valence, self.tempo]
    }

    /// All components finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite())
    }
}

/// Which part of the listening history to cluster.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SongSource {
    /// Saved ("liked") tracks
    #[default]
    Liked,
    /// Most played tracks for a time range
    Top,
    /// Liked tracks followed by top tracks
    Both,
}

impl SongSource {
    #[must_use]
    pub const fn includes_liked(self) -> bool {
        matches!(self, Self::Liked | Self::Both)
    }

    #[must_use]
    pub const fn includes_top(self) -> bool {
        matches!(self, Self::Top | Self::Both)
    }
}

impl fmt::Display for SongSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Liked => write!(f, "liked"),
            Self::Top => write!(f, "top"),
            Self::Both => write!(f, "both"),
        }
    }
}

/// Window the catalog uses to compute top tracks.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    /// Roughly the last four weeks
    #[value(name = "short_term")]
    ShortTerm,
    /// Roughly the last six months
    #[default]
    #[value(name = "medium_term")]
    MediumTerm,
    /// Several years of history
    #[value(name = "long_term")]
    LongTerm,
}

impl TimeRange {
    /// Query-string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ShortTerm => "short_term",
            Self::MediumTerm => "medium_term",
            Self::LongTerm => "long_term",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
