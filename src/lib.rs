//! Groups a listening history into clusters of similar-sounding tracks and
//! turns each cluster into a private playlist.
//!
//! Core modules, in pipeline order:
//! - [`collector`] - Paginated retrieval of saved and top tracks
//! - [`features`] - Batched audio-feature lookup with a discard log
//! - [`cluster`] - Seeded, reproducible k-means
//! - [`materializer`] - Playlist creation and batched insertion
//! - [`pipeline`] - The entry point tying the stages together
//!
//! ### Supporting Modules
//!
//! - [`catalog`] - The [`catalog::CatalogClient`] trait every stage talks through
//! - [`spotify`] - Blocking Spotify Web API implementation of that trait
//! - [`track`] - Shared data model
//! - [`error`] - Fatal pipeline errors
//! - [`config`] - Settings file and environment handling
//! - [`cli`] / [`completion`] - Command-line definitions and shell completions
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use cadence::config::Settings;
//! use cadence::pipeline::{run_clustering_pipeline, PipelineOutcome};
//! use cadence::spotify::SpotifyClient;
//! use cadence::track::SongSource;
//!
//! let settings = Settings::load()?;
//! let client = SpotifyClient::from_settings(&settings)?;
//! let report = run_clustering_pipeline(&client, SongSource::Both, 3)?;
//!
//! if let PipelineOutcome::Created(names) = &report.outcome {
//!     println!("Created playlists: {}", names.join(", "));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! The pipeline returns [`error::PipelineError`] for failures that abort a run
//! (authentication, track collection, playlist creation). Lost feature batches
//! and tracks without features are not errors; they are listed in
//! [`pipeline::PipelineReport::discarded`]. Adapter and configuration code
//! uses `anyhow::Result`.

pub mod catalog;
pub mod cli;
pub mod cluster;
pub mod collector;
pub mod completion;
pub mod config;
pub mod error;
pub mod features;
pub mod materializer;
pub mod pipeline;
pub mod spotify;
pub mod track;
