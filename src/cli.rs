//! # Command-Line Interface Module
//!
//! This module defines the command-line interface for Cadence using Clap derive
//! macros.
//!
//! ## Commands
//!
//! - `run`: Cluster listening history and create one playlist per cluster
//! - `config`: Show the effective configuration
//! - `completion`: Generate shell completion scripts
//!
//! ## Examples
//!
//! ```bash
//! cadence run --source both --clusters 4
//! cadence run --source top --time-range short_term --dry-run
//! cadence completion bash > ~/.local/share/bash-completion/completions/cadence
//! ```

use crate::track::{SongSource, TimeRange};
use clap::{Parser, Subcommand, ValueEnum};

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(about = "Cadence: group your listening history into similar-sounding playlists")]
#[command(version)]
pub struct Args {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Cluster your tracks and create one private playlist per cluster
    ///
    /// Collects the selected tracks, looks up their audio features
    /// (danceability, energy, valence, tempo), groups them with seeded k-means
    /// and creates playlists named "Cluster N Playlist". Playlists created
    /// before a failure are left in place.
    Run {
        /// Which tracks to cluster
        #[arg(short, long, value_enum, default_value_t = SongSource::Liked)]
        source: SongSource,

        /// Number of clusters (defaults to the configured value)
        #[arg(short = 'k', long)]
        clusters: Option<usize>,

        /// Window used for top tracks (defaults to the configured value)
        #[arg(long, value_enum)]
        time_range: Option<TimeRange>,

        /// Seed for cluster initialization (defaults to the configured value)
        #[arg(long)]
        seed: Option<u64>,

        /// Access token, overriding config file and environment
        #[arg(long, env = "CADENCE_ACCESS_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Show the clusters without creating playlists
        #[arg(long)]
        dry_run: bool,

        /// Print every cluster's track ids and every dropped track
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show the effective configuration and where it is read from
    Config,

    /// Generate shell completions
    ///
    /// Usage: cadence completion bash > ~/.local/share/bash-completion/completions/cadence
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}
