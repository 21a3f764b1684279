//! # Configuration Module
//!
//! This module handles configuration loading for Cadence. Settings come from
//! three layers, later ones winning:
//!
//! 1. Built-in defaults ([`Settings::default`])
//! 2. The JSON config file in the platform config directory
//! 3. The `CADENCE_ACCESS_TOKEN` environment variable (token only)
//!
//! Command-line flags are applied on top by the binary.
//!
//! ## Config Location
//!
//! - Linux: `~/.config/cadence/config.json`
//! - macOS: `~/Library/Application Support/cadence/config.json`
//! - Windows: `%APPDATA%\cadence\config.json`
//!
//! ## Example
//!
//! ```json
//! {
//!   "access_token": "BQD...",
//!   "cluster_count": 4,
//!   "time_range": "short_term"
//! }
//! ```

use crate::cluster::ClusterConfig;
use crate::track::TimeRange;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the configured access token.
pub const TOKEN_ENV_VAR: &str = "CADENCE_ACCESS_TOKEN";

/// Returns the platform-appropriate config file path.
///
/// # Errors
///
/// This function will return an error if the system config directory cannot
/// be determined.
///
/// # Examples
///
/// ```no_run
/// use cadence::config::get_config_path;
///
/// let path = get_config_path()?;
/// println!("Config location: {}", path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system config directory. Please ensure your platform supports standard config directories."
        )
    })?;

    Ok(config_dir.join("cadence").join("config.json"))
}

/// Runtime settings. Every field has a default so partial files are fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the catalog Web API
    pub api_base_url: String,
    /// OAuth bearer token obtained out of band
    pub access_token: Option<String>,
    /// Default number of clusters
    pub cluster_count: usize,
    /// Seed for cluster initialization
    pub seed: u64,
    /// Seeded clustering restarts
    pub restarts: usize,
    pub max_iterations: usize,
    /// Window for top tracks
    pub time_range: TimeRange,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let cluster = ClusterConfig::default();
        Self {
            api_base_url: "https://api.spotify.com/v1".to_string(),
            access_token: None,
            cluster_count: cluster.k,
            seed: cluster.seed,
            restarts: cluster.restarts,
            max_iterations: cluster.max_iterations,
            time_range: TimeRange::default(),
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Load settings from the default location, then apply the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = get_config_path()?;
        let mut settings = Self::load_from(&path)?;
        settings.apply_token_override(std::env::var(TOKEN_ENV_VAR).ok());
        Ok(settings)
    }

    /// Load settings from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not valid JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Replace the token with a non-empty override.
    pub fn apply_token_override(&mut self, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.access_token = Some(token);
        }
    }

    /// Clustering parameters implied by these settings.
    #[must_use]
    pub fn cluster_config(&self) -> ClusterConfig {
        ClusterConfig {
            k: self.cluster_count,
            seed: self.seed,
            restarts: self.restarts,
            max_iterations: self.max_iterations,
            ..ClusterConfig::default()
        }
    }

    /// Settings rendered for display with the token masked.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_redacted_json(&self) -> Result<String> {
        let mut shown = self.clone();
        shown.access_token = shown.access_token.map(|_| "<redacted>".to_string());
        Ok(serde_json::to_string_pretty(&shown)?)
    }
}
