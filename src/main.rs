//! # Cadence
//!
//! Command-line front end for the clustering pipeline. It plays the part of
//! the surrounding layer: builds an authenticated catalog client from the
//! configuration, runs the pipeline and turns every outcome into a message.
//!
//! ## Usage
//!
//! ```bash
//! # Cluster liked songs into two playlists
//! cadence run
//!
//! # Liked and top songs, four clusters, preview only
//! cadence run --source both -k 4 --dry-run
//!
//! # Where is the config file?
//! cadence config
//! ```

use anyhow::Result;
use cadence::cli::{self, Args, Command};
use cadence::config::{self, Settings};
use cadence::pipeline::{self, PipelineOptions, PipelineOutcome, PipelineReport};
use cadence::spotify::SpotifyClient;
use cadence::{completion, error::PipelineError};
use clap::{CommandFactory, Parser};
use log::{debug, info};

/// Main entry point for the Cadence application.
///
/// # Logging
///
/// Initializes environment logger which can be controlled via `RUST_LOG`:
/// - `RUST_LOG=debug cadence run` - Enable debug logging
/// - `RUST_LOG=cadence::features=debug cadence run` - Module-specific logging
fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Command::Run {
            source,
            clusters,
            time_range,
            seed,
            token,
            dry_run,
            verbose,
        } => {
            let mut settings = Settings::load()?;
            settings.apply_token_override(token);

            let mut cluster = settings.cluster_config();
            if let Some(k) = clusters {
                cluster.k = k;
            }
            if let Some(seed) = seed {
                cluster.seed = seed;
            }
            let options = PipelineOptions {
                cluster,
                time_range: time_range.unwrap_or(settings.time_range),
                dry_run,
            };
            debug!("Pipeline options: {options:?}");

            let result = SpotifyClient::from_settings(&settings)
                .and_then(|client| pipeline::run_pipeline(&client, source, &options));

            match result {
                Ok(report) => print_report(&report, verbose),
                Err(e) => {
                    print_failure(&e);
                    std::process::exit(1);
                }
            }
        }
        Command::Config => {
            let path = config::get_config_path()?;
            let settings = Settings::load()?;
            println!("Config file: {}", path.display());
            println!("{}", settings.to_redacted_json()?);
        }
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(
                completion::shell_to_completion_shell(&shell),
                &mut cmd,
            );
        }
    }

    Ok(())
}

fn print_report(report: &PipelineReport, verbose: bool) {
    info!(
        "Collected {} tracks, dropped {}",
        report.tracks_collected,
        report.discarded.len()
    );

    match &report.outcome {
        PipelineOutcome::Created(names) => {
            println!("Created playlists: {}", names.join(", "));
        }
        PipelineOutcome::Planned(names) => {
            println!("Dry run, would create: {}", names.join(", "));
        }
        PipelineOutcome::NothingCreated(reason) => {
            println!("No playlists created: {reason}.");
        }
    }

    if !report.discarded.is_empty() {
        println!(
            "{} of {} tracks were left out.",
            report.discarded.len(),
            report.tracks_collected
        );
    }

    if verbose {
        if let Some(assignment) = &report.assignment {
            for (index, ids) in assignment.iter() {
                println!("Cluster {} ({} tracks): {}", index + 1, ids.len(), ids.join(" "));
            }
        }
        for discard in &report.discarded {
            println!(
                "  dropped #{} {:?}: {}",
                discard.position, discard.track_id, discard.reason
            );
        }
    }
}

fn print_failure(error: &PipelineError) {
    eprintln!("Could not create playlists: {error}");
    let mut cause = std::error::Error::source(error);
    while let Some(inner) = cause {
        eprintln!("  caused by: {inner}");
        cause = std::error::Error::source(inner);
    }

    let leftovers = error.created_playlists();
    if !leftovers.is_empty() {
        eprintln!(
            "These playlists were created before the failure and were kept: {}",
            leftovers.join(", ")
        );
    }
    if matches!(error, PipelineError::NotAuthenticated { .. }) {
        eprintln!("Set {} to a valid access token and try again.", config::TOKEN_ENV_VAR);
    }
}
