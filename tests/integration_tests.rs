//! # Integration Tests for Cadence
//!
//! End-to-end pipeline runs against an in-memory catalog that records every
//! call, so tests can assert on what was requested as well as what came back.

use anyhow::Result;
use cadence::catalog::{CatalogClient, Page, PlaylistHandle};
use cadence::track::{FeatureVector, RawTrackRecord, TimeRange};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

/// Recorded catalog interaction.
#[derive(Debug, Clone, PartialEq)]
enum Call {
    CurrentUser,
    Saved { offset: usize },
    Top { offset: usize, time_range: TimeRange },
    Features { ids: Vec<String> },
    Create { user: String, name: String, public: bool },
    Add { playlist: String, ids: Vec<String> },
}

/// In-memory catalog with switchable failures.
#[derive(Default)]
struct MockCatalog {
    user: Option<String>,
    saved: Vec<RawTrackRecord>,
    top: Vec<RawTrackRecord>,
    features: HashMap<String, FeatureVector>,
    failing_feature_batches: HashSet<usize>,
    failing_saved_offsets: HashSet<usize>,
    fail_create_after: Option<usize>,
    /// Zero-based index of the insertion call that fails, counted across playlists.
    fail_insert_call: Option<usize>,
    calls: RefCell<Vec<Call>>,
    feature_batches_seen: RefCell<usize>,
    playlists_created: RefCell<usize>,
    insert_calls: RefCell<usize>,
}

impl MockCatalog {
    fn new() -> Self {
        Self {
            user: Some("listener".to_string()),
            ..Self::default()
        }
    }

    /// `n` saved tracks, each with features spread across three tempo bands.
    fn with_saved(mut self, n: usize) -> Self {
        for i in 0..n {
            let id = format!("saved{i:03}");
            self.features.insert(id.clone(), sample_features(i));
            self.saved.push(RawTrackRecord::wrapped(id));
        }
        self
    }

    fn with_top(mut self, n: usize) -> Self {
        for i in 0..n {
            let id = format!("top{i:03}");
            self.features.insert(id.clone(), sample_features(i));
            self.top.push(RawTrackRecord::flat(id));
        }
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn feature_calls(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Features { ids } => Some(ids),
                _ => None,
            })
            .collect()
    }

    fn created(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Inserted ids per playlist id, in insertion order.
    fn inserted(&self) -> Vec<(String, Vec<String>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Add { playlist, ids } => Some((playlist, ids)),
                _ => None,
            })
            .collect()
    }

    fn page(items: &[RawTrackRecord], page_size: usize, offset: usize) -> Page {
        let end = (offset + page_size).min(items.len());
        let start = offset.min(end);
        Page {
            items: items[start..end].to_vec(),
            has_next: end < items.len(),
        }
    }
}

fn sample_features(i: usize) -> FeatureVector {
    let band = (i % 3) as f64;
    let jitter = (i % 7) as f64 * 0.5;
    FeatureVector::new(0.2 + band * 0.3, 0.5, 0.4, 80.0 + band * 50.0 + jitter)
}

impl CatalogClient for MockCatalog {
    fn current_user_id(&self) -> Result<String> {
        self.calls.borrow_mut().push(Call::CurrentUser);
        self.user
            .clone()
            .ok_or_else(|| anyhow::anyhow!("401 Unauthorized: The access token expired"))
    }

    fn list_saved_tracks(&self, page_size: usize, offset: usize) -> Result<Page> {
        self.calls.borrow_mut().push(Call::Saved { offset });
        if self.failing_saved_offsets.contains(&offset) {
            anyhow::bail!("500 Internal Server Error");
        }
        Ok(Self::page(&self.saved, page_size, offset))
    }

    fn list_top_tracks(
        &self,
        page_size: usize,
        offset: usize,
        time_range: TimeRange,
    ) -> Result<Page> {
        self.calls.borrow_mut().push(Call::Top { offset, time_range });
        Ok(Self::page(&self.top, page_size, offset))
    }

    fn get_audio_features(&self, ids: &[String]) -> Result<Vec<Option<FeatureVector>>> {
        self.calls.borrow_mut().push(Call::Features { ids: ids.to_vec() });
        let batch = {
            let mut seen = self.feature_batches_seen.borrow_mut();
            *seen += 1;
            *seen - 1
        };
        if self.failing_feature_batches.contains(&batch) {
            anyhow::bail!("connection reset by peer");
        }
        Ok(ids.iter().map(|id| self.features.get(id).copied()).collect())
    }

    fn create_playlist(&self, user_id: &str, name: &str, public: bool) -> Result<PlaylistHandle> {
        self.calls.borrow_mut().push(Call::Create {
            user: user_id.to_string(),
            name: name.to_string(),
            public,
        });
        let mut created = self.playlists_created.borrow_mut();
        if self.fail_create_after == Some(*created) {
            anyhow::bail!("403 Forbidden");
        }
        *created += 1;
        Ok(PlaylistHandle {
            id: format!("pl{}", *created),
            name: name.to_string(),
        })
    }

    fn add_items_to_playlist(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        self.calls.borrow_mut().push(Call::Add {
            playlist: playlist_id.to_string(),
            ids: track_ids.to_vec(),
        });
        let mut calls = self.insert_calls.borrow_mut();
        let index = *calls;
        *calls += 1;
        if self.fail_insert_call == Some(index) {
            anyhow::bail!("502 Bad Gateway");
        }
        Ok(())
    }
}

#[cfg(test)]
mod collector_tests {
    use super::*;
    use cadence::collector::{collect_tracks, PAGE_SIZE};
    use cadence::error::PipelineError;
    use cadence::track::SongSource;

    #[test]
    fn test_first_page_without_next_is_returned_as_is() {
        let catalog = MockCatalog::new().with_saved(12);
        let tracks = collect_tracks(&catalog, SongSource::Liked, TimeRange::MediumTerm).unwrap();

        assert_eq!(tracks.len(), 12);
        assert_eq!(catalog.calls(), vec![Call::Saved { offset: 0 }]);
    }

    #[test]
    fn test_full_pages_concatenate_in_order() {
        let catalog = MockCatalog::new().with_saved(3 * PAGE_SIZE);
        let tracks = collect_tracks(&catalog, SongSource::Liked, TimeRange::MediumTerm).unwrap();

        assert_eq!(tracks.len(), 150);
        assert_eq!(
            catalog.calls(),
            vec![
                Call::Saved { offset: 0 },
                Call::Saved { offset: 50 },
                Call::Saved { offset: 100 },
            ]
        );
        let expected: Vec<String> = (0..150).map(|i| format!("saved{i:03}")).collect();
        let ids: Vec<String> = tracks.into_iter().map(|t| t.id).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_both_sources_liked_first_without_dedup() {
        let catalog = MockCatalog::new().with_saved(3).with_top(60);
        let tracks = collect_tracks(&catalog, SongSource::Both, TimeRange::ShortTerm).unwrap();

        assert_eq!(tracks.len(), 63);
        assert_eq!(tracks[0].id, "saved000");
        assert_eq!(tracks[3].id, "top000");
        assert_eq!(
            catalog.calls(),
            vec![
                Call::Saved { offset: 0 },
                Call::Top { offset: 0, time_range: TimeRange::ShortTerm },
                Call::Top { offset: 50, time_range: TimeRange::ShortTerm },
            ]
        );
    }

    #[test]
    fn test_top_only_skips_saved() {
        let catalog = MockCatalog::new().with_saved(5).with_top(2);
        let tracks = collect_tracks(&catalog, SongSource::Top, TimeRange::MediumTerm).unwrap();

        assert_eq!(tracks.len(), 2);
        assert!(!catalog.calls().iter().any(|c| matches!(c, Call::Saved { .. })));
    }

    #[test]
    fn test_page_failure_is_fatal() {
        let mut catalog = MockCatalog::new().with_saved(120);
        catalog.failing_saved_offsets.insert(50);

        let err = collect_tracks(&catalog, SongSource::Liked, TimeRange::MediumTerm).unwrap_err();
        assert!(matches!(err, PipelineError::Collection { offset: 50, .. }));
    }
}

#[cfg(test)]
mod materializer_tests {
    use super::*;
    use cadence::cluster::ClusterAssignment;
    use cadence::error::PipelineError;
    use cadence::materializer::materialize_playlists;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    #[test]
    fn test_empty_cluster_gets_no_playlist() {
        let catalog = MockCatalog::new();
        let assignment =
            ClusterAssignment::from_clusters(vec![vec!["t1".into(), "t2".into()], vec![]]);

        let names = materialize_playlists(&catalog, &assignment, "listener").unwrap();

        assert_eq!(names, vec!["Cluster 1 Playlist"]);
        assert_eq!(
            catalog.calls(),
            vec![
                Call::Create {
                    user: "listener".into(),
                    name: "Cluster 1 Playlist".into(),
                    public: false,
                },
                Call::Add {
                    playlist: "pl1".into(),
                    ids: vec!["t1".into(), "t2".into()],
                },
            ]
        );
    }

    #[test]
    fn test_large_cluster_inserted_in_bounded_batches() {
        let catalog = MockCatalog::new();
        let members = ids("x", 250);
        let assignment = ClusterAssignment::from_clusters(vec![vec![], members.clone()]);

        let names = materialize_playlists(&catalog, &assignment, "listener").unwrap();

        assert_eq!(names, vec!["Cluster 2 Playlist"]);
        let batches = catalog.inserted();
        let sizes: Vec<usize> = batches.iter().map(|(_, ids)| ids.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        let flattened: Vec<String> = batches.into_iter().flat_map(|(_, ids)| ids).collect();
        assert_eq!(flattened, members);
    }

    #[test]
    fn test_failure_stops_later_clusters_and_reports_earlier_ones() {
        let mut catalog = MockCatalog::new();
        catalog.fail_create_after = Some(1);
        let assignment =
            ClusterAssignment::from_clusters(vec![ids("a", 2), ids("b", 2), ids("c", 2)]);

        let err = materialize_playlists(&catalog, &assignment, "listener").unwrap_err();

        match &err {
            PipelineError::Materialization { cluster, created, .. } => {
                assert_eq!(*cluster, 1);
                assert_eq!(created, &vec!["Cluster 1 Playlist".to_string()]);
            }
            other => panic!("expected materialization error, got {other:?}"),
        }
        assert_eq!(catalog.created(), vec!["Cluster 1 Playlist", "Cluster 2 Playlist"]);
        assert_eq!(catalog.inserted().len(), 1);
    }

    #[test]
    fn test_insertion_failure_stops_later_clusters() {
        let mut catalog = MockCatalog::new();
        // Call 0 fills cluster 1; calls 1 and 2 are the first two batches of cluster 2.
        catalog.fail_insert_call = Some(2);
        let assignment =
            ClusterAssignment::from_clusters(vec![ids("a", 2), ids("b", 250), ids("c", 2)]);

        let err = materialize_playlists(&catalog, &assignment, "listener").unwrap_err();

        match &err {
            PipelineError::Materialization { cluster, created, source } => {
                assert_eq!(*cluster, 1);
                assert_eq!(created, &vec!["Cluster 1 Playlist".to_string()]);
                assert!(format!("{source:#}").contains("batch 1"));
            }
            other => panic!("expected materialization error, got {other:?}"),
        }
        assert_eq!(catalog.created(), vec!["Cluster 1 Playlist", "Cluster 2 Playlist"]);
        let sizes: Vec<usize> = catalog.inserted().iter().map(|(_, ids)| ids.len()).collect();
        assert_eq!(sizes, vec![2, 100, 100]);
        assert!(catalog
            .inserted()
            .iter()
            .all(|(_, ids)| !ids.iter().any(|id| id.starts_with('c'))));
    }
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use cadence::error::PipelineError;
    use cadence::features::DiscardReason;
    use cadence::pipeline::{
        run_clustering_pipeline, run_pipeline, EmptyReason, PipelineOptions, PipelineOutcome,
    };
    use cadence::track::SongSource;

    #[test]
    fn test_end_to_end_120_liked_tracks_three_clusters() {
        let catalog = MockCatalog::new().with_saved(120);

        let report = run_clustering_pipeline(&catalog, SongSource::Liked, 3).unwrap();

        let feature_sizes: Vec<usize> = catalog.feature_calls().iter().map(Vec::len).collect();
        assert_eq!(feature_sizes, vec![100, 20]);

        let names = report.created_playlists().to_vec();
        assert!(!names.is_empty() && names.len() <= 3);
        assert_eq!(catalog.created(), names);

        let inserted = catalog.inserted();
        assert!(inserted.iter().all(|(_, ids)| ids.len() <= 100));
        let all: Vec<String> = inserted.iter().flat_map(|(_, ids)| ids.clone()).collect();
        assert_eq!(all.len(), 120);
        let unique: HashSet<&String> = all.iter().collect();
        assert_eq!(unique.len(), 120);

        // Insertion follows the cluster order produced by the engine.
        let assignment = report.assignment.expect("assignment should be reported");
        let expected: Vec<String> = assignment
            .non_empty()
            .flat_map(|(_, ids)| ids.to_vec())
            .collect();
        assert_eq!(all, expected);
        assert_eq!(report.tracks_collected, 120);
        assert!(report.discarded.is_empty());
    }

    #[test]
    fn test_failed_feature_batch_does_not_abort() {
        let mut catalog = MockCatalog::new().with_saved(120);
        catalog.failing_feature_batches.insert(0);

        let report = run_clustering_pipeline(&catalog, SongSource::Liked, 2).unwrap();

        let assignment = report.assignment.as_ref().unwrap();
        assert_eq!(assignment.total_tracks(), 20);
        let inserted: usize = catalog.inserted().iter().map(|(_, ids)| ids.len()).sum();
        assert_eq!(inserted, 20);
        assert_eq!(report.discarded.len(), 100);
        assert!(report
            .discarded
            .iter()
            .all(|d| matches!(d.reason, DiscardReason::BatchFailed { batch: 0, .. })));
        assert!(matches!(report.outcome, PipelineOutcome::Created(_)));
    }

    #[test]
    fn test_clustering_is_reproducible_across_runs() {
        let first = MockCatalog::new().with_saved(90).with_top(40);
        let second = MockCatalog::new().with_saved(90).with_top(40);

        let a = run_clustering_pipeline(&first, SongSource::Both, 4).unwrap();
        let b = run_clustering_pipeline(&second, SongSource::Both, 4).unwrap();

        assert_eq!(a.assignment, b.assignment);
        assert_eq!(first.inserted(), second.inserted());
    }

    #[test]
    fn test_no_tracks_creates_nothing() {
        let catalog = MockCatalog::new();
        let report = run_clustering_pipeline(&catalog, SongSource::Both, 2).unwrap();

        assert_eq!(report.outcome, PipelineOutcome::NothingCreated(EmptyReason::NoTracks));
        assert!(catalog.feature_calls().is_empty());
        assert!(catalog.created().is_empty());
    }

    #[test]
    fn test_no_features_creates_nothing() {
        let mut catalog = MockCatalog::new().with_saved(5);
        catalog.features.clear();

        let report = run_clustering_pipeline(&catalog, SongSource::Liked, 2).unwrap();

        assert_eq!(report.outcome, PipelineOutcome::NothingCreated(EmptyReason::NoFeatures));
        assert_eq!(report.discarded.len(), 5);
        assert!(catalog.created().is_empty());
    }

    #[test]
    fn test_more_clusters_than_tracks_skips_empty_ones() {
        let catalog = MockCatalog::new().with_saved(3);
        let report = run_clustering_pipeline(&catalog, SongSource::Liked, 6).unwrap();

        let assignment = report.assignment.as_ref().unwrap();
        assert_eq!(assignment.cluster_count(), 6);
        assert_eq!(assignment.total_tracks(), 3);
        assert_eq!(report.created_playlists().len(), assignment.non_empty().count());
        assert!(report.created_playlists().len() <= 3);
    }

    #[test]
    fn test_huge_cluster_count_does_not_exhaust_memory() {
        let catalog = MockCatalog::new().with_saved(6);
        let report = run_clustering_pipeline(&catalog, SongSource::Liked, usize::MAX).unwrap();

        let assignment = report.assignment.as_ref().unwrap();
        assert_eq!(assignment.cluster_count(), usize::MAX);
        assert_eq!(assignment.total_tracks(), 6);
        assert_eq!(report.created_playlists().len(), assignment.non_empty().count());
        assert!(report.created_playlists().len() <= 6);
    }

    #[test]
    fn test_missing_session_fails_closed_before_collection() {
        let mut catalog = MockCatalog::new().with_saved(10);
        catalog.user = None;

        let err = run_clustering_pipeline(&catalog, SongSource::Liked, 2).unwrap_err();

        assert!(matches!(err, PipelineError::NotAuthenticated { .. }));
        assert_eq!(catalog.calls(), vec![Call::CurrentUser]);
    }

    #[test]
    fn test_zero_clusters_rejected_without_network() {
        let catalog = MockCatalog::new().with_saved(10);
        let err = run_clustering_pipeline(&catalog, SongSource::Liked, 0).unwrap_err();

        assert!(matches!(err, PipelineError::InvalidClusterCount(0)));
        assert!(catalog.calls().is_empty());
    }

    #[test]
    fn test_dry_run_plans_without_mutation() {
        let catalog = MockCatalog::new().with_saved(30);
        let options = PipelineOptions {
            dry_run: true,
            ..PipelineOptions::with_cluster_count(3)
        };

        let report = run_pipeline(&catalog, SongSource::Liked, &options).unwrap();

        match &report.outcome {
            PipelineOutcome::Planned(names) => assert!(!names.is_empty()),
            other => panic!("expected a plan, got {other:?}"),
        }
        assert!(catalog.created().is_empty());
        assert!(catalog.inserted().is_empty());
    }

    #[test]
    fn test_tracks_without_ids_are_logged_not_looked_up() {
        let mut catalog = MockCatalog::new().with_saved(4);
        catalog.saved.insert(2, RawTrackRecord::Wrapped { track: None });

        let report = run_clustering_pipeline(&catalog, SongSource::Liked, 2).unwrap();

        assert_eq!(report.tracks_collected, 5);
        assert_eq!(report.discarded.len(), 1);
        assert_eq!(report.discarded[0].position, 2);
        assert_eq!(report.discarded[0].reason, DiscardReason::MissingIdentifier);
        assert_eq!(catalog.feature_calls()[0].len(), 4);
    }
}
