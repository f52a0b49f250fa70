use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::error::CatalogError;
use crate::matcher::match_track;
use crate::model::{DryRunItem, NormalizedTrack, PlaylistGroup, PlaylistSummary};
use crate::normalize::normalize;
use crate::ports::catalog::CatalogClient;

/// Pause between consecutive match calls. Catalog search endpoints are not
/// covered by the per-call 429 backoff for cumulative quota exhaustion, so
/// the planner throttles itself.
const DEFAULT_THROTTLE: Duration = Duration::from_millis(120);

/// Advisory progress stream consumed by the UI layer; not part of the
/// correctness contract.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    PlaylistStarted {
        playlist_id: String,
        playlist_title: String,
        index: usize,
        of: usize,
    },
    ItemProcessed {
        playlist_title: String,
        processed: usize,
        total: usize,
        matched: bool,
    },
    PlaylistFinished {
        playlist_id: String,
        matched: usize,
        total: usize,
    },
}

/// A playlist whose analysis failed. The run continues with the remaining
/// playlists; completed groups are always preserved.
#[derive(Debug)]
pub struct FailedPlaylist {
    pub playlist_id: String,
    pub playlist_title: String,
    pub error: CatalogError,
}

#[derive(Debug, Default)]
pub struct DryRunReport {
    pub groups: Vec<PlaylistGroup>,
    pub failures: Vec<FailedPlaylist>,
    /// True when the run was cancelled mid-way; the last group may then be
    /// partial and unprocessed playlists are absent entirely.
    pub cancelled: bool,
}

impl DryRunReport {
    pub fn total(&self) -> usize {
        self.groups.iter().map(|group| group.total).sum()
    }

    pub fn matched(&self) -> usize {
        self.groups.iter().map(|group| group.matched).sum()
    }
}

/// Drives normalize + match over the selected source playlists and builds
/// the preview report. Performs no destination writes.
pub struct DryRunPlanner<'a> {
    source: &'a dyn CatalogClient,
    destination: &'a dyn CatalogClient,
    throttle: Duration,
    cancel: CancellationToken,
    progress: Option<UnboundedSender<ProgressEvent>>,
}

impl<'a> DryRunPlanner<'a> {
    pub fn new(source: &'a dyn CatalogClient, destination: &'a dyn CatalogClient) -> Self {
        Self {
            source,
            destination,
            throttle: DEFAULT_THROTTLE,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    /// Analyzes each selected playlist in order, one track at a time.
    /// Cancellation is cooperative and checked at item boundaries only; an
    /// in-flight request always completes or fails first.
    pub async fn run(&self, playlists: &[PlaylistSummary]) -> DryRunReport {
        let mut report = DryRunReport::default();

        for (index, playlist) in playlists.iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            self.emit(ProgressEvent::PlaylistStarted {
                playlist_id: playlist.id.clone(),
                playlist_title: playlist.title.clone(),
                index,
                of: playlists.len(),
            });
            tracing::info!(
                playlist = %playlist.title,
                position = index + 1,
                of = playlists.len(),
                "analyzing playlist"
            );

            match self.analyze_playlist(playlist).await {
                Ok((group, interrupted)) => {
                    report.groups.push(group);
                    if interrupted {
                        report.cancelled = true;
                        break;
                    }
                }
                Err(error) => {
                    tracing::warn!(playlist = %playlist.title, %error, "dry-run of playlist failed");
                    report.failures.push(FailedPlaylist {
                        playlist_id: playlist.id.clone(),
                        playlist_title: playlist.title.clone(),
                        error,
                    });
                }
            }
        }

        report
    }

    async fn analyze_playlist(
        &self,
        playlist: &PlaylistSummary,
    ) -> Result<(PlaylistGroup, bool), CatalogError> {
        let raw_items = self.source.list_playlist_tracks(&playlist.id).await?;
        let tracks: Vec<NormalizedTrack> = raw_items.iter().filter_map(normalize).collect();

        let mut items = Vec::with_capacity(tracks.len());
        let mut interrupted = false;

        for (position, track) in tracks.iter().enumerate() {
            if self.cancel.is_cancelled() {
                interrupted = true;
                break;
            }

            let result = match_track(track, self.destination).await?;
            let matched = result.is_hit();
            items.push(DryRunItem {
                source_id: track.source_id.clone(),
                destination_id: result.destination_id().map(String::from),
                title: track.title.clone(),
                method: result.method(),
            });

            self.emit(ProgressEvent::ItemProcessed {
                playlist_title: playlist.title.clone(),
                processed: position + 1,
                total: tracks.len(),
                matched,
            });

            tokio::time::sleep(self.throttle).await;
        }

        let matched = items.iter().filter(|item| item.destination_id.is_some()).count();
        let group = PlaylistGroup {
            playlist_id: playlist.id.clone(),
            playlist_title: playlist.title.clone(),
            total: items.len(),
            matched,
            items,
        };

        self.emit(ProgressEvent::PlaylistFinished {
            playlist_id: group.playlist_id.clone(),
            matched: group.matched,
            total: group.total,
        });

        Ok((group, interrupted))
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(progress) = &self.progress {
            // A gone consumer is not an error; progress is advisory.
            let _ = progress.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Provider, RawTrackItem, SearchHit};
    use crate::ports::catalog::MockCatalogClient;

    fn summary(id: &str, title: &str) -> PlaylistSummary {
        PlaylistSummary {
            id: id.into(),
            title: title.into(),
            description: None,
            track_count: None,
        }
    }

    fn video(id: &str, title: &str) -> RawTrackItem {
        RawTrackItem::YouTube {
            video_id: Some(id.into()),
            title: Some(title.into()),
        }
    }

    fn spotify_destination() -> MockCatalogClient {
        let mut destination = MockCatalogClient::new();
        destination
            .expect_provider()
            .return_const(Provider::Spotify);
        destination
    }

    fn hit(id: &str) -> SearchHit {
        SearchHit {
            id: id.into(),
            title: None,
        }
    }

    #[tokio::test]
    async fn test_groups_mirror_source_order_and_counts() {
        let mut source = MockCatalogClient::new();
        source
            .expect_list_playlist_tracks()
            .times(1)
            .withf(|id| id == "pl1")
            .returning(|_| {
                Ok(vec![
                    video("v1", "One"),
                    // Placeholder is dropped by normalization.
                    RawTrackItem::YouTube {
                        video_id: None,
                        title: Some("Deleted video".into()),
                    },
                    video("v2", "Two"),
                ])
            });

        let mut destination = spotify_destination();
        destination.expect_search_by_query().returning(|query| {
            if query == "One" {
                Ok(vec![hit("spotify:track:a")])
            } else {
                Ok(vec![])
            }
        });

        let planner = DryRunPlanner::new(&source, &destination).with_throttle(Duration::ZERO);
        let report = planner.run(&[summary("pl1", "Mix")]).await;

        assert!(!report.cancelled);
        assert_eq!(report.groups.len(), 1);
        let group = &report.groups[0];
        assert_eq!(group.total, 2);
        assert_eq!(group.matched, 1);
        assert_eq!(group.items[0].source_id, "v1");
        assert_eq!(group.items[1].source_id, "v2");
        assert!(group.items[1].destination_id.is_none());
        assert_eq!(report.matched(), 1);
    }

    #[tokio::test]
    async fn test_failed_playlist_recorded_and_run_continues() {
        let mut source = MockCatalogClient::new();
        source
            .expect_list_playlist_tracks()
            .withf(|id| id == "pl1")
            .returning(|_| {
                Err(CatalogError::Http {
                    provider: Provider::YouTube,
                    status: 500,
                    body: "boom".into(),
                })
            });
        source
            .expect_list_playlist_tracks()
            .withf(|id| id == "pl2")
            .returning(|_| Ok(vec![video("v1", "One")]));

        let mut destination = spotify_destination();
        destination
            .expect_search_by_query()
            .returning(|_| Ok(vec![hit("spotify:track:a")]));

        let planner = DryRunPlanner::new(&source, &destination).with_throttle(Duration::ZERO);
        let report = planner
            .run(&[summary("pl1", "Broken"), summary("pl2", "Fine")])
            .await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].playlist_id, "pl1");
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].playlist_id, "pl2");
    }

    #[tokio::test]
    async fn test_cancellation_keeps_progress_and_skips_rest() {
        let mut source = MockCatalogClient::new();
        source
            .expect_list_playlist_tracks()
            .withf(|id| id == "pl1")
            .returning(|_| Ok(vec![video("a1", "A1"), video("a2", "A2")]));
        source
            .expect_list_playlist_tracks()
            .withf(|id| id == "pl2")
            .returning(|_| Ok(vec![video("b1", "B1"), video("b2", "B2")]));
        // No expectation for pl3: fetching it would panic.

        let cancel = CancellationToken::new();
        let cancel_from_match = cancel.clone();
        let mut destination = spotify_destination();
        destination
            .expect_search_by_query()
            .times(3)
            .returning(move |query| {
                // Cancellation arrives while playlist 2's first item is in
                // flight; the request itself still completes.
                if query == "B1" {
                    cancel_from_match.cancel();
                }
                Ok(vec![hit("spotify:track:x")])
            });

        let planner = DryRunPlanner::new(&source, &destination)
            .with_throttle(Duration::ZERO)
            .with_cancellation(cancel);
        let report = planner
            .run(&[
                summary("pl1", "First"),
                summary("pl2", "Second"),
                summary("pl3", "Never"),
            ])
            .await;

        assert!(report.cancelled);
        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.groups[0].total, 2);
        // Playlist 2 is partial: only the item matched before cancellation.
        assert_eq!(report.groups[1].total, 1);
        assert_eq!(report.groups[1].items[0].source_id, "b1");
    }

    #[tokio::test]
    async fn test_progress_events_emitted() {
        let mut source = MockCatalogClient::new();
        source
            .expect_list_playlist_tracks()
            .returning(|_| Ok(vec![video("v1", "One")]));

        let mut destination = spotify_destination();
        destination
            .expect_search_by_query()
            .returning(|_| Ok(vec![hit("spotify:track:a")]));

        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let planner = DryRunPlanner::new(&source, &destination)
            .with_throttle(Duration::ZERO)
            .with_progress(sender);
        planner.run(&[summary("pl1", "Mix")]).await;

        let mut saw_item = false;
        while let Ok(event) = receiver.try_recv() {
            if let ProgressEvent::ItemProcessed {
                processed, total, matched, ..
            } = event
            {
                assert_eq!((processed, total, matched), (1, 1, true));
                saw_item = true;
            }
        }
        assert!(saw_item);
    }
}
