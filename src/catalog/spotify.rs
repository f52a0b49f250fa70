use std::collections::HashSet;

use serde::Deserialize;

use crate::auth::{AuthToken, TokenRefresher};
use crate::catalog::{CatalogHttp, ReqwestTransport, RetryPolicy};
use crate::error::CatalogError;
use crate::model::{PlaylistSummary, PrivacyStatus, Provider, RawTrackItem, SearchHit};
use crate::ports::catalog::CatalogClient;
use crate::ports::http::HttpTransport;

const API: &str = "https://api.spotify.com/v1";

/// Spotify Web API client. Pagination follows the absolute `next` URL each
/// page body carries; track writes are batched 100 URIs per request.
pub struct SpotifyCatalog<T: HttpTransport> {
    http: CatalogHttp<T>,
}

impl SpotifyCatalog<ReqwestTransport> {
    pub fn new(token: AuthToken, refresher: Box<dyn TokenRefresher>) -> Self {
        Self::with_transport(
            ReqwestTransport::new(Provider::Spotify),
            refresher,
            token,
            RetryPolicy::default(),
        )
    }
}

impl<T: HttpTransport> SpotifyCatalog<T> {
    pub fn with_transport(
        transport: T,
        refresher: Box<dyn TokenRefresher>,
        token: AuthToken,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http: CatalogHttp::new(Provider::Spotify, transport, refresher, token, retry),
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, CatalogError> {
        let url = format!(
            "{API}/search?type=track&limit=5&q={}",
            urlencoding::encode(query)
        );
        let response: SearchResponse = match self.http.get_json(url).await {
            Ok(response) => response,
            Err(CatalogError::Http { status: 404, .. }) => return Ok(Vec::new()),
            Err(error) => return Err(error),
        };

        Ok(response
            .tracks
            .map(|tracks| tracks.items)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|track| {
                let uri = track_uri(&track)?;
                Some(SearchHit {
                    id: uri,
                    title: track.name,
                })
            })
            .collect())
    }

    async fn track_pages(&self, playlist_id: &str) -> Result<Vec<PlaylistTrackObject>, CatalogError> {
        let mut all_items = Vec::new();
        let mut next_url = Some(format!("{API}/playlists/{playlist_id}/tracks?limit=100"));

        while let Some(url) = next_url {
            let page: Page<PlaylistTrackObject> = self.http.get_json(url).await?;
            all_items.extend(page.items);
            next_url = page.next;
        }

        Ok(all_items)
    }
}

/// Spotify track URIs are the catalog's addressing scheme; search hits,
/// member ids and write ids all use the `spotify:track:` form.
fn track_uri(track: &TrackObject) -> Option<String> {
    track
        .uri
        .clone()
        .or_else(|| track.id.as_ref().map(|id| format!("spotify:track:{id}")))
}

#[derive(Deserialize)]
struct Page<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistObject {
    id: String,
    name: String,
    description: Option<String>,
    tracks: Option<PlaylistTracksRef>,
}

#[derive(Deserialize)]
struct PlaylistTracksRef {
    total: u32,
}

#[derive(Deserialize)]
struct PlaylistTrackObject {
    track: Option<TrackObject>,
}

#[derive(Deserialize)]
struct TrackObject {
    id: Option<String>,
    name: Option<String>,
    uri: Option<String>,
    #[serde(default)]
    artists: Vec<ArtistObject>,
    duration_ms: Option<i64>,
    external_ids: Option<ExternalIds>,
}

#[derive(Deserialize)]
struct ArtistObject {
    name: String,
}

#[derive(Deserialize)]
struct ExternalIds {
    isrc: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: Option<SearchTracks>,
}

#[derive(Deserialize)]
struct SearchTracks {
    items: Vec<TrackObject>,
}

#[derive(Deserialize)]
struct UserObject {
    id: String,
}

impl From<PlaylistObject> for PlaylistSummary {
    fn from(playlist: PlaylistObject) -> Self {
        PlaylistSummary {
            id: playlist.id,
            title: playlist.name,
            description: playlist.description,
            track_count: playlist.tracks.map(|tracks| tracks.total),
        }
    }
}

#[async_trait::async_trait]
impl<T: HttpTransport> CatalogClient for SpotifyCatalog<T> {
    fn provider(&self) -> Provider {
        Provider::Spotify
    }

    async fn list_playlists(&self) -> Result<Vec<PlaylistSummary>, CatalogError> {
        let mut all_playlists = Vec::new();
        let mut next_url = Some(format!("{API}/me/playlists?limit=50"));

        while let Some(url) = next_url {
            let page: Page<PlaylistObject> = self.http.get_json(url).await?;
            all_playlists.extend(page.items.into_iter().map(PlaylistSummary::from));
            next_url = page.next;
        }

        Ok(all_playlists)
    }

    async fn list_playlist_tracks(
        &self,
        playlist_id: &str,
    ) -> Result<Vec<RawTrackItem>, CatalogError> {
        let items = self.track_pages(playlist_id).await?;

        Ok(items
            .into_iter()
            .map(|item| match item.track {
                Some(track) => RawTrackItem::Spotify {
                    id: track.id,
                    title: track.name,
                    artists: track.artists.into_iter().map(|artist| artist.name).collect(),
                    duration_ms: track.duration_ms,
                    isrc: track.external_ids.and_then(|ids| ids.isrc),
                },
                // Deleted/unavailable placeholder; dropped by normalization.
                None => RawTrackItem::Spotify {
                    id: None,
                    title: None,
                    artists: Vec::new(),
                    duration_ms: None,
                    isrc: None,
                },
            })
            .collect())
    }

    async fn search_by_isrc(&self, isrc: &str) -> Result<Vec<SearchHit>, CatalogError> {
        self.search(&format!("isrc:{isrc}")).await
    }

    async fn search_by_query(&self, query: &str) -> Result<Vec<SearchHit>, CatalogError> {
        self.search(query).await
    }

    async fn create_playlist(
        &self,
        title: &str,
        description: &str,
        privacy: PrivacyStatus,
    ) -> Result<PlaylistSummary, CatalogError> {
        let user: UserObject = self.http.get_json(format!("{API}/me")).await?;

        // Spotify has no unlisted tier; anything but Public stays private.
        let body = serde_json::json!({
            "name": title,
            "description": description,
            "public": privacy == PrivacyStatus::Public,
        });
        let playlist: PlaylistObject = self
            .http
            .post_json(format!("{API}/users/{}/playlists", user.id), body)
            .await?;

        tracing::info!(playlist_id = %playlist.id, title, "created spotify playlist");
        Ok(playlist.into())
    }

    async fn list_playlist_member_ids(
        &self,
        playlist_id: &str,
    ) -> Result<HashSet<String>, CatalogError> {
        let items = self.track_pages(playlist_id).await?;

        Ok(items
            .into_iter()
            .filter_map(|item| item.track.as_ref().and_then(track_uri))
            .collect())
    }

    async fn add_items(&self, playlist_id: &str, ids: &[String]) -> Result<(), CatalogError> {
        for chunk in ids.chunks(100) {
            let body = serde_json::json!({ "uris": chunk });
            self.http
                .post(format!("{API}/playlists/{playlist_id}/tracks"), body)
                .await?;
            tracing::debug!(playlist_id, count = chunk.len(), "added tracks to playlist");
        }
        Ok(())
    }
}
