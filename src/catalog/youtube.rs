use std::collections::HashSet;

use serde::Deserialize;

use crate::auth::{AuthToken, TokenRefresher};
use crate::catalog::{CatalogHttp, ReqwestTransport, RetryPolicy};
use crate::error::CatalogError;
use crate::model::{PlaylistSummary, PrivacyStatus, Provider, RawTrackItem, SearchHit};
use crate::ports::catalog::CatalogClient;
use crate::ports::http::HttpTransport;

const API: &str = "https://www.googleapis.com/youtube/v3";

/// YouTube Data API v3 client. Pagination uses the opaque `pageToken` query
/// parameter; the playlist-item insert endpoint has no batch form, so writes
/// go one item per request.
pub struct YouTubeCatalog<T: HttpTransport> {
    http: CatalogHttp<T>,
}

impl YouTubeCatalog<ReqwestTransport> {
    pub fn new(token: AuthToken, refresher: Box<dyn TokenRefresher>) -> Self {
        Self::with_transport(
            ReqwestTransport::new(Provider::YouTube),
            refresher,
            token,
            RetryPolicy::default(),
        )
    }
}

impl<T: HttpTransport> YouTubeCatalog<T> {
    pub fn with_transport(
        transport: T,
        refresher: Box<dyn TokenRefresher>,
        token: AuthToken,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            http: CatalogHttp::new(Provider::YouTube, transport, refresher, token, retry),
        }
    }

    /// Both ISRC and free-text lookups go through the same search endpoint;
    /// an ISRC is simply submitted as the query string.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, CatalogError> {
        let url = format!(
            "{API}/search?part=snippet&type=video&maxResults=5&q={}",
            urlencoding::encode(query)
        );
        let response: SearchResponse = match self.http.get_json(url).await {
            Ok(response) => response,
            Err(CatalogError::Http { status: 404, .. }) => return Ok(Vec::new()),
            Err(error) => return Err(error),
        };

        Ok(response
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.and_then(|id| id.video_id)?;
                Some(SearchHit {
                    id: video_id,
                    title: item.snippet.and_then(|snippet| snippet.title),
                })
            })
            .collect())
    }

    async fn playlist_items(
        &self,
        playlist_id: &str,
    ) -> Result<Vec<PlaylistItemObject>, CatalogError> {
        let base = format!(
            "{API}/playlistItems?part=snippet,contentDetails&playlistId={playlist_id}&maxResults=50"
        );
        let mut all_items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = match &page_token {
                Some(token) => format!("{base}&pageToken={token}"),
                None => base.clone(),
            };
            let page: PageResponse<PlaylistItemObject> = self.http.get_json(url).await?;
            all_items.extend(page.items);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_items)
    }
}

fn item_video_id(item: &PlaylistItemObject) -> Option<String> {
    item.content_details
        .as_ref()
        .and_then(|details| details.video_id.clone())
        .or_else(|| {
            item.snippet
                .as_ref()
                .and_then(|snippet| snippet.resource_id.as_ref())
                .and_then(|resource| resource.video_id.clone())
        })
}

#[derive(Deserialize)]
struct PageResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistObject {
    id: String,
    snippet: Option<SnippetObject>,
    #[serde(rename = "contentDetails")]
    content_details: Option<PlaylistContentDetails>,
}

#[derive(Deserialize)]
struct PlaylistContentDetails {
    #[serde(rename = "itemCount")]
    item_count: Option<u32>,
}

#[derive(Deserialize)]
struct PlaylistItemObject {
    snippet: Option<SnippetObject>,
    #[serde(rename = "contentDetails")]
    content_details: Option<ItemContentDetails>,
}

#[derive(Deserialize)]
struct ItemContentDetails {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Deserialize)]
struct SnippetObject {
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "resourceId")]
    resource_id: Option<ResourceIdObject>,
}

#[derive(Deserialize)]
struct ResourceIdObject {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default = "Vec::new")]
    items: Vec<SearchItemObject>,
}

#[derive(Deserialize)]
struct SearchItemObject {
    id: Option<SearchIdObject>,
    snippet: Option<SnippetObject>,
}

#[derive(Deserialize)]
struct SearchIdObject {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

impl From<PlaylistObject> for PlaylistSummary {
    fn from(playlist: PlaylistObject) -> Self {
        let (title, description) = match playlist.snippet {
            Some(snippet) => (
                snippet.title.unwrap_or_default(),
                snippet.description,
            ),
            None => (String::new(), None),
        };
        PlaylistSummary {
            id: playlist.id,
            title,
            description,
            track_count: playlist.content_details.and_then(|details| details.item_count),
        }
    }
}

#[async_trait::async_trait]
impl<T: HttpTransport> CatalogClient for YouTubeCatalog<T> {
    fn provider(&self) -> Provider {
        Provider::YouTube
    }

    async fn list_playlists(&self) -> Result<Vec<PlaylistSummary>, CatalogError> {
        let base = format!("{API}/playlists?part=id,snippet,contentDetails&mine=true&maxResults=50");
        let mut all_playlists = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = match &page_token {
                Some(token) => format!("{base}&pageToken={token}"),
                None => base.clone(),
            };
            let page: PageResponse<PlaylistObject> = self.http.get_json(url).await?;
            all_playlists.extend(page.items.into_iter().map(PlaylistSummary::from));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_playlists)
    }

    async fn list_playlist_tracks(
        &self,
        playlist_id: &str,
    ) -> Result<Vec<RawTrackItem>, CatalogError> {
        let items = self.playlist_items(playlist_id).await?;

        Ok(items
            .into_iter()
            .map(|item| RawTrackItem::YouTube {
                video_id: item_video_id(&item),
                title: item.snippet.and_then(|snippet| snippet.title),
            })
            .collect())
    }

    async fn search_by_isrc(&self, isrc: &str) -> Result<Vec<SearchHit>, CatalogError> {
        self.search(isrc).await
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
        let body = serde_json::json!({
            "snippet": { "title": title, "description": description },
            "status": { "privacyStatus": privacy.as_str() },
        });
        let playlist: PlaylistObject = self
            .http
            .post_json(format!("{API}/playlists?part=snippet,status"), body)
            .await?;

        tracing::info!(playlist_id = %playlist.id, title, "created youtube playlist");
        Ok(playlist.into())
    }

    async fn list_playlist_member_ids(
        &self,
        playlist_id: &str,
    ) -> Result<HashSet<String>, CatalogError> {
        let items = self.playlist_items(playlist_id).await?;
        Ok(items.iter().filter_map(item_video_id).collect())
    }

    async fn add_items(&self, playlist_id: &str, ids: &[String]) -> Result<(), CatalogError> {
        // No batch insert endpoint; one request per video.
        for video_id in ids {
            let body = serde_json::json!({
                "snippet": {
                    "playlistId": playlist_id,
                    "resourceId": { "kind": "youtube#video", "videoId": video_id },
                },
            });
            self.http
                .post(format!("{API}/playlistItems?part=snippet"), body)
                .await?;
            tracing::debug!(playlist_id, video_id, "inserted playlist item");
        }
        Ok(())
    }
}
