use std::collections::HashSet;

use crate::error::CatalogError;
use crate::model::{PlaylistSummary, PrivacyStatus, Provider, RawTrackItem, SearchHit};

/// Port trait wrapping the catalog capabilities the engine needs.
///
/// Both providers implement the same shape; the wire encodings differ.
/// Production implementations live in `catalog::spotify` and
/// `catalog::youtube`.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// All of the caller's playlists, traversing every page.
    async fn list_playlists(&self) -> Result<Vec<PlaylistSummary>, CatalogError>;

    /// All entries of one playlist in source order, traversing every page.
    async fn list_playlist_tracks(
        &self,
        playlist_id: &str,
    ) -> Result<Vec<RawTrackItem>, CatalogError>;

    /// ISRC-keyed search. Provider-side "not found" is an empty hit list,
    /// never an error.
    async fn search_by_isrc(&self, isrc: &str) -> Result<Vec<SearchHit>, CatalogError>;

    /// Free-text search with the same not-found contract as `search_by_isrc`.
    async fn search_by_query(&self, query: &str) -> Result<Vec<SearchHit>, CatalogError>;

    async fn create_playlist(
        &self,
        title: &str,
        description: &str,
        privacy: PrivacyStatus,
    ) -> Result<PlaylistSummary, CatalogError>;

    /// Identifiers already present in a playlist, in the catalog's own
    /// addressing scheme. Used for dedupe-against-existing.
    async fn list_playlist_member_ids(
        &self,
        playlist_id: &str,
    ) -> Result<HashSet<String>, CatalogError>;

    /// Adds items to a playlist, chunking to the provider's batch cap.
    async fn add_items(&self, playlist_id: &str, ids: &[String]) -> Result<(), CatalogError>;

    /// Case-insensitive, whitespace-trimmed exact title match over all of
    /// the caller's playlists. When several playlists share a title, the
    /// first one the provider lists wins; the order among duplicates is
    /// whatever the provider returns (known limitation).
    async fn find_playlist_by_title(
        &self,
        title: &str,
    ) -> Result<Option<PlaylistSummary>, CatalogError> {
        let needle = title.trim().to_lowercase();
        Ok(self
            .list_playlists()
            .await?
            .into_iter()
            .find(|playlist| playlist.title.trim().to_lowercase() == needle))
    }
}
