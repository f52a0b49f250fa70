use crate::error::CatalogError;
use crate::model::{MatchMethod, MatchResult, NormalizedTrack, Provider};
use crate::ports::catalog::CatalogClient;

/// Finds the best-effort counterpart of `track` in the destination catalog.
///
/// The two directions are not symmetric because the catalogs' capabilities
/// differ; both always take the first hit of the provider's own ranking and
/// do no re-ranking or fuzzy comparison of their own.
pub async fn match_track(
    track: &NormalizedTrack,
    destination: &dyn CatalogClient,
) -> Result<MatchResult, CatalogError> {
    let result = match destination.provider() {
        Provider::YouTube => match_to_youtube(track, destination).await?,
        Provider::Spotify => match_to_spotify(track, destination).await?,
    };

    tracing::debug!(
        title = %track.title,
        method = ?result.method(),
        destination_id = result.destination_id().unwrap_or("-"),
        "matched track"
    );
    Ok(result)
}

/// ISRC lookup first when the source track carries one, then an
/// artist-and-title query.
async fn match_to_youtube(
    track: &NormalizedTrack,
    destination: &dyn CatalogClient,
) -> Result<MatchResult, CatalogError> {
    if let Some(isrc) = &track.isrc {
        let hits = destination.search_by_isrc(isrc).await?;
        if let Some(hit) = hits.into_iter().next() {
            return Ok(MatchResult::hit(hit.id, MatchMethod::Isrc));
        }
    }

    let query = format!(
        "{} {}",
        track.primary_artist().unwrap_or_default(),
        track.title
    );
    let hits = destination.search_by_query(query.trim()).await?;
    match hits.into_iter().next() {
        Some(hit) => Ok(MatchResult::hit(hit.id, MatchMethod::Query)),
        None => Ok(MatchResult::miss()),
    }
}

/// Video-sourced tracks never carry an ISRC, so this side only queries:
/// bare title first, then an artist-prefixed retry when one was inferred.
async fn match_to_spotify(
    track: &NormalizedTrack,
    destination: &dyn CatalogClient,
) -> Result<MatchResult, CatalogError> {
    let hits = destination.search_by_query(&track.title).await?;
    if let Some(hit) = hits.into_iter().next() {
        return Ok(MatchResult::hit(hit.id, MatchMethod::Query));
    }

    if let Some(artist) = track.primary_artist() {
        let hits = destination
            .search_by_query(&format!("{artist} {}", track.title))
            .await?;
        if let Some(hit) = hits.into_iter().next() {
            return Ok(MatchResult::hit(hit.id, MatchMethod::Query));
        }
    }

    Ok(MatchResult::miss())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SearchHit;
    use crate::ports::catalog::MockCatalogClient;
    use mockall::Sequence;

    fn track(isrc: Option<&str>, artists: Vec<&str>) -> NormalizedTrack {
        NormalizedTrack {
            title: "Around the World".into(),
            artists: artists.into_iter().map(String::from).collect(),
            duration_ms: Some(215_000),
            isrc: isrc.map(String::from),
            source_id: "src1".into(),
        }
    }

    fn hit(id: &str) -> SearchHit {
        SearchHit {
            id: id.into(),
            title: None,
        }
    }

    fn youtube_mock() -> MockCatalogClient {
        let mut destination = MockCatalogClient::new();
        destination
            .expect_provider()
            .return_const(Provider::YouTube);
        destination
    }

    fn spotify_mock() -> MockCatalogClient {
        let mut destination = MockCatalogClient::new();
        destination
            .expect_provider()
            .return_const(Provider::Spotify);
        destination
    }

    #[tokio::test]
    async fn test_isrc_search_attempted_before_query() {
        let mut destination = youtube_mock();
        let mut seq = Sequence::new();
        destination
            .expect_search_by_isrc()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|isrc| isrc == "USRC17607839")
            .returning(|_| Ok(vec![]));
        destination
            .expect_search_by_query()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|query| query == "Daft Punk Around the World")
            .returning(|_| Ok(vec![hit("vid1")]));

        let track = track(Some("USRC17607839"), vec!["Daft Punk"]);
        let result = match_track(&track, &destination).await.unwrap();
        assert_eq!(result.method(), MatchMethod::Query);
        assert_eq!(result.destination_id(), Some("vid1"));
    }

    #[tokio::test]
    async fn test_isrc_hit_short_circuits_query() {
        let mut destination = youtube_mock();
        destination
            .expect_search_by_isrc()
            .times(1)
            .returning(|_| Ok(vec![hit("vid1"), hit("vid2")]));
        // No query expectation: a fallback search would panic.

        let track = track(Some("USRC17607839"), vec!["Daft Punk"]);
        let result = match_track(&track, &destination).await.unwrap();
        assert_eq!(result.method(), MatchMethod::Isrc);
        assert_eq!(result.destination_id(), Some("vid1"));
    }

    #[tokio::test]
    async fn test_no_isrc_goes_straight_to_query() {
        let mut destination = youtube_mock();
        destination
            .expect_search_by_query()
            .times(1)
            .withf(|query| query == "Daft Punk Around the World")
            .returning(|_| Ok(vec![hit("vid1")]));

        let track = track(None, vec!["Daft Punk"]);
        let result = match_track(&track, &destination).await.unwrap();
        assert_eq!(result.method(), MatchMethod::Query);
    }

    #[tokio::test]
    async fn test_artistless_track_queries_bare_title() {
        let mut destination = youtube_mock();
        destination
            .expect_search_by_query()
            .times(1)
            .withf(|query| query == "Around the World")
            .returning(|_| Ok(vec![]));

        let track = track(None, vec![]);
        let result = match_track(&track, &destination).await.unwrap();
        assert_eq!(result.method(), MatchMethod::None);
        assert_eq!(result.destination_id(), None);
    }

    #[tokio::test]
    async fn test_toward_spotify_never_searches_by_isrc() {
        let mut destination = spotify_mock();
        let mut seq = Sequence::new();
        destination
            .expect_search_by_query()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|query| query == "Around the World")
            .returning(|_| Ok(vec![]));
        destination
            .expect_search_by_query()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|query| query == "Daft Punk Around the World")
            .returning(|_| Ok(vec![hit("spotify:track:t1")]));
        // No search_by_isrc expectation: an ISRC lookup would panic.

        let track = track(Some("USRC17607839"), vec!["Daft Punk"]);
        let result = match_track(&track, &destination).await.unwrap();
        assert_eq!(result.method(), MatchMethod::Query);
        assert_eq!(result.destination_id(), Some("spotify:track:t1"));
    }

    #[tokio::test]
    async fn test_toward_spotify_without_artist_does_not_retry() {
        let mut destination = spotify_mock();
        destination
            .expect_search_by_query()
            .times(1)
            .withf(|query| query == "Around the World")
            .returning(|_| Ok(vec![]));

        let track = track(None, vec![]);
        let result = match_track(&track, &destination).await.unwrap();
        assert_eq!(result.method(), MatchMethod::None);
    }
}
