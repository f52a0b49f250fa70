use crate::model::{NormalizedTrack, RawTrackItem};

/// Maps a raw catalog entry to the provider-agnostic track record.
///
/// Pure and infallible apart from dropping the input: deleted/unavailable
/// placeholders and items without an id or a non-empty title come back as
/// `None` and are silently skipped upstream.
pub fn normalize(item: &RawTrackItem) -> Option<NormalizedTrack> {
    match item {
        RawTrackItem::Spotify {
            id,
            title,
            artists,
            duration_ms,
            isrc,
        } => {
            let source_id = id.clone()?;
            let title = non_empty(title.as_deref()?)?;
            Some(NormalizedTrack {
                title,
                artists: artists.clone(),
                duration_ms: *duration_ms,
                isrc: isrc.clone(),
                source_id,
            })
        }
        RawTrackItem::YouTube { video_id, title } => {
            let source_id = video_id.clone()?;
            let title = non_empty(title.as_deref()?)?;
            // Video titles carry no structured artist data; a single split on
            // " - " infers the uploader's usual "Artist - Title" convention.
            // The title itself is kept whole.
            let artists = match title.split_once(" - ") {
                Some((artist, _rest)) => vec![artist.to_string()],
                None => Vec::new(),
            };
            Some(NormalizedTrack {
                title,
                artists,
                duration_ms: None,
                isrc: None,
                source_id,
            })
        }
    }
}

fn non_empty(title: &str) -> Option<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
