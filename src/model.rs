use serde::{Deserialize, Serialize};

/// The two catalogs a migration moves between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provider {
    Spotify,
    YouTube,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Spotify => "spotify",
            Provider::YouTube => "youtube",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoupled representation of a playlist as listed by either catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    /// Item count as reported by the provider, when it reports one.
    pub track_count: Option<u32>,
}

/// Raw playlist entry as returned by a catalog, before normalization.
///
/// Tagged by provider so normalization dispatches on identity rather than
/// sniffing the JSON shape.
#[derive(Debug, Clone)]
pub enum RawTrackItem {
    /// Spotify playlist entry. `id`/`title` are absent for deleted or
    /// region-unavailable tracks, which the API returns as null placeholders.
    Spotify {
        id: Option<String>,
        title: Option<String>,
        artists: Vec<String>,
        duration_ms: Option<i64>,
        isrc: Option<String>,
    },
    /// YouTube playlist item. Carries no structured artist or ISRC data.
    YouTube {
        video_id: Option<String>,
        title: Option<String>,
    },
}

/// One hit from a catalog search, already in that catalog's addressing
/// scheme (a `spotify:track:` URI or a YouTube video id).
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub title: Option<String>,
}

/// Provider-agnostic track record produced by normalization.
///
/// `title` is always non-empty: items that fail normalization are dropped,
/// never propagated with an empty title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedTrack {
    pub title: String,
    /// Primary artist first. May be empty for video-sourced tracks whose
    /// title carried no artist hint.
    pub artists: Vec<String>,
    pub duration_ms: Option<i64>,
    pub isrc: Option<String>,
    /// Identifier of the item in the source catalog.
    pub source_id: String,
}

impl NormalizedTrack {
    pub fn primary_artist(&self) -> Option<&str> {
        self.artists.first().map(String::as_str)
    }
}

/// How a destination identifier was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    Isrc,
    Query,
    None,
}

/// Best-effort match of one track in the destination catalog.
///
/// `method == None` iff `destination_id` is absent; the constructors are the
/// only way to build one, so the invariant holds everywhere.
#[derive(Debug, Clone)]
pub struct MatchResult {
    destination_id: Option<String>,
    method: MatchMethod,
}

impl MatchResult {
    pub fn hit(destination_id: String, method: MatchMethod) -> Self {
        debug_assert!(method != MatchMethod::None);
        Self {
            destination_id: Some(destination_id),
            method,
        }
    }

    pub fn miss() -> Self {
        Self {
            destination_id: None,
            method: MatchMethod::None,
        }
    }

    pub fn destination_id(&self) -> Option<&str> {
        self.destination_id.as_deref()
    }

    pub fn method(&self) -> MatchMethod {
        self.method
    }

    pub fn is_hit(&self) -> bool {
        self.destination_id.is_some()
    }
}

/// One row of a dry-run preview; doubles as the write list entry for the
/// migration executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryRunItem {
    pub source_id: String,
    pub destination_id: Option<String>,
    pub title: String,
    pub method: MatchMethod,
}

/// Dry-run result for one selected source playlist. Item order mirrors the
/// source playlist's track order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistGroup {
    pub playlist_id: String,
    pub playlist_title: String,
    pub total: usize,
    pub matched: usize,
    pub items: Vec<DryRunItem>,
}

/// How the destination playlist is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationMode {
    /// Always create a new playlist, regardless of name collisions.
    Create,
    /// Look up an existing playlist by exact title first.
    MergeByName,
    /// Use this playlist id verbatim; a missing playlist surfaces as an
    /// HTTP error on the write step.
    MergeInto(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    #[default]
    Private,
    Public,
    Unlisted,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Private => "private",
            PrivacyStatus::Public => "public",
            PrivacyStatus::Unlisted => "unlisted",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MigrateOptions {
    pub mode: DestinationMode,
    /// Only consulted in `MergeByName` mode.
    pub allow_create_if_missing: bool,
    pub dedupe_input: bool,
    pub dedupe_existing: bool,
    /// Privacy for playlists created in `Create` mode; merge-by-name
    /// fallback creation uses the destination default instead.
    pub privacy: PrivacyStatus,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            mode: DestinationMode::Create,
            allow_create_if_missing: true,
            dedupe_input: true,
            dedupe_existing: true,
            privacy: PrivacyStatus::default(),
        }
    }
}
