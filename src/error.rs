use crate::model::Provider;

/// Failures surfaced by a catalog client.
///
/// Rate-limit responses are retried internally and only become visible as
/// `RateLimitExhausted` once the retry budget is spent.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("not authenticated with {provider}: no valid token and no way to refresh")]
    Auth { provider: Provider },
    #[error("{provider} kept rate limiting after {attempts} retries")]
    RateLimitExhausted { provider: Provider, attempts: u32 },
    #[error("{provider} returned HTTP {status}: {body}")]
    Http {
        provider: Provider,
        status: u16,
        body: String,
    },
    #[error("failed to send request to {provider}")]
    Request {
        provider: Provider,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode {provider} response")]
    Decode {
        provider: Provider,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures surfaced by the migration executor for one playlist group.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("no destination playlist titled {title:?} and creation is disabled")]
    DestinationNotFound { title: String },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
