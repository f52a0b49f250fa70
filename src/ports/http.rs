use serde::de::DeserializeOwned;

use crate::error::CatalogError;
use crate::model::Provider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// One authorized API request, already carrying the bearer token to use.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    pub bearer: String,
    pub body: Option<serde_json::Value>,
}

/// Wire response reduced to what the retry policy and decoders need.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed `Retry-After` header, seconds.
    pub retry_after: Option<u64>,
    pub body: String,
}

impl ApiResponse {
    #[cfg(test)]
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body: body.into(),
        }
    }

    #[cfg(test)]
    pub fn status(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<D: DeserializeOwned>(&self, provider: Provider) -> Result<D, CatalogError> {
        serde_json::from_str(&self.body).map_err(|source| CatalogError::Decode { provider, source })
    }
}

/// Port between the catalog clients and the actual HTTP stack, so the
/// retry/refresh loop is testable without a network.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, CatalogError>;
}
