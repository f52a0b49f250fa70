pub mod spotify;
pub mod youtube;

use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::auth::{AuthToken, TokenRefresher};
use crate::error::CatalogError;
use crate::model::Provider;
use crate::ports::http::{ApiRequest, ApiResponse, HttpMethod, HttpTransport};

/// Bounds on the automatic 429 backoff. The original behavior retried
/// rate-limited calls forever; this caps them and surfaces
/// `RateLimitExhausted` instead.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_rate_limit_retries: u32,
    /// Used when the provider sends no `Retry-After` header.
    pub default_retry_after_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: 5,
            default_retry_after_secs: 1,
        }
    }
}

/// Production `HttpTransport` backed by reqwest.
pub struct ReqwestTransport {
    provider: Provider,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, CatalogError> {
        let builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        let mut builder = builder
            .bearer_auth(&request.bearer)
            .timeout(Duration::from_secs(10));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|source| CatalogError::Request {
                provider: self.provider,
                source,
            })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok());
        let body = response
            .text()
            .await
            .map_err(|source| CatalogError::Request {
                provider: self.provider,
                source,
            })?;

        Ok(ApiResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// Shared authorized-request loop for both catalog clients.
///
/// Owns the provider session and its refresh lifecycle: the token is
/// refreshed in place under the single-flow assumption (one logical
/// operation at a time; the mutex is there for `&self` interior mutability,
/// not for cross-operation concurrency).
pub struct CatalogHttp<T: HttpTransport> {
    provider: Provider,
    transport: T,
    refresher: Box<dyn TokenRefresher>,
    session: Mutex<AuthToken>,
    retry: RetryPolicy,
}

impl<T: HttpTransport> CatalogHttp<T> {
    pub fn new(
        provider: Provider,
        transport: T,
        refresher: Box<dyn TokenRefresher>,
        token: AuthToken,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            transport,
            refresher,
            session: Mutex::new(token),
            retry,
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub async fn get_json<D: DeserializeOwned>(&self, url: String) -> Result<D, CatalogError> {
        let response = self.execute(HttpMethod::Get, url, None).await?;
        response.json(self.provider)
    }

    pub async fn post_json<D: DeserializeOwned>(
        &self,
        url: String,
        body: serde_json::Value,
    ) -> Result<D, CatalogError> {
        let response = self.execute(HttpMethod::Post, url, Some(body)).await?;
        response.json(self.provider)
    }

    pub async fn post(&self, url: String, body: serde_json::Value) -> Result<(), CatalogError> {
        self.execute(HttpMethod::Post, url, Some(body)).await?;
        Ok(())
    }

    /// Sends one logical request, absorbing 429s (bounded) and at most one
    /// 401-triggered token refresh. Anything else non-2xx is surfaced as-is.
    pub async fn execute(
        &self,
        method: HttpMethod,
        url: String,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, CatalogError> {
        let mut rate_limit_attempts: u32 = 0;
        let mut refreshed = false;

        // An already-expired token is refreshed up front rather than burning
        // a request on a guaranteed 401. Counts as this call's one refresh.
        if !self.session.lock().await.is_valid() {
            self.refresh_session().await?;
            refreshed = true;
        }

        loop {
            let bearer = self.session.lock().await.access_token.clone();
            let request = ApiRequest {
                method,
                url: url.clone(),
                bearer,
                body: body.clone(),
            };
            let response = self.transport.send(request).await?;

            match response.status {
                429 => {
                    if rate_limit_attempts >= self.retry.max_rate_limit_retries {
                        return Err(CatalogError::RateLimitExhausted {
                            provider: self.provider,
                            attempts: rate_limit_attempts,
                        });
                    }
                    let wait = response
                        .retry_after
                        .unwrap_or(self.retry.default_retry_after_secs)
                        + 1;
                    tracing::warn!(
                        provider = %self.provider,
                        wait_secs = wait,
                        attempt = rate_limit_attempts + 1,
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                    rate_limit_attempts += 1;
                }
                401 => {
                    if refreshed {
                        return Err(CatalogError::Auth {
                            provider: self.provider,
                        });
                    }
                    tracing::debug!(provider = %self.provider, "token rejected, refreshing");
                    self.refresh_session().await?;
                    refreshed = true;
                }
                status if !response.is_success() => {
                    return Err(CatalogError::Http {
                        provider: self.provider,
                        status,
                        body: response.body,
                    });
                }
                _ => return Ok(response),
            }
        }
    }

    async fn refresh_session(&self) -> Result<(), CatalogError> {
        let refresh_token = self.session.lock().await.refresh_token.clone();
        let Some(refresh_token) = refresh_token else {
            return Err(CatalogError::Auth {
                provider: self.provider,
            });
        };

        let fresh = self.refresher.refresh(&refresh_token).await?;
        let mut session = self.session.lock().await;
        let retained = fresh
            .refresh_token
            .clone()
            .or_else(|| session.refresh_token.clone());
        *session = AuthToken {
            refresh_token: retained,
            ..fresh
        };
        Ok(())
    }
}
