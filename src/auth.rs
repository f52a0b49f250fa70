use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use crate::error::CatalogError;
use crate::model::Provider;

const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Leeway subtracted from the token lifetime so a token is refreshed a bit
/// before the provider would actually reject it.
const EXPIRY_LEEWAY_SECS: i64 = 30;

/// A provider access token with its refresh lifecycle state.
///
/// Never persisted by the engine; acquisition is an external collaborator
/// concern and each catalog client owns refreshing its own token in place.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub access_token: String,
    pub expires_in: u64,
    /// Epoch seconds at which the token was obtained.
    pub obtained_at: i64,
    pub refresh_token: Option<String>,
}

impl AuthToken {
    pub fn new(access_token: String, expires_in: u64, refresh_token: Option<String>) -> Self {
        Self {
            access_token,
            expires_in,
            obtained_at: chrono::Utc::now().timestamp(),
            refresh_token,
        }
    }

    pub fn is_valid_at(&self, now: i64) -> bool {
        now < self.obtained_at + self.expires_in as i64 - EXPIRY_LEEWAY_SECS
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(chrono::Utc::now().timestamp())
    }
}

/// Port for the auth collaborator's refresh operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<AuthToken, CatalogError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    refresh_token: Option<String>,
}

/// Refreshes an access token against an OAuth token endpoint using the
/// `refresh_token` grant with Basic client credentials.
pub struct OAuthRefresher {
    provider: Provider,
    token_url: String,
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
}

impl OAuthRefresher {
    pub fn spotify(client_id: String, client_secret: String) -> Self {
        Self::new(
            Provider::Spotify,
            SPOTIFY_TOKEN_URL.to_string(),
            client_id,
            client_secret,
        )
    }

    pub fn google(client_id: String, client_secret: String) -> Self {
        Self::new(
            Provider::YouTube,
            GOOGLE_TOKEN_URL.to_string(),
            client_id,
            client_secret,
        )
    }

    pub fn new(
        provider: Provider,
        token_url: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            provider,
            token_url,
            client_id,
            client_secret,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl TokenRefresher for OAuthRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<AuthToken, CatalogError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.client_id),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .header(
                "Authorization",
                format!(
                    "Basic {}",
                    STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret))
                ),
            )
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|source| CatalogError::Request {
                provider: self.provider,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %self.provider, %status, %body, "token refresh rejected");
            return Err(CatalogError::Auth {
                provider: self.provider,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| CatalogError::Request {
                provider: self.provider,
                source,
            })?;
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|source| CatalogError::Decode {
                provider: self.provider,
                source,
            })?;

        // Google never echoes the refresh token back; keep using the old one.
        let refresh_token = token
            .refresh_token
            .unwrap_or_else(|| refresh_token.to_string());

        Ok(AuthToken::new(
            token.access_token,
            token.expires_in,
            Some(refresh_token),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_valid_within_lifetime() {
        let token = AuthToken {
            access_token: "at".into(),
            expires_in: 3600,
            obtained_at: 1_000,
            refresh_token: None,
        };
        assert!(token.is_valid_at(1_000 + 3_000));
    }

    #[test]
    fn test_token_invalid_inside_leeway_window() {
        let token = AuthToken {
            access_token: "at".into(),
            expires_in: 3600,
            obtained_at: 1_000,
            refresh_token: None,
        };
        // 10 seconds before nominal expiry is inside the 30 second leeway.
        assert!(!token.is_valid_at(1_000 + 3_590));
        assert!(!token.is_valid_at(1_000 + 3_600));
    }
}
