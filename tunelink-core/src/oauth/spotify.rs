//! Spotify authorization URL and authorization-code exchange.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::debug;

use super::MusicAuthClient;
use crate::config::SpotifyConfig;
use crate::error::{ConfigError, MusicAuthError};
use crate::types::{AuthorizationState, MusicToken};

#[derive(Debug, Deserialize)]
struct SpotifyTokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Spotify accounts-service client using reqwest.
pub struct SpotifyOAuthClient {
    client: reqwest::Client,
    authorize_url: url::Url,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl SpotifyOAuthClient {
    pub fn new(config: &SpotifyConfig, client: reqwest::Client) -> Result<Self, ConfigError> {
        let authorize_url =
            url::Url::parse(&config.authorize_url).map_err(|e| ConfigError::Invalid {
                message: format!("Invalid spotify.authorize_url: {e}"),
            })?;
        Ok(Self {
            client,
            authorize_url,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
        })
    }
}

#[async_trait]
impl MusicAuthClient for SpotifyOAuthClient {
    fn authorization_url(&self, state: &AuthorizationState) -> String {
        let mut url = self.authorize_url.clone();
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("client_id", &self.client_id);
            params.append_pair("response_type", "code");
            params.append_pair("redirect_uri", &self.redirect_uri);
            if !self.scopes.is_empty() {
                params.append_pair("scope", &self.scopes.join(" "));
            }
            params.append_pair("state", state.as_str());
        }
        url.into()
    }

    async fn exchange_code(&self, code: &str) -> Result<MusicToken, MusicAuthError> {
        debug!(url = %self.token_url, "Exchanging Spotify authorization code");

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MusicAuthError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MusicAuthError::Transport {
                message: format!("Failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(MusicAuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_token_response(&body, Utc::now())
    }
}

/// Parse a token endpoint body, resolving `expires_in` against `now`.
fn parse_token_response(body: &str, now: DateTime<Utc>) -> Result<MusicToken, MusicAuthError> {
    let parsed: SpotifyTokenResponse =
        serde_json::from_str(body).map_err(|e| MusicAuthError::Parse {
            message: e.to_string(),
        })?;

    if parsed.access_token.is_empty() {
        return Err(MusicAuthError::Parse {
            message: "empty access_token".to_string(),
        });
    }

    let expiry = parsed
        .expires_in
        .filter(|secs| *secs > 0)
        .and_then(Duration::try_seconds)
        .map(|ttl| now + ttl);

    Ok(MusicToken {
        access_token: parsed.access_token,
        refresh_token: parsed.refresh_token.unwrap_or_default(),
        token_type: parsed.token_type.unwrap_or_default(),
        expiry,
    })
}
