//! Slack `oauth.v2.access` code exchange.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::ChatAuthClient;
use crate::config::SlackConfig;
use crate::error::ChatAuthError;
use crate::types::ChatIdentity;

/// The parts of the `oauth.v2.access` response we read.
#[derive(Debug, Deserialize)]
struct SlackTokenResponse {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    authed_user: Option<SlackAuthedUser>,
}

#[derive(Debug, Deserialize)]
struct SlackAuthedUser {
    #[serde(default)]
    id: String,
    #[serde(default)]
    access_token: String,
}

/// Slack token endpoint client using reqwest.
pub struct SlackOAuthClient {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: Option<String>,
}

impl SlackOAuthClient {
    pub fn new(config: &SlackConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        }
    }
}

#[async_trait]
impl ChatAuthClient for SlackOAuthClient {
    async fn exchange_code(&self, code: &str) -> Result<ChatIdentity, ChatAuthError> {
        let mut form = vec![
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        if let Some(uri) = &self.redirect_uri {
            form.push(("redirect_uri", uri.as_str()));
        }

        debug!(url = %self.token_url, "Exchanging Slack authorization code");

        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ChatAuthError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChatAuthError::Transport {
                message: format!("Failed to read response body: {e}"),
            })?;

        if !status.is_success() {
            return Err(ChatAuthError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_token_response(&body)
    }
}

/// Parse an `oauth.v2.access` body into the authorizing user's identity.
///
/// Slack answers most failures with HTTP 200 and `"ok": false`.
fn parse_token_response(body: &str) -> Result<ChatIdentity, ChatAuthError> {
    let parsed: SlackTokenResponse =
        serde_json::from_str(body).map_err(|e| ChatAuthError::Parse {
            message: e.to_string(),
        })?;

    if parsed.ok == Some(false) {
        return Err(ChatAuthError::Rejected {
            error: parsed.error.unwrap_or_else(|| "unknown_error".to_string()),
        });
    }

    let user = parsed.authed_user.ok_or(ChatAuthError::MissingField {
        field: "authed_user",
    })?;
    if user.id.is_empty() {
        return Err(ChatAuthError::MissingField {
            field: "authed_user.id",
        });
    }
    if user.access_token.is_empty() {
        return Err(ChatAuthError::MissingField {
            field: "authed_user.access_token",
        });
    }

    Ok(ChatIdentity {
        user_id: user.id,
        access_token: user.access_token,
    })
}
