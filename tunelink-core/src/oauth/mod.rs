//! # OAuth clients
//!
//! The two authorization servers the handshake talks to, each behind a trait
//! so the orchestrator can be driven by mocks in tests:
//!
//! | Trait | Implementation | Endpoint |
//! |-------|----------------|----------|
//! | [`ChatAuthClient`] | [`SlackOAuthClient`] | `oauth.v2.access` |
//! | [`MusicAuthClient`] | [`SpotifyOAuthClient`] | `/authorize`, `/api/token` |

pub mod slack;
pub mod spotify;

pub use slack::SlackOAuthClient;
pub use spotify::SpotifyOAuthClient;

use async_trait::async_trait;

use crate::config::HttpConfig;
use crate::error::{ChatAuthError, ConfigError, MusicAuthError};
use crate::types::{AuthorizationState, ChatIdentity, MusicToken};

/// Exchanges a Slack authorization code for the authorizing user's identity.
#[async_trait]
pub trait ChatAuthClient: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<ChatIdentity, ChatAuthError>;
}

/// Builds Spotify authorization URLs and exchanges the returned code.
#[async_trait]
pub trait MusicAuthClient: Send + Sync {
    /// URL the user is redirected to after the Slack hop.
    fn authorization_url(&self, state: &AuthorizationState) -> String;

    async fn exchange_code(&self, code: &str) -> Result<MusicToken, MusicAuthError>;
}

/// Build the outbound client shared by both token exchanges.
pub fn build_http_client(config: &HttpConfig) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .user_agent(concat!("tunelink/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ConfigError::Invalid {
            message: format!("Failed to build HTTP client: {e}"),
        })
}
