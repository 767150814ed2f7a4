//! Data carried through the linking handshake.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage of a linking flow, used to tag log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStage {
    /// Waiting for Slack to redirect back with a code.
    AwaitingChatCallback,
    /// Carriers issued, waiting for Spotify to redirect back.
    AwaitingMusicCallback,
    /// Both tokens obtained and stored.
    Linked,
}

impl std::fmt::Display for LinkStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkStage::AwaitingChatCallback => write!(f, "awaiting_chat_callback"),
            LinkStage::AwaitingMusicCallback => write!(f, "awaiting_music_callback"),
            LinkStage::Linked => write!(f, "linked"),
        }
    }
}

/// Anti-forgery value sent to Spotify and checked on the way back.
///
/// One value per orchestrator, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationState(String);

impl AuthorizationState {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a `state` echoed back by the authorization server matches.
    pub fn matches(&self, returned: &str) -> bool {
        !self.0.is_empty() && self.0 == returned
    }
}

/// Query parameters of an OAuth redirect back to us.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// Set by the authorization server when the user declined.
    #[serde(default)]
    pub error: Option<String>,
}

/// The Slack user who authorized the app, as returned by `oauth.v2.access`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatIdentity {
    pub user_id: String,
    pub access_token: String,
}

/// Slack identity carried between the two hops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBridgeRecord {
    pub chat_user_id: String,
    pub chat_access_token: String,
}

/// Token pair obtained from Spotify. Fields are passed through unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    pub token_type: String,
    /// Absolute expiry, when Spotify reported `expires_in`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

/// A completed link between a Slack user and a Spotify account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLinkRecord {
    pub chat_user_id: String,
    pub chat_access_token: String,
    pub music_access_token: String,
    pub music_refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music_expiry: Option<DateTime<Utc>>,
    pub music_token_type: String,
}

impl UserLinkRecord {
    /// Combine the carried Slack identity with the Spotify token.
    pub fn new(session: SessionBridgeRecord, token: MusicToken) -> Self {
        Self {
            chat_user_id: session.chat_user_id,
            chat_access_token: session.chat_access_token,
            music_access_token: token.access_token,
            music_refresh_token: token.refresh_token,
            music_expiry: token.expiry,
            music_token_type: token.token_type,
        }
    }
}
