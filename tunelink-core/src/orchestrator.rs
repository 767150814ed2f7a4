//! Two-hop Slack → Spotify linking handshake.
//!
//! Hop 1 exchanges the Slack code and hands the identity to the browser as
//! carriers. Hop 2 reads the carriers back, exchanges the Spotify code and
//! stores the joined record. Each failure is logged where it happens and
//! leaves as exactly one [`AppError`].

use axum::http::HeaderMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::TunelinkConfig;
use crate::error::{AppError, ConfigError, MalformedQuery, MusicAuthError};
use crate::oauth::{
    ChatAuthClient, MusicAuthClient, SlackOAuthClient, SpotifyOAuthClient, build_http_client,
};
use crate::session::{Carrier, SessionBridge};
use crate::store::UserLinkStore;
use crate::types::{AuthorizationState, CallbackQuery, LinkStage, UserLinkRecord};

/// Result of a successful Slack hop.
#[derive(Debug, Clone)]
pub struct ChatHandoff {
    pub carriers: [Carrier; 2],
    /// Spotify authorization URL to redirect the browser to.
    pub redirect_url: String,
}

pub struct LinkOrchestrator {
    chat: Arc<dyn ChatAuthClient>,
    music: Arc<dyn MusicAuthClient>,
    store: Arc<dyn UserLinkStore>,
    bridge: SessionBridge,
    state: AuthorizationState,
}

impl LinkOrchestrator {
    pub fn new(
        chat: Arc<dyn ChatAuthClient>,
        music: Arc<dyn MusicAuthClient>,
        store: Arc<dyn UserLinkStore>,
        bridge: SessionBridge,
        state: AuthorizationState,
    ) -> Self {
        Self {
            chat,
            music,
            store,
            bridge,
            state,
        }
    }

    /// Wire the Slack and Spotify clients, carriers and state from config.
    pub fn from_config(
        config: &TunelinkConfig,
        store: Arc<dyn UserLinkStore>,
    ) -> Result<Self, ConfigError> {
        let http = build_http_client(&config.http)?;
        let chat = SlackOAuthClient::new(&config.slack, http.clone());
        let music = SpotifyOAuthClient::new(&config.spotify, http)?;
        let bridge = SessionBridge::from_config(&config.session)?;
        Ok(Self::new(
            Arc::new(chat),
            Arc::new(music),
            store,
            bridge,
            AuthorizationState::new(config.spotify.state.clone()),
        ))
    }

    /// Handle Slack's redirect: exchange the code and issue carriers.
    ///
    /// Never touches the store.
    pub async fn complete_chat_auth(
        &self,
        query: Result<CallbackQuery, MalformedQuery>,
    ) -> Result<ChatHandoff, AppError> {
        let stage = LinkStage::AwaitingChatCallback;

        let query =
            query.map_err(|e| reject(stage, AppError::InvalidChatAuthCode, &e.to_string()))?;
        if let Some(error) = query.error.as_deref() {
            return Err(reject(stage, AppError::InvalidChatAuthCode, error));
        }
        let code = query
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| reject(stage, AppError::InvalidChatAuthCode, "missing code"))?;

        let identity = self.chat.exchange_code(code).await.map_err(|e| {
            let err = e.catalog();
            reject(stage, err, &e.to_string())
        })?;

        let carriers = self
            .bridge
            .issue(&identity.user_id, &identity.access_token)
            .map_err(|e| reject(stage, AppError::ChatAuthBadRequest, &e.to_string()))?;
        let redirect_url = self.music.authorization_url(&self.state);

        info!(
            stage = %LinkStage::AwaitingMusicCallback,
            slack_user_id = %identity.user_id,
            "Slack authorization complete, redirecting to Spotify"
        );

        Ok(ChatHandoff {
            carriers,
            redirect_url,
        })
    }

    /// Handle Spotify's redirect: read carriers, exchange the code, upsert.
    ///
    /// Carriers are checked before the query, so a request without them is
    /// always `InvalidCarrier`.
    pub async fn complete_music_auth(
        &self,
        headers: &HeaderMap,
        query: Result<CallbackQuery, MalformedQuery>,
    ) -> Result<UserLinkRecord, AppError> {
        let stage = LinkStage::AwaitingMusicCallback;

        let session = self
            .bridge
            .read(headers)
            .map_err(|e| reject(stage, AppError::InvalidCarrier, &e.to_string()))?;

        let query =
            query.map_err(|e| reject(stage, AppError::InvalidMusicAuthCode, &e.to_string()))?;
        let code = self
            .validate_music_callback(&query)
            .map_err(|e| reject(stage, AppError::InvalidMusicAuthCode, &e.to_string()))?;

        let token = self
            .music
            .exchange_code(code)
            .await
            .map_err(|e| reject(stage, AppError::InvalidMusicAuthCode, &e.to_string()))?;

        let record = UserLinkRecord::new(session, token);

        self.store
            .upsert(record.clone())
            .await
            .map_err(|e| reject(stage, AppError::AddUserError, &e.to_string()))?;

        info!(
            stage = %LinkStage::Linked,
            slack_user_id = %record.chat_user_id,
            "Linked Slack user to Spotify"
        );
        Ok(record)
    }

    fn validate_music_callback<'q>(
        &self,
        query: &'q CallbackQuery,
    ) -> Result<&'q str, MusicAuthError> {
        if let Some(error) = &query.error {
            return Err(MusicAuthError::Denied {
                error: error.clone(),
            });
        }
        let code = query
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(MusicAuthError::MissingCode)?;
        if !self.state.matches(query.state.as_deref().unwrap_or_default()) {
            return Err(MusicAuthError::StateMismatch);
        }
        Ok(code)
    }
}

fn reject(stage: LinkStage, error: AppError, cause: &str) -> AppError {
    warn!(
        stage = %stage,
        code = error.code(),
        status = error.status().as_u16(),
        cause,
        "Link request failed"
    );
    error
}
