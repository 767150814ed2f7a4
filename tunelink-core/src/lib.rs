//! # Tunelink Core
//!
//! Core library for Tunelink, which links a Slack user to their Spotify
//! account through two consecutive OAuth redirects.
//! Provides the link orchestrator, OAuth clients, session carriers, the user
//! link store, configuration, and the HTTP router.

pub mod config;
pub mod error;
pub mod oauth;
pub mod orchestrator;
pub mod response;
pub mod server;
pub mod session;
pub mod store;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{TunelinkConfig, load_config};
pub use error::{AppError, ChatAuthError, ConfigError, MalformedQuery, MusicAuthError, StoreError};
pub use oauth::{ChatAuthClient, MusicAuthClient, SlackOAuthClient, SpotifyOAuthClient};
pub use orchestrator::{ChatHandoff, LinkOrchestrator};
pub use server::{AppState, router};
pub use session::{Carrier, InvalidCarrierValue, SessionBridge};
pub use store::{InMemoryUserLinkStore, SqliteUserLinkStore, UserLinkStore, open_store};
pub use types::{
    AuthorizationState, CallbackQuery, ChatIdentity, LinkStage, MusicToken, SessionBridgeRecord,
    UserLinkRecord,
};
