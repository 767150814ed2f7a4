//! Error types for the Tunelink core library.
//!
//! [`AppError`] is the error catalog: the closed set of failures that may reach
//! an HTTP caller, each bound to a stable code, a message and a status. The
//! remaining enums describe lower-level causes; they are logged and then
//! translated into exactly one catalog entry by the orchestrator.

use axum::http::StatusCode;
use std::path::PathBuf;

/// Named failure conditions reported to HTTP callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum AppError {
    /// A session carrier is absent (or fails verification) on the Spotify hop.
    #[error("Missing or invalid session cookie")]
    InvalidCarrier,

    /// Slack rejected the authorization code, or no code was supplied.
    #[error("Invalid Slack authorization code")]
    InvalidChatAuthCode,

    /// The Spotify callback was invalid or the token exchange failed.
    #[error("Invalid Spotify authorization code")]
    InvalidMusicAuthCode,

    /// The user link could not be stored.
    #[error("Failed to add user")]
    AddUserError,

    /// Slack's token endpoint was unreachable or answered with garbage.
    #[error("Slack authorization request failed")]
    ChatAuthBadRequest,
}

impl AppError {
    /// Every catalog entry, in declaration order.
    pub const ALL: [AppError; 5] = [
        AppError::InvalidCarrier,
        AppError::InvalidChatAuthCode,
        AppError::InvalidMusicAuthCode,
        AppError::AddUserError,
        AppError::ChatAuthBadRequest,
    ];

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidCarrier => "invalid_carrier",
            AppError::InvalidChatAuthCode => "invalid_slack_auth_code",
            AppError::InvalidMusicAuthCode => "invalid_spotify_auth_code",
            AppError::AddUserError => "add_user_error",
            AppError::ChatAuthBadRequest => "slack_auth_bad_request",
        }
    }

    /// Human-readable message, identical to the `Display` output.
    pub fn message(&self) -> &'static str {
        match self {
            AppError::InvalidCarrier => "Missing or invalid session cookie",
            AppError::InvalidChatAuthCode => "Invalid Slack authorization code",
            AppError::InvalidMusicAuthCode => "Invalid Spotify authorization code",
            AppError::AddUserError => "Failed to add user",
            AppError::ChatAuthBadRequest => "Slack authorization request failed",
        }
    }

    /// HTTP status returned for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCarrier
            | AppError::InvalidChatAuthCode
            | AppError::InvalidMusicAuthCode => StatusCode::BAD_REQUEST,
            AppError::AddUserError => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ChatAuthBadRequest => StatusCode::BAD_GATEWAY,
        }
    }

    /// Look up an entry's message and status by its code.
    pub fn lookup(code: &str) -> Option<(&'static str, StatusCode)> {
        Self::ALL
            .iter()
            .find(|e| e.code() == code)
            .map(|e| (e.message(), e.status()))
    }
}

/// A callback query string that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed callback query: {message}")]
pub struct MalformedQuery {
    pub message: String,
}

/// Errors from the Slack `oauth.v2.access` exchange.
#[derive(Debug, thiserror::Error)]
pub enum ChatAuthError {
    #[error("Slack token request failed: {message}")]
    Transport { message: String },

    #[error("Slack token endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Slack token response parse error: {message}")]
    Parse { message: String },

    #[error("Slack rejected the authorization code: {error}")]
    Rejected { error: String },

    #[error("Slack token response missing '{field}'")]
    MissingField { field: &'static str },
}

impl ChatAuthError {
    /// Catalog entry reported for this cause.
    ///
    /// Failures to talk to Slack at all are a bad gateway; an answer from
    /// Slack that refuses the code is the caller's problem.
    pub fn catalog(&self) -> AppError {
        match self {
            ChatAuthError::Transport { .. }
            | ChatAuthError::Status { .. }
            | ChatAuthError::Parse { .. } => AppError::ChatAuthBadRequest,
            ChatAuthError::Rejected { .. } | ChatAuthError::MissingField { .. } => {
                AppError::InvalidChatAuthCode
            }
        }
    }
}

/// Errors from the Spotify callback and token exchange.
#[derive(Debug, thiserror::Error)]
pub enum MusicAuthError {
    #[error("Spotify authorization failed: {error}")]
    Denied { error: String },

    #[error("Spotify callback did not contain an authorization code")]
    MissingCode,

    #[error("Spotify state parameter mismatch")]
    StateMismatch,

    #[error("Spotify token request failed: {message}")]
    Transport { message: String },

    #[error("Spotify token endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Spotify token response parse error: {message}")]
    Parse { message: String },
}

/// Errors from the user link store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open user store at {path}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("Failed to write user link: {message}")]
    WriteFailed { message: String },

    #[error("Failed to read user link: {message}")]
    ReadFailed { message: String },

    #[error("User store task failed: {message}")]
    Task { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Configuration parse error: {0}")]
    Parse(#[from] Box<figment::Error>),
}
