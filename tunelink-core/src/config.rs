//! Configuration system for Tunelink.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! local (or explicit) config file -> environment. The user config lives at
//! `~/.config/tunelink/config.toml`; the local one is `./tunelink.toml`.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Name of the working-directory config file.
pub const LOCAL_CONFIG_FILE: &str = "tunelink.toml";

/// Prefix for environment overrides (`TUNELINK_SLACK__CLIENT_ID`, ...).
pub const ENV_PREFIX: &str = "TUNELINK_";

const REDACTED: &str = "********";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunelinkConfig {
    pub server: ServerConfig,
    pub slack: SlackConfig,
    pub spotify: SpotifyConfig,
    pub session: SessionConfig,
    pub store: StoreConfig,
    pub http: HttpConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// HTML page served once a link is stored.
    pub completion_page: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            completion_page: PathBuf::from("static/completed/index.html"),
        }
    }
}

/// Slack app credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub client_id: String,
    pub client_secret: String,
    /// `oauth.v2.access` endpoint.
    pub token_url: String,
    /// Must be sent when the authorize request carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: "https://slack.com/api/oauth.v2.access".to_string(),
            redirect_uri: None,
        }
    }
}

/// Spotify app credentials and the shared authorization state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Where Spotify sends the user back, i.e. our `/spotify/callback`.
    pub redirect_uri: String,
    /// Anti-forgery value sent as `state` and checked on return.
    pub state: String,
    pub authorize_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            state: String::new(),
            authorize_url: "https://accounts.spotify.com/authorize".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            scopes: vec![
                "user-read-currently-playing".to_string(),
                "user-read-playback-state".to_string(),
            ],
        }
    }
}

/// Session carrier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Carrier lifetime in seconds.
    pub ttl_secs: u64,
    /// Add the `Secure` attribute (HTTPS deployments).
    pub secure: bool,
    /// HMAC key for carrier values. Unsigned when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_secret: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            secure: false,
            signing_secret: None,
        }
    }
}

/// Which user link store to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    /// Process-local; links are lost on restart.
    Memory,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Sqlite => write!(f, "sqlite"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

/// User link store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            database_path: PathBuf::from("tunelink.db"),
        }
    }
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Total timeout for each token exchange request.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

impl TunelinkConfig {
    /// Check that everything the handshake needs is present and well-formed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("slack.client_id", &self.slack.client_id),
            ("slack.client_secret", &self.slack.client_secret),
            ("spotify.client_id", &self.spotify.client_id),
            ("spotify.client_secret", &self.spotify.client_secret),
            ("spotify.redirect_uri", &self.spotify.redirect_uri),
            ("spotify.state", &self.spotify.state),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                });
            }
        }

        let urls = [
            ("slack.token_url", self.slack.token_url.as_str()),
            ("spotify.authorize_url", self.spotify.authorize_url.as_str()),
            ("spotify.token_url", self.spotify.token_url.as_str()),
            ("spotify.redirect_uri", self.spotify.redirect_uri.as_str()),
        ];
        for (field, value) in urls {
            url::Url::parse(value).map_err(|e| ConfigError::Invalid {
                message: format!("{field} is not a valid URL ({value}): {e}"),
            })?;
        }
        if let Some(uri) = &self.slack.redirect_uri {
            url::Url::parse(uri).map_err(|e| ConfigError::Invalid {
                message: format!("slack.redirect_uri is not a valid URL ({uri}): {e}"),
            })?;
        }

        if self.session.ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "session.ttl_secs must be greater than zero".to_string(),
            });
        }
        if matches!(self.session.signing_secret.as_deref(), Some("")) {
            return Err(ConfigError::Invalid {
                message: "session.signing_secret must not be empty".to_string(),
            });
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "http.timeout_secs must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Copy with every secret masked, for display.
    pub fn redacted(&self) -> Self {
        fn mask(value: &str) -> String {
            if value.is_empty() {
                String::new()
            } else {
                REDACTED.to_string()
            }
        }

        let mut config = self.clone();
        config.slack.client_secret = mask(&config.slack.client_secret);
        config.spotify.client_secret = mask(&config.spotify.client_secret);
        config.spotify.state = mask(&config.spotify.state);
        config.session.signing_secret = config.session.signing_secret.as_deref().map(mask);
        config
    }
}

/// Path of the user-level config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "tunelink", "tunelink")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `TUNELINK_`, nested with `__`)
/// 2. `explicit` config file, or `./tunelink.toml` when none is given
/// 3. User config (`~/.config/tunelink/config.toml`)
/// 4. Built-in defaults
///
/// An explicit path that does not exist is an error; the implicit files are
/// simply skipped when absent. The result is not validated.
pub fn load_config(explicit: Option<&Path>) -> Result<TunelinkConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(TunelinkConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            let local = Path::new(LOCAL_CONFIG_FILE);
            if local.exists() {
                figment = figment.merge(Toml::file(local));
            }
        }
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    figment
        .extract()
        .map_err(|e| ConfigError::Parse(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn valid_config() -> TunelinkConfig {
        let mut config = TunelinkConfig::default();
        config.slack.client_id = "123.456".into();
        config.slack.client_secret = "slack-secret".into();
        config.spotify.client_id = "spotify-id".into();
        config.spotify.client_secret = "spotify-secret".into();
        config.spotify.redirect_uri = "http://localhost:8080/spotify/callback".into();
        config.spotify.state = "fixed-state".into();
        config
    }

    #[test]
    fn test_default_config() {
        let config = TunelinkConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.session.ttl_secs, 3600);
        assert!(config.session.signing_secret.is_none());
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(
            config.slack.token_url,
            "https://slack.com/api/oauth.v2.access"
        );
        assert_eq!(config.spotify.scopes.len(), 2);
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_state() {
        let mut config = valid_config();
        config.spotify.state = String::new();
        match config.validate().unwrap_err() {
            ConfigError::MissingField { field } => assert_eq!(field, "spotify.state"),
            other => panic!("Expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_bad_url() {
        let mut config = valid_config();
        config.slack.token_url = "not a url".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_validate_zero_ttl() {
        let mut config = valid_config();
        config.session.ttl_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_redacted_masks_secrets() {
        let mut config = valid_config();
        config.session.signing_secret = Some("k".into());
        let redacted = config.redacted();
        assert_eq!(redacted.slack.client_secret, REDACTED);
        assert_eq!(redacted.spotify.client_secret, REDACTED);
        assert_eq!(redacted.spotify.state, REDACTED);
        assert_eq!(redacted.session.signing_secret.as_deref(), Some(REDACTED));
        assert_eq!(redacted.slack.client_id, "123.456");
    }

    #[test]
    fn test_store_backend_serde() {
        let json = serde_json::to_string(&StoreBackend::Memory).unwrap();
        assert_eq!(json, "\"memory\"");
        let parsed: StoreBackend = serde_json::from_str("\"sqlite\"").unwrap();
        assert_eq!(parsed, StoreBackend::Sqlite);
    }

    #[test]
    fn test_load_config_defaults() {
        Jail::expect_with(|_jail| {
            let config = load_config(None).expect("defaults should load");
            assert_eq!(config.server.port, 8080);
            Ok(())
        });
    }

    #[test]
    fn test_load_config_from_local_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                LOCAL_CONFIG_FILE,
                r#"
                [server]
                port = 9000

                [slack]
                client_id = "from-file"

                [spotify]
                state = "file-state"
                scopes = ["user-read-private"]
                "#,
            )?;
            let config = load_config(None).expect("local file should load");
            assert_eq!(config.server.port, 9000);
            assert_eq!(config.slack.client_id, "from-file");
            assert_eq!(config.spotify.state, "file-state");
            assert_eq!(config.spotify.scopes, vec!["user-read-private".to_string()]);
            // Untouched sections keep their defaults.
            assert_eq!(config.session.ttl_secs, 3600);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[slack]\nclient_secret = \"file\"\n")?;
            jail.set_env("TUNELINK_SLACK__CLIENT_SECRET", "env");
            jail.set_env("TUNELINK_STORE__BACKEND", "memory");
            let config = load_config(Some(Path::new("custom.toml"))).expect("should load");
            assert_eq!(config.slack.client_secret, "env");
            assert_eq!(config.store.backend, StoreBackend::Memory);
            Ok(())
        });
    }

    #[test]
    fn test_explicit_missing_file() {
        Jail::expect_with(|_jail| {
            let err = load_config(Some(Path::new("missing.toml"))).unwrap_err();
            assert!(matches!(err, ConfigError::FileNotFound { .. }));
            Ok(())
        });
    }
}
