//! User link storage.
//!
//! Provides a trait-based abstraction over the store with two implementations:
//! - `SqliteUserLinkStore`: a `user_links` table in a local SQLite database.
//! - `InMemoryUserLinkStore`: process-local map, for tests and throwaway runs.
//!
//! The handshake only ever calls [`UserLinkStore::upsert`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::StoreError;
use crate::types::UserLinkRecord;

/// Insert-or-update of completed links, keyed by Slack user ID.
#[async_trait]
pub trait UserLinkStore: Send + Sync {
    async fn upsert(&self, record: UserLinkRecord) -> Result<(), StoreError>;
}

/// Open the store selected by `config.backend`.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn UserLinkStore>, StoreError> {
    match config.backend {
        StoreBackend::Sqlite => Ok(Arc::new(SqliteUserLinkStore::open(&config.database_path)?)),
        StoreBackend::Memory => Ok(Arc::new(InMemoryUserLinkStore::new())),
    }
}

/// In-memory store.
///
/// Thread-safe via `Mutex<HashMap>`. Does not persist across process restarts.
pub struct InMemoryUserLinkStore {
    links: Mutex<HashMap<String, UserLinkRecord>>,
    upserts: AtomicUsize,
}

impl InMemoryUserLinkStore {
    pub fn new() -> Self {
        Self {
            links: Mutex::new(HashMap::new()),
            upserts: AtomicUsize::new(0),
        }
    }

    /// The stored link for a Slack user, if any.
    pub fn get(&self, chat_user_id: &str) -> Option<UserLinkRecord> {
        self.links
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(chat_user_id)
            .cloned()
    }

    /// Number of distinct linked users.
    pub fn len(&self) -> usize {
        self.links.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `upsert` calls served so far.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryUserLinkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserLinkStore for InMemoryUserLinkStore {
    async fn upsert(&self, record: UserLinkRecord) -> Result<(), StoreError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.links
            .lock()
            .map_err(|e| StoreError::WriteFailed {
                message: e.to_string(),
            })?
            .insert(record.chat_user_id.clone(), record);
        Ok(())
    }
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS user_links (
    slack_user_id         TEXT PRIMARY KEY,
    slack_access_token    TEXT NOT NULL,
    spotify_access_token  TEXT NOT NULL,
    spotify_refresh_token TEXT NOT NULL,
    spotify_expiry        TEXT,
    spotify_token_type    TEXT NOT NULL,
    updated_at            TEXT NOT NULL
)";

const UPSERT: &str = "INSERT INTO user_links (
    slack_user_id, slack_access_token, spotify_access_token,
    spotify_refresh_token, spotify_expiry, spotify_token_type, updated_at
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
ON CONFLICT(slack_user_id) DO UPDATE SET
    slack_access_token    = excluded.slack_access_token,
    spotify_access_token  = excluded.spotify_access_token,
    spotify_refresh_token = excluded.spotify_refresh_token,
    spotify_expiry        = excluded.spotify_expiry,
    spotify_token_type    = excluded.spotify_token_type,
    updated_at            = excluded.updated_at";

const SELECT: &str = "SELECT slack_user_id, slack_access_token, spotify_access_token,
    spotify_refresh_token, spotify_expiry, spotify_token_type
FROM user_links WHERE slack_user_id = ?1";

/// SQLite-backed store.
///
/// The connection sits behind a mutex and every query runs on the blocking
/// thread pool.
pub struct SqliteUserLinkStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserLinkStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Open {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        }
        let conn = Connection::open(path).map_err(|e| StoreError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let store = Self::with_connection(conn, path)?;
        info!(path = %path.display(), "Opened SQLite user link store");
        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open {
            path: PathBuf::from(":memory:"),
            message: e.to_string(),
        })?;
        Self::with_connection(conn, Path::new(":memory:"))
    }

    fn with_connection(conn: Connection, path: &Path) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(|e| StoreError::Open {
            path: path.to_path_buf(),
            message: format!("Failed to create schema: {e}"),
        })?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// The stored link for a Slack user, if any.
    pub async fn find(&self, chat_user_id: &str) -> Result<Option<UserLinkRecord>, StoreError> {
        let conn = Arc::clone(&self.conn);
        let id = chat_user_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| StoreError::ReadFailed {
                message: e.to_string(),
            })?;
            let row = conn
                .query_row(SELECT, params![id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })
                .optional()
                .map_err(|e| StoreError::ReadFailed {
                    message: e.to_string(),
                })?;

            let Some((user, chat_token, access, refresh, expiry, token_type)) = row else {
                return Ok(None);
            };
            let music_expiry = expiry
                .map(|s| {
                    DateTime::parse_from_rfc3339(&s)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(|e| StoreError::ReadFailed {
                            message: format!("Invalid spotify_expiry '{s}': {e}"),
                        })
                })
                .transpose()?;

            Ok(Some(UserLinkRecord {
                chat_user_id: user,
                chat_access_token: chat_token,
                music_access_token: access,
                music_refresh_token: refresh,
                music_expiry,
                music_token_type: token_type,
            }))
        })
        .await
        .map_err(|e| StoreError::Task {
            message: e.to_string(),
        })?
    }
}

#[async_trait]
impl UserLinkStore for SqliteUserLinkStore {
    async fn upsert(&self, record: UserLinkRecord) -> Result<(), StoreError> {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| StoreError::WriteFailed {
                message: e.to_string(),
            })?;
            conn.execute(
                UPSERT,
                params![
                    record.chat_user_id,
                    record.chat_access_token,
                    record.music_access_token,
                    record.music_refresh_token,
                    record.music_expiry.map(|dt| dt.to_rfc3339()),
                    record.music_token_type,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::WriteFailed {
                message: e.to_string(),
            })?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Task {
            message: e.to_string(),
        })?
    }
}
