//! Namespaced key-value cache persisted in a SQLite file.
//!
//! One cache file stands for one embedding origin. Every key is prefixed with
//! the namespace given at open time (default `pin-comments:`), so independent
//! instances can share a file without colliding.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::error::CacheError;
use crate::types::{BackendConfig, Comment, Mode};

/// Default namespace prefix for cache keys.
pub const DEFAULT_PREFIX: &str = "pin-comments:";

pub const KEY_BACKEND_CONFIG: &str = "backend-config";
pub const KEY_MODE: &str = "mode";
pub const KEY_COMMENTS: &str = "comments-cache";
pub const KEY_USER_NAME: &str = "user-name";

/// Handle to the local cache. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct LocalCache {
    conn: Connection,
    prefix: String,
}

impl std::fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl LocalCache {
    /// Opens (or creates) the cache file at `path`, configures WAL mode, and
    /// applies schema migrations.
    ///
    /// `busy_timeout` is set through the `Connection` method rather than a
    /// PRAGMA string so it takes effect regardless of pragma caching.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Sqlite` if the file cannot be opened, WAL
    /// configuration fails, or schema DDL fails.
    pub async fn open(path: impl AsRef<Path>, prefix: &str) -> Result<Self, CacheError> {
        let conn = Connection::open(path.as_ref()).await?;

        conn.call(|db| -> rusqlite::Result<()> {
            db.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;",
            )?;
            db.busy_timeout(Duration::from_secs(5))?;
            crate::schema::migrate(db)
        })
        .await?;

        Ok(Self { conn, prefix: prefix.to_owned() })
    }

    /// Opens a throwaway cache that lives as long as the handle.
    pub async fn open_in_memory(prefix: &str) -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory().await?;
        conn.call(|db| -> rusqlite::Result<()> { crate::schema::migrate(db) })
            .await?;
        Ok(Self { conn, prefix: prefix.to_owned() })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Reads the raw value stored under `name` in this namespace.
    pub async fn get(&self, name: &str) -> Result<Option<String>, CacheError> {
        let key = self.key(name);
        let value = self
            .conn
            .call(move |db| -> rusqlite::Result<Option<String>> {
                db.query_row(
                    "SELECT value FROM cache_entries WHERE key = ?1",
                    rusqlite::params![&key],
                    |r| r.get(0),
                )
                .optional()
            })
            .await?;
        Ok(value)
    }

    /// Writes `value` under `name`, replacing any previous value.
    pub async fn set(&self, name: &str, value: String) -> Result<(), CacheError> {
        let key = self.key(name);
        self.conn
            .call(move |db| -> rusqlite::Result<()> {
                db.execute(
                    "INSERT INTO cache_entries (key, value, updated_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(key)
                     DO UPDATE SET value = excluded.value,
                                   updated_at = excluded.updated_at",
                    rusqlite::params![&key, &value, now_secs()],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Deletes `name` from this namespace. Missing keys are not an error.
    pub async fn remove(&self, name: &str) -> Result<(), CacheError> {
        let key = self.key(name);
        self.conn
            .call(move |db| -> rusqlite::Result<()> {
                db.execute(
                    "DELETE FROM cache_entries WHERE key = ?1",
                    rusqlite::params![&key],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<Option<T>, CacheError> {
        match self.get(name).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| CacheError::Json { key: self.key(name), source }),
            None => Ok(None),
        }
    }

    async fn set_json<T: serde::Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value)
            .map_err(|source| CacheError::Json { key: self.key(name), source })?;
        self.set(name, raw).await
    }

    /// Full comment set across all pages. Empty when nothing was cached yet.
    pub async fn load_comments(&self) -> Result<Vec<Comment>, CacheError> {
        Ok(self.get_json(KEY_COMMENTS).await?.unwrap_or_default())
    }

    /// Overwrites the cached comment set.
    pub async fn save_comments(&self, comments: &[Comment]) -> Result<(), CacheError> {
        self.set_json(KEY_COMMENTS, comments).await
    }

    pub async fn load_backend_config(&self) -> Result<Option<BackendConfig>, CacheError> {
        self.get_json(KEY_BACKEND_CONFIG).await
    }

    pub async fn save_backend_config(&self, config: &BackendConfig) -> Result<(), CacheError> {
        self.set_json(KEY_BACKEND_CONFIG, config).await
    }

    /// Persisted mode flag. Unknown values read as absent.
    pub async fn load_mode(&self) -> Result<Option<Mode>, CacheError> {
        Ok(self.get(KEY_MODE).await?.as_deref().and_then(Mode::parse))
    }

    pub async fn save_mode(&self, mode: Mode) -> Result<(), CacheError> {
        self.set(KEY_MODE, mode.as_str().to_owned()).await
    }

    /// Forgets the backend config and mode flag so setup runs again.
    pub async fn clear_setup(&self) -> Result<(), CacheError> {
        self.remove(KEY_BACKEND_CONFIG).await?;
        self.remove(KEY_MODE).await
    }

    pub async fn load_user_name(&self) -> Result<Option<String>, CacheError> {
        Ok(self.get(KEY_USER_NAME).await?.filter(|n| !n.is_empty()))
    }

    pub async fn save_user_name(&self, name: &str) -> Result<(), CacheError> {
        self.set(KEY_USER_NAME, name.to_owned()).await
    }

    pub async fn clear_user_name(&self) -> Result<(), CacheError> {
        self.remove(KEY_USER_NAME).await
    }
}

/// Returns the current Unix timestamp in seconds.
fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
