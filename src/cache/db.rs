//! Upload cache trait and SQLite implementation.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension};

use super::error::CacheError;
use super::schema;

/// Aggregate view of the cache, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
    pub entries: u64,
    pub newest_upload: Option<DateTime<Utc>>,
}

/// String-keyed persistent store for `content hash → remote URL` entries.
///
/// Object-safe so it can be shared as `Arc<dyn UploadCache>` across
/// concurrent mutations and replaced with an in-memory double under test.
#[async_trait]
pub trait UploadCache: Send + Sync {
    /// Look up the remote URL a previous upload of this content produced.
    async fn get(&self, hash: &str) -> Result<Option<String>, CacheError>;

    /// Record `hash → url` after a successful upload, replacing any previous
    /// entry for the same hash.
    async fn put(&self, hash: &str, url: &str) -> Result<(), CacheError>;

    /// Wipe every entry. Returns the number of entries removed.
    async fn clear(&self) -> Result<u64, CacheError>;

    /// Entry count and newest upload time.
    async fn status(&self) -> Result<CacheStatus, CacheError>;
}

/// SQLite implementation of the upload cache.
pub struct SqliteUploadCache {
    /// Wrapped in Mutex because rusqlite::Connection is not Sync. Guards are
    /// always dropped before any await point.
    conn: Mutex<Connection>,
    /// Path to the database file (for error messages).
    path: PathBuf,
}

impl std::fmt::Debug for SqliteUploadCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteUploadCache")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteUploadCache {
    /// Open or create a cache database at the given path.
    pub async fn open(path: &Path) -> Result<Self, CacheError> {
        let path = path.to_path_buf();
        let path_clone = path.clone();

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path_clone).map_err(|e| CacheError::Open {
                path: path_clone.clone(),
                source: e,
            })?;

            // WAL keeps concurrent mutations from serializing on the journal.
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(CacheError::Migration)?;

            schema::migrate(&conn)?;

            Ok::<_, CacheError>(conn)
        })
        .await??;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Open an in-memory cache (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory().map_err(|e| CacheError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }
}

#[async_trait]
impl UploadCache for SqliteUploadCache {
    async fn get(&self, hash: &str) -> Result<Option<String>, CacheError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CacheError::Query(e.to_string()))?;

        conn.query_row(
            "SELECT remote_url FROM uploads WHERE content_hash = ?1",
            [hash],
            |row| row.get(0),
        )
        .optional()
        .map_err(CacheError::query)
    }

    async fn put(&self, hash: &str, url: &str) -> Result<(), CacheError> {
        let uploaded_at = Utc::now().timestamp();

        let conn = self
            .conn
            .lock()
            .map_err(|e| CacheError::Query(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO uploads (content_hash, remote_url, uploaded_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(content_hash) DO UPDATE SET
                remote_url = excluded.remote_url,
                uploaded_at = excluded.uploaded_at
            "#,
            rusqlite::params![hash, url, uploaded_at],
        )
        .map_err(CacheError::query)?;

        Ok(())
    }

    async fn clear(&self) -> Result<u64, CacheError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CacheError::Query(e.to_string()))?;

        let rows = conn
            .execute("DELETE FROM uploads", [])
            .map_err(CacheError::query)?;

        Ok(rows as u64)
    }

    async fn status(&self) -> Result<CacheStatus, CacheError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| CacheError::Query(e.to_string()))?;

        let (entries, newest): (i64, Option<i64>) = conn
            .query_row(
                "SELECT COUNT(*), MAX(uploaded_at) FROM uploads",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(CacheError::query)?;

        Ok(CacheStatus {
            entries: entries as u64,
            newest_upload: newest.and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        })
    }
}
