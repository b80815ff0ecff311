//! SQLite store for fetched API responses, keyed by a hash of the request URL.

use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Response cache. Each row remembers which epoch and endpoint it answered,
/// so an epoch can be re-verified offline.
pub struct Cache {
    conn: Mutex<Connection>,
}

impl Cache {
    /// Open or create the cache at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS responses (
                key TEXT PRIMARY KEY,
                epoch INTEGER NOT NULL,
                endpoint TEXT NOT NULL,
                body TEXT NOT NULL,
                created_utc INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_responses_epoch ON responses(epoch);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// SHA-256 hex of the request identifier.
    pub fn key_for(request: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|e| CacheError::Io(std::io::Error::other(e.to_string())))
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT body FROM responses WHERE key = ?1")?;
        let row = stmt
            .query_row([key], |r| r.get::<_, String>(0))
            .optional()?;
        Ok(row)
    }

    /// Insert or replace the response body for `key`.
    pub fn put(
        &self,
        key: &str,
        epoch: u64,
        endpoint: &str,
        body: &str,
    ) -> Result<(), CacheError> {
        let created = time::OffsetDateTime::now_utc().unix_timestamp();
        let epoch = i64::try_from(epoch).unwrap_or(i64::MAX);
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO responses (key, epoch, endpoint, body, created_utc) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![key, epoch, endpoint, body, created],
        )?;
        Ok(())
    }

    /// Endpoints cached for `epoch`, sorted.
    pub fn endpoints_for_epoch(&self, epoch: u64) -> Result<Vec<String>, CacheError> {
        let epoch = i64::try_from(epoch).unwrap_or(i64::MAX);
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT endpoint FROM responses WHERE epoch = ?1 ORDER BY endpoint")?;
        let rows = stmt.query_map([epoch], |r| r.get::<_, String>(0))?;
        let endpoints = rows.collect::<Result<Vec<String>, _>>()?;
        Ok(endpoints)
    }
}
