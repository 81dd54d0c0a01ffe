//! SQLite entry storage
//!
//! One row per fragment. Timestamps are stored as unix seconds, so every
//! value read back has whole-second precision.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::EntryStorage;
use crate::models::{Entry, SourceKind};
use crate::utils::error::StorageError;

const SELECT_COLUMNS: &str = "id, language, title, url, updated, published, created, updated_at, \
                              summary, content, author, number, resource_id, chunk";

/// SQLite implementation of [`EntryStorage`]
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite storage initialized");
        Ok(storage)
    }

    /// Create in-memory storage (for testing and dry runs)
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.create_schema()?;
        Ok(storage)
    }

    fn create_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS feed_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    language TEXT NOT NULL,
                    title TEXT NOT NULL,
                    url TEXT NOT NULL,
                    updated INTEGER,
                    published INTEGER,
                    created INTEGER,
                    updated_at INTEGER,
                    summary TEXT NOT NULL DEFAULT '',
                    content TEXT NOT NULL DEFAULT '',
                    author TEXT NOT NULL DEFAULT '',
                    number TEXT NOT NULL DEFAULT '',
                    resource_id INTEGER NOT NULL,
                    chunk INTEGER NOT NULL,
                    UNIQUE (url, chunk)
                );

                CREATE INDEX IF NOT EXISTS idx_feed_entries_url
                    ON feed_entries(url);

                CREATE INDEX IF NOT EXISTS idx_feed_entries_resource
                    ON feed_entries(resource_id);
                "#,
        )
        .context("Failed to create SQLite schema")?;

        Ok(())
    }

    /// Number of stored fragments
    pub fn count(&self) -> Result<usize, StorageError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM feed_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

#[async_trait]
impl EntryStorage for SqliteStorage {
    async fn find_fragments_by_url(&self, url: &str) -> Result<Vec<Entry>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SELECT_COLUMNS} FROM feed_entries WHERE url = ?1 ORDER BY chunk ASC"
        ))?;

        let rows = stmt.query_map(params![url], row_to_entry)?;
        let entries = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    async fn insert(&self, entry: &Entry) -> Result<i64, StorageError> {
        let conn = self.conn()?;
        let result = conn.execute(
            r#"
            INSERT INTO feed_entries
                (language, title, url, updated, published, created, updated_at,
                 summary, content, author, number, resource_id, chunk)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                entry.language,
                entry.title,
                entry.url,
                to_unix(entry.updated),
                to_unix(entry.published),
                to_unix(entry.created),
                to_unix(entry.updated_at),
                entry.summary,
                entry.content,
                entry.author,
                entry.number,
                entry.source.resource_id(),
                entry.chunk,
            ],
        );

        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StorageError::Conflict {
                    url: entry.url.clone(),
                    chunk: entry.chunk,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, entry: &Entry) -> Result<(), StorageError> {
        let id = entry
            .id
            .ok_or_else(|| StorageError::MissingId(entry.url.clone()))?;

        let conn = self.conn()?;
        let changed = conn.execute(
            r#"
            UPDATE feed_entries SET
                language = ?1, title = ?2, url = ?3, updated = ?4, published = ?5,
                created = ?6, updated_at = ?7, summary = ?8, content = ?9,
                author = ?10, number = ?11, resource_id = ?12, chunk = ?13
            WHERE id = ?14
            "#,
            params![
                entry.language,
                entry.title,
                entry.url,
                to_unix(entry.updated),
                to_unix(entry.published),
                to_unix(entry.created),
                to_unix(entry.updated_at),
                entry.summary,
                entry.content,
                entry.author,
                entry.number,
                entry.source.resource_id(),
                entry.chunk,
                id,
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::NotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM feed_entries WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StorageError::NotFound(id));
        }
        Ok(())
    }
}

fn to_unix(ts: Option<DateTime<Utc>>) -> Option<i64> {
    ts.map(|t| t.timestamp())
}

fn from_unix(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let resource_id: u32 = row.get(12)?;
    Ok(Entry {
        id: Some(row.get(0)?),
        language: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        updated: from_unix(row.get(4)?),
        published: from_unix(row.get(5)?),
        created: from_unix(row.get(6)?),
        updated_at: from_unix(row.get(7)?),
        summary: row.get(8)?,
        content: row.get(9)?,
        author: row.get(10)?,
        number: row.get(11)?,
        source: SourceKind::from_resource_id(resource_id).unwrap_or_default(),
        chunk: row.get(13)?,
    })
}
