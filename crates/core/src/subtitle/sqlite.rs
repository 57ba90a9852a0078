//! SQLite-backed subtitle indexer.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection};

use super::{SubtitleError, SubtitleIndexer, SubtitleStat};
use crate::extract::ExtractedFile;
use crate::indexer::torrent_parser::{content_hash, file_ext};

pub struct SqliteSubtitleIndexer {
    conn: Mutex<Connection>,
}

impl SqliteSubtitleIndexer {
    pub fn new(path: &Path) -> Result<Self, SubtitleError> {
        let conn = Connection::open(path).map_err(|e| SubtitleError::Database(e.to_string()))?;
        // Several stores share one database file
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| SubtitleError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, SubtitleError> {
        let conn =
            Connection::open_in_memory().map_err(|e| SubtitleError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), SubtitleError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS subtitle_contents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hash TEXT NOT NULL UNIQUE,
                ext TEXT NOT NULL,
                size INTEGER NOT NULL,
                raw_bytes BLOB NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS subtitle_refs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_hash TEXT NOT NULL,
                filename TEXT NOT NULL,
                url TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(content_hash, filename, url)
            );

            CREATE INDEX IF NOT EXISTS idx_subtitle_refs_filename ON subtitle_refs(filename);
            "#,
        )
        .map_err(|e| SubtitleError::Database(e.to_string()))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SubtitleError> {
        self.conn
            .lock()
            .map_err(|_| SubtitleError::Database("connection lock poisoned".to_string()))
    }
}

impl SubtitleIndexer for SqliteSubtitleIndexer {
    fn index_subtitle(&self, file: &ExtractedFile) -> Result<SubtitleStat, SubtitleError> {
        let hash = content_hash(&file.data);
        let now = Utc::now().to_rfc3339();
        let filename = file.name();

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| SubtitleError::Database(e.to_string()))?;

        let contents = tx
            .execute(
                "INSERT INTO subtitle_contents (hash, ext, size, raw_bytes, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(hash) DO NOTHING",
                params![
                    hash,
                    file_ext(filename),
                    file.data.len() as i64,
                    file.data,
                    now,
                    now
                ],
            )
            .map_err(|e| SubtitleError::Database(e.to_string()))?;

        let refs = tx
            .execute(
                "INSERT INTO subtitle_refs (content_hash, filename, url, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(content_hash, filename, url) DO NOTHING",
                params![hash, filename, file.url, now, now],
            )
            .map_err(|e| SubtitleError::Database(e.to_string()))?;

        tx.commit()
            .map_err(|e| SubtitleError::Database(e.to_string()))?;

        tracing::debug!(file = filename, hash = %hash, new = contents > 0, "indexed subtitle");
        Ok(SubtitleStat {
            content_count: contents as u64,
            ref_count: refs as u64,
        })
    }

    fn stat(&self) -> Result<SubtitleStat, SubtitleError> {
        let conn = self.lock()?;

        let content_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM subtitle_contents", [], |row| {
                row.get(0)
            })
            .map_err(|e| SubtitleError::Database(e.to_string()))?;
        let ref_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM subtitle_refs", [], |row| row.get(0))
            .map_err(|e| SubtitleError::Database(e.to_string()))?;

        Ok(SubtitleStat {
            content_count: content_count as u64,
            ref_count: ref_count as u64,
        })
    }
}
