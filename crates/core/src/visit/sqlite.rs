//! SQLite-backed visit store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{VisitError, VisitRecord, VisitStore};

/// SQLite-backed visit store.
pub struct SqliteVisitStore {
    conn: Mutex<Connection>,
}

impl SqliteVisitStore {
    /// Create a new SQLite visit store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, VisitError> {
        let conn = Connection::open(path).map_err(|e| VisitError::Database(e.to_string()))?;
        // Several stores share one database file
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| VisitError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite visit store (useful for testing).
    pub fn in_memory() -> Result<Self, VisitError> {
        let conn = Connection::open_in_memory().map_err(|e| VisitError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), VisitError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS visit_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                visiting INTEGER NOT NULL DEFAULT 0,
                scraped INTEGER NOT NULL DEFAULT 0,
                file INTEGER NOT NULL DEFAULT 0,
                error TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_visit_records_scraped ON visit_records(scraped);
            "#,
        )
        .map_err(|e| VisitError::Database(e.to_string()))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, VisitError> {
        self.conn
            .lock()
            .map_err(|_| VisitError::Database("connection lock poisoned".to_string()))
    }

    /// Upsert one row; `sql` must bind (url, created_at, updated_at[, extra]).
    fn upsert(&self, sql: &str, url: &str, extra: Option<&str>) -> Result<(), VisitError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.lock()?;

        let changed = match extra {
            Some(value) => conn.execute(sql, params![url, now, now, value]),
            None => conn.execute(sql, params![url, now, now]),
        }
        .map_err(|e| VisitError::Database(e.to_string()))?;

        tracing::trace!(url, changed, "visit upsert");
        Ok(())
    }
}

impl VisitStore for SqliteVisitStore {
    fn mark_visiting(&self, url: &str) -> Result<(), VisitError> {
        self.upsert(
            "INSERT INTO visit_records (url, visiting, created_at, updated_at)
             VALUES (?1, 1, ?2, ?3)
             ON CONFLICT(url) DO UPDATE SET visiting = 1, updated_at = excluded.updated_at
             WHERE visit_records.visiting != 1",
            url,
            None,
        )
    }

    fn mark_scraped(&self, url: &str) -> Result<(), VisitError> {
        self.upsert(
            "INSERT INTO visit_records (url, scraped, created_at, updated_at)
             VALUES (?1, 1, ?2, ?3)
             ON CONFLICT(url) DO UPDATE SET scraped = 1, updated_at = excluded.updated_at
             WHERE visit_records.scraped != 1",
            url,
            None,
        )
    }

    fn mark_file(&self, url: &str) -> Result<(), VisitError> {
        self.upsert(
            "INSERT INTO visit_records (url, file, scraped, created_at, updated_at)
             VALUES (?1, 1, 1, ?2, ?3)
             ON CONFLICT(url) DO UPDATE SET file = 1, scraped = 1, updated_at = excluded.updated_at
             WHERE visit_records.file != 1 OR visit_records.scraped != 1",
            url,
            None,
        )
    }

    fn mark_error(&self, url: &str, error: &str) -> Result<(), VisitError> {
        self.upsert(
            "INSERT INTO visit_records (url, error, created_at, updated_at)
             VALUES (?1, ?4, ?2, ?3)
             ON CONFLICT(url) DO UPDATE SET error = excluded.error, updated_at = excluded.updated_at
             WHERE visit_records.error != excluded.error",
            url,
            Some(error),
        )
    }

    fn is_scraped(&self, url: &str) -> Result<bool, VisitError> {
        let conn = self.lock()?;

        let scraped: Option<bool> = conn
            .query_row(
                "SELECT scraped FROM visit_records WHERE url = ?",
                params![url],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| VisitError::Database(e.to_string()))?;

        Ok(scraped.unwrap_or(false))
    }

    fn get(&self, url: &str) -> Result<Option<VisitRecord>, VisitError> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT url, visiting, scraped, file, error FROM visit_records WHERE url = ?",
            params![url],
            |row| {
                Ok(VisitRecord {
                    url: row.get(0)?,
                    visiting: row.get(1)?,
                    scraped: row.get(2)?,
                    file: row.get(3)?,
                    error: row.get(4)?,
                })
            },
        )
        .optional()
        .map_err(|e| VisitError::Database(e.to_string()))
    }

    fn scraped_count(&self) -> Result<usize, VisitError> {
        let conn = self.lock()?;

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM visit_records WHERE scraped = 1",
                [],
                |row| row.get(0),
            )
            .map_err(|e| VisitError::Database(e.to_string()))?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://example.com/thread-1";

    fn create_test_store() -> SqliteVisitStore {
        SqliteVisitStore::in_memory().unwrap()
    }

    #[test]
    fn test_unknown_url() {
        let store = create_test_store();
        assert!(!store.is_scraped(URL).unwrap());
        assert!(store.get(URL).unwrap().is_none());
    }

    #[test]
    fn test_mark_visiting_then_scraped() {
        let store = create_test_store();

        store.mark_visiting(URL).unwrap();
        let record = store.get(URL).unwrap().unwrap();
        assert!(record.visiting);
        assert!(!record.scraped);

        store.mark_scraped(URL).unwrap();
        let record = store.get(URL).unwrap().unwrap();
        assert!(record.visiting);
        assert!(record.scraped);
        assert!(store.is_scraped(URL).unwrap());
    }

    #[test]
    fn test_scraped_is_monotonic() {
        let store = create_test_store();

        store.mark_scraped(URL).unwrap();
        store.mark_visiting(URL).unwrap();
        store.mark_error(URL, "connection reset").unwrap();

        assert!(store.is_scraped(URL).unwrap());
    }

    #[test]
    fn test_marks_are_idempotent() {
        let store = create_test_store();

        for _ in 0..3 {
            store.mark_visiting(URL).unwrap();
            store.mark_scraped(URL).unwrap();
        }

        assert_eq!(store.scraped_count().unwrap(), 1);
    }

    #[test]
    fn test_mark_file_counts_as_scraped() {
        let store = create_test_store();

        store.mark_visiting(URL).unwrap();
        store.mark_file(URL).unwrap();

        let record = store.get(URL).unwrap().unwrap();
        assert!(record.file);
        assert!(record.scraped);
    }

    #[test]
    fn test_mark_error_keeps_latest() {
        let store = create_test_store();

        store.mark_error(URL, "first").unwrap();
        store.mark_error(URL, "second").unwrap();

        let record = store.get(URL).unwrap().unwrap();
        assert_eq!(record.error, "second");
        assert!(!record.scraped);
    }

    #[test]
    fn test_urls_are_independent() {
        let store = create_test_store();

        store.mark_scraped("http://example.com/a").unwrap();
        assert!(!store.is_scraped("http://example.com/b").unwrap());
    }
}
