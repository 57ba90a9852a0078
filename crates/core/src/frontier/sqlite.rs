//! SQLite-backed crawl frontier.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{normalize_url, CrawlRequest, Frontier, FrontierError};

/// SQLite-backed frontier.
pub struct SqliteFrontier {
    conn: Mutex<Connection>,
}

impl SqliteFrontier {
    /// Create a new SQLite frontier, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, FrontierError> {
        let conn = Connection::open(path).map_err(|e| FrontierError::Database(e.to_string()))?;
        // Several stores share one database file
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| FrontierError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite frontier (useful for testing).
    pub fn in_memory() -> Result<Self, FrontierError> {
        let conn =
            Connection::open_in_memory().map_err(|e| FrontierError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), FrontierError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS queue_requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                depth INTEGER NOT NULL DEFAULT 0,
                referer TEXT,
                raw BLOB NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_queue_requests_referer ON queue_requests(referer);

            -- Every URL ever accepted, so popped URLs are not queued again
            CREATE TABLE IF NOT EXISTS queue_history (
                url TEXT PRIMARY KEY,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| FrontierError::Database(e.to_string()))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, FrontierError> {
        self.conn
            .lock()
            .map_err(|_| FrontierError::Database("connection lock poisoned".to_string()))
    }

    /// Parse a payload and rewrite it with its normalized URL.
    fn prepare(payload: &[u8]) -> Result<(CrawlRequest, Vec<u8>), FrontierError> {
        let mut request = CrawlRequest::decode(payload)?;
        request.url = normalize_url(&request.url)?;
        let raw = request.encode()?;
        Ok((request, raw))
    }

    fn insert_pending(
        conn: &Connection,
        request: &CrawlRequest,
        raw: &[u8],
        now: &str,
    ) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO queue_requests (url, depth, referer, raw, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(url) DO NOTHING",
            params![request.url, request.depth, request.referer, raw, now, now],
        )
    }
}

impl Frontier for SqliteFrontier {
    fn add_request(&self, payload: &[u8]) -> Result<bool, FrontierError> {
        let (request, raw) = Self::prepare(payload)?;
        let now = Utc::now().to_rfc3339();

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| FrontierError::Database(e.to_string()))?;

        let accepted = tx
            .execute(
                "INSERT INTO queue_history (url, created_at) VALUES (?, ?)
                 ON CONFLICT(url) DO NOTHING",
                params![request.url, now],
            )
            .map_err(|e| FrontierError::Database(e.to_string()))?;

        let inserted = if accepted > 0 {
            Self::insert_pending(&tx, &request, &raw, &now)
                .map_err(|e| FrontierError::Database(e.to_string()))?
        } else {
            0
        };

        tx.commit()
            .map_err(|e| FrontierError::Database(e.to_string()))?;

        tracing::debug!(url = %request.url, added = inserted > 0, "add request");
        Ok(inserted > 0)
    }

    fn requeue(&self, payload: &[u8]) -> Result<bool, FrontierError> {
        let (request, raw) = Self::prepare(payload)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO queue_history (url, created_at) VALUES (?, ?)
             ON CONFLICT(url) DO NOTHING",
            params![request.url, now],
        )
        .map_err(|e| FrontierError::Database(e.to_string()))?;

        let inserted = Self::insert_pending(&conn, &request, &raw, &now)
            .map_err(|e| FrontierError::Database(e.to_string()))?;

        tracing::debug!(url = %request.url, added = inserted > 0, "requeue request");
        Ok(inserted > 0)
    }

    fn get_request(&self) -> Result<Option<Vec<u8>>, FrontierError> {
        let conn = self.lock()?;

        conn.query_row(
            "DELETE FROM queue_requests
             WHERE id = (SELECT id FROM queue_requests ORDER BY id LIMIT 1)
             RETURNING raw",
            [],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()
        .map_err(|e| FrontierError::Database(e.to_string()))
    }

    fn queue_size(&self) -> Result<usize, FrontierError> {
        let conn = self.lock()?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM queue_requests", [], |row| row.get(0))
            .map_err(|e| FrontierError::Database(e.to_string()))?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn payload(url: &str, depth: u32) -> Vec<u8> {
        CrawlRequest::new(url, depth).encode().unwrap()
    }

    fn drain(frontier: &SqliteFrontier) -> Vec<CrawlRequest> {
        let mut out = Vec::new();
        while let Some(raw) = frontier.get_request().unwrap() {
            out.push(CrawlRequest::decode(&raw).unwrap());
        }
        out
    }

    #[test]
    fn test_add_and_get_request() {
        let frontier = SqliteFrontier::in_memory().unwrap();
        let request = CrawlRequest::new("http://example.com/thread-1", 2)
            .with_referer("http://example.com/");

        assert!(frontier.add_request(&request.encode().unwrap()).unwrap());
        assert_eq!(frontier.queue_size().unwrap(), 1);

        let popped = CrawlRequest::decode(&frontier.get_request().unwrap().unwrap()).unwrap();
        assert_eq!(popped, request);
        assert_eq!(frontier.queue_size().unwrap(), 0);
    }

    #[test]
    fn test_get_request_empty() {
        let frontier = SqliteFrontier::in_memory().unwrap();
        assert!(frontier.get_request().unwrap().is_none());
    }

    #[test]
    fn test_duplicate_url_delivered_once() {
        let frontier = SqliteFrontier::in_memory().unwrap();

        assert!(frontier.add_request(&payload("http://example.com/a", 1)).unwrap());
        assert!(!frontier.add_request(&payload("http://example.com/a", 3)).unwrap());
        assert!(!frontier.add_request(&payload("http://example.com/a#top", 1)).unwrap());

        let delivered = drain(&frontier);
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].depth, 1);
    }

    #[test]
    fn test_popped_url_not_added_again() {
        let frontier = SqliteFrontier::in_memory().unwrap();

        frontier.add_request(&payload("http://example.com/a", 0)).unwrap();
        assert!(frontier.get_request().unwrap().is_some());

        assert!(!frontier.add_request(&payload("http://example.com/a", 0)).unwrap());
        assert!(frontier.get_request().unwrap().is_none());
    }

    #[test]
    fn test_requeue_bypasses_history() {
        let frontier = SqliteFrontier::in_memory().unwrap();

        frontier.add_request(&payload("http://example.com/", 0)).unwrap();
        frontier.get_request().unwrap();

        assert!(frontier.requeue(&payload("http://example.com/", 0)).unwrap());
        // Still unique while pending
        assert!(!frontier.requeue(&payload("http://example.com/", 0)).unwrap());
        assert_eq!(drain(&frontier).len(), 1);
    }

    #[test]
    fn test_insertion_order() {
        let frontier = SqliteFrontier::in_memory().unwrap();
        for i in 0..3 {
            frontier
                .add_request(&payload(&format!("http://example.com/{}", i), 0))
                .unwrap();
        }

        let urls: Vec<_> = drain(&frontier).into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![
                "http://example.com/0",
                "http://example.com/1",
                "http://example.com/2"
            ]
        );
    }

    #[test]
    fn test_invalid_payload() {
        let frontier = SqliteFrontier::in_memory().unwrap();
        assert!(matches!(
            frontier.add_request(b"{}"),
            Err(FrontierError::InvalidPayload(_))
        ));
        assert!(matches!(
            frontier.add_request(&payload("not a url", 0)),
            Err(FrontierError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_concurrent_pops_deliver_once() {
        let frontier = Arc::new(SqliteFrontier::in_memory().unwrap());
        for i in 0..50 {
            frontier
                .add_request(&payload(&format!("http://example.com/{}", i), 0))
                .unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let frontier = Arc::clone(&frontier);
                std::thread::spawn(move || {
                    let mut urls = Vec::new();
                    while let Some(raw) = frontier.get_request().unwrap() {
                        urls.push(CrawlRequest::decode(&raw).unwrap().url);
                    }
                    urls
                })
            })
            .collect();

        let mut all: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 50);
    }

    #[test]
    fn test_file_based_frontier_persists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("frontier.db");

        {
            let frontier = SqliteFrontier::new(&db_path).unwrap();
            frontier.add_request(&payload("http://example.com/a", 0)).unwrap();
        }

        let frontier = SqliteFrontier::new(&db_path).unwrap();
        assert_eq!(frontier.queue_size().unwrap(), 1);
    }
}
