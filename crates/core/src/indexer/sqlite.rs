//! SQLite-backed content indexer.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    parse_torrent, ContentIndexer, IndexError, IndexOptions, IndexTorrentStat, MetaFileRecord,
    TorrentFileRecord, TorrentRecord,
};
use crate::extract::ExtractedFile;

/// SQLite-backed content indexer.
pub struct SqliteContentIndexer {
    conn: Mutex<Connection>,
}

impl SqliteContentIndexer {
    /// Create a new SQLite indexer, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, IndexError> {
        let conn = Connection::open(path).map_err(|e| IndexError::Database(e.to_string()))?;
        // Several stores share one database file
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| IndexError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite indexer (useful for testing).
    pub fn in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory().map_err(|e| IndexError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), IndexError> {
        conn.execute_batch(
            r#"
            -- Raw .torrent files (one row per unique byte content)
            CREATE TABLE IF NOT EXISTS meta_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_hash TEXT NOT NULL UNIQUE,
                torrent_hash TEXT NOT NULL,
                filename TEXT NOT NULL,
                raw TEXT NOT NULL,
                size INTEGER NOT NULL,
                source_url TEXT,
                announce TEXT,
                created_by TEXT,
                comment TEXT,
                encoding TEXT,
                creation_date INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_meta_files_torrent_hash ON meta_files(torrent_hash);

            -- Torrents (one row per info hash)
            CREATE TABLE IF NOT EXISTS torrents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hash TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                total_file_size INTEGER NOT NULL,
                file_count INTEGER NOT NULL,
                piece_count INTEGER NOT NULL,
                is_dir INTEGER NOT NULL,
                info_bytes BLOB NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_torrents_name ON torrents(name);

            -- Files declared inside torrents
            CREATE TABLE IF NOT EXISTS torrent_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                torrent_hash TEXT NOT NULL,
                path TEXT NOT NULL,
                size INTEGER NOT NULL,
                filename TEXT NOT NULL,
                ext TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(torrent_hash, path)
            );

            CREATE INDEX IF NOT EXISTS idx_torrent_files_ext ON torrent_files(ext);
            "#,
        )
        .map_err(|e| IndexError::Database(e.to_string()))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, IndexError> {
        self.conn
            .lock()
            .map_err(|_| IndexError::Database("connection lock poisoned".to_string()))
    }
}

impl ContentIndexer for SqliteContentIndexer {
    fn index_torrent(
        &self,
        file: &ExtractedFile,
        options: &IndexOptions,
    ) -> Result<IndexTorrentStat, IndexError> {
        // Parse fully before touching the database
        let torrent = parse_torrent(&file.data)?;
        let now = Utc::now().to_rfc3339();
        let source_url = Some(file.url.as_str()).filter(|u| !u.is_empty());

        let mut stat = IndexTorrentStat::default();
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| IndexError::Database(e.to_string()))?;

        let inserted = tx
            .execute(
                "INSERT INTO meta_files (content_hash, torrent_hash, filename, raw, size, source_url,
                    announce, created_by, comment, encoding, creation_date, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(content_hash) DO NOTHING",
                params![
                    torrent.content_hash,
                    torrent.info_hash,
                    file.name(),
                    torrent.meta_json,
                    file.data.len() as i64,
                    source_url,
                    torrent.announce,
                    torrent.created_by,
                    torrent.comment,
                    torrent.encoding,
                    torrent.creation_date,
                    now,
                    now,
                ],
            )
            .map_err(|e| IndexError::Database(e.to_string()))?;

        if inserted > 0 {
            stat.meta_count += 1;
            stat.meta_size += file.data.len() as u64;
        } else if !options.force {
            tx.commit()
                .map_err(|e| IndexError::Database(e.to_string()))?;
            tracing::trace!(hash = %torrent.content_hash, "meta file already indexed");
            return Ok(stat);
        }

        let inserted = tx
            .execute(
                "INSERT INTO torrents (hash, name, total_file_size, file_count, piece_count, is_dir,
                    info_bytes, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(hash) DO NOTHING",
                params![
                    torrent.info_hash,
                    torrent.name,
                    torrent.total_file_size() as i64,
                    torrent.files.len() as i64,
                    torrent.piece_count as i64,
                    torrent.is_dir,
                    torrent.info_bytes,
                    now,
                    now,
                ],
            )
            .map_err(|e| IndexError::Database(e.to_string()))?;

        if inserted > 0 {
            stat.torrent_count += 1;
        } else if !options.force {
            tx.commit()
                .map_err(|e| IndexError::Database(e.to_string()))?;
            tracing::trace!(hash = %torrent.info_hash, "torrent already indexed");
            return Ok(stat);
        }

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO torrent_files (torrent_hash, path, size, filename, ext, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT(torrent_hash, path) DO NOTHING",
                )
                .map_err(|e| IndexError::Database(e.to_string()))?;

            for entry in &torrent.files {
                let inserted = stmt
                    .execute(params![
                        torrent.info_hash,
                        entry.path,
                        entry.size as i64,
                        entry.filename(),
                        entry.ext(),
                        now,
                        now,
                    ])
                    .map_err(|e| IndexError::Database(e.to_string()))?;
                if inserted > 0 {
                    stat.torrent_file_count += 1;
                    stat.torrent_file_total_size += entry.size;
                }
            }
        }

        tx.commit()
            .map_err(|e| IndexError::Database(e.to_string()))?;

        tracing::debug!(
            hash = %torrent.info_hash,
            name = %torrent.name,
            files = stat.torrent_file_count,
            "indexed torrent"
        );
        Ok(stat)
    }

    fn stat(&self) -> Result<IndexTorrentStat, IndexError> {
        let conn = self.lock()?;

        let (meta_count, meta_size): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM meta_files",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| IndexError::Database(e.to_string()))?;

        let torrent_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM torrents", [], |row| row.get(0))
            .map_err(|e| IndexError::Database(e.to_string()))?;

        let (file_count, file_size): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM torrent_files",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| IndexError::Database(e.to_string()))?;

        Ok(IndexTorrentStat {
            meta_count: meta_count as u64,
            meta_size: meta_size as u64,
            torrent_count: torrent_count as u64,
            torrent_file_count: file_count as u64,
            torrent_file_total_size: file_size as u64,
        })
    }

    fn get_torrent(&self, hash: &str) -> Result<Option<TorrentRecord>, IndexError> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT hash, name, total_file_size, file_count, piece_count, is_dir
             FROM torrents WHERE hash = ?",
            params![hash],
            |row| {
                Ok(TorrentRecord {
                    hash: row.get(0)?,
                    name: row.get(1)?,
                    total_file_size: row.get::<_, i64>(2)? as u64,
                    file_count: row.get::<_, i64>(3)? as u64,
                    piece_count: row.get::<_, i64>(4)? as u64,
                    is_dir: row.get(5)?,
                })
            },
        )
        .optional()
        .map_err(|e| IndexError::Database(e.to_string()))
    }

    fn list_torrent_files(&self, hash: &str) -> Result<Vec<TorrentFileRecord>, IndexError> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(
                "SELECT torrent_hash, path, size, filename, ext
                 FROM torrent_files WHERE torrent_hash = ? ORDER BY path",
            )
            .map_err(|e| IndexError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![hash], |row| {
                Ok(TorrentFileRecord {
                    torrent_hash: row.get(0)?,
                    path: row.get(1)?,
                    size: row.get::<_, i64>(2)? as u64,
                    filename: row.get(3)?,
                    ext: row.get(4)?,
                })
            })
            .map_err(|e| IndexError::Database(e.to_string()))?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row.map_err(|e| IndexError::Database(e.to_string()))?);
        }
        Ok(files)
    }

    fn get_meta_file(&self, content_hash: &str) -> Result<Option<MetaFileRecord>, IndexError> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT content_hash, torrent_hash, filename, size, source_url, announce, created_by, comment
             FROM meta_files WHERE content_hash = ?",
            params![content_hash],
            |row| {
                Ok(MetaFileRecord {
                    content_hash: row.get(0)?,
                    torrent_hash: row.get(1)?,
                    filename: row.get(2)?,
                    size: row.get::<_, i64>(3)? as u64,
                    source_url: row.get(4)?,
                    announce: row.get(5)?,
                    created_by: row.get(6)?,
                    comment: row.get(7)?,
                })
            },
        )
        .optional()
        .map_err(|e| IndexError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::torrent_parser::content_hash;
    use crate::indexer::IndexError;
    use crate::testing::fixtures;

    const MIB: u64 = 1024 * 1024;

    fn create_test_indexer() -> SqliteContentIndexer {
        SqliteContentIndexer::in_memory().unwrap()
    }

    fn pack() -> ExtractedFile {
        let data = fixtures::torrent_bytes(
            "pack",
            &[("a.mkv", 300 * MIB), ("b.mkv", 300 * MIB), ("c.mkv", 300 * MIB)],
        );
        ExtractedFile::new("pack.torrent", data, "http://example.com/attach-1")
    }

    #[test]
    fn test_index_new_torrent() {
        let indexer = create_test_indexer();
        let file = pack();

        let stat = indexer.index_torrent(&file, &IndexOptions::default()).unwrap();
        assert_eq!(stat.meta_count, 1);
        assert_eq!(stat.meta_size, file.data.len() as u64);
        assert_eq!(stat.torrent_count, 1);
        assert_eq!(stat.torrent_file_count, 3);
        assert_eq!(stat.torrent_file_total_size, 900 * MIB);

        let meta = indexer
            .get_meta_file(&content_hash(&file.data))
            .unwrap()
            .unwrap();
        assert_eq!(meta.filename, "pack.torrent");
        assert_eq!(meta.source_url.as_deref(), Some("http://example.com/attach-1"));

        let torrent = indexer.get_torrent(&meta.torrent_hash).unwrap().unwrap();
        assert_eq!(torrent.name, "pack");
        assert_eq!(torrent.file_count, 3);
        assert_eq!(torrent.total_file_size, 900 * MIB);
        assert!(torrent.is_dir);

        let files = indexer.list_torrent_files(&torrent.hash).unwrap();
        assert_eq!(files.len(), 3);
        assert_eq!(files[0].filename, "a.mkv");
        assert_eq!(files[0].ext, ".mkv");
    }

    #[test]
    fn test_index_twice_is_idempotent() {
        let indexer = create_test_indexer();
        let file = pack();

        indexer.index_torrent(&file, &IndexOptions::default()).unwrap();
        let before = indexer.stat().unwrap();

        let second = indexer.index_torrent(&file, &IndexOptions::default()).unwrap();
        assert!(second.is_empty());
        assert_eq!(second, IndexTorrentStat::default());
        assert_eq!(indexer.stat().unwrap(), before);
    }

    #[test]
    fn test_force_reindex_inserts_nothing_new() {
        let indexer = create_test_indexer();
        let file = pack();

        indexer.index_torrent(&file, &IndexOptions::default()).unwrap();
        let stat = indexer
            .index_torrent(&file, &IndexOptions { force: true })
            .unwrap();
        assert!(stat.is_empty());
        assert_eq!(indexer.stat().unwrap().torrent_file_count, 3);
    }

    #[test]
    fn test_same_info_different_bytes_collapses_torrent() {
        let indexer = create_test_indexer();
        let files = [("a.bin", 10), ("b.bin", 20)];
        let first = ExtractedFile::new("one.torrent", fixtures::torrent_bytes("x", &files), "");
        let second = ExtractedFile::new(
            "two.torrent",
            fixtures::torrent_bytes_with_comment("x", &files, "mirror"),
            "",
        );

        indexer.index_torrent(&first, &IndexOptions::default()).unwrap();
        let stat = indexer.index_torrent(&second, &IndexOptions::default()).unwrap();

        assert_eq!(stat.meta_count, 1);
        assert_eq!(stat.torrent_count, 0);
        assert_eq!(stat.torrent_file_count, 0);

        let totals = indexer.stat().unwrap();
        assert_eq!(totals.meta_count, 2);
        assert_eq!(totals.torrent_count, 1);
        assert_eq!(totals.torrent_file_count, 2);
    }

    #[test]
    fn test_empty_source_url_stored_as_null() {
        let indexer = create_test_indexer();
        let file = ExtractedFile::new("x.torrent", fixtures::torrent_bytes("x", &[("a", 1)]), "");

        indexer.index_torrent(&file, &IndexOptions::default()).unwrap();
        let meta = indexer
            .get_meta_file(&content_hash(&file.data))
            .unwrap()
            .unwrap();
        assert!(meta.source_url.is_none());
    }

    #[test]
    fn test_parse_error_writes_nothing() {
        let indexer = create_test_indexer();
        let file = ExtractedFile::new("bad.torrent", b"d8:announce3:url".to_vec(), "");

        let result = indexer.index_torrent(&file, &IndexOptions::default());
        assert!(matches!(result, Err(IndexError::Parse(_))));
        assert_eq!(indexer.stat().unwrap(), IndexTorrentStat::default());
    }
}
