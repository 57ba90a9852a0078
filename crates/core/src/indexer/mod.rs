//! Content-addressed torrent index.
//!
//! Three levels are stored, each deduplicated independently:
//! - meta files, keyed by the sha256 of the raw .torrent bytes
//! - torrents, keyed by the BitTorrent info hash
//! - torrent files, keyed by (info hash, path)

mod sqlite;
pub mod torrent_parser;
mod types;

pub use sqlite::SqliteContentIndexer;
pub use torrent_parser::{parse_torrent, ParsedTorrent, TorrentParseError};
pub use types::*;

use thiserror::Error;

use crate::extract::ExtractedFile;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Parse error: {0}")]
    Parse(#[from] TorrentParseError),

    #[error("Database error: {0}")]
    Database(String),
}

/// Trait for torrent index backends.
pub trait ContentIndexer: Send + Sync {
    /// Index one .torrent file.
    ///
    /// Returns the number of rows inserted at each level. A byte-identical
    /// file that was indexed before returns an empty stat unless `force` is set.
    fn index_torrent(
        &self,
        file: &ExtractedFile,
        options: &IndexOptions,
    ) -> Result<IndexTorrentStat, IndexError>;

    /// Totals across everything indexed.
    fn stat(&self) -> Result<IndexTorrentStat, IndexError>;

    fn get_torrent(&self, hash: &str) -> Result<Option<TorrentRecord>, IndexError>;

    fn list_torrent_files(&self, hash: &str) -> Result<Vec<TorrentFileRecord>, IndexError>;

    fn get_meta_file(&self, content_hash: &str) -> Result<Option<MetaFileRecord>, IndexError>;
}
