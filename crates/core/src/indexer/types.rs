use serde::{Deserialize, Serialize};

/// Options for [`ContentIndexer::index_torrent`](super::ContentIndexer::index_torrent).
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    /// Keep going past rows that already exist instead of returning early.
    pub force: bool,
}

/// Row counts written by one indexing call, or table totals from `stat()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTorrentStat {
    pub meta_count: u64,
    pub meta_size: u64,
    pub torrent_count: u64,
    pub torrent_file_count: u64,
    pub torrent_file_total_size: u64,
}

impl IndexTorrentStat {
    /// True when nothing was inserted.
    pub fn is_empty(&self) -> bool {
        self.meta_count == 0 && self.torrent_count == 0 && self.torrent_file_count == 0
    }
}

/// A stored torrent (one per info hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentRecord {
    pub hash: String,
    pub name: String,
    pub total_file_size: u64,
    pub file_count: u64,
    pub piece_count: u64,
    pub is_dir: bool,
}

/// A stored file entry of a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentFileRecord {
    pub torrent_hash: String,
    pub path: String,
    pub size: u64,
    pub filename: String,
    pub ext: String,
}

/// A stored .torrent source file (one per content hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaFileRecord {
    pub content_hash: String,
    pub torrent_hash: String,
    pub filename: String,
    pub size: u64,
    pub source_url: Option<String>,
    pub announce: Option<String>,
    pub created_by: Option<String>,
    pub comment: Option<String>,
}
