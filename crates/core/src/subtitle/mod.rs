//! Subtitle file index.
//!
//! Subtitle bodies are stored once per content hash; every (file name, URL)
//! it was seen under is kept as a reference.

mod sqlite;

pub use sqlite::SqliteSubtitleIndexer;

use serde::Serialize;
use thiserror::Error;

use crate::extract::ExtractedFile;

#[derive(Debug, Error)]
pub enum SubtitleError {
    #[error("Database error: {0}")]
    Database(String),
}

/// Rows inserted by one call, or table totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SubtitleStat {
    pub content_count: u64,
    pub ref_count: u64,
}

pub trait SubtitleIndexer: Send + Sync {
    fn index_subtitle(&self, file: &ExtractedFile) -> Result<SubtitleStat, SubtitleError>;

    fn stat(&self) -> Result<SubtitleStat, SubtitleError>;
}
