//! Per-URL crawl state.
//!
//! A URL moves from unvisited to visiting to scraped. `file` and `error` are
//! side flags. Every mark is a conditional upsert, so marks are idempotent and
//! `scraped` never goes back to false.

mod sqlite;

pub use sqlite::SqliteVisitStore;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisitError {
    #[error("Database error: {0}")]
    Database(String),
}

/// Stored state for one URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VisitRecord {
    pub url: String,
    pub visiting: bool,
    pub scraped: bool,
    pub file: bool,
    pub error: String,
}

/// Trait for visit-state storage backends.
pub trait VisitStore: Send + Sync {
    fn mark_visiting(&self, url: &str) -> Result<(), VisitError>;

    /// Mark a page as fully processed. Never reset afterwards.
    fn mark_scraped(&self, url: &str) -> Result<(), VisitError>;

    /// Mark a URL as a file download. Downloads count as scraped.
    fn mark_file(&self, url: &str) -> Result<(), VisitError>;

    /// Record the last error seen for a URL. Does not block future visits.
    fn mark_error(&self, url: &str, error: &str) -> Result<(), VisitError>;

    fn is_scraped(&self, url: &str) -> Result<bool, VisitError>;

    fn get(&self, url: &str) -> Result<Option<VisitRecord>, VisitError>;

    /// Number of URLs with `scraped` set.
    fn scraped_count(&self) -> Result<usize, VisitError>;
}
