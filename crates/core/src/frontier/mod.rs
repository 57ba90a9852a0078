//! Durable crawl frontier.
//!
//! Pending requests are stored as opaque payloads keyed by normalized URL.
//! Popping a request deletes it, so every successful pop delivers a URL at
//! most once.

mod sqlite;
mod types;

pub use sqlite::SqliteFrontier;
pub use types::{normalize_url, CrawlRequest};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("Invalid request payload: {0}")]
    InvalidPayload(String),

    #[error("Database error: {0}")]
    Database(String),
}

/// Trait for frontier storage backends.
pub trait Frontier: Send + Sync {
    /// Enqueue a serialized [`CrawlRequest`].
    ///
    /// Returns `false` when the URL is pending or was accepted before.
    fn add_request(&self, payload: &[u8]) -> Result<bool, FrontierError>;

    /// Enqueue a request even if its URL was accepted before (still unique while pending).
    fn requeue(&self, payload: &[u8]) -> Result<bool, FrontierError>;

    /// Remove and return one pending payload, or `None` when the frontier is empty.
    fn get_request(&self) -> Result<Option<Vec<u8>>, FrontierError>;

    /// Number of pending requests.
    fn queue_size(&self) -> Result<usize, FrontierError>;
}
