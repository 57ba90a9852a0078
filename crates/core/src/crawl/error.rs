use thiserror::Error;

use crate::extract::HandlerError;
use crate::fetch::FetchError;
use crate::frontier::FrontierError;
use crate::indexer::IndexError;
use crate::scraper::ScraperError;
use crate::visit::VisitError;

/// Errors raised while processing one crawl request.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// Raised by the extraction pipeline, which has already logged and counted it.
    #[error("Handler error: {0}")]
    Handler(HandlerError),

    /// The error that stopped a session running in fatal mode.
    #[error("Crawl stopped: {0}")]
    Fatal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CrawlError {
    /// Stage label used for metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            CrawlError::Fetch(_) => "fetch",
            CrawlError::Parse(_) => "parse",
            CrawlError::Storage(_) => "storage",
            CrawlError::Handler(e) => e.stage(),
            CrawlError::Fatal(_) | CrawlError::Config(_) => "session",
        }
    }

    pub fn is_storage(&self) -> bool {
        match self {
            CrawlError::Storage(_) => true,
            CrawlError::Handler(e) => e.is_storage(),
            _ => false,
        }
    }
}

impl From<HandlerError> for CrawlError {
    fn from(e: HandlerError) -> Self {
        CrawlError::Handler(e)
    }
}

impl From<FrontierError> for CrawlError {
    fn from(e: FrontierError) -> Self {
        match e {
            FrontierError::InvalidPayload(msg) => CrawlError::Parse(msg),
            FrontierError::Database(msg) => CrawlError::Storage(msg),
        }
    }
}

impl From<VisitError> for CrawlError {
    fn from(e: VisitError) -> Self {
        match e {
            VisitError::Database(msg) => CrawlError::Storage(msg),
        }
    }
}

impl From<IndexError> for CrawlError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::Parse(e) => CrawlError::Parse(e.to_string()),
            IndexError::Database(msg) => CrawlError::Storage(msg),
        }
    }
}

impl From<ScraperError> for CrawlError {
    fn from(e: ScraperError) -> Self {
        CrawlError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_classification() {
        let err: CrawlError = FrontierError::Database("locked".to_string()).into();
        assert!(err.is_storage());
        assert_eq!(err.stage(), "storage");

        let err: CrawlError = FrontierError::InvalidPayload("bad".to_string()).into();
        assert!(!err.is_storage());
        assert_eq!(err.stage(), "parse");

        let err: CrawlError = HandlerError::Index(IndexError::Database("x".to_string())).into();
        assert!(err.is_storage());
        assert_eq!(err.stage(), "storage");
    }

    #[test]
    fn test_fetch_stage() {
        let err: CrawlError = FetchError::Status {
            status: 500,
            url: "http://a.com/".to_string(),
        }
        .into();
        assert_eq!(err.stage(), "fetch");
        assert!(err.to_string().contains("HTTP 500"));
    }
}
