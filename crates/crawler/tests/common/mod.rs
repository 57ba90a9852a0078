//! Common test utilities for the status API.
//!
//! Builds an in-process router over a crawl session backed by in-memory
//! stores and a mock fetcher, so routes can be exercised without a network.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use torrenti_core::scraper::ForumScraper;
use torrenti_core::testing::MockFetcher;
use torrenti_core::{
    CrawlConfig, CrawlSession, ScraperRegistry, SqliteContentIndexer, SqliteFrontier,
    SqliteSubtitleIndexer, SqliteVisitStore, SubtitleIndexer,
};

/// Re-export fixtures for test convenience
pub use torrenti_core::testing::fixtures;

pub const SEED: &str = "http://example.com/thread-1";

/// In-process status server over a mock-backed crawl session.
pub struct TestFixture {
    pub router: Router,
    pub session: Arc<CrawlSession>,
    pub fetcher: Arc<MockFetcher>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    pub fn new() -> Self {
        let mut config = CrawlConfig::new(SEED);
        config.concurrency = Some(1);
        config.idle_poll_ms = 10;

        let mut registry = ScraperRegistry::new();
        registry.register(Arc::new(
            ForumScraper::from_config(fixtures::forum_site("example.com"))
                .expect("Failed to build site adapter"),
        ));

        let fetcher = Arc::new(MockFetcher::new());
        let subtitles: Arc<dyn SubtitleIndexer> = Arc::new(
            SqliteSubtitleIndexer::in_memory().expect("Failed to create subtitle indexer"),
        );

        let session = CrawlSession::builder(config)
            .frontier(Arc::new(
                SqliteFrontier::in_memory().expect("Failed to create frontier"),
            ))
            .visits(Arc::new(
                SqliteVisitStore::in_memory().expect("Failed to create visit store"),
            ))
            .indexer(Arc::new(
                SqliteContentIndexer::in_memory().expect("Failed to create indexer"),
            ))
            .subtitles(Arc::clone(&subtitles))
            .fetcher(fetcher.clone())
            .build(&registry)
            .expect("Failed to build session");
        session.seed().expect("Failed to queue seed");

        let state = Arc::new(torrenti_crawler::state::AppState::new(
            Arc::clone(&session),
            Some(subtitles),
        ));
        let router = torrenti_crawler::api::create_router(state);

        Self {
            router,
            session,
            fetcher,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}
