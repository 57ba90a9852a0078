//! Mock fetcher for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::fetch::{FetchError, FetchRequest, FetchResponse, Fetcher};

/// What a route answers with.
#[derive(Debug, Clone)]
enum Route {
    Response(FetchResponse),
    Timeout,
}

/// Mock implementation of the Fetcher trait.
///
/// Serves canned responses keyed by URL and records every request. Unknown
/// URLs answer 404.
///
/// # Example
///
/// ```rust,ignore
/// let fetcher = MockFetcher::new();
/// fetcher.set_html("http://example.com/", "<a href=\"/thread-1\">t</a>").await;
///
/// let response = fetcher.fetch(&FetchRequest::new("http://example.com/")).await?;
/// assert!(response.is_html());
/// assert_eq!(fetcher.requests().await.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockFetcher {
    routes: Arc<RwLock<HashMap<String, Route>>>,
    requests: Arc<RwLock<Vec<FetchRequest>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `response`.
    pub async fn set_response(&self, url: &str, response: FetchResponse) {
        self.routes
            .write()
            .await
            .insert(url.to_string(), Route::Response(response));
    }

    /// Answer `url` with an HTML page.
    pub async fn set_html(&self, url: &str, html: &str) {
        let response = FetchResponse::new(url, 200, html.as_bytes())
            .with_header("content-type", "text/html; charset=utf-8");
        self.set_response(url, response).await;
    }

    /// Answer `url` with an attachment download.
    pub async fn set_attachment(&self, url: &str, filename: &str, body: Vec<u8>) {
        let response = FetchResponse::new(url, 200, body)
            .with_header("content-type", "application/octet-stream")
            .with_header(
                "content-disposition",
                format!("attachment; filename=\"{}\"", filename),
            );
        self.set_response(url, response).await;
    }

    /// Answer `url` with an empty body and the given status.
    pub async fn set_status(&self, url: &str, status: u16) {
        self.set_response(url, FetchResponse::new(url, status, Vec::new()))
            .await;
    }

    /// Make requests to `url` time out.
    pub async fn set_timeout(&self, url: &str) {
        self.routes
            .write()
            .await
            .insert(url.to_string(), Route::Timeout);
    }

    /// Every request received, in order.
    pub async fn requests(&self) -> Vec<FetchRequest> {
        self.requests.read().await.clone()
    }

    /// How many times `url` was requested.
    pub async fn request_count(&self, url: &str) -> usize {
        self.requests
            .read()
            .await
            .iter()
            .filter(|r| r.url == url)
            .count()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        self.requests.write().await.push(request.clone());

        let route = self.routes.read().await.get(&request.url).cloned();
        match route {
            Some(Route::Response(response)) => {
                if response.body.len() > request.max_body_size {
                    return Err(FetchError::BodyTooLarge {
                        limit: request.max_body_size,
                        url: request.url.clone(),
                    });
                }
                Ok(response)
            }
            Some(Route::Timeout) => Err(FetchError::Timeout(request.url.clone())),
            None => Ok(FetchResponse::new(request.url.clone(), 404, b"not found".to_vec())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_routes_and_recording() {
        let fetcher = MockFetcher::new();
        fetcher.set_html("http://a.com/", "<html></html>").await;
        fetcher.set_timeout("http://a.com/slow").await;

        let page = fetcher
            .fetch(&FetchRequest::new("http://a.com/"))
            .await
            .unwrap();
        assert_eq!(page.status, 200);
        assert!(page.is_html());

        let missing = fetcher
            .fetch(&FetchRequest::new("http://a.com/missing"))
            .await
            .unwrap();
        assert_eq!(missing.status, 404);

        let slow = fetcher.fetch(&FetchRequest::new("http://a.com/slow")).await;
        assert!(matches!(slow, Err(FetchError::Timeout(_))));

        assert_eq!(fetcher.requests().await.len(), 3);
        assert_eq!(fetcher.request_count("http://a.com/").await, 1);
    }

    #[tokio::test]
    async fn test_body_limit() {
        let fetcher = MockFetcher::new();
        fetcher
            .set_attachment("http://a.com/f", "f.zip", vec![0u8; 64])
            .await;

        let mut request = FetchRequest::new("http://a.com/f");
        request.max_body_size = 16;
        assert!(matches!(
            fetcher.fetch(&request).await,
            Err(FetchError::BodyTooLarge { limit: 16, .. })
        ));
    }
}
