//! reqwest-backed fetcher.

use async_trait::async_trait;
use reqwest::Client;

use super::{FetchError, FetchRequest, FetchResponse, Fetcher};

/// Fetcher using a shared reqwest client.
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Request(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

fn map_error(e: reqwest::Error, url: &str) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(url.to_string())
    } else if e.is_connect() {
        FetchError::ConnectionFailed(e.to_string())
    } else {
        FetchError::Request(e.to_string())
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let mut builder = self.client.get(&request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let mut response = builder
            .send()
            .await
            .map_err(|e| map_error(e, &request.url))?;

        let url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        if let Some(len) = response.content_length() {
            if len as usize > request.max_body_size {
                return Err(FetchError::BodyTooLarge {
                    limit: request.max_body_size,
                    url,
                });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| map_error(e, &request.url))?
        {
            if body.len() + chunk.len() > request.max_body_size {
                return Err(FetchError::BodyTooLarge {
                    limit: request.max_body_size,
                    url,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchResponse {
            url,
            status,
            headers,
            body,
        })
    }
}
