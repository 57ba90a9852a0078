use serde::{Deserialize, Serialize};
use url::Url;

use super::FrontierError;

/// A pending crawl request, serialized as the frontier's opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub url: String,
    #[serde(default)]
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
}

impl CrawlRequest {
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
            referer: None,
            headers: Vec::new(),
        }
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn encode(&self) -> Result<Vec<u8>, FrontierError> {
        serde_json::to_vec(self).map_err(|e| FrontierError::InvalidPayload(e.to_string()))
    }

    pub fn decode(payload: &[u8]) -> Result<Self, FrontierError> {
        serde_json::from_slice(payload).map_err(|e| FrontierError::InvalidPayload(e.to_string()))
    }
}

/// Canonical form used as the frontier's dedup key (fragment dropped).
pub fn normalize_url(raw: &str) -> Result<String, FrontierError> {
    let mut url =
        Url::parse(raw).map_err(|e| FrontierError::InvalidPayload(format!("{}: {}", raw, e)))?;
    url.set_fragment(None);
    Ok(url.to_string())
}
