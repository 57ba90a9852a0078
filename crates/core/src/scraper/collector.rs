use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::crawl::{CrawlError, CrawlSession};
use crate::extract::ExtractedFile;
use crate::fetch::FetchResponse;
use crate::frontier::CrawlRequest;

/// Fetch parameters of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    /// Hosts requests may go to; empty allows every host.
    pub allowed_domains: Vec<String>,
    pub timeout: Duration,
    pub max_body_size: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            allowed_domains: Vec::new(),
            timeout: Duration::from_secs(30),
            max_body_size: 20 * 1024 * 1024,
        }
    }
}

/// An anchor found on a fetched page.
#[derive(Debug, Clone, Copy)]
pub struct Link<'a> {
    /// The raw `href` attribute.
    pub href: &'a str,
    /// `href` resolved against the page URL.
    pub url: &'a Url,
    /// The page the anchor was found on.
    pub page: &'a Url,
    pub request: &'a CrawlRequest,
}

/// How a response hook classified a response.
#[derive(Debug)]
pub enum ResponseKind {
    Page,
    File(ExtractedFile),
}

pub type LinkHook = Arc<dyn Fn(&CrawlSession, &Link<'_>) -> Result<(), CrawlError> + Send + Sync>;

pub type ResponseHook = Arc<
    dyn Fn(&CrawlSession, &CrawlRequest, &FetchResponse) -> Result<ResponseKind, CrawlError>
        + Send
        + Sync,
>;

/// Fetch configuration plus the hooks installed by active scrapers.
#[derive(Clone, Default)]
pub struct Collector {
    config: CollectorConfig,
    link_hooks: Vec<LinkHook>,
    response_hooks: Vec<ResponseHook>,
}

impl Collector {
    pub fn new(config: CollectorConfig) -> Self {
        Self {
            config,
            link_hooks: Vec::new(),
            response_hooks: Vec::new(),
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Called for every http(s) anchor on every HTML page.
    pub fn on_link<F>(&mut self, hook: F)
    where
        F: Fn(&CrawlSession, &Link<'_>) -> Result<(), CrawlError> + Send + Sync + 'static,
    {
        self.link_hooks.push(Arc::new(hook));
    }

    /// Called for every successful response; the first hook returning
    /// [`ResponseKind::File`] wins.
    pub fn on_response<F>(&mut self, hook: F)
    where
        F: Fn(&CrawlSession, &CrawlRequest, &FetchResponse) -> Result<ResponseKind, CrawlError>
            + Send
            + Sync
            + 'static,
    {
        self.response_hooks.push(Arc::new(hook));
    }

    pub fn link_hooks(&self) -> &[LinkHook] {
        &self.link_hooks
    }

    pub fn response_hooks(&self) -> &[ResponseHook] {
        &self.response_hooks
    }

    /// Whether a URL's host is one of the allowed domains (or a subdomain).
    pub fn is_allowed(&self, url: &Url) -> bool {
        if self.config.allowed_domains.is_empty() {
            return true;
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        self.config.allowed_domains.iter().any(|domain| {
            host.eq_ignore_ascii_case(domain)
                || host
                    .to_ascii_lowercase()
                    .ends_with(&format!(".{}", domain.to_ascii_lowercase()))
        })
    }
}
