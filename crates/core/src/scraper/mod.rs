//! Site adapters.
//!
//! A [`Scraper`] decides whether it supports a crawl session (usually by
//! matching the seed host), configures the session's [`Collector`] and
//! installs link-discovery and response-detection hooks on it. Scrapers are
//! registered on an explicit [`ScraperRegistry`] value owned by the caller.

mod collector;
mod disposition;
mod forum;
mod rules;

pub use collector::{Collector, CollectorConfig, Link, LinkHook, ResponseHook, ResponseKind};
pub use disposition::{filename_from_disposition, filename_from_url};
pub use forum::ForumScraper;
pub use rules::{classify, LinkRule, PathPattern};

use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::config::CrawlConfig;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Scraper {name} failed to set up: {reason}")]
    Setup { name: String, reason: String },
}

/// What a scraper sees of the session it is asked to support.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub seed: Url,
    pub config: CrawlConfig,
}

impl SessionContext {
    pub fn seed_host(&self) -> &str {
        self.seed.host_str().unwrap_or_default()
    }
}

/// A site adapter.
pub trait Scraper: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this scraper applies to the session.
    fn supports(&self, ctx: &SessionContext) -> bool;

    /// Adjust fetch parameters before the collector is built.
    fn init_collector(
        &self,
        ctx: &SessionContext,
        config: &mut CollectorConfig,
    ) -> Result<(), ScraperError>;

    /// Install hooks on the built collector.
    fn setup_collector(
        &self,
        ctx: &SessionContext,
        collector: &mut Collector,
    ) -> Result<(), ScraperError>;
}

/// The scrapers available to crawl sessions.
#[derive(Clone, Default)]
pub struct ScraperRegistry {
    scrapers: Vec<Arc<dyn Scraper>>,
}

impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, scraper: Arc<dyn Scraper>) {
        tracing::debug!(name = scraper.name(), "register scraper");
        self.scrapers.push(scraper);
    }

    pub fn scrapers(&self) -> &[Arc<dyn Scraper>] {
        &self.scrapers
    }

    /// Scrapers whose `supports` accepts the session, in registration order.
    pub fn supporting(&self, ctx: &SessionContext) -> Vec<Arc<dyn Scraper>> {
        self.scrapers
            .iter()
            .filter(|s| s.supports(ctx))
            .cloned()
            .collect()
    }

    /// Build the session collector from every supporting scraper.
    pub fn build_collector(&self, ctx: &SessionContext) -> Result<Collector, ScraperError> {
        let active = self.supporting(ctx);
        if active.is_empty() {
            tracing::warn!(seed = %ctx.seed, "no scraper supports the seed");
        }

        let mut config = CollectorConfig::default();
        for scraper in &active {
            scraper.init_collector(ctx, &mut config)?;
        }

        let mut collector = Collector::new(config);
        for scraper in &active {
            scraper.setup_collector(ctx, &mut collector)?;
            tracing::info!(name = scraper.name(), "scraper active");
        }

        Ok(collector)
    }

    pub fn len(&self) -> usize {
        self.scrapers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scrapers.is_empty()
    }
}
