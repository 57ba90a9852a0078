//! Crawl session: the worker pool that drives one crawl.
//!
//! Each worker pops a request from the frontier, fetches it, runs the active
//! scrapers' response hooks, hands file downloads to the extraction pipeline
//! or discovers links on HTML pages, and records the outcome in the visit
//! store. Workers share nothing but the stores and the [`Stat`] counters.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};
use url::Url;

use super::links::{extract_hrefs, resolve_href};
use super::{CrawlError, Stat, StatSnapshot};
use crate::config::{CrawlConfig, ExtractConfig};
use crate::extract::{ExtensionPolicy, ExtractedFile, ExtractionPipeline};
use crate::fetch::{FetchError, FetchRequest, FetchResponse, Fetcher};
use crate::frontier::{CrawlRequest, Frontier};
use crate::indexer::ContentIndexer;
use crate::metrics;
use crate::scraper::{Collector, Link, ResponseKind, ScraperRegistry, SessionContext};
use crate::subtitle::SubtitleIndexer;
use crate::visit::VisitStore;

/// One crawl over a seed URL.
pub struct CrawlSession {
    config: CrawlConfig,
    context: SessionContext,
    collector: Collector,
    frontier: Arc<dyn Frontier>,
    visits: Arc<dyn VisitStore>,
    indexer: Arc<dyn ContentIndexer>,
    fetcher: Arc<dyn Fetcher>,
    pipeline: Arc<ExtractionPipeline>,
    stat: Arc<Stat>,
    stopped: AtomicBool,
    in_flight: AtomicUsize,
    fatal_error: Mutex<Option<String>>,
}

/// Builder for [`CrawlSession`].
pub struct CrawlSessionBuilder {
    config: CrawlConfig,
    extract: ExtractConfig,
    frontier: Option<Arc<dyn Frontier>>,
    visits: Option<Arc<dyn VisitStore>>,
    indexer: Option<Arc<dyn ContentIndexer>>,
    subtitles: Option<Arc<dyn SubtitleIndexer>>,
    fetcher: Option<Arc<dyn Fetcher>>,
}

impl CrawlSessionBuilder {
    pub fn frontier(mut self, frontier: Arc<dyn Frontier>) -> Self {
        self.frontier = Some(frontier);
        self
    }

    pub fn visits(mut self, visits: Arc<dyn VisitStore>) -> Self {
        self.visits = Some(visits);
        self
    }

    pub fn indexer(mut self, indexer: Arc<dyn ContentIndexer>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    pub fn subtitles(mut self, subtitles: Arc<dyn SubtitleIndexer>) -> Self {
        self.subtitles = Some(subtitles);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn extract(mut self, extract: ExtractConfig) -> Self {
        self.extract = extract;
        self
    }

    /// Activate every supporting scraper in `registry` and build the session.
    pub fn build(self, registry: &ScraperRegistry) -> Result<Arc<CrawlSession>, CrawlError> {
        let missing = |what: &str| CrawlError::Config(format!("crawl session needs a {}", what));
        let frontier = self.frontier.ok_or_else(|| missing("frontier"))?;
        let visits = self.visits.ok_or_else(|| missing("visit store"))?;
        let indexer = self.indexer.ok_or_else(|| missing("content indexer"))?;
        let fetcher = self.fetcher.ok_or_else(|| missing("fetcher"))?;

        let seed = Url::parse(&self.config.seed)
            .map_err(|e| CrawlError::Config(format!("invalid seed {}: {}", self.config.seed, e)))?;
        let context = SessionContext {
            seed,
            config: self.config.clone(),
        };
        let collector = registry.build_collector(&context)?;

        let stat = Arc::new(Stat::new());
        let mut pipeline = ExtractionPipeline::new(Arc::clone(&indexer), Arc::clone(&stat))
            .with_policy(ExtensionPolicy::from_config(&self.extract))
            .with_fatal(self.config.fatal)
            .with_max_entry_size(collector.config().max_body_size as u64);
        if self.extract.subtitles {
            if let Some(subtitles) = self.subtitles {
                pipeline = pipeline.with_subtitles(subtitles);
            }
        }
        if let Some(dir) = &self.config.dump_dir {
            pipeline = pipeline.with_dump_dir(dir);
        }

        Ok(Arc::new(CrawlSession {
            config: self.config,
            context,
            collector,
            frontier,
            visits,
            indexer,
            fetcher,
            pipeline: Arc::new(pipeline),
            stat,
            stopped: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            fatal_error: Mutex::new(None),
        }))
    }
}

impl CrawlSession {
    pub fn builder(config: CrawlConfig) -> CrawlSessionBuilder {
        CrawlSessionBuilder {
            config,
            extract: ExtractConfig::default(),
            frontier: None,
            visits: None,
            indexer: None,
            subtitles: None,
            fetcher: None,
        }
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn stat(&self) -> &Arc<Stat> {
        &self.stat
    }

    pub fn visits(&self) -> &Arc<dyn VisitStore> {
        &self.visits
    }

    pub fn frontier(&self) -> &Arc<dyn Frontier> {
        &self.frontier
    }

    pub fn indexer(&self) -> &Arc<dyn ContentIndexer> {
        &self.indexer
    }

    /// Ask the workers to stop after their current request.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            info!("crawl session stopping");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Queue the seed URL, even if it was fetched by an earlier run.
    pub fn seed(&self) -> Result<bool, CrawlError> {
        let request = CrawlRequest::new(self.config.seed.clone(), 0);
        let queued = self.frontier.requeue(&request.encode()?)?;
        debug!(url = %request.url, queued, "seed");
        Ok(queued)
    }

    /// Queue a discovered link.
    ///
    /// `href` is resolved against the referer's URL. Targets that were already
    /// scraped are counted and skipped. Returns whether the frontier accepted
    /// the request.
    pub fn queue_visit(
        &self,
        href: &str,
        source: &str,
        reason: &str,
        referer: Option<&CrawlRequest>,
    ) -> Result<bool, CrawlError> {
        let resolved = match referer {
            Some(r) => Url::parse(&r.url).ok().and_then(|base| resolve_href(&base, href)),
            None => Url::parse(href).ok().and_then(|u| resolve_href(&u, "")),
        };
        let Some(url) = resolved else {
            trace!(href, src = source, "unresolvable link");
            return Ok(false);
        };

        if !self.collector.is_allowed(&url) {
            trace!(url = %url, src = source, "link outside allowed domains");
            return Ok(false);
        }

        if self.visits.is_scraped(url.as_str())? {
            self.stat.inc_skip_visit();
            metrics::SKIPPED_VISITS_TOTAL.inc();
            trace!(url = %url, reason, "already scraped");
            return Ok(false);
        }

        let mut request = CrawlRequest::new(url.as_str(), 0);
        if let Some(r) = referer {
            request.depth = r.depth + 1;
            request = request.with_referer(r.url.clone());
        }

        let queued = self.frontier.add_request(&request.encode()?)?;
        debug!(
            url = %request.url,
            depth = request.depth,
            src = source,
            reason,
            queued,
            "queue visit"
        );
        Ok(queued)
    }

    /// Run the worker pool until the frontier drains or the session stops.
    pub async fn run(self: &Arc<Self>) -> Result<StatSnapshot, CrawlError> {
        let workers = self.config.effective_concurrency();
        info!(seed = %self.config.seed, workers, fatal = self.config.fatal, "crawl started");

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                let session = Arc::clone(self);
                tokio::spawn(async move { session.worker(id).await })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "crawl worker panicked");
            }
        }

        self.stat.report("final");

        let fatal = self
            .fatal_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match fatal {
            Some(err) => Err(CrawlError::Fatal(err)),
            None => Ok(self.stat.snapshot()),
        }
    }

    async fn worker(&self, id: usize) {
        let idle = Duration::from_millis(self.config.idle_poll_ms);
        debug!(worker = id, "worker started");

        while !self.is_stopped() {
            // Counted before the pop so an idle worker never sees an empty
            // frontier while a busy one is still about to enqueue links.
            self.in_flight.fetch_add(1, Ordering::SeqCst);

            match self.next_request() {
                Ok(Some(request)) => {
                    if let Err(e) = self.visit(&request).await {
                        self.on_error(Some(&request), &e);
                    }
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    self.stat.maybe_report(&self.config.report);
                }
                Ok(None) => {
                    if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                        break;
                    }
                    tokio::time::sleep(idle).await;
                }
                Err(e) => {
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    self.on_error(None, &e);
                    tokio::time::sleep(idle).await;
                }
            }
        }

        debug!(worker = id, "worker finished");
    }

    fn next_request(&self) -> Result<Option<CrawlRequest>, CrawlError> {
        match self.frontier.get_request()? {
            Some(payload) => Ok(Some(CrawlRequest::decode(&payload)?)),
            None => Ok(None),
        }
    }

    /// Process one request end to end.
    pub async fn visit(&self, request: &CrawlRequest) -> Result<(), CrawlError> {
        let url = Url::parse(&request.url)
            .map_err(|e| CrawlError::Parse(format!("invalid url {}: {}", request.url, e)))?;

        if !self.collector.is_allowed(&url) {
            debug!(url = %url, "host not allowed");
            self.stat.inc_skip_visit();
            return Ok(());
        }

        self.stat.inc_request();
        metrics::REQUESTS_TOTAL.inc();
        self.visits.mark_visiting(&request.url)?;

        let response = self.fetch(request).await?;

        let mut file = None;
        for hook in self.collector.response_hooks() {
            if let ResponseKind::File(f) = hook(self, request, &response)? {
                file = Some(f);
                break;
            }
        }

        let is_file = file.is_some();
        match file {
            Some(file) => self.extract(file).await?,
            None if response.is_html() => self.discover_links(request, &response)?,
            None => debug!(url = %request.url, "not a page, no links"),
        }

        self.stat.inc_scraped();
        metrics::SCRAPED_TOTAL.inc();
        if is_file {
            self.stat.inc_skip_mark_visit();
        } else {
            self.visits.mark_scraped(&request.url)?;
        }
        Ok(())
    }

    async fn fetch(&self, request: &CrawlRequest) -> Result<FetchResponse, CrawlError> {
        let collector = self.collector.config();
        let mut fetch = FetchRequest::new(request.url.clone());
        fetch.timeout = collector.timeout;
        fetch.max_body_size = collector.max_body_size;

        if request.depth <= self.config.direct_seed_depth {
            fetch = fetch.with_header("Cache-Control", "no-cache");
        }
        for (name, value) in &request.headers {
            fetch = fetch.with_header(name.clone(), value.clone());
        }
        if let Some(referer) = &request.referer {
            fetch = fetch.with_header("Referer", referer.clone());
        }

        let started = Instant::now();
        let result = self.fetcher.fetch(&fetch).await;
        metrics::FETCH_DURATION
            .with_label_values(&[if result.is_ok() { "ok" } else { "error" }])
            .observe(started.elapsed().as_secs_f64());

        let response = result?;
        if !response.is_success() {
            return Err(FetchError::Status {
                status: response.status,
                url: request.url.clone(),
            }
            .into());
        }
        Ok(response)
    }

    /// Run the extraction pipeline off the async workers.
    async fn extract(&self, file: ExtractedFile) -> Result<(), CrawlError> {
        let pipeline = Arc::clone(&self.pipeline);
        tokio::task::spawn_blocking(move || pipeline.handle(file))
            .await
            .map_err(|e| CrawlError::Storage(format!("extraction task failed: {}", e)))??;
        Ok(())
    }

    fn discover_links(
        &self,
        request: &CrawlRequest,
        response: &FetchResponse,
    ) -> Result<(), CrawlError> {
        if self.collector.link_hooks().is_empty() {
            return Ok(());
        }

        let page = Url::parse(&response.url)
            .or_else(|_| Url::parse(&request.url))
            .map_err(|e| CrawlError::Parse(format!("invalid page url {}: {}", response.url, e)))?;

        for href in extract_hrefs(&response.body) {
            let Some(url) = resolve_href(&page, &href) else {
                trace!(href = %href, src = %page, "drop link");
                continue;
            };
            let link = Link {
                href: &href,
                url: &url,
                page: &page,
                request,
            };
            for hook in self.collector.link_hooks() {
                hook(self, &link)?;
            }
        }
        Ok(())
    }

    fn on_error(&self, request: Option<&CrawlRequest>, err: &CrawlError) {
        // Pipeline errors were counted and logged with file context already
        if !matches!(err, CrawlError::Handler(_)) {
            self.stat.inc_error();
            metrics::ERRORS_TOTAL.with_label_values(&[err.stage()]).inc();
            error!(
                url = request.map(|r| r.url.as_str()).unwrap_or_default(),
                depth = request.map(|r| r.depth).unwrap_or_default(),
                stage = err.stage(),
                error = %err,
                "crawl error"
            );
        }

        if let Some(request) = request {
            if let Err(e) = self.visits.mark_error(&request.url, &err.to_string()) {
                warn!(url = %request.url, error = %e, "failed to record visit error");
            }
        }

        if self.config.fatal {
            let mut fatal = self.fatal_error.lock().unwrap_or_else(|e| e.into_inner());
            if fatal.is_none() {
                *fatal = Some(err.to_string());
            }
            drop(fatal);
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontier::SqliteFrontier;
    use crate::indexer::SqliteContentIndexer;
    use crate::testing::MockFetcher;
    use crate::visit::SqliteVisitStore;

    fn build(config: CrawlConfig, registry: &ScraperRegistry) -> Arc<CrawlSession> {
        CrawlSession::builder(config)
            .frontier(Arc::new(SqliteFrontier::in_memory().unwrap()))
            .visits(Arc::new(SqliteVisitStore::in_memory().unwrap()))
            .indexer(Arc::new(SqliteContentIndexer::in_memory().unwrap()))
            .fetcher(Arc::new(MockFetcher::new()))
            .build(registry)
            .unwrap()
    }

    #[test]
    fn test_builder_requires_stores() {
        let result = CrawlSession::builder(CrawlConfig::new("http://a.com/"))
            .fetcher(Arc::new(MockFetcher::new()))
            .build(&ScraperRegistry::new());
        assert!(matches!(result, Err(CrawlError::Config(_))));
    }

    #[test]
    fn test_builder_rejects_bad_seed() {
        let result = CrawlSession::builder(CrawlConfig::new("not a url"))
            .frontier(Arc::new(SqliteFrontier::in_memory().unwrap()))
            .visits(Arc::new(SqliteVisitStore::in_memory().unwrap()))
            .indexer(Arc::new(SqliteContentIndexer::in_memory().unwrap()))
            .fetcher(Arc::new(MockFetcher::new()))
            .build(&ScraperRegistry::new());
        assert!(matches!(result, Err(CrawlError::Config(_))));
    }

    #[test]
    fn test_queue_visit_resolves_against_referer() {
        let session = build(CrawlConfig::new("http://a.com/"), &ScraperRegistry::new());
        let referer = CrawlRequest::new("http://a.com/forum/index.htm", 2);

        assert!(session
            .queue_visit("thread-1.htm", "/forum/index.htm", "thread", Some(&referer))
            .unwrap());

        let payload = session.frontier().get_request().unwrap().unwrap();
        let queued = CrawlRequest::decode(&payload).unwrap();
        assert_eq!(queued.url, "http://a.com/forum/thread-1.htm");
        assert_eq!(queued.depth, 3);
        assert_eq!(queued.referer.as_deref(), Some("http://a.com/forum/index.htm"));
    }

    #[test]
    fn test_queue_visit_skips_scraped() {
        let session = build(CrawlConfig::new("http://a.com/"), &ScraperRegistry::new());
        session.visits().mark_scraped("http://a.com/done").unwrap();

        assert!(!session
            .queue_visit("http://a.com/done", "/", "test", None)
            .unwrap());
        assert_eq!(session.stat().snapshot().skip, 1);
        assert_eq!(session.frontier().queue_size().unwrap(), 0);
    }

    #[test]
    fn test_queue_visit_drops_non_http() {
        let session = build(CrawlConfig::new("http://a.com/"), &ScraperRegistry::new());
        assert!(!session
            .queue_visit("ftp://a.com/file", "/", "test", None)
            .unwrap());
        assert_eq!(session.frontier().queue_size().unwrap(), 0);
    }

    #[test]
    fn test_seed_requeues() {
        let session = build(CrawlConfig::new("http://a.com/"), &ScraperRegistry::new());
        assert!(session.seed().unwrap());
        session.frontier().get_request().unwrap().unwrap();
        assert!(session.seed().unwrap());
    }

    #[tokio::test]
    async fn test_run_empty_frontier_finishes() {
        let mut config = CrawlConfig::new("http://a.com/");
        config.concurrency = Some(4);
        let session = build(config, &ScraperRegistry::new());

        let snapshot = session.run().await.unwrap();
        assert_eq!(snapshot.request, 0);
    }

    #[tokio::test]
    async fn test_stop_before_run() {
        let session = build(CrawlConfig::new("http://a.com/"), &ScraperRegistry::new());
        session.seed().unwrap();
        session.stop();

        let snapshot = session.run().await.unwrap();
        assert_eq!(snapshot.request, 0);
        assert_eq!(session.frontier().queue_size().unwrap(), 1);
    }
}
