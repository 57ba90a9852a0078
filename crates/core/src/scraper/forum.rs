//! Data-driven forum site adapter.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{
    classify, filename_from_disposition, filename_from_url, Collector, CollectorConfig, LinkRule,
    ResponseKind, Scraper, ScraperError, SessionContext,
};
use crate::config::SiteConfig;
use crate::crawl::CrawlSession;
use crate::extract::ExtractedFile;
use crate::fetch::FetchResponse;
use crate::metrics;

/// A forum adapter configured from a `[[sites]]` entry.
pub struct ForumScraper {
    site: SiteConfig,
    rules: Arc<Vec<LinkRule>>,
}

impl ForumScraper {
    pub fn from_config(site: SiteConfig) -> Result<Self, ScraperError> {
        let rules = site
            .links
            .iter()
            .map(LinkRule::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            site,
            rules: Arc::new(rules),
        })
    }

    fn allowed_domains(&self) -> &[String] {
        if self.site.allowed_domains.is_empty() {
            &self.site.hosts
        } else {
            &self.site.allowed_domains
        }
    }
}

/// Path plus query, the string link rules match against.
fn rule_path(url: &url::Url) -> String {
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}

/// Turn a download response into an [`ExtractedFile`].
fn detect_file(session: &CrawlSession, response: &FetchResponse, url: &str) -> Option<ExtractedFile> {
    let disposition = response.header("content-disposition")?;

    session.stat().inc_file();
    metrics::FILES_TOTAL.inc();

    let name = filename_from_disposition(disposition)
        .or_else(|| filename_from_url(url))
        .unwrap_or_else(|| "download".to_string());
    tracing::debug!(url, file = %name, size = response.body.len(), "file detected");

    let mut file = ExtractedFile::new(name, response.body.clone(), url);
    file.modified = response
        .header("last-modified")
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .map(|d| d.with_timezone(&Utc));
    Some(file)
}

impl Scraper for ForumScraper {
    fn name(&self) -> &str {
        &self.site.name
    }

    fn supports(&self, ctx: &SessionContext) -> bool {
        let host = ctx.seed_host();
        self.site.hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
    }

    fn init_collector(
        &self,
        _ctx: &SessionContext,
        config: &mut CollectorConfig,
    ) -> Result<(), ScraperError> {
        for domain in self.allowed_domains() {
            if !config.allowed_domains.contains(domain) {
                config.allowed_domains.push(domain.clone());
            }
        }
        config.timeout = Duration::from_secs(self.site.request_timeout_secs);
        config.max_body_size = self.site.max_body_size;
        Ok(())
    }

    fn setup_collector(
        &self,
        _ctx: &SessionContext,
        collector: &mut Collector,
    ) -> Result<(), ScraperError> {
        let rules = Arc::clone(&self.rules);
        collector.on_link(move |session, link| {
            let source = rule_path(link.page);
            let target = rule_path(link.url);

            match classify(&rules, &source, &target) {
                Some((rule, path)) => {
                    let mut url = link.url.clone();
                    if path != target {
                        // Rewritten paths may carry their own query
                        let (p, q) = match path.split_once('?') {
                            Some((p, q)) => (p.to_string(), Some(q.to_string())),
                            None => (path.clone(), None),
                        };
                        url.set_path(&p);
                        url.set_query(q.as_deref());
                    }
                    session.queue_visit(url.as_str(), &source, &rule.reason, Some(link.request))?;
                }
                None => {
                    tracing::trace!(href = link.href, src = %source, "drop link");
                }
            }
            Ok(())
        });

        collector.on_response(|session, request, response| {
            match detect_file(session, response, &request.url) {
                Some(file) => {
                    session.visits().mark_file(&request.url)?;
                    Ok(ResponseKind::File(file))
                }
                None => Ok(ResponseKind::Page),
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CrawlConfig, LinkRuleConfig, PathPatternConfig};
    use url::Url;

    fn site() -> SiteConfig {
        SiteConfig {
            name: "forum".to_string(),
            hosts: vec!["forum.example.com".to_string()],
            allowed_domains: vec![],
            request_timeout_secs: 12,
            max_body_size: 1024,
            links: vec![LinkRuleConfig {
                reason: "thread".to_string(),
                source: None,
                target: PathPatternConfig::Prefix("/thread-".to_string()),
                rewrite: None,
            }],
        }
    }

    fn context(seed: &str) -> SessionContext {
        SessionContext {
            seed: Url::parse(seed).unwrap(),
            config: CrawlConfig::new(seed),
        }
    }

    #[test]
    fn test_supports_by_host() {
        let scraper = ForumScraper::from_config(site()).unwrap();
        assert!(scraper.supports(&context("http://forum.example.com/")));
        assert!(scraper.supports(&context("https://FORUM.example.com/index.htm")));
        assert!(!scraper.supports(&context("http://other.example.com/")));
    }

    #[test]
    fn test_init_collector() {
        let scraper = ForumScraper::from_config(site()).unwrap();
        let mut config = CollectorConfig::default();
        scraper
            .init_collector(&context("http://forum.example.com/"), &mut config)
            .unwrap();

        assert_eq!(config.allowed_domains, vec!["forum.example.com"]);
        assert_eq!(config.timeout, Duration::from_secs(12));
        assert_eq!(config.max_body_size, 1024);
    }

    #[test]
    fn test_explicit_allowed_domains() {
        let mut site = site();
        site.allowed_domains = vec!["cdn.example.com".to_string()];
        let scraper = ForumScraper::from_config(site).unwrap();

        let mut config = CollectorConfig::default();
        scraper
            .init_collector(&context("http://forum.example.com/"), &mut config)
            .unwrap();
        assert_eq!(config.allowed_domains, vec!["cdn.example.com"]);
    }

    #[test]
    fn test_invalid_rule_rejected() {
        let mut site = site();
        site.links[0].target = PathPatternConfig::Regex("[".to_string());
        assert!(ForumScraper::from_config(site).is_err());
    }

    #[test]
    fn test_rule_path_includes_query() {
        let url = Url::parse("http://a.com/forum.php?mod=viewthread&tid=1#x").unwrap();
        assert_eq!(rule_path(&url), "/forum.php?mod=viewthread&tid=1");
    }
}
