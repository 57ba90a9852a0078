use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Indexed content (meta files, torrents, torrent files, subtitles).
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Crawl state (frontier and visit records).
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            store_path: default_store_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("torrenti.db")
}

fn default_store_path() -> PathBuf {
    PathBuf::from("scraper-store.db")
}

/// Crawl session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlConfig {
    /// Seed URL; also selects the site adapters by hostname.
    pub seed: String,
    /// Worker count (default: host parallelism).
    #[serde(default)]
    pub concurrency: Option<usize>,
    /// Terminate on the first pipeline error instead of recording it.
    #[serde(default)]
    pub fatal: bool,
    /// Requests at or below this depth bypass HTTP caches.
    #[serde(default)]
    pub direct_seed_depth: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// How long an idle worker waits before polling the frontier again.
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
    /// Where unhandled files are dumped (default: system temp dir).
    #[serde(default)]
    pub dump_dir: Option<PathBuf>,
    #[serde(default)]
    pub report: ReportConfig,
}

impl CrawlConfig {
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            concurrency: None,
            fatal: false,
            direct_seed_depth: 0,
            user_agent: default_user_agent(),
            idle_poll_ms: default_idle_poll_ms(),
            dump_dir: None,
            report: ReportConfig::default(),
        }
    }

    /// Configured concurrency, falling back to the host's available parallelism.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/99.0.4844.74 Safari/537.36".to_string()
}

fn default_idle_poll_ms() -> u64 {
    200
}

/// Periodic stat report thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Report on every N-th scraped page, once `min_interval_secs` has passed.
    #[serde(default = "default_every_scraped")]
    pub every_scraped: u64,
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: u64,
    /// Always report once this much time has passed.
    #[serde(default = "default_max_interval")]
    pub max_interval_secs: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            every_scraped: default_every_scraped(),
            min_interval_secs: default_min_interval(),
            max_interval_secs: default_max_interval(),
        }
    }
}

fn default_every_scraped() -> u64 {
    1000
}

fn default_min_interval() -> u64 {
    10
}

fn default_max_interval() -> u64 {
    30
}

/// Extraction pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractConfig {
    /// Extensions (with leading dot) that are skipped without handling.
    #[serde(default = "default_ignored_extensions")]
    pub ignored_extensions: Vec<String>,
    /// Index subtitle files found in downloads.
    #[serde(default = "default_true")]
    pub subtitles: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            ignored_extensions: default_ignored_extensions(),
            subtitles: true,
        }
    }
}

fn default_ignored_extensions() -> Vec<String> {
    [
        // trivial
        ".txt", ".tv", ".url", ".ds_store", ".db", ".sqlite", ".ini",
        // office
        ".docx", ".doc",
        // images
        ".jpg", ".jpeg", ".png",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_true() -> bool {
    true
}

/// A forum-style site adapter
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    pub name: String,
    /// Seed hostnames this adapter supports.
    pub hosts: Vec<String>,
    /// Hosts requests may go to (default: `hosts`).
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    /// Ordered link classification table; the first match wins.
    #[serde(default)]
    pub links: Vec<LinkRuleConfig>,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_body_size() -> usize {
    20 * 1024 * 1024
}

/// One `(source, target)` link classification rule
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinkRuleConfig {
    /// Human-readable tag logged when the rule queues a link.
    pub reason: String,
    /// Pattern the linking page's path must match (any page when absent).
    #[serde(default)]
    pub source: Option<PathPatternConfig>,
    /// Pattern the link target's path must match.
    pub target: PathPatternConfig,
    #[serde(default)]
    pub rewrite: Option<RewriteConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PathPatternConfig {
    Prefix(String),
    Regex(String),
}

/// Replace `from` with `to` in a matched target path
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RewriteConfig {
    pub from: String,
    pub to: String,
}

/// Status server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    7676
}
