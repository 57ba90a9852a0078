pub mod config;
pub mod crawl;
pub mod extract;
pub mod fetch;
pub mod frontier;
pub mod indexer;
pub mod metrics;
pub mod scraper;
pub mod subtitle;
pub mod testing;
pub mod visit;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, CrawlConfig,
    ExtractConfig, SiteConfig,
};
pub use crawl::{CrawlError, CrawlSession, CrawlSessionBuilder, Stat, StatSnapshot};
pub use extract::{ExtractedFile, ExtractionPipeline, HandlerError};
pub use fetch::{FetchError, FetchRequest, FetchResponse, Fetcher, ReqwestFetcher};
pub use frontier::{CrawlRequest, Frontier, FrontierError, SqliteFrontier};
pub use indexer::{
    ContentIndexer, IndexError, IndexOptions, IndexTorrentStat, SqliteContentIndexer,
};
pub use scraper::{ForumScraper, Scraper, ScraperError, ScraperRegistry, SessionContext};
pub use subtitle::{SqliteSubtitleIndexer, SubtitleError, SubtitleIndexer, SubtitleStat};
pub use visit::{SqliteVisitStore, VisitError, VisitRecord, VisitStore};
