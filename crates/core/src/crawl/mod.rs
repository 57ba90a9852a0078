//! Crawl orchestration.

mod error;
mod links;
mod session;
mod stat;

pub use error::CrawlError;
pub use links::{extract_hrefs, resolve_href};
pub use session::{CrawlSession, CrawlSessionBuilder};
pub use stat::{Stat, StatSnapshot};
