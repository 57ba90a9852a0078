use std::sync::Arc;

use torrenti_core::{CrawlSession, SubtitleIndexer};

/// Shared application state
pub struct AppState {
    session: Arc<CrawlSession>,
    subtitles: Option<Arc<dyn SubtitleIndexer>>,
}

impl AppState {
    pub fn new(session: Arc<CrawlSession>, subtitles: Option<Arc<dyn SubtitleIndexer>>) -> Self {
        Self { session, subtitles }
    }

    pub fn session(&self) -> &Arc<CrawlSession> {
        &self.session
    }

    pub fn subtitles(&self) -> Option<&Arc<dyn SubtitleIndexer>> {
        self.subtitles.as_ref()
    }
}
