//! Recursive file dispatcher.

use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use super::archive::{read_entries, ArchiveError, ArchiveFormat, DEFAULT_MAX_ENTRY_SIZE};
use super::policy::{is_subtitle_ext, ExtensionPolicy};
use super::sniff::{sniff_ext, sniff_mime};
use super::ExtractedFile;
use crate::crawl::Stat;
use crate::indexer::{ContentIndexer, IndexError, IndexOptions};
use crate::metrics;
use crate::subtitle::{SubtitleError, SubtitleIndexer};

/// Errors raised while handling one file.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("No handler for extension {ext:?}")]
    Unhandled { ext: String },

    #[error("Got an HTML error page instead of a file")]
    ErrorPage,

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),
}

impl HandlerError {
    /// Storage failures propagate past the current file.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            HandlerError::Index(IndexError::Database(_)) | HandlerError::Subtitle(_)
        )
    }

    /// Malformed container or metainfo.
    pub fn is_parse(&self) -> bool {
        matches!(
            self,
            HandlerError::Archive(_) | HandlerError::Index(IndexError::Parse(_))
        )
    }

    /// Stage label used for metrics.
    pub fn stage(&self) -> &'static str {
        if self.is_storage() {
            "storage"
        } else if self.is_parse() {
            "parse"
        } else {
            "handler"
        }
    }
}

/// Classifies downloaded files and routes them to the indexers.
pub struct ExtractionPipeline {
    policy: ExtensionPolicy,
    indexer: Arc<dyn ContentIndexer>,
    subtitles: Option<Arc<dyn SubtitleIndexer>>,
    stat: Arc<Stat>,
    fatal: bool,
    dump_dir: PathBuf,
    max_entry_size: u64,
}

impl ExtractionPipeline {
    pub fn new(indexer: Arc<dyn ContentIndexer>, stat: Arc<Stat>) -> Self {
        Self {
            policy: ExtensionPolicy::default(),
            indexer,
            subtitles: None,
            stat,
            fatal: false,
            dump_dir: std::env::temp_dir(),
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
        }
    }

    pub fn with_policy(mut self, policy: ExtensionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_subtitles(mut self, subtitles: Arc<dyn SubtitleIndexer>) -> Self {
        self.subtitles = Some(subtitles);
        self
    }

    pub fn with_fatal(mut self, fatal: bool) -> Self {
        self.fatal = fatal;
        self
    }

    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = dir.into();
        self
    }

    /// Largest archive entry that will be unpacked.
    pub fn with_max_entry_size(mut self, size: u64) -> Self {
        self.max_entry_size = size;
        self
    }

    /// Handle a file and everything nested inside it.
    ///
    /// Handler errors are logged, dumped and counted, and the next file is
    /// processed. Storage errors, and every error in fatal mode, are returned.
    pub fn handle(&self, file: ExtractedFile) -> Result<(), HandlerError> {
        let mut queue = VecDeque::from([file]);

        while let Some(file) = queue.pop_front() {
            if file.is_dir {
                continue;
            }

            let ext = sniff_ext(&file);
            self.stat.count_ext(&ext);
            metrics::EXTRACTED_FILES
                .with_label_values(&[ext.as_str()])
                .inc();

            if let Some(reason) = self.policy.skip_reason(file.name(), &ext) {
                tracing::trace!(file = %file.path, ext = %ext, reason, "skip file");
                continue;
            }

            match self.dispatch(&file, &ext) {
                Ok(entries) => queue.extend(entries),
                Err(err) => {
                    self.record_error(&file, &ext, &err);
                    if self.fatal || err.is_storage() {
                        return Err(err);
                    }
                }
            }
        }

        Ok(())
    }

    /// Handle one file; archive entries are returned for the caller to queue.
    fn dispatch(&self, file: &ExtractedFile, ext: &str) -> Result<Vec<ExtractedFile>, HandlerError> {
        if let Some(format) = ArchiveFormat::from_ext(ext) {
            return Ok(read_entries(format, file, self.max_entry_size)?);
        }

        match ext {
            ".torrent" => {
                let stat = self.indexer.index_torrent(file, &IndexOptions::default())?;
                metrics::INDEXED_ROWS
                    .with_label_values(&["meta_file"])
                    .inc_by(stat.meta_count);
                metrics::INDEXED_ROWS
                    .with_label_values(&["torrent"])
                    .inc_by(stat.torrent_count);
                metrics::INDEXED_ROWS
                    .with_label_values(&["torrent_file"])
                    .inc_by(stat.torrent_file_count);
            }
            ".html" | ".htm" => return Err(HandlerError::ErrorPage),
            ext if is_subtitle_ext(ext) => match &self.subtitles {
                Some(subtitles) => {
                    let stat = subtitles.index_subtitle(file)?;
                    metrics::INDEXED_ROWS
                        .with_label_values(&["subtitle"])
                        .inc_by(stat.content_count);
                }
                None => tracing::trace!(file = %file.path, ext, "skip subtitle"),
            },
            _ => {
                return Err(HandlerError::Unhandled {
                    ext: ext.to_string(),
                })
            }
        }

        Ok(Vec::new())
    }

    fn record_error(&self, file: &ExtractedFile, ext: &str, err: &HandlerError) {
        self.stat.inc_error();
        metrics::ERRORS_TOTAL
            .with_label_values(&[err.stage()])
            .inc();

        let mime = sniff_mime(&file.data);
        let dump = dump_file(&self.dump_dir, file)
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        tracing::error!(
            url = %file.url,
            file = %file.path,
            ext,
            mime,
            dump = %dump,
            error = %err,
            "handle file failed"
        );
    }
}

/// Write a file's bytes under `dir` for postmortem.
///
/// Dumps never overwrite each other: the sanitized name gets a random
/// infix before its extension.
fn dump_file(dir: &Path, file: &ExtractedFile) -> Option<PathBuf> {
    let name: String = file
        .name()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let (stem, ext) = match name.rfind('.') {
        Some(i) => name.split_at(i),
        _ => (name.as_str(), ""),
    };
    let stem = if stem.is_empty() || stem.starts_with('.') {
        format!("dump{}", stem)
    } else {
        stem.to_string()
    };

    let written = std::fs::create_dir_all(dir).and_then(|_| {
        let mut temp = tempfile::Builder::new()
            .prefix(&format!("{}-", stem))
            .suffix(ext)
            .tempfile_in(dir)?;
        temp.write_all(&file.data)?;
        let (_, path) = temp.keep().map_err(|e| e.error)?;
        Ok(path)
    });
    match written {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(dir = %dir.display(), file = %file.path, error = %e, "dump failed");
            None
        }
    }
}
