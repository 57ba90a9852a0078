use std::collections::HashSet;

use crate::config::ExtractConfig;

/// Subtitle formats routed to the subtitle indexer.
pub const SUBTITLE_EXTENSIONS: &[&str] = &[
    ".ass", ".dfxp", ".idx", ".mks", ".rt", ".sami", ".sbv", ".scc", ".srt", ".ssa", ".sub",
    ".sup", ".tml", ".ttml", ".vtt",
];

pub fn is_subtitle_ext(ext: &str) -> bool {
    SUBTITLE_EXTENSIONS.binary_search(&ext).is_ok()
}

/// Which files are skipped before dispatch.
#[derive(Debug, Clone)]
pub struct ExtensionPolicy {
    ignored: HashSet<String>,
}

impl ExtensionPolicy {
    pub fn new(ignored: impl IntoIterator<Item = String>) -> Self {
        Self {
            ignored: ignored.into_iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    pub fn from_config(config: &ExtractConfig) -> Self {
        Self::new(config.ignored_extensions.iter().cloned())
    }

    /// Why a file is skipped, or `None` when it should be handled.
    pub fn skip_reason(&self, name: &str, ext: &str) -> Option<&'static str> {
        if name.starts_with('.') {
            Some("hidden")
        } else if self.ignored.contains(ext) {
            Some("ignored")
        } else {
            None
        }
    }
}

impl Default for ExtensionPolicy {
    fn default() -> Self {
        Self::from_config(&ExtractConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtitle_extensions_sorted() {
        let mut sorted = SUBTITLE_EXTENSIONS.to_vec();
        sorted.sort();
        assert_eq!(sorted, SUBTITLE_EXTENSIONS);
    }

    #[test]
    fn test_is_subtitle_ext() {
        assert!(is_subtitle_ext(".srt"));
        assert!(is_subtitle_ext(".ass"));
        assert!(!is_subtitle_ext(".torrent"));
        assert!(!is_subtitle_ext("srt"));
    }

    #[test]
    fn test_skip_reason() {
        let policy = ExtensionPolicy::default();
        assert_eq!(policy.skip_reason(".DS_Store", ".ds_store"), Some("hidden"));
        assert_eq!(policy.skip_reason("cover.jpg", ".jpg"), Some("ignored"));
        assert_eq!(policy.skip_reason("readme.txt", ".txt"), Some("ignored"));
        assert_eq!(policy.skip_reason("a.torrent", ".torrent"), None);
        assert_eq!(policy.skip_reason("a.mkv", ".mkv"), None);
    }

    #[test]
    fn test_custom_ignore_list() {
        let policy = ExtensionPolicy::new(vec![".NFO".to_string()]);
        assert_eq!(policy.skip_reason("x.nfo", ".nfo"), Some("ignored"));
        assert_eq!(policy.skip_reason("x.jpg", ".jpg"), None);
    }
}
