use chrono::{DateTime, Utc};

/// A downloaded file or archive entry held in memory.
#[derive(Clone, Default)]
pub struct ExtractedFile {
    /// File name or path inside an archive.
    pub path: String,
    /// Declared length (may differ from `data.len()` for archive entries).
    pub length: u64,
    pub mode: Option<u32>,
    pub modified: Option<DateTime<Utc>>,
    pub data: Vec<u8>,
    /// URL the outermost file was downloaded from.
    pub url: String,
    pub is_dir: bool,
}

impl ExtractedFile {
    pub fn new(path: impl Into<String>, data: Vec<u8>, url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            length: data.len() as u64,
            mode: None,
            modified: None,
            data,
            url: url.into(),
            is_dir: false,
        }
    }

    /// An entry read out of this archive; keeps the origin URL.
    pub fn entry(&self, path: impl Into<String>, data: Vec<u8>) -> Self {
        Self::new(path, data, self.url.clone())
    }

    /// Base name, with either separator.
    pub fn name(&self) -> &str {
        self.path
            .rsplit(|c| c == '/' || c == '\\')
            .next()
            .unwrap_or(&self.path)
    }
}

impl std::fmt::Debug for ExtractedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractedFile")
            .field("path", &self.path)
            .field("length", &self.length)
            .field("url", &self.url)
            .field("is_dir", &self.is_dir)
            .field("data", &format_args!("<{} bytes>", self.data.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name() {
        let file = ExtractedFile::new("dir/sub/a.torrent", vec![], "");
        assert_eq!(file.name(), "a.torrent");

        let file = ExtractedFile::new("dir\\b.srt", vec![], "");
        assert_eq!(file.name(), "b.srt");

        let file = ExtractedFile::new("plain", vec![], "");
        assert_eq!(file.name(), "plain");
    }

    #[test]
    fn test_entry_keeps_origin() {
        let archive = ExtractedFile::new("pack.zip", vec![1, 2, 3], "http://example.com/attach-1");
        let entry = archive.entry("inner/x.torrent", vec![9]);
        assert_eq!(entry.url, "http://example.com/attach-1");
        assert_eq!(entry.length, 1);
    }
}
