//! Testing utilities: a mock fetcher and byte fixtures.
//!
//! Lets a whole crawl session run against canned HTTP responses and
//! in-memory stores.
//!
//! # Example
//!
//! ```rust,ignore
//! use torrenti_core::testing::{fixtures, MockFetcher};
//!
//! let fetcher = MockFetcher::new();
//! fetcher.set_html("http://example.com/thread-1", &fixtures::page(&["/attach-1"])).await;
//! fetcher
//!     .set_attachment(
//!         "http://example.com/attach-1",
//!         "pack.torrent",
//!         fixtures::torrent_bytes("pack", &[("a.mkv", 1024)]),
//!     )
//!     .await;
//! ```

mod mock_fetcher;

pub use mock_fetcher::MockFetcher;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io::{Cursor, Write};

    use librqbit_bencode::{bencode_serialize_to_writer, BencodeValue, ByteBufOwned};
    use sevenz_rust::nt_time::FileTime;
    use sevenz_rust::{SevenZArchiveEntry, SevenZWriter};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use crate::config::{LinkRuleConfig, PathPatternConfig, SiteConfig};

    type Value = BencodeValue<ByteBufOwned>;

    pub const ANNOUNCE: &str = "http://tracker.example.com:6969/announce";

    const PIECE_LENGTH: u64 = 4 * 1024 * 1024;

    fn bytes(b: impl AsRef<[u8]>) -> Value {
        BencodeValue::Bytes(ByteBufOwned::from(b.as_ref()))
    }

    fn int(i: u64) -> Value {
        BencodeValue::Integer(i as i64)
    }

    fn dict(entries: Vec<(&str, Value)>) -> Value {
        BencodeValue::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (ByteBufOwned::from(k.as_bytes()), v))
                .collect(),
        )
    }

    fn encode(value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        bencode_serialize_to_writer(value, &mut buf).unwrap();
        buf
    }

    fn pieces(total: u64) -> Value {
        let count = total.div_ceil(PIECE_LENGTH).max(1);
        bytes(vec![0u8; (count * 20) as usize])
    }

    fn multi_file_info(name: &str, files: &[(&str, u64)]) -> Value {
        let total = files.iter().map(|(_, size)| size).sum();
        let files = files
            .iter()
            .map(|(path, size)| {
                dict(vec![
                    ("length", int(*size)),
                    ("path", BencodeValue::List(path.split('/').map(bytes).collect())),
                ])
            })
            .collect();

        dict(vec![
            ("files", BencodeValue::List(files)),
            ("name", bytes(name)),
            ("piece length", int(PIECE_LENGTH)),
            ("pieces", pieces(total)),
        ])
    }

    fn torrent(info: Value, comment: Option<&str>) -> Vec<u8> {
        let mut entries = vec![
            ("announce", bytes(ANNOUNCE)),
            ("created by", bytes("torrenti-tests")),
            ("creation date", int(1_700_000_000)),
            ("info", info),
        ];
        if let Some(comment) = comment {
            entries.push(("comment", bytes(comment)));
        }
        encode(&dict(entries))
    }

    /// A multi-file .torrent declaring `files` as `(path, size)` pairs.
    pub fn torrent_bytes(name: &str, files: &[(&str, u64)]) -> Vec<u8> {
        torrent(multi_file_info(name, files), None)
    }

    /// Same info dict as [`torrent_bytes`], different outer dict.
    pub fn torrent_bytes_with_comment(name: &str, files: &[(&str, u64)], comment: &str) -> Vec<u8> {
        torrent(multi_file_info(name, files), Some(comment))
    }

    /// A single-file .torrent.
    pub fn single_file_torrent_bytes(name: &str, length: u64) -> Vec<u8> {
        let info = dict(vec![
            ("length", int(length)),
            ("name", bytes(name)),
            ("piece length", int(PIECE_LENGTH)),
            ("pieces", pieces(length)),
        ]);
        torrent(info, None)
    }

    /// A zip archive holding `files` as `(path, bytes)` pairs.
    pub fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        zip_bytes_with_dirs(&[], files)
    }

    /// A zip archive with explicit directory entries.
    pub fn zip_bytes_with_dirs(dirs: &[&str], files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        for dir in dirs {
            zip.add_directory(*dir, options).unwrap();
        }
        for (path, data) in files {
            zip.start_file(*path, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    /// Modification time stamped on every [`seven_z_bytes`] entry.
    pub const SEVEN_Z_MTIME: i64 = 1_700_000_000;

    /// A 7z archive holding `files`, each with mode 0644 and
    /// [`SEVEN_Z_MTIME`] as its modification time.
    pub fn seven_z_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut sz = SevenZWriter::new(Cursor::new(Vec::new())).unwrap();
        for (path, data) in files {
            let mut entry = SevenZArchiveEntry::default();
            entry.name = path.to_string();
            entry.has_last_modified_date = true;
            entry.last_modified_date = FileTime::from_unix_time(SEVEN_Z_MTIME).unwrap();
            entry.has_windows_attributes = true;
            entry.windows_attributes = 0x8000 | (0o100644 << 16);
            sz.push_archive_entry(entry, Some(*data)).unwrap();
        }
        sz.finish().unwrap().into_inner()
    }

    /// A stored RAR4 archive holding a single-file `a.torrent` and
    /// `sub/b.srt`, both modified 2024-03-05 12:34:56 with mode 0644.
    pub fn rar_bytes() -> Vec<u8> {
        include_bytes!("../../tests/data/pack.rar").to_vec()
    }

    /// A zip whose only entry, a deflated `a.torrent`, declares a 16 TiB
    /// uncompressed size in its zip64 extra field.
    pub fn huge_entry_zip_bytes() -> Vec<u8> {
        include_bytes!("../../tests/data/huge-entry.zip").to_vec()
    }

    /// An HTML page linking to every href in `links`.
    pub fn page(links: &[&str]) -> String {
        let anchors: String = links
            .iter()
            .enumerate()
            .map(|(i, href)| format!("<li><a href=\"{}\">link {}</a></li>\n", href, i))
            .collect();
        format!(
            "<!DOCTYPE html>\n<html><head><title>forum</title></head><body><ul>\n{}</ul></body></html>",
            anchors
        )
    }

    /// A forum adapter for `host` following thread and attachment links.
    pub fn forum_site(host: &str) -> SiteConfig {
        SiteConfig {
            name: "test-forum".to_string(),
            hosts: vec![host.to_string()],
            allowed_domains: vec![],
            request_timeout_secs: 5,
            max_body_size: 20 * 1024 * 1024,
            links: vec![
                LinkRuleConfig {
                    reason: "forum to thread".to_string(),
                    source: None,
                    target: PathPatternConfig::Prefix("/thread-".to_string()),
                    rewrite: None,
                },
                LinkRuleConfig {
                    reason: "thread to attachment".to_string(),
                    source: Some(PathPatternConfig::Prefix("/thread-".to_string())),
                    target: PathPatternConfig::Prefix("/attach-".to_string()),
                    rewrite: None,
                },
            ],
        }
    }
}
