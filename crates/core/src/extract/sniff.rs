//! Effective extension detection.
//!
//! The name suffix is only a hint: bencoded metainfo is recognised by its
//! first bytes whatever the name says, archive names are checked against
//! their magic bytes, and HTML served under another name is an error page.

use super::ExtractedFile;
use crate::indexer::torrent_parser::file_ext;

const TORRENT_MAGIC: [&[u8]; 2] = [b"d8:announce", b"d13:announce-list"];

pub fn is_torrent(data: &[u8]) -> bool {
    TORRENT_MAGIC.iter().any(|magic| data.starts_with(magic))
}

fn is_html(data: &[u8]) -> bool {
    let head = &data[..data.len().min(64)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start().to_ascii_lowercase();
    head.starts_with("<html") || head.starts_with("<!doctype html")
}

fn archive_ext(data: &[u8]) -> Option<&'static str> {
    if infer::archive::is_zip(data) {
        Some(".zip")
    } else if infer::archive::is_rar(data) {
        Some(".rar")
    } else if infer::archive::is_7z(data) {
        Some(".7z")
    } else {
        None
    }
}

fn is_valid_ext(ext: &str) -> bool {
    ext.len() > 1
        && ext.starts_with('.')
        && ext[1..]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

/// Detected MIME type of the content, for error context.
pub fn sniff_mime(data: &[u8]) -> &'static str {
    if is_torrent(data) {
        return "application/x-bittorrent";
    }
    if is_html(data) {
        return "text/html";
    }
    infer::get(data)
        .map(|kind| kind.mime_type())
        .unwrap_or("application/octet-stream")
}

/// Lowercased extension with the leading dot, corrected by content.
pub fn sniff_ext(file: &ExtractedFile) -> String {
    let named = file_ext(file.name());
    let ext = detect(&named, &file.data);
    if ext != named {
        tracing::debug!(file = %file.path, from = %named, ext = %ext, "fix ext");
    }
    ext
}

fn detect(named: &str, data: &[u8]) -> String {
    if is_torrent(data) {
        return ".torrent".to_string();
    }

    if matches!(named, ".zip" | ".rar" | ".7z" | "") {
        if let Some(ext) = archive_ext(data) {
            return ext.to_string();
        }
    }

    if !is_valid_ext(named) {
        return String::new();
    }

    if named != ".html" && named != ".htm" && is_html(data) {
        return ".html".to_string();
    }

    named.to_string()
}
