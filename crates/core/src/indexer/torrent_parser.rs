//! Torrent file parser - extracts everything the indexer stores from a .torrent file.
//!
//! Uses librqbit-core for the metainfo itself (info hash, raw `info` bytes,
//! file listing, top-level fields) and librqbit-bencode for the generic dict
//! kept as JSON.

use librqbit_bencode::{dyn_from_bytes, BencodeValue, ByteBuf};
use librqbit_core::torrent_metainfo::{torrent_from_bytes_ext, TorrentMetaV1Borrowed};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors that can occur when parsing torrent files.
#[derive(Debug, Error)]
pub enum TorrentParseError {
    #[error("Failed to decode bencode: {0}")]
    Bencode(String),

    #[error("Failed to parse torrent: {0}")]
    ParseError(String),

    #[error("Missing info dictionary")]
    MissingInfo,

    #[error("Empty torrent (no files)")]
    EmptyTorrent,
}

/// One file declared in the info dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    /// `/`-joined path inside the torrent.
    pub path: String,
    pub size: u64,
}

impl ParsedFile {
    pub fn filename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Lowercased extension with the leading dot, or empty.
    pub fn ext(&self) -> String {
        file_ext(self.filename())
    }
}

/// A decoded .torrent file.
#[derive(Debug, Clone)]
pub struct ParsedTorrent {
    /// sha256 of the raw file bytes.
    pub content_hash: String,
    /// BitTorrent info hash (lowercase hex).
    pub info_hash: String,
    pub name: String,
    /// Top-level dict without `info`, as JSON.
    pub meta_json: String,
    pub announce: Option<String>,
    pub created_by: Option<String>,
    pub comment: Option<String>,
    pub encoding: Option<String>,
    pub creation_date: Option<i64>,
    pub info_bytes: Vec<u8>,
    pub piece_count: u64,
    pub is_dir: bool,
    pub files: Vec<ParsedFile>,
}

impl ParsedTorrent {
    pub fn total_file_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// sha256 of raw bytes as lowercase hex.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Parse a .torrent file. Nothing is returned unless every part decodes.
pub fn parse_torrent(bytes: &[u8]) -> Result<ParsedTorrent, TorrentParseError> {
    let meta_json = match dyn_from_bytes::<ByteBuf>(bytes)
        .map_err(|e| TorrentParseError::Bencode(e.to_string()))?
    {
        BencodeValue::Dict(mut dict) => {
            if dict.remove(&ByteBuf(b"info")).is_none() {
                return Err(TorrentParseError::MissingInfo);
            }
            to_json(&BencodeValue::Dict(dict)).to_string()
        }
        _ => return Err(TorrentParseError::MissingInfo),
    };

    let parsed = torrent_from_bytes_ext::<ByteBuf>(bytes)
        .map_err(|e| TorrentParseError::ParseError(e.to_string()))?;
    let torrent: TorrentMetaV1Borrowed = parsed.meta;

    let name = torrent
        .info
        .name
        .as_ref()
        .map(|b| bytes_to_string(b.as_ref()))
        .unwrap_or_else(|| "unknown".to_string());

    let (files, is_dir) = if let Some(ref files) = torrent.info.files {
        let mut result = Vec::with_capacity(files.len());
        for file in files {
            let parts: Vec<String> = file
                .path
                .iter()
                .map(|part| bytes_to_string(part.as_ref()))
                .collect();
            result.push(ParsedFile {
                path: parts.join("/"),
                size: file.length,
            });
        }
        (result, true)
    } else if let Some(length) = torrent.info.length {
        (
            vec![ParsedFile {
                path: name.clone(),
                size: length,
            }],
            false,
        )
    } else {
        return Err(TorrentParseError::EmptyTorrent);
    };

    if files.is_empty() {
        return Err(TorrentParseError::EmptyTorrent);
    }

    let text = |value: &Option<ByteBuf>| value.as_ref().map(|b| bytes_to_string(b.as_ref()));

    Ok(ParsedTorrent {
        content_hash: content_hash(bytes),
        info_hash: torrent.info_hash.as_string(),
        name,
        meta_json,
        announce: text(&torrent.announce),
        created_by: text(&torrent.created_by),
        comment: text(&torrent.comment),
        encoding: text(&torrent.encoding),
        creation_date: torrent.creation_date.map(|d| d as i64),
        info_bytes: parsed.info_bytes.as_ref().to_vec(),
        piece_count: (torrent.info.pieces.as_ref().len() / 20) as u64,
        is_dir,
        files,
    })
}

/// Generic bencode as JSON, byte strings decoded as lossy UTF-8.
fn to_json(value: &BencodeValue<ByteBuf>) -> serde_json::Value {
    match value {
        BencodeValue::Integer(i) => serde_json::Value::from(*i),
        BencodeValue::Bytes(b) => serde_json::Value::String(bytes_to_string(b.as_ref())),
        BencodeValue::List(list) => serde_json::Value::Array(list.iter().map(to_json).collect()),
        BencodeValue::Dict(dict) => serde_json::Value::Object(
            dict.iter()
                .map(|(k, v)| (bytes_to_string(k.as_ref()), to_json(v)))
                .collect(),
        ),
    }
}

/// Lowercased extension of a file name with the leading dot, or empty.
pub fn file_ext(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => name[idx..].to_lowercase(),
        _ => String::new(),
    }
}

/// Convert bytes to a string, replacing invalid UTF-8.
fn bytes_to_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
