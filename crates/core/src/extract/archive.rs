//! Archive readers.
//!
//! Each reader lists the non-directory entries of an in-memory archive as
//! [`ExtractedFile`]s carrying the archive's origin URL.

use std::io::{Cursor, Read, Write};

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use zip::ZipArchive;

use super::ExtractedFile;
use crate::metrics;

const S_IFMT: u32 = 0o170000;

/// Errors that can occur while reading an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to open archive: {0}")]
    OpenFailed(String),

    #[error("Failed to read archive entry {entry}: {reason}")]
    ReadEntry { entry: String, reason: String },

    #[error("Archive entry {entry} exceeds {limit} bytes")]
    EntryTooLarge { entry: String, limit: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Rar,
    SevenZ,
}

impl ArchiveFormat {
    pub fn from_ext(ext: &str) -> Option<Self> {
        match ext {
            ".zip" => Some(Self::Zip),
            ".rar" => Some(Self::Rar),
            ".7z" => Some(Self::SevenZ),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Rar => "rar",
            Self::SevenZ => "7z",
        }
    }
}

/// Entry size cap used when the caller does not set one.
pub const DEFAULT_MAX_ENTRY_SIZE: u64 = 64 * 1024 * 1024;

/// Read every file entry of an archive.
///
/// Entries that declare or decompress to more than `max_entry_size` bytes
/// fail the whole archive with [`ArchiveError::EntryTooLarge`].
pub fn read_entries(
    format: ArchiveFormat,
    archive: &ExtractedFile,
    max_entry_size: u64,
) -> Result<Vec<ExtractedFile>, ArchiveError> {
    let entries = match format {
        ArchiveFormat::Zip => read_zip(archive, max_entry_size)?,
        ArchiveFormat::Rar => read_rar(archive, max_entry_size)?,
        ArchiveFormat::SevenZ => read_7z(archive, max_entry_size)?,
    };

    metrics::ARCHIVE_ENTRIES
        .with_label_values(&[format.as_str()])
        .inc_by(entries.len() as u64);
    tracing::debug!(
        file = %archive.path,
        format = format.as_str(),
        entries = entries.len(),
        "read archive"
    );
    Ok(entries)
}

fn check_declared(entry: &str, size: u64, limit: u64) -> Result<(), ArchiveError> {
    if size > limit {
        return Err(ArchiveError::EntryTooLarge {
            entry: entry.to_string(),
            limit,
        });
    }
    Ok(())
}

/// Read at most `limit` bytes; one more means the entry is over the cap.
fn read_capped(entry: &str, reader: impl Read, limit: u64) -> Result<Vec<u8>, ArchiveError> {
    let mut data = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut data)
        .map_err(|e| ArchiveError::ReadEntry {
            entry: entry.to_string(),
            reason: e.to_string(),
        })?;
    check_declared(entry, data.len() as u64, limit)?;
    Ok(data)
}

fn utc(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(hour, min, sec)
        .map(|t| t.and_utc())
}

/// Decode an MS-DOS packed date and time.
fn dos_time(t: u32) -> Option<DateTime<Utc>> {
    utc(
        ((t >> 25) & 0x7f) as i32 + 1980,
        (t >> 21) & 0x0f,
        (t >> 16) & 0x1f,
        (t >> 11) & 0x1f,
        (t >> 5) & 0x3f,
        (t & 0x1f) * 2,
    )
}

/// Unix permission bits, when the attribute word carries them.
fn unix_mode(attr: u32) -> Option<u32> {
    (attr & S_IFMT != 0).then_some(attr)
}

fn read_zip(archive: &ExtractedFile, limit: u64) -> Result<Vec<ExtractedFile>, ArchiveError> {
    let mut zip = ZipArchive::new(Cursor::new(archive.data.as_slice()))?;
    let mut entries = Vec::with_capacity(zip.len());

    for i in 0..zip.len() {
        let mut file = zip.by_index(i)?;
        if file.is_dir() {
            continue;
        }

        let path = file.name().to_string();
        check_declared(&path, file.size(), limit)?;
        let data = read_capped(&path, &mut file, limit)?;

        let mut entry = archive.entry(path, data);
        entry.length = file.size();
        entry.mode = file.unix_mode();
        entry.modified = file.last_modified().and_then(|t| {
            utc(
                t.year() as i32,
                t.month() as u32,
                t.day() as u32,
                t.hour() as u32,
                t.minute() as u32,
                t.second() as u32,
            )
        });
        entries.push(entry);
    }

    Ok(entries)
}

fn read_7z(archive: &ExtractedFile, limit: u64) -> Result<Vec<ExtractedFile>, ArchiveError> {
    let len = archive.data.len() as u64;
    let mut reader = sevenz_rust::SevenZReader::new(
        Cursor::new(archive.data.as_slice()),
        len,
        sevenz_rust::Password::empty(),
    )
    .map_err(|e| ArchiveError::OpenFailed(e.to_string()))?;

    let mut entries = Vec::new();
    let mut read_error = None;
    reader
        .for_each_entries(|entry, data| {
            if entry.is_directory() {
                return Ok(true);
            }
            let buf = match check_declared(entry.name(), entry.size(), limit)
                .and_then(|_| read_capped(entry.name(), data, limit))
            {
                Ok(buf) => buf,
                Err(e) => {
                    read_error = Some(e);
                    return Ok(false);
                }
            };

            let mut file = archive.entry(entry.name(), buf);
            file.length = entry.size();
            if entry.has_last_modified_date {
                file.modified =
                    DateTime::from_timestamp(entry.last_modified_date().to_unix_time(), 0);
            }
            // p7zip keeps the unix mode in the high word
            if entry.has_windows_attributes && entry.windows_attributes() & 0x8000 != 0 {
                file.mode = unix_mode(entry.windows_attributes() >> 16);
            }
            entries.push(file);
            Ok(true)
        })
        .map_err(|e| ArchiveError::OpenFailed(e.to_string()))?;

    match read_error {
        Some(e) => Err(e),
        None => Ok(entries),
    }
}

fn read_rar(archive: &ExtractedFile, limit: u64) -> Result<Vec<ExtractedFile>, ArchiveError> {
    // unrar only reads from disk
    let mut temp = tempfile::Builder::new()
        .prefix("torrenti-")
        .suffix(".rar")
        .tempfile()?;
    temp.write_all(&archive.data)?;
    temp.flush()?;

    let mut rar = unrar::Archive::new(temp.path())
        .open_for_processing()
        .map_err(|e| ArchiveError::OpenFailed(e.to_string()))?;

    let mut entries = Vec::new();
    while let Some(header) = rar
        .read_header()
        .map_err(|e| ArchiveError::OpenFailed(e.to_string()))?
    {
        let meta = header.entry();
        let path = meta.filename.to_string_lossy().into_owned();
        let size = meta.unpacked_size;
        let modified = dos_time(meta.file_time);
        let mode = unix_mode(meta.file_attr);

        rar = if meta.is_file() {
            check_declared(&path, size, limit)?;
            let (data, rest) = header.read().map_err(|e| ArchiveError::ReadEntry {
                entry: path.clone(),
                reason: e.to_string(),
            })?;
            check_declared(&path, data.len() as u64, limit)?;

            let mut file = archive.entry(path, data);
            file.length = size;
            file.modified = modified;
            file.mode = mode;
            entries.push(file);
            rest
        } else {
            header
                .skip()
                .map_err(|e| ArchiveError::OpenFailed(e.to_string()))?
        };
    }

    Ok(entries)
}
