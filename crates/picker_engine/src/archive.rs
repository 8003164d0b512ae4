use std::io::{Cursor, Write};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use picker_logging::picker_debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub filename: String,
    pub bytes: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("nothing to archive")]
    Empty,
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive task failed: {0}")]
    Task(String),
}

/// Deflates `entries` into an in-memory ZIP, in order.
pub fn build_zip(entries: &[ArchiveEntry], level: i32) -> Result<Vec<u8>, ArchiveError> {
    if entries.is_empty() {
        return Err(ArchiveError::Empty);
    }
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level))
        .unix_permissions(0o644);
    for entry in entries {
        writer.start_file(entry.filename.as_str(), options)?;
        writer.write_all(&entry.bytes)?;
    }
    let archive = writer.finish()?.into_inner();
    picker_debug!(
        "archived {} entries into {} bytes",
        entries.len(),
        archive.len()
    );
    Ok(archive)
}

/// [`build_zip`] on the blocking pool.
pub async fn build_zip_async(entries: Vec<ArchiveEntry>, level: i32) -> Result<Vec<u8>, ArchiveError> {
    tokio::task::spawn_blocking(move || build_zip(&entries, level))
        .await
        .map_err(|err| ArchiveError::Task(err.to_string()))?
}

/// `media-download-YYYY-MM-DDTHH-MM-SS.zip`
pub fn archive_filename(now: DateTime<Utc>) -> String {
    format!("media-download-{}.zip", now.format("%Y-%m-%dT%H-%M-%S"))
}
