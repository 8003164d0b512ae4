use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use picker_logging::{abbreviate, picker_info, picker_warn};
use serde::Serialize;

use crate::fetch::{Credentials, Fetcher};
use crate::persist::{AtomicFileWriter, PersistError};
use crate::{DownloadId, FetchError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadSource {
    Url(String),
    Bytes(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub source: DownloadSource,
    pub filename: String,
}

impl DownloadRequest {
    pub fn url(url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            source: DownloadSource::Url(url.into()),
            filename: filename.into(),
        }
    }

    pub fn bytes(bytes: impl Into<Bytes>, filename: impl Into<String>) -> Self {
        Self {
            source: DownloadSource::Bytes(bytes.into()),
            filename: filename.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("{0}")]
    Fetch(#[from] FetchError),
    #[error("could not save file: {0}")]
    Persist(#[from] PersistError),
    #[error("download task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DownloadStatus {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    pub id: DownloadId,
    pub filename: String,
    pub source_url: Option<String>,
    pub saved_to: Option<PathBuf>,
    pub error: Option<String>,
}

/// The host's native download mechanism.
#[async_trait::async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, request: DownloadRequest) -> Result<DownloadId, DownloadError>;

    fn status(&self) -> DownloadStatus;
}

#[derive(Debug, Default)]
struct Ledger {
    active: BTreeMap<DownloadId, DownloadRecord>,
    completed: Vec<DownloadRecord>,
    failed: Vec<DownloadRecord>,
}

/// Saves downloads into a directory, never clobbering existing files.
pub struct DirectoryDownloader {
    writer: AtomicFileWriter,
    fetcher: Arc<dyn Fetcher>,
    next_id: AtomicU64,
    ledger: Mutex<Ledger>,
}

impl DirectoryDownloader {
    pub fn new(dir: PathBuf, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
            fetcher,
            next_id: AtomicU64::new(1),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn completed(&self) -> Vec<DownloadRecord> {
        self.ledger().completed.clone()
    }

    pub fn failed(&self) -> Vec<DownloadRecord> {
        self.ledger().failed.clone()
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn finish(&self, id: DownloadId, outcome: Result<PathBuf, String>) {
        let mut ledger = self.ledger();
        let Some(mut record) = ledger.active.remove(&id) else {
            return;
        };
        match outcome {
            Ok(path) => {
                record.saved_to = Some(path);
                ledger.completed.push(record);
            }
            Err(error) => {
                record.error = Some(error);
                ledger.failed.push(record);
            }
        }
    }
}

#[async_trait::async_trait]
impl Downloader for DirectoryDownloader {
    async fn download(&self, request: DownloadRequest) -> Result<DownloadId, DownloadError> {
        let DownloadRequest { source, filename } = request;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let source_url = match &source {
            DownloadSource::Url(url) => Some(url.clone()),
            DownloadSource::Bytes(_) => None,
        };
        self.ledger().active.insert(
            id,
            DownloadRecord {
                id,
                filename: filename.clone(),
                source_url,
                saved_to: None,
                error: None,
            },
        );

        let result = async {
            let bytes = match source {
                DownloadSource::Url(url) => {
                    self.fetcher.fetch(&url, Credentials::Include).await?.bytes
                }
                DownloadSource::Bytes(bytes) => bytes,
            };
            let writer = self.writer.clone();
            let target = filename.clone();
            let path = tokio::task::spawn_blocking(move || writer.write(&target, &bytes))
                .await
                .map_err(|err| DownloadError::Task(err.to_string()))??;
            Ok::<_, DownloadError>(path)
        }
        .await;

        match result {
            Ok(path) => {
                picker_info!("download {id} saved to {}", path.display());
                self.finish(id, Ok(path));
                Ok(id)
            }
            Err(err) => {
                picker_warn!("download {id} ({}) failed: {err}", abbreviate(&filename));
                self.finish(id, Err(err.to_string()));
                Err(err)
            }
        }
    }

    fn status(&self) -> DownloadStatus {
        let ledger = self.ledger();
        DownloadStatus {
            active: ledger.active.len(),
            completed: ledger.completed.len(),
            failed: ledger.failed.len(),
        }
    }
}
