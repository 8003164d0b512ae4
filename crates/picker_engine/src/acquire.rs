use std::sync::Arc;

use picker_core::MediaKind;
use picker_logging::{abbreviate, picker_debug, picker_info, picker_warn};
use serde::{Deserialize, Serialize};

use crate::archive::{archive_filename, build_zip_async, ArchiveEntry, ArchiveError};
use crate::classify::classify;
use crate::config::{AcquisitionSettings, Clock};
use crate::data_url::decode_data_url;
use crate::download::{DownloadError, DownloadRequest, DownloadStatus, Downloader};
use crate::fetch::{Credentials, Fetcher};
use crate::filename::{derive_filename, sanitize_filename, truncate_preserving_extension, FilenameRegistry};
use crate::{DownloadId, DownloadResult, FailedItem, MediaError, MediaErrorKind, SucceededItem};

/// One caller-supplied item of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRequest {
    pub url: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: MediaKind,
}

impl MediaRequest {
    pub fn new(url: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }
}

fn default_kind() -> MediaKind {
    MediaKind::Image
}

/// A batch delivered as one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipDelivery {
    pub filename: String,
    pub download_id: DownloadId,
    pub result: DownloadResult,
}

impl ZipDelivery {
    pub fn archived(&self) -> usize {
        self.result.succeeded.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleDelivery {
    pub filename: String,
    pub download_id: DownloadId,
}

#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("no URLs provided")]
    NoItems,
    #[error(
        "No files could be added to the archive; the site may block direct downloads. Try downloading individual files instead."
    )]
    NothingRetrieved { result: DownloadResult },
    #[error("none of the provided blobs could be decoded")]
    NoDecodableBlobs { result: DownloadResult },
    #[error("got {blobs} blobs but {filenames} filenames")]
    MismatchedBlobs { blobs: usize, filenames: usize },
    #[error("{0}")]
    Invalid(MediaError),
    #[error("could not build the archive: {0}")]
    Packaging(#[from] ArchiveError),
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),
}

impl AcquireError {
    pub fn kind(&self) -> MediaErrorKind {
        match self {
            AcquireError::NoItems | AcquireError::MismatchedBlobs { .. } => MediaErrorKind::InvalidUrl,
            AcquireError::Invalid(err) => err.kind(),
            AcquireError::NothingRetrieved { .. } => MediaErrorKind::UnreachableResource,
            AcquireError::NoDecodableBlobs { .. } => MediaErrorKind::EmptyPayload,
            AcquireError::Packaging(_) => MediaErrorKind::PackagingFailure,
            AcquireError::Download(_) => MediaErrorKind::UnreachableResource,
        }
    }

    /// Per-item outcome carried by batch failures.
    pub fn result(&self) -> Option<&DownloadResult> {
        match self {
            AcquireError::NothingRetrieved { result } | AcquireError::NoDecodableBlobs { result } => {
                Some(result)
            }
            _ => None,
        }
    }
}

/// Retrieves media bytes and hands them to the downloader, one item at a time.
pub struct AcquisitionService {
    fetcher: Arc<dyn Fetcher>,
    downloader: Arc<dyn Downloader>,
    settings: AcquisitionSettings,
    clock: Clock,
}

impl AcquisitionService {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        downloader: Arc<dyn Downloader>,
        settings: AcquisitionSettings,
        clock: Clock,
    ) -> Self {
        Self {
            fetcher,
            downloader,
            settings,
            clock,
        }
    }

    pub fn status(&self) -> DownloadStatus {
        self.downloader.status()
    }

    /// Fetches every valid item with credentials and delivers one archive.
    pub async fn download_batch_zip(&self, items: &[MediaRequest]) -> Result<ZipDelivery, AcquireError> {
        if items.is_empty() {
            return Err(AcquireError::NoItems);
        }
        let mut result = DownloadResult::default();
        let mut names = FilenameRegistry::new();
        let mut entries = Vec::new();

        for (index, item) in items.iter().enumerate() {
            let Some(url) = self.validate(item, &mut result) else {
                continue;
            };
            let filename = names.claim(self.filename_for(&url, index, item.kind));
            match self.fetcher.fetch(&url, Credentials::Include).await {
                Ok(output) => {
                    picker_debug!("fetched {} as {filename}", abbreviate(&url));
                    entries.push(ArchiveEntry {
                        filename: filename.clone(),
                        bytes: output.bytes,
                    });
                    result.succeeded.push(SucceededItem {
                        url: item.url.clone(),
                        filename,
                        download_id: None,
                    });
                }
                Err(err) => {
                    picker_warn!("fetch failed for {}: {err}", abbreviate(&url));
                    let error = MediaError::from_fetch(&url, &err);
                    result.failed.push(FailedItem::new(item.url.clone(), &error));
                }
            }
        }

        if entries.is_empty() {
            return Err(AcquireError::NothingRetrieved { result });
        }
        self.deliver_archive(entries, result).await
    }

    /// Hands each valid item to the downloader, pausing between items.
    pub async fn download_individually(&self, items: &[MediaRequest]) -> DownloadResult {
        let mut result = DownloadResult::default();
        let mut names = FilenameRegistry::new();
        let valid: Vec<(usize, &MediaRequest, String)> = items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let url = self.validate(item, &mut result)?;
                Some((index, item, url))
            })
            .collect();

        let last = valid.len().saturating_sub(1);
        for (position, (index, item, url)) in valid.into_iter().enumerate() {
            let filename = names.claim(self.filename_for(&url, index, item.kind));
            match self
                .downloader
                .download(DownloadRequest::url(url.clone(), filename.clone()))
                .await
            {
                Ok(id) => result.succeeded.push(SucceededItem {
                    url: item.url.clone(),
                    filename,
                    download_id: Some(id),
                }),
                Err(err) => {
                    let error = match &err {
                        DownloadError::Fetch(fetch) => MediaError::from_fetch(&url, fetch),
                        other => MediaError::UnreachableResource {
                            url: url.clone(),
                            reason: other.to_string(),
                        },
                    };
                    result.failed.push(FailedItem::new(item.url.clone(), &error));
                }
            }
            if position < last && !self.settings.download_delay.is_zero() {
                tokio::time::sleep(self.settings.download_delay).await;
            }
        }

        picker_info!(
            "individual downloads: {} succeeded, {} failed, {} skipped",
            result.succeeded.len(),
            result.failed.len(),
            result.skipped.len()
        );
        result
    }

    /// Packages caller-retrieved data URLs without touching the network.
    pub async fn create_zip_from_blobs(
        &self,
        blobs: &[String],
        filenames: &[String],
    ) -> Result<ZipDelivery, AcquireError> {
        if blobs.is_empty() {
            return Err(AcquireError::NoItems);
        }
        if blobs.len() != filenames.len() {
            return Err(AcquireError::MismatchedBlobs {
                blobs: blobs.len(),
                filenames: filenames.len(),
            });
        }
        let mut result = DownloadResult::default();
        let mut names = FilenameRegistry::new();
        let mut entries = Vec::new();

        for (blob, requested) in blobs.iter().zip(filenames) {
            match decode_data_url(blob) {
                Ok(decoded) => {
                    let cleaned = sanitize_filename(requested);
                    let cleaned = if cleaned.is_empty() {
                        let kind = if decoded.mime.starts_with("video/") {
                            MediaKind::Video
                        } else {
                            MediaKind::Image
                        };
                        format!("media_{}.{}", entries.len() + 1, kind.fallback_extension())
                    } else {
                        truncate_preserving_extension(&cleaned, self.settings.filename_max_len)
                    };
                    let filename = names.claim(cleaned);
                    entries.push(ArchiveEntry {
                        filename: filename.clone(),
                        bytes: decoded.bytes.into(),
                    });
                    result.succeeded.push(SucceededItem {
                        url: requested.clone(),
                        filename,
                        download_id: None,
                    });
                }
                Err(err) => {
                    picker_warn!("blob for {requested} rejected: {err}");
                    result.failed.push(FailedItem {
                        url: requested.clone(),
                        reason: format!("could not decode blob: {err}"),
                        kind: MediaErrorKind::EmptyPayload,
                    });
                }
            }
        }

        if entries.is_empty() {
            return Err(AcquireError::NoDecodableBlobs { result });
        }
        self.deliver_archive(entries, result).await
    }

    /// Downloads one URL natively under its derived filename.
    pub async fn download_single(&self, item: &MediaRequest) -> Result<SingleDelivery, AcquireError> {
        if item.url.trim().is_empty() {
            return Err(AcquireError::NoItems);
        }
        let mut result = DownloadResult::default();
        let Some(url) = self.validate(item, &mut result) else {
            return Err(AcquireError::Invalid(MediaError::InvalidUrl {
                url: item.url.clone(),
                reason: result
                    .skipped
                    .first()
                    .map(|skipped| skipped.reason.clone())
                    .unwrap_or_default(),
            }));
        };
        let filename = self.filename_for(&url, 0, item.kind);
        let download_id = self
            .downloader
            .download(DownloadRequest::url(url, filename.clone()))
            .await?;
        Ok(SingleDelivery {
            filename,
            download_id,
        })
    }

    fn validate(&self, item: &MediaRequest, result: &mut DownloadResult) -> Option<String> {
        let classification = classify(&item.url, None);
        if let Some(url) = classification.accepted_url() {
            return Some(url.to_string());
        }
        let reason = classification
            .reject_reason()
            .map(ToString::to_string)
            .unwrap_or_default();
        picker_debug!("skipping {}: {reason}", abbreviate(&item.url));
        let error = MediaError::InvalidUrl {
            url: item.url.clone(),
            reason,
        };
        result.skipped.push(FailedItem::new(item.url.clone(), &error));
        None
    }

    fn filename_for(&self, url: &str, index: usize, kind: MediaKind) -> String {
        derive_filename(url, index, kind, self.settings.filename_max_len)
    }

    async fn deliver_archive(
        &self,
        entries: Vec<ArchiveEntry>,
        result: DownloadResult,
    ) -> Result<ZipDelivery, AcquireError> {
        let count = entries.len();
        let archive = build_zip_async(entries, self.settings.compression_level).await?;
        let filename = archive_filename((self.clock)());
        let download_id = self
            .downloader
            .download(DownloadRequest::bytes(archive, filename.clone()))
            .await?;
        picker_info!("delivered {filename} with {count} files");
        Ok(ZipDelivery {
            filename,
            download_id,
            result,
        })
    }
}
