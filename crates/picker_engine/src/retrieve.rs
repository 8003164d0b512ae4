//! Page-context byte retrieval for `fetchMediaAsBlobs`.
//!
//! Strategies run in order and the first one producing a non-empty payload
//! wins. Items that no strategy can retrieve are reported, not fatal.

use std::sync::Arc;

use bytes::Bytes;
use picker_core::{ElementLocator, MediaKind};
use picker_logging::{abbreviate, picker_debug, picker_info, picker_warn};

use crate::data_url::{encode_data_url, guess_mime};
use crate::fetch::{Credentials, FetchSettings, Fetcher, ReqwestFetcher};
use crate::filename::{derive_filename, FilenameRegistry, DEFAULT_FILENAME_MAX_LEN};
use crate::{FailedItem, FetchError, MediaError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalItem {
    pub url: String,
    pub kind: MediaKind,
    /// Set when the item is an image still rendered by the page.
    pub live_element: Option<ElementLocator>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieved {
    pub bytes: Bytes,
    pub mime: String,
    pub strategy: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetrievalError {
    #[error("not applicable")]
    NotApplicable,
    #[error("read-back refused: {0}")]
    Readback(#[from] ReadbackError),
    #[error("{0}")]
    Fetch(#[from] FetchError),
    #[error("empty payload")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReadbackError {
    #[error("image not loaded")]
    NotLoaded,
    #[error("cross-origin pixels are tainted")]
    Tainted,
    #[error("no rendering surface available")]
    Unsupported,
}

/// Access to decoded pixels of a rendered image, re-encoded as JPEG.
pub trait SurfaceProvider: Send + Sync {
    fn read_back(&self, element: &ElementLocator, url: &str) -> Result<Bytes, ReadbackError>;
}

/// Headless contexts have nothing to read back from.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSurfaces;

impl SurfaceProvider for NoSurfaces {
    fn read_back(&self, _element: &ElementLocator, _url: &str) -> Result<Bytes, ReadbackError> {
        Err(ReadbackError::Unsupported)
    }
}

#[async_trait::async_trait]
pub trait RetrievalStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn retrieve(&self, item: &RetrievalItem) -> Result<Retrieved, RetrievalError>;
}

pub struct CanvasReadback {
    surfaces: Arc<dyn SurfaceProvider>,
}

impl CanvasReadback {
    pub fn new(surfaces: Arc<dyn SurfaceProvider>) -> Self {
        Self { surfaces }
    }
}

#[async_trait::async_trait]
impl RetrievalStrategy for CanvasReadback {
    fn name(&self) -> &'static str {
        "canvas"
    }

    async fn retrieve(&self, item: &RetrievalItem) -> Result<Retrieved, RetrievalError> {
        let element = match (&item.live_element, item.kind) {
            (Some(element), MediaKind::Image) => element,
            _ => return Err(RetrievalError::NotApplicable),
        };
        let bytes = self.surfaces.read_back(element, &item.url)?;
        Ok(Retrieved {
            bytes,
            mime: "image/jpeg".to_string(),
            strategy: self.name(),
        })
    }
}

/// Cross-origin fetch without the page's credentials.
pub struct CorsFetch {
    fetcher: Arc<dyn Fetcher>,
}

impl CorsFetch {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait::async_trait]
impl RetrievalStrategy for CorsFetch {
    fn name(&self) -> &'static str {
        "fetch"
    }

    async fn retrieve(&self, item: &RetrievalItem) -> Result<Retrieved, RetrievalError> {
        fetch_payload(self.fetcher.as_ref(), item, self.name()).await
    }
}

/// Last-resort plain request with its own timeout.
pub struct LegacyRequest {
    fetcher: Arc<dyn Fetcher>,
}

impl LegacyRequest {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait::async_trait]
impl RetrievalStrategy for LegacyRequest {
    fn name(&self) -> &'static str {
        "legacy"
    }

    async fn retrieve(&self, item: &RetrievalItem) -> Result<Retrieved, RetrievalError> {
        fetch_payload(self.fetcher.as_ref(), item, self.name()).await
    }
}

async fn fetch_payload(
    fetcher: &dyn Fetcher,
    item: &RetrievalItem,
    strategy: &'static str,
) -> Result<Retrieved, RetrievalError> {
    let output = fetcher.fetch(&item.url, Credentials::Omit).await?;
    if output.bytes.is_empty() {
        return Err(RetrievalError::Empty);
    }
    let mime = output
        .metadata
        .mime()
        .unwrap_or_else(|| guess_mime(&item.url, item.kind).to_string());
    Ok(Retrieved {
        bytes: output.bytes,
        mime,
        strategy,
    })
}

/// Data URLs with their derived filenames, index aligned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlobBundle {
    pub blobs: Vec<String>,
    pub filenames: Vec<String>,
    pub errors: Vec<FailedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlobsError {
    #[error("no items to retrieve")]
    NothingSelected,
    #[error("could not retrieve any media: {}", summarize(.errors))]
    NothingRetrieved { errors: Vec<FailedItem> },
}

fn summarize(errors: &[FailedItem]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub struct RetrievalChain {
    strategies: Vec<Arc<dyn RetrievalStrategy>>,
    filename_max_len: usize,
}

impl RetrievalChain {
    pub fn new(strategies: Vec<Arc<dyn RetrievalStrategy>>) -> Self {
        Self {
            strategies,
            filename_max_len: DEFAULT_FILENAME_MAX_LEN,
        }
    }

    /// Read-back, then credential-less fetch, then a legacy request bounded by
    /// `legacy_timeout`.
    pub fn standard(
        surfaces: Arc<dyn SurfaceProvider>,
        fetch: FetchSettings,
        legacy_timeout: std::time::Duration,
    ) -> Self {
        let cors: Arc<dyn Fetcher> = Arc::new(ReqwestFetcher::new(fetch.clone()));
        let legacy: Arc<dyn Fetcher> =
            Arc::new(ReqwestFetcher::new(fetch.with_timeout(legacy_timeout)));
        Self::new(vec![
            Arc::new(CanvasReadback::new(surfaces)),
            Arc::new(CorsFetch::new(cors)),
            Arc::new(LegacyRequest::new(legacy)),
        ])
    }

    pub fn with_filename_max_len(mut self, max_len: usize) -> Self {
        self.filename_max_len = max_len;
        self
    }

    /// First strategy to succeed; otherwise every strategy's error in order.
    pub async fn retrieve(
        &self,
        item: &RetrievalItem,
    ) -> Result<Retrieved, Vec<(&'static str, RetrievalError)>> {
        let mut errors = Vec::new();
        for strategy in &self.strategies {
            match strategy.retrieve(item).await {
                Ok(retrieved) if !retrieved.bytes.is_empty() => {
                    picker_debug!(
                        "{} retrieved {} ({} bytes)",
                        strategy.name(),
                        abbreviate(&item.url),
                        retrieved.bytes.len()
                    );
                    return Ok(retrieved);
                }
                Ok(_) => errors.push((strategy.name(), RetrievalError::Empty)),
                Err(RetrievalError::NotApplicable) => {}
                Err(err) => errors.push((strategy.name(), err)),
            }
        }
        Err(errors)
    }

    /// Retrieves every item in order as base64 data URLs.
    pub async fn fetch_as_blobs(&self, items: &[RetrievalItem]) -> Result<BlobBundle, BlobsError> {
        if items.is_empty() {
            return Err(BlobsError::NothingSelected);
        }
        let mut bundle = BlobBundle::default();
        let mut names = FilenameRegistry::new();
        for item in items {
            match self.retrieve(item).await {
                Ok(retrieved) => {
                    let index = bundle.blobs.len();
                    let name = derive_filename(&item.url, index, item.kind, self.filename_max_len);
                    bundle.filenames.push(names.claim(name));
                    bundle.blobs.push(encode_data_url(&retrieved.mime, &retrieved.bytes));
                }
                Err(errors) => {
                    let reason = if errors.is_empty() {
                        "no retrieval strategy applies".to_string()
                    } else {
                        errors
                            .iter()
                            .map(|(name, err)| format!("{name}: {err}"))
                            .collect::<Vec<_>>()
                            .join(", ")
                    };
                    picker_warn!("could not retrieve {}: {reason}", abbreviate(&item.url));
                    let error = MediaError::UnreachableResource {
                        url: item.url.clone(),
                        reason,
                    };
                    bundle.errors.push(FailedItem::new(item.url.clone(), &error));
                }
            }
        }
        if bundle.blobs.is_empty() {
            return Err(BlobsError::NothingRetrieved {
                errors: bundle.errors,
            });
        }
        picker_info!(
            "retrieved {} of {} selected items",
            bundle.blobs.len(),
            items.len()
        );
        Ok(bundle)
    }
}
