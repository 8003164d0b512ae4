use std::sync::{Arc, RwLock};

use picker_logging::picker_debug;
use tokio::sync::watch;
use url::Url;

use crate::decode::{decode_page, DecodeError};
use crate::fetch::{Credentials, Fetcher};
use crate::FetchError;

/// The document as the detector sees it at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSnapshot {
    pub base_url: Url,
    pub html: String,
}

impl PageSnapshot {
    pub fn new(base_url: Url, html: impl Into<String>) -> Self {
        Self {
            base_url,
            html: html.into(),
        }
    }

    pub fn parse(base_url: &str, html: impl Into<String>) -> Result<Self, PageError> {
        let base_url =
            Url::parse(base_url).map_err(|err| PageError::InvalidBase(err.to_string()))?;
        Ok(Self::new(base_url, html))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("invalid page address: {0}")]
    InvalidBase(String),
    #[error("could not load page: {0}")]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Where the engine reads the document from.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    async fn snapshot(&self) -> Result<PageSnapshot, PageError>;

    /// Change notifications, when the source can produce them. Sources
    /// without them are only rescanned by the fallback poll.
    fn changes(&self) -> Option<watch::Receiver<u64>> {
        None
    }
}

/// A fixed document.
#[derive(Debug, Clone)]
pub struct StaticPage {
    snapshot: PageSnapshot,
}

impl StaticPage {
    pub fn new(snapshot: PageSnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait::async_trait]
impl PageSource for StaticPage {
    async fn snapshot(&self) -> Result<PageSnapshot, PageError> {
        Ok(self.snapshot.clone())
    }
}

/// A document that other code may rewrite; every rewrite bumps a version
/// observed through [`PageSource::changes`].
pub struct SharedPage {
    current: RwLock<PageSnapshot>,
    version: watch::Sender<u64>,
}

impl SharedPage {
    pub fn new(snapshot: PageSnapshot) -> Arc<Self> {
        let (version, _) = watch::channel(0);
        Arc::new(Self {
            current: RwLock::new(snapshot),
            version,
        })
    }

    pub fn current(&self) -> PageSnapshot {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn replace_html(&self, html: impl Into<String>) {
        {
            let mut current = self
                .current
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            current.html = html.into();
        }
        self.version.send_modify(|version| *version += 1);
    }

    pub fn replace(&self, snapshot: PageSnapshot) {
        {
            let mut current = self
                .current
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *current = snapshot;
        }
        self.version.send_modify(|version| *version += 1);
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }
}

#[async_trait::async_trait]
impl PageSource for SharedPage {
    async fn snapshot(&self) -> Result<PageSnapshot, PageError> {
        Ok(self.current())
    }

    fn changes(&self) -> Option<watch::Receiver<u64>> {
        Some(self.version.subscribe())
    }
}

/// Loads the document over HTTP on every snapshot.
pub struct HttpPageSource {
    url: String,
    fetcher: Arc<dyn Fetcher>,
}

impl HttpPageSource {
    pub fn new(url: impl Into<String>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            url: url.into(),
            fetcher,
        }
    }
}

#[async_trait::async_trait]
impl PageSource for HttpPageSource {
    async fn snapshot(&self) -> Result<PageSnapshot, PageError> {
        let output = self.fetcher.fetch(&self.url, Credentials::Include).await?;
        let decoded = decode_page(&output.bytes, output.metadata.content_type.as_deref())?;
        picker_debug!(
            "loaded {} ({} bytes, {})",
            output.metadata.final_url,
            output.metadata.byte_len,
            decoded.encoding_label
        );
        PageSnapshot::parse(&output.metadata.final_url, decoded.html)
    }
}
