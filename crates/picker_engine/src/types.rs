use std::fmt;

use bytes::Bytes;
use serde::Serialize;

pub type DownloadId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Bytes,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

impl FetchMetadata {
    /// Content type without parameters, lowercased.
    pub fn mime(&self) -> Option<String> {
        self.content_type.as_deref().and_then(|ct| {
            let essence = ct.split(';').next().unwrap_or(ct).trim();
            (!essence.is_empty()).then(|| essence.to_ascii_lowercase())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    EmptyBody,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::EmptyBody => write!(f, "empty response body"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// Coarse error classes surfaced to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaErrorKind {
    InvalidUrl,
    UnreachableResource,
    EmptyPayload,
    PackagingFailure,
    MessagingFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    #[error("not a valid media URL: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("could not retrieve {url}: {reason}")]
    UnreachableResource { url: String, reason: String },
    #[error("{url} returned no data")]
    EmptyPayload { url: String },
    #[error("could not build the archive: {0}")]
    PackagingFailure(String),
    #[error("cannot communicate with the page; try refreshing it")]
    MessagingFailure,
}

impl MediaError {
    pub fn kind(&self) -> MediaErrorKind {
        match self {
            MediaError::InvalidUrl { .. } => MediaErrorKind::InvalidUrl,
            MediaError::UnreachableResource { .. } => MediaErrorKind::UnreachableResource,
            MediaError::EmptyPayload { .. } => MediaErrorKind::EmptyPayload,
            MediaError::PackagingFailure(_) => MediaErrorKind::PackagingFailure,
            MediaError::MessagingFailure => MediaErrorKind::MessagingFailure,
        }
    }

    /// Classifies a transport failure for `url`.
    pub fn from_fetch(url: &str, err: &FetchError) -> Self {
        match err.kind {
            FailureKind::EmptyBody => MediaError::EmptyPayload {
                url: url.to_string(),
            },
            FailureKind::InvalidUrl => MediaError::InvalidUrl {
                url: url.to_string(),
                reason: err.message.clone(),
            },
            _ => MediaError::UnreachableResource {
                url: url.to_string(),
                reason: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SucceededItem {
    pub url: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_id: Option<DownloadId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedItem {
    pub url: String,
    pub reason: String,
    pub kind: MediaErrorKind,
}

impl FailedItem {
    pub fn new(url: impl Into<String>, error: &MediaError) -> Self {
        Self {
            url: url.into(),
            reason: error.to_string(),
            kind: error.kind(),
        }
    }
}

impl fmt::Display for FailedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.reason)
    }
}

/// Per-item outcome of a batch; every input lands in exactly one list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResult {
    pub succeeded: Vec<SucceededItem>,
    pub failed: Vec<FailedItem>,
    pub skipped: Vec<FailedItem>,
}

impl DownloadResult {
    /// Failed plus skipped, the figure the UI reports as "failed".
    pub fn unsuccessful(&self) -> usize {
        self.failed.len() + self.skipped.len()
    }
}
