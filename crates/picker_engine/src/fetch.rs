use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use picker_logging::{abbreviate, picker_debug};
use reqwest::header::CONTENT_TYPE;

use crate::data_url::{decode_data_url, DataUrlError};
use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput};

/// Whether the request carries the page's ambient credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credentials {
    Include,
    Omit,
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    /// Empty accepts any content type.
    pub allowed_content_types: Vec<String>,
    /// Headers attached only to [`Credentials::Include`] requests.
    pub credential_headers: Vec<(String, String)>,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            redirect_limit: 5,
            max_bytes: 512 * 1024 * 1024,
            allowed_content_types: Vec::new(),
            credential_headers: Vec::new(),
            user_agent: concat!("media-picker/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchSettings {
    /// Settings for loading the page document itself.
    pub fn for_pages() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, credentials: Credentials) -> Result<FetchOutput, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    fn build_client(
        &self,
        redirect_counter: Arc<AtomicUsize>,
    ) -> Result<reqwest::Client, FetchError> {
        let redirect_limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let count = attempt.previous().len();
            redirect_counter.store(count, Ordering::Relaxed);
            if count >= redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .user_agent(self.settings.user_agent.clone())
            .redirect(policy)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        if self.settings.allowed_content_types.is_empty() {
            return true;
        }
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    /// Payload of a `data:` URL; credentials do not apply.
    fn inline(&self, url: &str) -> Result<FetchOutput, FetchError> {
        let decoded = decode_data_url(url).map_err(|err| match err {
            DataUrlError::Empty => FetchError::new(FailureKind::EmptyBody, err.to_string()),
            other => FetchError::new(FailureKind::InvalidUrl, other.to_string()),
        })?;
        if !self.is_content_type_allowed(&decoded.mime) {
            return Err(FetchError::new(
                FailureKind::UnsupportedContentType {
                    content_type: decoded.mime,
                },
                "unsupported content type",
            ));
        }
        self.finish(url, url.to_string(), Some(decoded.mime), Bytes::from(decoded.bytes))
    }

    /// Contents of a local file, as referenced by pages opened from disk.
    async fn local(&self, url: &str, parsed: &reqwest::Url) -> Result<FetchOutput, FetchError> {
        let path = parsed
            .to_file_path()
            .map_err(|()| FetchError::new(FailureKind::InvalidUrl, "not a local path"))?;
        let len = tokio::fs::metadata(&path)
            .await
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?
            .len();
        if len > self.settings.max_bytes {
            return Err(self.too_large(len));
        }
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        picker_debug!("read {} ({} bytes)", path.display(), bytes.len());
        self.finish(url, url.to_string(), None, Bytes::from(bytes))
    }

    fn finish(
        &self,
        url: &str,
        final_url: String,
        content_type: Option<String>,
        bytes: Bytes,
    ) -> Result<FetchOutput, FetchError> {
        if bytes.is_empty() {
            return Err(FetchError::new(FailureKind::EmptyBody, ""));
        }
        if bytes.len() as u64 > self.settings.max_bytes {
            return Err(self.too_large(bytes.len() as u64));
        }
        Ok(FetchOutput {
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url,
                redirect_count: 0,
                content_type,
                byte_len: bytes.len() as u64,
            },
            bytes,
        })
    }

    fn too_large(&self, actual: u64) -> FetchError {
        FetchError::new(
            FailureKind::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual: Some(actual),
            },
            "response too large",
        )
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, credentials: Credentials) -> Result<FetchOutput, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => {}
            "data" => return self.inline(url),
            "file" => return self.local(url, &parsed).await,
            other => {
                return Err(FetchError::new(
                    FailureKind::InvalidUrl,
                    format!("unsupported scheme {other}"),
                ))
            }
        }
        let redirect_counter = Arc::new(AtomicUsize::new(0));
        let client = self.build_client(redirect_counter.clone())?;

        let mut request = client.get(parsed);
        if credentials == Credentials::Include {
            for (name, value) in &self.settings.credential_headers {
                request = request.header(name.as_str(), value.as_str());
            }
        }
        picker_debug!("GET {} ({credentials:?})", abbreviate(url));
        let response = request.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(self.too_large(content_len));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(FetchError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(self.too_large(next_len));
            }
            body.extend_from_slice(&chunk);
        }
        let mut output = self.finish(url, final_url, content_type, body.freeze())?;
        output.metadata.redirect_count = redirect_counter.load(Ordering::Relaxed);
        Ok(output)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
