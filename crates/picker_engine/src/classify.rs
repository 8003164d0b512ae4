//! URL normalization and media classification.
//!
//! Both the detector and the acquisition service run every URL through
//! [`classify`]; the rule order below is significant and the first matching
//! rule wins.

use std::fmt;

use picker_core::MediaKind;
use url::Url;

pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "ico", "avif",
];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg", "mov", "avi", "mkv", "m4v"];

/// Substrings marking non-content imagery.
pub const EXCLUDED_PATTERNS: &[&str] = &[
    "tracking",
    "analytics",
    "pixel",
    "beacon",
    "1x1",
    "spacer",
    "blank",
    "transparent",
    "avatar",
    "profile",
    "icon",
    "logo",
    "emoji",
    "badge",
    "button",
    "spinner",
    "loader",
];

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "html", "htm", "php", "asp", "aspx", "jsp", "cgi", "pl", "py", "rb", "do", "action",
];

/// Query parameters used by image resizing endpoints.
const DYNAMIC_IMAGE_PARAMS: &[&str] = &[
    "format",
    "width",
    "height",
    "w",
    "h",
    "size",
    "tag",
    "policy",
    "signature",
];

const MEDIA_HOST_KEYWORDS: &[&str] = &[
    "images", "img", "media", "cdn", "static", "assets", "photos", "pictures", "files", "thumb",
    "upload",
];

const MEDIA_CDN_HOSTS: &[&str] = &[
    "cloudfront",
    "cloudflare",
    "akamai",
    "fastly",
    "imgix",
    "imagekit",
    "fbcdn",
    "twimg",
];

/// Data URLs at or below this length are tracking placeholders.
const MIN_DATA_URL_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlType {
    Image,
    Video,
    Unknown,
}

impl UrlType {
    pub fn media_kind(self) -> Option<MediaKind> {
        match self {
            UrlType::Image => Some(MediaKind::Image),
            UrlType::Video => Some(MediaKind::Video),
            UrlType::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Unresolvable,
    Excluded(&'static str),
    DocumentExtension(String),
    NoMediaSignal,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Unresolvable => write!(f, "unresolvable url"),
            RejectReason::Excluded(pattern) => write!(f, "matches excluded pattern {pattern:?}"),
            RejectReason::DocumentExtension(ext) => write!(f, "document extension .{ext}"),
            RejectReason::NoMediaSignal => write!(f, "no media extension or image hints"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted(UrlType),
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub url: Option<Url>,
    pub verdict: Verdict,
}

impl Classification {
    pub fn is_valid(&self) -> bool {
        matches!(self.verdict, Verdict::Accepted(_))
    }

    pub fn url_type(&self) -> UrlType {
        match self.verdict {
            Verdict::Accepted(kind) => kind,
            Verdict::Rejected(_) => UrlType::Unknown,
        }
    }

    /// The canonical URL when the verdict is positive.
    pub fn accepted_url(&self) -> Option<&Url> {
        if self.is_valid() {
            self.url.as_ref()
        } else {
            None
        }
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match &self.verdict {
            Verdict::Rejected(reason) => Some(reason),
            Verdict::Accepted(_) => None,
        }
    }

    fn rejected(url: Option<Url>, reason: RejectReason) -> Self {
        Self {
            url,
            verdict: Verdict::Rejected(reason),
        }
    }

    fn accepted(url: Url, kind: UrlType) -> Self {
        Self {
            url: Some(url),
            verdict: Verdict::Accepted(kind),
        }
    }
}

/// Resolves `raw` against `base` into an absolute URL.
///
/// Empty, fragment-only and script URLs, `blob:` handles and short `data:`
/// placeholders resolve to nothing.
pub fn to_absolute_url(raw: &str, base: Option<&Url>) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let lower = trimmed.get(..11).unwrap_or(trimmed).to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("blob:") {
        return None;
    }
    if lower.starts_with("data:") {
        if trimmed.len() <= MIN_DATA_URL_LEN {
            return None;
        }
        return Url::parse(trimmed).ok();
    }

    let resolved = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(trimmed).ok()?,
        Err(_) => return None,
    };
    match resolved.scheme() {
        "http" | "https" | "file" => Some(resolved),
        _ => None,
    }
}

/// Classifies a raw URL. Total: every input yields exactly one verdict.
pub fn classify(raw: &str, base: Option<&Url>) -> Classification {
    let Some(url) = to_absolute_url(raw, base) else {
        return Classification::rejected(None, RejectReason::Unresolvable);
    };

    if url.scheme() == "data" {
        return classify_data_url(url);
    }

    let lowered = url.as_str().to_ascii_lowercase();
    if let Some(pattern) = excluded_pattern(&lowered) {
        return Classification::rejected(Some(url), RejectReason::Excluded(pattern));
    }

    let extension = path_extension(&url);
    if let Some(ext) = extension.as_deref() {
        if IMAGE_EXTENSIONS.contains(&ext) {
            return Classification::accepted(url, UrlType::Image);
        }
        if VIDEO_EXTENSIONS.contains(&ext) {
            return Classification::accepted(url, UrlType::Video);
        }
        if DOCUMENT_EXTENSIONS.contains(&ext) && !has_dynamic_image_params(&url) {
            return Classification::rejected(
                Some(url),
                RejectReason::DocumentExtension(ext.to_string()),
            );
        }
    }

    if looks_like_media_host(&url) {
        return Classification::accepted(url, UrlType::Image);
    }

    if extension.is_none() {
        if has_dynamic_image_params(&url) {
            return Classification::accepted(url, UrlType::Image);
        }
        return Classification::rejected(Some(url), RejectReason::NoMediaSignal);
    }

    Classification::accepted(url, UrlType::Unknown)
}

fn classify_data_url(url: Url) -> Classification {
    let mime = url
        .path()
        .split([';', ','])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if mime.starts_with("image/") {
        Classification::accepted(url, UrlType::Image)
    } else if mime.starts_with("video/") {
        Classification::accepted(url, UrlType::Video)
    } else {
        Classification::rejected(Some(url), RejectReason::NoMediaSignal)
    }
}

fn excluded_pattern(lowered: &str) -> Option<&'static str> {
    EXCLUDED_PATTERNS
        .iter()
        .copied()
        .find(|pattern| lowered.contains(pattern))
}

/// Lowercased extension of the last path segment, if it has one.
pub(crate) fn path_extension(url: &Url) -> Option<String> {
    let segment = url.path().rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() && ext.is_empty() {
        return None;
    }
    let valid = (1..=6).contains(&ext.len()) && ext.bytes().all(|b| b.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

fn has_dynamic_image_params(url: &Url) -> bool {
    url.query_pairs().any(|(key, _)| {
        DYNAMIC_IMAGE_PARAMS
            .iter()
            .any(|param| key.eq_ignore_ascii_case(param))
    })
}

fn looks_like_media_host(url: &Url) -> bool {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let path = url.path().to_ascii_lowercase();
    MEDIA_CDN_HOSTS.iter().any(|cdn| host.contains(cdn))
        || MEDIA_HOST_KEYWORDS
            .iter()
            .any(|keyword| host.contains(keyword) || path.contains(keyword))
}
