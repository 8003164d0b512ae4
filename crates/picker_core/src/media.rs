use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Extension used when a filename has to be synthesized.
    pub fn fallback_extension(self) -> &'static str {
        match self {
            MediaKind::Image => "jpg",
            MediaKind::Video => "mp4",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Page-session unique id: `media-<seq>-<stamp_ms>`.
///
/// The sequence number is monotonic per page engine, so ordering by id is
/// detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MediaId {
    seq: u64,
    stamp_ms: u64,
}

impl MediaId {
    pub fn new(seq: u64, stamp_ms: u64) -> Self {
        Self { seq, stamp_ms }
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media-{}-{}", self.seq, self.stamp_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMediaIdError(String);

impl fmt::Display for ParseMediaIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed media id {:?}", self.0)
    }
}

impl std::error::Error for ParseMediaIdError {}

impl FromStr for MediaId {
    type Err = ParseMediaIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMediaIdError(s.to_string());
        let rest = s.strip_prefix("media-").ok_or_else(err)?;
        let (seq, stamp) = rest.split_once('-').ok_or_else(err)?;
        Ok(Self {
            seq: seq.parse().map_err(|_| err())?,
            stamp_ms: stamp.parse().map_err(|_| err())?,
        })
    }
}

impl From<MediaId> for String {
    fn from(id: MediaId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for MediaId {
    type Error = ParseMediaIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Invalidatable handle to the element a descriptor was found on.
///
/// `path` is the child-index chain from the document root. The handle never
/// keeps the element alive; resolving it against a newer document may fail,
/// in which case callers search by the element's URL-bearing attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementLocator {
    path: Vec<usize>,
    tag: String,
}

impl ElementLocator {
    pub fn new(path: Vec<usize>, tag: impl Into<String>) -> Self {
        Self {
            path,
            tag: tag.into().to_ascii_lowercase(),
        }
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl fmt::Display for ElementLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@", self.tag)?;
        for (i, idx) in self.path.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{idx}")?;
        }
        Ok(())
    }
}

/// A document-sourced media reference that already passed URL validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub kind: MediaKind,
    pub element: ElementLocator,
    pub poster: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDescriptor {
    pub id: MediaId,
    pub url: String,
    pub kind: MediaKind,
    pub element: ElementLocator,
    pub poster: Option<String>,
}

impl MediaDescriptor {
    pub(crate) fn from_candidate(id: MediaId, candidate: Candidate) -> Self {
        Self {
            id,
            url: candidate.url,
            kind: candidate.kind,
            element: candidate.element,
            poster: candidate.poster,
        }
    }

    /// Images preview themselves; videos prefer their poster frame.
    pub fn thumbnail_url(&self) -> &str {
        match self.kind {
            MediaKind::Image => &self.url,
            MediaKind::Video => self.poster.as_deref().unwrap_or(&self.url),
        }
    }
}
