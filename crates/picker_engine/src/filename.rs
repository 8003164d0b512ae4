use std::collections::HashSet;

use percent_encoding::percent_decode_str;
use picker_core::MediaKind;
use url::Url;

use crate::classify::{IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};

pub const DEFAULT_FILENAME_MAX_LEN: usize = 100;

/// Filename for the `index`-th item of a batch, derived from its URL.
///
/// Falls back to `media_{index+1}.{jpg|mp4}` when the last path segment has
/// no recognized media extension.
pub fn derive_filename(url: &str, index: usize, kind: MediaKind, max_len: usize) -> String {
    let fallback = || format!("media_{}.{}", index + 1, kind.fallback_extension());

    let Ok(parsed) = Url::parse(url) else {
        return fallback();
    };
    if parsed.scheme() == "data" {
        return fallback();
    }
    let segment = parsed.path().rsplit('/').next().unwrap_or_default();
    let decoded = percent_decode_str(segment).decode_utf8_lossy();
    let name = sanitize_filename(&decoded);
    let has_known_extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS.contains(&ext.as_str()) || VIDEO_EXTENSIONS.contains(&ext.as_str())
        });
    if !has_known_extension {
        return fallback();
    }

    truncate_preserving_extension(&name, max_len)
}

/// Replaces reserved characters and whitespace with `_`, collapses runs of
/// `_` and trims them from both ends.
pub fn sanitize_filename(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        let mapped = match ch {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }
    out.trim_matches('_').to_string()
}

/// Cuts the stem so the whole name fits in `max_len` characters.
pub fn truncate_preserving_extension(name: &str, max_len: usize) -> String {
    if name.chars().count() <= max_len {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if ext.chars().count() + 1 < max_len => {
            let keep = max_len - ext.chars().count() - 1;
            let stem: String = stem.chars().take(keep).collect();
            format!("{stem}.{ext}")
        }
        _ => name.chars().take(max_len).collect(),
    }
}

/// Hands out unique names within one batch by appending `_n` to the stem.
#[derive(Debug, Default)]
pub struct FilenameRegistry {
    used: HashSet<String>,
}

impl FilenameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, name: String) -> String {
        if self.used.insert(name.clone()) {
            return name;
        }
        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), Some(ext.to_string())),
            _ => (name.clone(), None),
        };
        let mut counter = 1usize;
        loop {
            let candidate = match &ext {
                Some(ext) => format!("{stem}_{counter}.{ext}"),
                None => format!("{stem}_{counter}"),
            };
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_recognized_extension() {
        assert_eq!(
            derive_filename("https://a.example/p/Photo%201.JPG?x=1", 0, MediaKind::Image, 100),
            "Photo_1.JPG"
        );
    }

    #[test]
    fn falls_back_to_indexed_name() {
        assert_eq!(
            derive_filename("https://a.example/p/stream", 4, MediaKind::Video, 100),
            "media_5.mp4"
        );
        assert_eq!(
            derive_filename("https://a.example/view.php?w=800", 0, MediaKind::Image, 100),
            "media_1.jpg"
        );
        assert_eq!(derive_filename("https://a.example/", 2, MediaKind::Image, 100), "media_3.jpg");
        assert_eq!(derive_filename("not a url", 0, MediaKind::Video, 100), "media_1.mp4");
    }

    #[test]
    fn sanitize_collapses_and_trims() {
        assert_eq!(sanitize_filename("  a<b>  c??.jpg_"), "a_b_c_.jpg");
        assert_eq!(sanitize_filename("___"), "");
    }

    #[test]
    fn truncation_keeps_extension() {
        let name = truncate_preserving_extension(&format!("{}.jpeg", "n".repeat(120)), 100);
        assert_eq!(name.chars().count(), 100);
        assert!(name.ends_with(".jpeg"));
    }

    #[test]
    fn registry_suffixes_collisions() {
        let mut registry = FilenameRegistry::new();
        assert_eq!(registry.claim("x.jpg".into()), "x.jpg");
        assert_eq!(registry.claim("x.jpg".into()), "x_1.jpg");
        assert_eq!(registry.claim("x.jpg".into()), "x_2.jpg");
        assert_eq!(registry.claim("x_1.jpg".into()), "x_1_1.jpg");
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn escapes_are_decoded_and_bad_ones_kept() {
        assert_eq!(
            derive_filename("https://a.example/a%20b%zz%4.jpg", 0, MediaKind::Image, 100),
            "a_b%zz%4.jpg"
        );
        assert_eq!(
            derive_filename("https://a.example/caf%C3%A9%20.png", 0, MediaKind::Image, 100),
            "café_.png"
        );
    }
}
