//! Document scanning.
//!
//! Every public entry point parses the snapshot itself and drops the parsed
//! tree before returning, so nothing here is held across an `.await`.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use ego_tree::{NodeId, NodeRef};
use picker_core::{Candidate, ElementLocator, MediaKind};
use picker_logging::{abbreviate, picker_debug, picker_trace, picker_warn};
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::classify::{classify, to_absolute_url};
use crate::config::DetectorConfig;
use crate::page::PageSnapshot;
use crate::srcset::{best_srcset_url, parse_srcset};

/// Sizes the renderer knows about; a static document knows none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementMetrics {
    pub natural: Option<(u32, u32)>,
    pub rendered: Option<(u32, u32)>,
}

pub trait LayoutProbe: Send + Sync {
    fn metrics(&self, element: &ElementLocator, url: &str) -> ElementMetrics;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoLayout;

impl LayoutProbe for NoLayout {
    fn metrics(&self, _element: &ElementLocator, _url: &str) -> ElementMetrics {
        ElementMetrics::default()
    }
}

pub struct MediaDetector {
    config: RwLock<DetectorConfig>,
    layout: Arc<dyn LayoutProbe>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    MinSize,
    Open,
}

impl MediaDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_layout(config, Arc::new(NoLayout))
    }

    pub fn with_layout(config: DetectorConfig, layout: Arc<dyn LayoutProbe>) -> Self {
        Self {
            config: RwLock::new(config),
            layout,
        }
    }

    pub fn config(&self) -> DetectorConfig {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn update_config(&self, apply: impl FnOnce(&mut DetectorConfig)) {
        let mut config = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        apply(&mut config);
    }

    /// Custom selectors, then `<img>`, `<picture>` and `<video>` passes.
    pub fn scan(&self, page: &PageSnapshot) -> Vec<Candidate> {
        self.run(page, false)
    }

    /// [`scan`](Self::scan) plus every slide of an open lightbox.
    pub fn scan_continuous(&self, page: &PageSnapshot) -> Vec<Candidate> {
        self.run(page, true)
    }

    /// Image of the lightbox slide currently shown, if a lightbox is open.
    pub fn active_slide(&self, page: &PageSnapshot) -> Option<Candidate> {
        let config = self.config();
        let document = Html::parse_document(&page.html);
        let base = document_base(&document, &page.base_url);
        let container = selector(&config.lightbox.container)?;
        let active = selector(&config.lightbox.active_item)?;
        let image = selector(&config.lightbox.image)?;

        let root = document.select(&container).next()?;
        let slide = root.select(&active).next()?;
        let img = slide.select(&image).next()?;
        let src = img.value().attr("src")?;
        let url = classify(src, Some(&base)).accepted_url()?.to_string();
        Some(Candidate {
            url,
            kind: MediaKind::Image,
            element: locate(img),
            poster: None,
        })
    }

    /// Re-finds each `(locator, url)` in the current document. A locator that
    /// no longer points at an element mentioning `url` falls back to a search
    /// by URL among elements with the same tag.
    pub fn relocate(
        &self,
        page: &PageSnapshot,
        targets: &[(ElementLocator, String)],
    ) -> Vec<Option<ElementLocator>> {
        let document = Html::parse_document(&page.html);
        let base = document_base(&document, &page.base_url);
        targets
            .iter()
            .map(|(locator, url)| {
                if let Some(element) = resolve_locator(&document, locator) {
                    if mentions(element, url, &base) {
                        return Some(locator.clone());
                    }
                }
                let by_tag = selector(locator.tag())?;
                document
                    .select(&by_tag)
                    .find(|element| mentions(*element, url, &base))
                    .map(locate)
            })
            .collect()
    }

    fn run(&self, page: &PageSnapshot, with_lightbox: bool) -> Vec<Candidate> {
        let config = self.config();
        let document = Html::parse_document(&page.html);
        let base = document_base(&document, &page.base_url);
        let mut pass = ScanPass::new(&config, &base, self.layout.as_ref());
        pass.custom_selectors(&document);
        pass.images(&document);
        pass.pictures(&document);
        pass.videos(&document);
        if with_lightbox {
            pass.lightbox_slides(&document);
        }
        let found = pass.found;
        picker_debug!(
            "scanned {}: {} candidates",
            abbreviate(page.base_url.as_str()),
            found.len()
        );
        found
    }
}

struct ScanPass<'a> {
    config: &'a DetectorConfig,
    base: &'a Url,
    layout: &'a dyn LayoutProbe,
    seen: HashSet<String>,
    claimed: HashSet<NodeId>,
    found: Vec<Candidate>,
}

impl<'a> ScanPass<'a> {
    fn new(config: &'a DetectorConfig, base: &'a Url, layout: &'a dyn LayoutProbe) -> Self {
        Self {
            config,
            base,
            layout,
            seen: HashSet::new(),
            claimed: HashSet::new(),
            found: Vec::new(),
        }
    }

    /// Classifies `raw` and records it under `anchor`. `media` is the element
    /// whose dimensions gate the candidate.
    fn offer(
        &mut self,
        raw: &str,
        kind: MediaKind,
        anchor: ElementRef<'_>,
        media: ElementRef<'_>,
        gate: Gate,
        poster: Option<String>,
    ) -> bool {
        let classification = classify(raw, Some(self.base));
        let Some(url) = classification.accepted_url() else {
            if let Some(reason) = classification.reject_reason() {
                picker_trace!("skip {}: {reason}", abbreviate(raw));
            }
            return false;
        };
        let url = url.to_string();
        if self.seen.contains(&url) {
            return false;
        }
        if gate == Gate::MinSize && !self.meets_min_size(media, &url) {
            picker_trace!("skip {}: below minimum size", abbreviate(&url));
            return false;
        }
        self.seen.insert(url.clone());
        self.found.push(Candidate {
            url,
            kind,
            element: locate(anchor),
            poster,
        });
        true
    }

    fn meets_min_size(&self, media: ElementRef<'_>, url: &str) -> bool {
        let metrics = self.layout.metrics(&locate(media), url);
        let attr_width = parse_dimension(media.value().attr("width"));
        let attr_height = parse_dimension(media.value().attr("height"));
        let width = [metrics.natural.map(|d| d.0), metrics.rendered.map(|d| d.0), attr_width]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(0);
        let height = [metrics.natural.map(|d| d.1), metrics.rendered.map(|d| d.1), attr_height]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(0);
        if width >= self.config.min_width && height >= self.config.min_height {
            return true;
        }
        let lowered = url.to_ascii_lowercase();
        self.config
            .size_gate_bypass
            .iter()
            .any(|keyword| lowered.contains(&keyword.to_ascii_lowercase()))
    }

    fn custom_selectors(&mut self, document: &Html) {
        let config = self.config;
        for text in &config.custom_selectors {
            let Some(custom) = selector(text) else {
                continue;
            };
            for element in document.select(&custom) {
                let Some((raw, kind, media)) = custom_source(element) else {
                    continue;
                };
                let gate = match kind {
                    MediaKind::Image => Gate::MinSize,
                    MediaKind::Video => Gate::Open,
                };
                if self.offer(&raw, kind, element, media, gate, None) {
                    self.claimed.insert(media.id());
                    self.claimed.insert(element.id());
                }
            }
        }
    }

    fn images(&mut self, document: &Html) {
        let Some(images) = selector("img") else {
            return;
        };
        for img in document.select(&images) {
            if self.claimed.contains(&img.id()) {
                continue;
            }
            if let Some(src) = img.value().attr("src") {
                self.offer(src, MediaKind::Image, img, img, Gate::MinSize, None);
            }
            if let Some(srcset) = img.value().attr("srcset") {
                if let Some(url) = best_srcset_url(srcset, Some(self.base), self.config.srcset_ranking)
                {
                    self.offer(url.as_str(), MediaKind::Image, img, img, Gate::Open, None);
                }
            }
            if let Some(url) = self.lazy_source(img) {
                self.offer(url.as_str(), MediaKind::Image, img, img, Gate::Open, None);
            }
        }
    }

    fn lazy_source(&self, element: ElementRef<'_>) -> Option<Url> {
        self.config.lazy_load_attrs.iter().find_map(|attr| {
            let value = element.value().attr(attr.as_str())?;
            if attr.ends_with("srcset") {
                best_srcset_url(value, Some(self.base), self.config.srcset_ranking)
            } else {
                to_absolute_url(value, Some(self.base))
            }
        })
    }

    fn pictures(&mut self, document: &Html) {
        let (Some(pictures), Some(sources)) = (selector("picture"), selector("source")) else {
            return;
        };
        for picture in document.select(&pictures) {
            if self.claimed.contains(&picture.id()) {
                continue;
            }
            for source in picture.select(&sources) {
                let Some(srcset) = source.value().attr("srcset") else {
                    continue;
                };
                if let Some(url) = best_srcset_url(srcset, Some(self.base), self.config.srcset_ranking)
                {
                    self.offer(url.as_str(), MediaKind::Image, picture, source, Gate::Open, None);
                }
            }
        }
    }

    fn videos(&mut self, document: &Html) {
        let (Some(videos), Some(sources)) = (selector("video"), selector("source")) else {
            return;
        };
        for video in document.select(&videos) {
            if self.claimed.contains(&video.id()) {
                continue;
            }
            let poster = video
                .value()
                .attr("poster")
                .and_then(|poster| to_absolute_url(poster, Some(self.base)))
                .map(|poster| poster.to_string());
            let urls: Vec<&str> = video
                .value()
                .attr("src")
                .into_iter()
                .chain(video.select(&sources).filter_map(|source| source.value().attr("src")))
                .collect();

            let mut yielded = false;
            for raw in urls {
                yielded |= self.offer(raw, MediaKind::Video, video, video, Gate::Open, poster.clone());
            }
            if !yielded {
                if let Some(poster) = &poster {
                    self.offer(poster, MediaKind::Image, video, video, Gate::Open, None);
                }
            }
        }
    }

    fn lightbox_slides(&mut self, document: &Html) {
        let lightbox = &self.config.lightbox;
        let (Some(container), Some(item), Some(image)) = (
            selector(&lightbox.container),
            selector(&lightbox.item),
            selector(&lightbox.image),
        ) else {
            return;
        };
        let Some(root) = document.select(&container).next() else {
            return;
        };
        for slide in root.select(&item) {
            let Some(img) = slide.select(&image).next() else {
                continue;
            };
            if let Some(src) = img.value().attr("src") {
                self.offer(src, MediaKind::Image, img, img, Gate::Open, None);
            }
        }
    }
}

/// Child-index path from the document root to `element`.
pub fn locate(element: ElementRef<'_>) -> ElementLocator {
    let mut path = Vec::new();
    let mut node: NodeRef<'_, Node> = *element;
    while let Some(parent) = node.parent() {
        path.push(node.prev_siblings().count());
        node = parent;
    }
    path.reverse();
    ElementLocator::new(path, element.value().name())
}

/// The element `locator` points at, if it still exists with the same tag.
pub fn resolve_locator<'a>(document: &'a Html, locator: &ElementLocator) -> Option<ElementRef<'a>> {
    let mut node = document.tree.root();
    for &index in locator.path() {
        node = node.children().nth(index)?;
    }
    let element = ElementRef::wrap(node)?;
    (element.value().name() == locator.tag()).then_some(element)
}

fn custom_source(element: ElementRef<'_>) -> Option<(String, MediaKind, ElementRef<'_>)> {
    let own_src = || {
        element
            .value()
            .attr("src")
            .filter(|src| !src.trim().is_empty())
            .map(str::to_string)
    };
    match element.value().name() {
        "img" => return own_src().map(|src| (src, MediaKind::Image, element)),
        "video" => return own_src().map(|src| (src, MediaKind::Video, element)),
        _ => {}
    }
    for nested in element.descendants().skip(1).filter_map(ElementRef::wrap) {
        let kind = match nested.value().name() {
            "img" => MediaKind::Image,
            "video" => MediaKind::Video,
            _ => continue,
        };
        if let Some(src) = nested.value().attr("src").filter(|src| !src.trim().is_empty()) {
            return Some((src.to_string(), kind, nested));
        }
    }
    let style = element.value().attr("style")?;
    background_image(style).map(|url| (url, MediaKind::Image, element))
}

fn background_image(style: &str) -> Option<String> {
    let lower = style.to_ascii_lowercase();
    let declaration = lower.find("background")?;
    let start = declaration + lower[declaration..].find("url(")? + "url(".len();
    let end = start + style[start..].find(')')?;
    let raw = style[start..end].trim().trim_matches(['"', '\'']).trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

/// Whether `element` or anything below it references `url`.
fn mentions(element: ElementRef<'_>, url: &str, base: &Url) -> bool {
    let resolves_to = |raw: &str| to_absolute_url(raw, Some(base)).is_some_and(|u| u.as_str() == url);
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .any(|node| {
            node.value().attrs().any(|(name, value)| {
                if name.ends_with("srcset") {
                    parse_srcset(value).iter().any(|entry| resolves_to(&entry.url))
                } else if name == "style" {
                    background_image(value).is_some_and(|raw| resolves_to(&raw))
                } else {
                    resolves_to(value)
                }
            })
        })
}

fn document_base(document: &Html, page_url: &Url) -> Url {
    selector("base[href]")
        .and_then(|base| {
            document
                .select(&base)
                .next()
                .and_then(|element| element.value().attr("href"))
                .and_then(|href| page_url.join(href).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(selector) => Some(selector),
        Err(err) => {
            picker_warn!("skipping invalid selector {css:?}: {err:?}");
            None
        }
    }
}

/// Leading digits of a dimension attribute (`"640px"` reads as 640).
fn parse_dimension(value: Option<&str>) -> Option<u32> {
    let digits: String = value?
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_image_handles_quotes() {
        assert_eq!(
            background_image("color: red; background-image: url( 'a b.jpg' )").as_deref(),
            Some("a b.jpg")
        );
        assert_eq!(background_image("background: none"), None);
    }

    #[test]
    fn dimensions_read_leading_digits() {
        assert_eq!(parse_dimension(Some(" 640px")), Some(640));
        assert_eq!(parse_dimension(Some("auto")), None);
        assert_eq!(parse_dimension(None), None);
    }

    #[test]
    fn locator_round_trips_through_document() {
        let document = Html::parse_document(
            "<html><body><div><p>x</p><img src=\"a.jpg\"></div></body></html>",
        );
        let img_selector = Selector::parse("img").unwrap();
        let img = document.select(&img_selector).next().unwrap();
        let locator = locate(img);
        assert_eq!(locator.tag(), "img");
        let resolved = resolve_locator(&document, &locator).unwrap();
        assert_eq!(resolved.id(), img.id());

        let wrong_tag = ElementLocator::new(locator.path().to_vec(), "video");
        assert!(resolve_locator(&document, &wrong_tag).is_none());
    }
}
