use serde::Serialize;
use url::Url;

use crate::view_model::{Affordance, SelectedView, StateSnapshot};
use crate::{
    Candidate, DetectedSet, MediaDescriptor, MediaId, MediaKind, SelectedMedia, SelectedSet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Idle,
    Selecting,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    mode: SelectionMode,
    detected: DetectedSet,
    selected: SelectedSet,
    next_seq: u64,
    last_active_slide: Option<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn detected(&self) -> &DetectedSet {
        &self.detected
    }

    pub fn selected(&self) -> &SelectedSet {
        &self.selected
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            mode: self.mode,
            is_selection_mode: self.mode == SelectionMode::Selecting,
            detected_count: self.detected.len(),
            selected_count: self.selected.len(),
            selected: self.selected_views(),
        }
    }

    /// `(url, kind)` pairs handed to the download service, in selection order.
    pub fn download_requests(&self) -> Vec<(String, MediaKind)> {
        self.selected
            .iter()
            .map(|entry| (entry.descriptor.url.clone(), entry.descriptor.kind))
            .collect()
    }

    /// Affordances exist only while selecting; one per detected item.
    pub fn affordances(&self) -> Vec<Affordance> {
        if self.mode != SelectionMode::Selecting {
            return Vec::new();
        }
        self.detected
            .iter()
            .map(|descriptor| Affordance {
                id: descriptor.id,
                url: descriptor.url.clone(),
                kind: descriptor.kind,
                anchor: descriptor.element.clone(),
                selected: self.selected.contains(&descriptor.url),
            })
            .collect()
    }

    pub(crate) fn set_mode(&mut self, mode: SelectionMode) {
        if mode == SelectionMode::Idle {
            self.last_active_slide = None;
        }
        self.mode = mode;
    }

    /// Flips URL membership. `None` when the id is not currently detected.
    pub(crate) fn toggle(&mut self, id: &MediaId) -> Option<bool> {
        let descriptor = self.detected.get(id)?.clone();
        if self.selected.remove_url(&descriptor.url).is_some() {
            return Some(false);
        }
        self.select(descriptor);
        Some(true)
    }

    pub(crate) fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub(crate) fn remove_selected(&mut self, id: &MediaId) -> bool {
        self.selected.remove_by_id(id).is_some()
    }

    /// Adds candidates whose URL is not yet registered. Returns how many were new.
    pub(crate) fn merge_candidates(&mut self, candidates: Vec<Candidate>, stamp_ms: u64) -> usize {
        let mut added = 0;
        for candidate in candidates {
            if self.register(candidate, stamp_ms).is_some() {
                added += 1;
            }
        }
        added
    }

    /// Rebuilds the registry with fresh ids, relinking the selection by URL.
    pub(crate) fn replace_candidates(&mut self, candidates: Vec<Candidate>, stamp_ms: u64) {
        self.detected.clear();
        self.merge_candidates(candidates, stamp_ms);
    }

    /// Registers the active lightbox slide and selects it. Returns whether
    /// anything changed.
    pub(crate) fn observe_active_slide(&mut self, candidate: Candidate, stamp_ms: u64) -> bool {
        if self.last_active_slide.as_deref() == Some(candidate.url.as_str()) {
            return false;
        }
        self.last_active_slide = Some(candidate.url.clone());

        let url = candidate.url.clone();
        let added = self.register(candidate, stamp_ms).is_some();
        let selected = match self.detected.find_by_url(&url) {
            Some(descriptor) if !self.selected.contains(&url) => {
                let descriptor = descriptor.clone();
                self.select(descriptor);
                true
            }
            _ => false,
        };
        added || selected
    }

    fn register(&mut self, candidate: Candidate, stamp_ms: u64) -> Option<MediaId> {
        if !is_canonical_absolute(&candidate.url) || self.detected.contains_url(&candidate.url) {
            return None;
        }
        self.next_seq += 1;
        let id = MediaId::new(self.next_seq, stamp_ms);
        let descriptor = MediaDescriptor::from_candidate(id, candidate);
        self.selected.relink(&descriptor);
        self.detected.insert_new(descriptor);
        Some(id)
    }

    fn select(&mut self, descriptor: MediaDescriptor) {
        let thumbnail_url = descriptor.thumbnail_url().to_string();
        self.selected.insert(SelectedMedia {
            descriptor,
            thumbnail_url,
        });
    }

    fn selected_views(&self) -> Vec<SelectedView> {
        self.selected
            .iter()
            .map(|entry| SelectedView {
                id: entry.descriptor.id,
                url: entry.descriptor.url.clone(),
                kind: entry.descriptor.kind,
                thumbnail_url: entry.thumbnail_url.clone(),
            })
            .collect()
    }
}

fn is_canonical_absolute(raw: &str) -> bool {
    !raw.is_empty() && Url::parse(raw).is_ok()
}
