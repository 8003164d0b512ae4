use std::collections::{BTreeMap, HashMap};

use crate::{MediaDescriptor, MediaId};

/// Detected media keyed by id, iterated in detection order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DetectedSet {
    by_id: BTreeMap<MediaId, MediaDescriptor>,
    by_url: HashMap<String, MediaId>,
}

impl DetectedSet {
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: &MediaId) -> Option<&MediaDescriptor> {
        self.by_id.get(id)
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.by_url.contains_key(url)
    }

    pub fn find_by_url(&self, url: &str) -> Option<&MediaDescriptor> {
        self.by_url.get(url).and_then(|id| self.by_id.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaDescriptor> {
        self.by_id.values()
    }

    /// Inserts unless the URL is already registered; existing entries win.
    pub(crate) fn insert_new(&mut self, descriptor: MediaDescriptor) -> bool {
        if self.by_url.contains_key(&descriptor.url) {
            return false;
        }
        self.by_url.insert(descriptor.url.clone(), descriptor.id);
        self.by_id.insert(descriptor.id, descriptor);
        true
    }

    pub(crate) fn clear(&mut self) {
        self.by_id.clear();
        self.by_url.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedMedia {
    pub descriptor: MediaDescriptor,
    pub thumbnail_url: String,
}

/// User selection keyed by canonical URL, kept in selection order.
///
/// Ids recorded here may be stale after a rescan until the entry is relinked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectedSet {
    entries: Vec<SelectedMedia>,
}

impl SelectedSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.position(url).is_some()
    }

    pub fn get(&self, url: &str) -> Option<&SelectedMedia> {
        self.position(url).map(|idx| &self.entries[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &SelectedMedia> {
        self.entries.iter()
    }

    pub(crate) fn insert(&mut self, entry: SelectedMedia) -> bool {
        if self.contains(&entry.descriptor.url) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub(crate) fn remove_url(&mut self, url: &str) -> Option<SelectedMedia> {
        self.position(url).map(|idx| self.entries.remove(idx))
    }

    pub(crate) fn remove_by_id(&mut self, id: &MediaId) -> Option<SelectedMedia> {
        let idx = self
            .entries
            .iter()
            .position(|entry| &entry.descriptor.id == id)?;
        Some(self.entries.remove(idx))
    }

    /// Points a selected entry at a freshly detected descriptor for its URL.
    pub(crate) fn relink(&mut self, descriptor: &MediaDescriptor) -> bool {
        match self.position(&descriptor.url) {
            Some(idx) => {
                let entry = &mut self.entries[idx].descriptor;
                entry.id = descriptor.id;
                entry.element = descriptor.element.clone();
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    fn position(&self, url: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.descriptor.url == url)
    }
}
