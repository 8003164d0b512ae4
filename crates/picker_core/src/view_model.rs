use serde::Serialize;

use crate::{ElementLocator, MediaId, MediaKind, SelectionMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedView {
    pub id: MediaId,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub thumbnail_url: String,
}

/// Renderer-facing toggle pin for one detected element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Affordance {
    pub id: MediaId,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub anchor: ElementLocator,
    pub selected: bool,
}

/// Read-only state pushed to the UI; the only way it observes the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub mode: SelectionMode,
    pub is_selection_mode: bool,
    pub detected_count: usize,
    pub selected_count: usize,
    pub selected: Vec<SelectedView>,
}
