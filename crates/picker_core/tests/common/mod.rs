#![allow(dead_code)]

use std::sync::Once;

use picker_core::{update, AppState, Candidate, Effect, ElementLocator, MediaId, MediaKind, Msg, ScanOrigin};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(picker_logging::initialize_for_tests);
}

pub fn image(url: &str, path: &[usize]) -> Candidate {
    Candidate {
        url: url.to_string(),
        kind: MediaKind::Image,
        element: ElementLocator::new(path.to_vec(), "img"),
        poster: None,
    }
}

pub fn video(url: &str, poster: Option<&str>, path: &[usize]) -> Candidate {
    Candidate {
        url: url.to_string(),
        kind: MediaKind::Video,
        element: ElementLocator::new(path.to_vec(), "video"),
        poster: poster.map(str::to_string),
    }
}

pub fn scanned(
    state: AppState,
    origin: ScanOrigin,
    candidates: Vec<Candidate>,
    at: u64,
) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::ScanCompleted {
            origin,
            candidates,
            observed_at_ms: at,
        },
    )
}

/// Enters selection mode and feeds the initial scan result.
pub fn selecting_with(candidates: Vec<Candidate>) -> AppState {
    let (state, _) = update(AppState::new(), Msg::StartSelection);
    let (state, _) = scanned(state, ScanOrigin::Initial, candidates, 1_000);
    state
}

pub fn id_for(state: &AppState, url: &str) -> MediaId {
    state
        .detected()
        .find_by_url(url)
        .map(|d| d.id)
        .expect("url detected")
}

pub fn selected_urls(state: &AppState) -> Vec<String> {
    state
        .selected()
        .iter()
        .map(|entry| entry.descriptor.url.clone())
        .collect()
}
