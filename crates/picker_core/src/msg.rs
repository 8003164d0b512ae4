use crate::{Candidate, MediaId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// UI asked to enter selection mode.
    StartSelection,
    /// UI asked to leave selection mode.
    StopSelection,
    /// User clicked a media element or its pin.
    ToggleItem { id: MediaId },
    /// UI cleared the whole selection.
    ClearSelection,
    /// UI removed one selected entry from its preview grid.
    RemoveItem { id: MediaId },
    /// UI asked for a full rescan.
    Rescan,
    /// Detector finished a pass over the page.
    ScanCompleted {
        origin: ScanOrigin,
        candidates: Vec<Candidate>,
        observed_at_ms: u64,
    },
    /// Lightbox watcher saw a different active slide.
    ActiveSlideChanged {
        candidate: Candidate,
        observed_at_ms: u64,
    },
}

/// Why a scan ran; decides merge versus replace semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanOrigin {
    /// First pass when selection mode starts.
    Initial,
    /// Explicit rescan; replaces the registry.
    Rescan,
    /// Page change notification.
    Observer,
    /// Low-frequency fallback timer.
    FallbackPoll,
}
