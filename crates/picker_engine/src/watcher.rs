use std::sync::Arc;

use picker_core::{Candidate, ScanOrigin};
use picker_logging::{abbreviate, picker_debug, picker_trace, picker_warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::WatchSettings;
use crate::detect::MediaDetector;
use crate::page::{PageSnapshot, PageSource};

/// Output of the continuous detection loop, consumed by the page engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionEvent {
    Scanned {
        origin: ScanOrigin,
        candidates: Vec<Candidate>,
    },
    ActiveSlide(Candidate),
}

/// Handle to a running detection loop. Dropping it stops the loop.
pub struct DetectionTask {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl DetectionTask {
    /// Spawns the loop on the current runtime.
    pub fn spawn(
        source: Arc<dyn PageSource>,
        detector: Arc<MediaDetector>,
        settings: WatchSettings,
        events: mpsc::UnboundedSender<DetectionEvent>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(run(source, detector, settings, events, cancel.clone()));
        Self { cancel, join }
    }

    pub fn is_running(&self) -> bool {
        !self.join.is_finished()
    }

    pub fn stop(self) {
        self.cancel.cancel();
    }
}

impl Drop for DetectionTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    source: Arc<dyn PageSource>,
    detector: Arc<MediaDetector>,
    settings: WatchSettings,
    events: mpsc::UnboundedSender<DetectionEvent>,
    cancel: CancellationToken,
) {
    let mut changes = source.changes();
    let mut last_slide: Option<String> = None;
    if changes.is_none() {
        picker_debug!("detection loop started (polling only)");
        polled(source.as_ref(), &detector, settings, &events, &cancel, &mut last_slide).await;
        picker_debug!("detection loop stopped");
        return;
    }

    let mut fallback = ticker(settings.fallback_poll);
    let mut slides = ticker(settings.slide_poll);
    // Both intervals fire immediately; the caller already scanned.
    fallback.tick().await;
    slides.tick().await;
    picker_debug!("detection loop started (observer)");

    loop {
        let observed = tokio::select! {
            _ = cancel.cancelled() => break,
            changed = next_change(&mut changes) => {
                if !changed {
                    changes = None;
                    continue;
                }
                snapshot(source.as_ref(), ScanOrigin::Observer)
                    .await
                    .and_then(|page| scan(&page, &detector, ScanOrigin::Observer))
            }
            _ = fallback.tick() => {
                snapshot(source.as_ref(), ScanOrigin::FallbackPoll)
                    .await
                    .and_then(|page| scan(&page, &detector, ScanOrigin::FallbackPoll))
            }
            _ = slides.tick() => {
                snapshot(source.as_ref(), ScanOrigin::FallbackPoll)
                    .await
                    .and_then(|page| active_slide(&page, &detector, &mut last_slide))
            }
        };
        if let Some(event) = observed {
            if events.send(event).is_err() {
                break;
            }
        }
    }
    picker_debug!("detection loop stopped");
}

/// Polling for sources without change notifications: one snapshot per
/// fallback tick feeds both the scan and the slide check.
async fn polled(
    source: &dyn PageSource,
    detector: &MediaDetector,
    settings: WatchSettings,
    events: &mpsc::UnboundedSender<DetectionEvent>,
    cancel: &CancellationToken,
    last_slide: &mut Option<String>,
) {
    let mut poll = ticker(settings.fallback_poll);
    poll.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = poll.tick() => {}
        }
        let Some(page) = snapshot(source, ScanOrigin::FallbackPoll).await else {
            continue;
        };
        let observed = [
            scan(&page, detector, ScanOrigin::FallbackPoll),
            active_slide(&page, detector, last_slide),
        ];
        for event in observed.into_iter().flatten() {
            if events.send(event).is_err() {
                return;
            }
        }
    }
}

fn ticker(period: std::time::Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn next_change(changes: &mut Option<watch::Receiver<u64>>) -> bool {
    match changes.as_mut() {
        Some(receiver) => receiver.changed().await.is_ok(),
        None => std::future::pending().await,
    }
}

async fn snapshot(source: &dyn PageSource, origin: ScanOrigin) -> Option<PageSnapshot> {
    match source.snapshot().await {
        Ok(page) => Some(page),
        Err(err) => {
            picker_warn!("{origin:?} scan skipped: {err}");
            None
        }
    }
}

fn scan(page: &PageSnapshot, detector: &MediaDetector, origin: ScanOrigin) -> Option<DetectionEvent> {
    let candidates = detector.scan_continuous(page);
    if candidates.is_empty() {
        return None;
    }
    picker_trace!("{origin:?} scan produced {} candidates", candidates.len());
    Some(DetectionEvent::Scanned { origin, candidates })
}

fn active_slide(
    page: &PageSnapshot,
    detector: &MediaDetector,
    last: &mut Option<String>,
) -> Option<DetectionEvent> {
    let candidate = detector.active_slide(page)?;
    if last.as_deref() == Some(candidate.url.as_str()) {
        return None;
    }
    picker_debug!("active slide is now {}", abbreviate(&candidate.url));
    *last = Some(candidate.url.clone());
    Some(DetectionEvent::ActiveSlide(candidate))
}
