//! The page-side actor: owns the selection state and the detection loop.

use std::collections::VecDeque;
use std::sync::Arc;

use picker_core::{update, AppState, Effect, ElementLocator, MediaKind, Msg, Rejection, ScanOrigin};
use picker_logging::{picker_debug, picker_trace, picker_warn};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::acquire::MediaRequest;
use crate::config::{Clock, WatchSettings};
use crate::detect::MediaDetector;
use crate::page::PageSource;
use crate::protocol::{DetectedList, DownloadUrls, PageCommand, PageEvent, Pong, Response};
use crate::retrieve::{RetrievalChain, RetrievalItem};
use crate::watcher::{DetectionEvent, DetectionTask};

const UPDATE_BUFFER: usize = 64;

pub struct PageEngineDeps {
    pub source: Arc<dyn PageSource>,
    pub detector: Arc<MediaDetector>,
    pub retrieval: Arc<RetrievalChain>,
    pub watch: WatchSettings,
    pub clock: Clock,
}

struct Request {
    command: PageCommand,
    reply: oneshot::Sender<Response>,
}

/// Cloneable sender side of a running page engine.
#[derive(Clone)]
pub struct PageEngineHandle {
    requests: mpsc::UnboundedSender<Request>,
    updates: broadcast::Sender<PageEvent>,
}

impl PageEngineHandle {
    /// Spawns the engine on the current runtime.
    pub fn spawn(deps: PageEngineDeps) -> Self {
        let (requests, request_rx) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(UPDATE_BUFFER);
        let (detection_tx, detection_rx) = mpsc::unbounded_channel();
        let engine = PageEngine {
            deps,
            state: AppState::new(),
            detection: None,
            detection_tx,
            updates: updates.clone(),
        };
        tokio::spawn(engine.run(request_rx, detection_rx));
        Self { requests, updates }
    }

    /// Queues `command`; the receiver yields its response. A closed engine
    /// drops the reply sender, which surfaces as a receive error.
    pub fn send(&self, command: PageCommand) -> oneshot::Receiver<Response> {
        let (reply, response) = oneshot::channel();
        if self.requests.send(Request { command, reply }).is_err() {
            picker_warn!("page engine is gone");
        }
        response
    }

    pub async fn request(&self, command: PageCommand) -> Response {
        self.send(command)
            .await
            .unwrap_or_else(|_| Response::messaging_failure())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.updates.subscribe()
    }
}

struct PageEngine {
    deps: PageEngineDeps,
    state: AppState,
    detection: Option<DetectionTask>,
    detection_tx: mpsc::UnboundedSender<DetectionEvent>,
    updates: broadcast::Sender<PageEvent>,
}

impl PageEngine {
    async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<Request>,
        mut detections: mpsc::UnboundedReceiver<DetectionEvent>,
    ) {
        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(Request { command, reply }) => self.handle(command, reply).await,
                    None => break,
                },
                Some(event) = detections.recv() => self.on_detection(event).await,
            }
        }
        self.stop_detection();
        picker_debug!("page engine stopped");
    }

    async fn handle(&mut self, command: PageCommand, reply: oneshot::Sender<Response>) {
        picker_trace!("page command {command:?}");
        let response = match command {
            PageCommand::Ping => Response::Pong(Pong { pong: true }),
            PageCommand::GetState => Response::State(self.state.snapshot()),
            PageCommand::StartSelection => self.acknowledge(Msg::StartSelection).await,
            PageCommand::StopSelection => self.acknowledge(Msg::StopSelection).await,
            PageCommand::ClearSelection => self.acknowledge(Msg::ClearSelection).await,
            PageCommand::ToggleItem { id } => self.acknowledge(Msg::ToggleItem { id }).await,
            PageCommand::RemoveItem { id } => self.acknowledge(Msg::RemoveItem { id }).await,
            PageCommand::Rescan => {
                self.dispatch(Msg::Rescan).await;
                Response::State(self.state.snapshot())
            }
            PageCommand::GetDetected => Response::Detected(DetectedList {
                detected: self.state.affordances(),
            }),
            PageCommand::GetDownloadUrls => Response::DownloadUrls(DownloadUrls {
                urls: self
                    .state
                    .download_requests()
                    .into_iter()
                    .map(|(url, kind)| MediaRequest::new(url, kind))
                    .collect(),
            }),
            PageCommand::FetchMediaAsBlobs => {
                self.fetch_blobs(reply).await;
                return;
            }
            PageCommand::UpdateConfig { settings } => {
                self.deps
                    .detector
                    .update_config(|config| config.apply(&settings));
                picker_debug!("detector settings updated");
                Response::ack()
            }
        };
        let _ = reply.send(response);
    }

    async fn acknowledge(&mut self, msg: Msg) -> Response {
        match self.dispatch(msg).await {
            None => Response::ack(),
            Some(Rejection::UnknownMediaId(id)) => Response::failure(format!("unknown media id {id}")),
            Some(Rejection::NotSelected(id)) => Response::failure(format!("{id} is not selected")),
        }
    }

    async fn on_detection(&mut self, event: DetectionEvent) {
        let observed_at_ms = self.now_ms();
        let msg = match event {
            DetectionEvent::Scanned { origin, candidates } => Msg::ScanCompleted {
                origin,
                candidates,
                observed_at_ms,
            },
            DetectionEvent::ActiveSlide(candidate) => Msg::ActiveSlideChanged {
                candidate,
                observed_at_ms,
            },
        };
        self.dispatch(msg).await;
    }

    /// Runs `msg` and every message its effects produce, in order.
    async fn dispatch(&mut self, msg: Msg) -> Option<Rejection> {
        let mut queue = VecDeque::from([msg]);
        let mut rejection = None;
        while let Some(msg) = queue.pop_front() {
            let (state, effects) = update(std::mem::take(&mut self.state), msg);
            self.state = state;
            for effect in effects {
                match effect {
                    Effect::ScanPage { origin } => {
                        if let Some(next) = self.scan(origin).await {
                            queue.push_back(next);
                        }
                    }
                    Effect::StartContinuousDetection => self.start_detection(),
                    Effect::StopContinuousDetection => self.stop_detection(),
                    Effect::BroadcastState(state) => {
                        let _ = self.updates.send(PageEvent::StateUpdate { state });
                    }
                    Effect::CommandRejected(reason) => rejection = Some(reason),
                }
            }
        }
        rejection
    }

    async fn scan(&self, origin: ScanOrigin) -> Option<Msg> {
        let snapshot = match self.deps.source.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                picker_warn!("{origin:?} scan failed: {err}");
                return None;
            }
        };
        let candidates = self.deps.detector.scan(&snapshot);
        Some(Msg::ScanCompleted {
            origin,
            candidates,
            observed_at_ms: self.now_ms(),
        })
    }

    fn start_detection(&mut self) {
        if self.detection.as_ref().is_some_and(DetectionTask::is_running) {
            return;
        }
        self.detection = Some(DetectionTask::spawn(
            self.deps.source.clone(),
            self.deps.detector.clone(),
            self.deps.watch,
            self.detection_tx.clone(),
        ));
    }

    fn stop_detection(&mut self) {
        if let Some(task) = self.detection.take() {
            task.stop();
        }
    }

    /// Resolves selected images against the live document, then retrieves
    /// on a separate task so detection keeps running.
    async fn fetch_blobs(&mut self, reply: oneshot::Sender<Response>) {
        let selected: Vec<(ElementLocator, String, MediaKind)> = self
            .state
            .selected()
            .iter()
            .map(|entry| {
                let descriptor = &entry.descriptor;
                (descriptor.element.clone(), descriptor.url.clone(), descriptor.kind)
            })
            .collect();

        let targets: Vec<(ElementLocator, String)> = selected
            .iter()
            .map(|(element, url, _)| (element.clone(), url.clone()))
            .collect();
        let live = match self.deps.source.snapshot().await {
            Ok(snapshot) => self.deps.detector.relocate(&snapshot, &targets),
            Err(err) => {
                picker_warn!("page unavailable for read-back: {err}");
                vec![None; targets.len()]
            }
        };

        let items: Vec<RetrievalItem> = selected
            .into_iter()
            .zip(live)
            .map(|((_, url, kind), live)| RetrievalItem {
                url,
                kind,
                live_element: live.filter(|_| kind == MediaKind::Image),
            })
            .collect();

        let retrieval = self.deps.retrieval.clone();
        tokio::spawn(async move {
            let outcome = retrieval.fetch_as_blobs(&items).await;
            let _ = reply.send(Response::from(outcome));
        });
    }

    fn now_ms(&self) -> u64 {
        u64::try_from((self.deps.clock)().timestamp_millis()).unwrap_or_default()
    }
}
