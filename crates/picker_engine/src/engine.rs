use std::sync::{mpsc, Arc};
use std::thread;

use picker_logging::{picker_debug, picker_warn};
use tokio::sync::broadcast;

use crate::acquire::AcquisitionService;
use crate::config::EngineConfig;
use crate::detect::MediaDetector;
use crate::download::{DirectoryDownloader, Downloader};
use crate::fetch::{Fetcher, ReqwestFetcher};
use crate::page::PageSource;
use crate::page_engine::{PageEngineDeps, PageEngineHandle};
use crate::protocol::{PageCommand, PageEvent, Response, ServiceCommand};
use crate::retrieve::{NoSurfaces, RetrievalChain};
use crate::service::ServiceHandle;

enum EngineCommand {
    Page {
        command: PageCommand,
        reply: mpsc::Sender<Response>,
    },
    Service {
        command: ServiceCommand,
        reply: mpsc::Sender<Response>,
    },
}

/// Blocking front door for callers without a runtime of their own. The page
/// engine and the acquisition service run on a dedicated thread.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<PageEvent>,
}

impl EngineHandle {
    pub fn new(config: EngineConfig, source: Arc<dyn PageSource>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
            let _guard = runtime.enter();
            let (page, service) = build(config, source);
            runtime.spawn(forward_events(page.subscribe(), event_tx));

            while let Ok(command) = cmd_rx.recv() {
                match command {
                    EngineCommand::Page { command, reply } => {
                        // Queued here so page commands keep their arrival order.
                        let pending = page.send(command);
                        runtime.spawn(async move {
                            let response = pending
                                .await
                                .unwrap_or_else(|_| Response::messaging_failure());
                            let _ = reply.send(response);
                        });
                    }
                    EngineCommand::Service { command, reply } => {
                        let service = service.clone();
                        runtime.spawn(async move {
                            let _ = reply.send(service.request(command).await);
                        });
                    }
                }
            }
            picker_debug!("engine thread exiting");
        });

        Self { cmd_tx, event_rx }
    }

    /// Sends a page command and waits for its response.
    pub fn send_page(&self, command: PageCommand) -> Response {
        let (reply, response) = mpsc::channel();
        self.roundtrip(EngineCommand::Page { command, reply }, response)
    }

    /// Sends a service command and waits for its response.
    pub fn send_service(&self, command: ServiceCommand) -> Response {
        let (reply, response) = mpsc::channel();
        self.roundtrip(EngineCommand::Service { command, reply }, response)
    }

    pub fn try_recv_event(&self) -> Option<PageEvent> {
        self.event_rx.try_recv().ok()
    }

    fn roundtrip(&self, command: EngineCommand, response: mpsc::Receiver<Response>) -> Response {
        if self.cmd_tx.send(command).is_err() {
            return Response::messaging_failure();
        }
        response
            .recv()
            .unwrap_or_else(|_| Response::messaging_failure())
    }
}

/// Wires the page engine and the acquisition service from one configuration.
/// Must run inside a runtime context.
pub fn build(config: EngineConfig, source: Arc<dyn PageSource>) -> (PageEngineHandle, ServiceHandle) {
    let fetcher: Arc<dyn Fetcher> = Arc::new(ReqwestFetcher::new(config.fetch.clone()));
    let downloader: Arc<dyn Downloader> =
        Arc::new(DirectoryDownloader::new(config.output_dir.clone(), fetcher.clone()));
    let service = AcquisitionService::new(
        fetcher,
        downloader,
        config.acquisition,
        config.clock.clone(),
    );
    let retrieval = RetrievalChain::standard(
        Arc::new(NoSurfaces),
        config.fetch.clone(),
        config.retrieval.legacy_timeout,
    )
    .with_filename_max_len(config.acquisition.filename_max_len);

    let page = PageEngineHandle::spawn(PageEngineDeps {
        source,
        detector: Arc::new(MediaDetector::new(config.detector)),
        retrieval: Arc::new(retrieval),
        watch: config.watch,
        clock: config.clock,
    });
    (page, ServiceHandle::new(Arc::new(service)))
}

async fn forward_events(mut updates: broadcast::Receiver<PageEvent>, events: mpsc::Sender<PageEvent>) {
    loop {
        match updates.recv().await {
            Ok(event) => {
                if events.send(event).is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                picker_warn!("dropped {missed} state updates");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
