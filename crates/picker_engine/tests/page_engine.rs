use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use picker_core::{MediaId, MediaKind, SelectionMode, StateSnapshot};
use picker_engine::{
    system_clock, DetectionEvent, DetectionTask, DetectorConfig, MediaDetector, MediaRequest,
    PageCommand, PageEngineDeps, PageEngineHandle, PageError, PageEvent, PageSnapshot, PageSource,
    Response, RetrievalChain, RetrievalError, RetrievalItem, RetrievalStrategy, Retrieved,
    SharedPage, StaticPage, UserSettings, WatchSettings,
};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

const BASE: &str = "https://example.org/album/";

fn snapshot(body: &str) -> PageSnapshot {
    PageSnapshot::parse(BASE, format!("<html><body>{body}</body></html>")).unwrap()
}

struct Canned;

#[async_trait::async_trait]
impl RetrievalStrategy for Canned {
    fn name(&self) -> &'static str {
        "canned"
    }

    async fn retrieve(&self, item: &RetrievalItem) -> Result<Retrieved, RetrievalError> {
        Ok(Retrieved {
            bytes: Bytes::from(item.url.clone().into_bytes()),
            mime: "image/jpeg".to_string(),
            strategy: "canned",
        })
    }
}

fn spawn_engine(source: Arc<dyn PageSource>) -> (PageEngineHandle, Arc<MediaDetector>) {
    picker_logging::initialize_for_tests();
    let detector = Arc::new(MediaDetector::new(DetectorConfig {
        min_width: 0,
        min_height: 0,
        ..DetectorConfig::default()
    }));
    let engine = PageEngineHandle::spawn(PageEngineDeps {
        source,
        detector: detector.clone(),
        retrieval: Arc::new(RetrievalChain::new(vec![Arc::new(Canned)])),
        watch: WatchSettings {
            fallback_poll: Duration::from_millis(40),
            slide_poll: Duration::from_millis(20),
        },
        clock: system_clock(),
    });
    (engine, detector)
}

async fn state(engine: &PageEngineHandle) -> StateSnapshot {
    match engine.request(PageCommand::GetState).await {
        Response::State(state) => state,
        other => panic!("unexpected response {other:?}"),
    }
}

async fn wait_for_state(
    engine: &PageEngineHandle,
    predicate: impl Fn(&StateSnapshot) -> bool,
) -> StateSnapshot {
    for _ in 0..100 {
        let current = state(engine).await;
        if predicate(&current) {
            return current;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("state never reached the expected shape");
}

async fn detected_ids(engine: &PageEngineHandle) -> Vec<(MediaId, String)> {
    match engine.request(PageCommand::GetDetected).await {
        Response::Detected(list) => list
            .detected
            .into_iter()
            .map(|affordance| (affordance.id, affordance.url))
            .collect(),
        other => panic!("unexpected response {other:?}"),
    }
}

#[tokio::test]
async fn selection_round_trip() {
    let page = StaticPage::new(snapshot(r#"<img src="one.jpg"><img src="two.png">"#));
    let (engine, _) = spawn_engine(Arc::new(page));
    let mut updates = engine.subscribe();

    assert!(matches!(
        engine.request(PageCommand::Ping).await,
        Response::Pong(pong) if pong.pong
    ));
    assert!(engine.request(PageCommand::StartSelection).await.is_success());

    let current = state(&engine).await;
    assert_eq!(current.mode, SelectionMode::Selecting);
    assert!(current.is_selection_mode);
    assert_eq!(current.detected_count, 2);

    let PageEvent::StateUpdate { state: pushed } =
        tokio::time::timeout(Duration::from_secs(1), updates.recv())
            .await
            .unwrap()
            .unwrap();
    assert!(pushed.is_selection_mode);

    let detected = detected_ids(&engine).await;
    assert_eq!(detected[0].1, "https://example.org/album/one.jpg");
    let response = engine
        .request(PageCommand::ToggleItem { id: detected[0].0 })
        .await;
    assert!(response.is_success());

    match engine.request(PageCommand::GetDownloadUrls).await {
        Response::DownloadUrls(list) => assert_eq!(
            list.urls,
            vec![MediaRequest::new(
                "https://example.org/album/one.jpg",
                MediaKind::Image
            )]
        ),
        other => panic!("unexpected response {other:?}"),
    }

    let unknown = engine
        .request(PageCommand::ToggleItem {
            id: MediaId::new(999, 1),
        })
        .await;
    assert!(unknown.error().unwrap().contains("unknown media id"));
    let not_selected = engine
        .request(PageCommand::RemoveItem { id: detected[1].0 })
        .await;
    assert!(!not_selected.is_success());

    assert!(engine
        .request(PageCommand::RemoveItem { id: detected[0].0 })
        .await
        .is_success());
    assert_eq!(state(&engine).await.selected_count, 0);
}

#[tokio::test]
async fn page_changes_are_detected_until_stopped() {
    let page = SharedPage::new(snapshot(r#"<img src="first.jpg">"#));
    let source: Arc<dyn PageSource> = page.clone();
    let (engine, _) = spawn_engine(source);

    engine.request(PageCommand::StartSelection).await;
    assert_eq!(state(&engine).await.detected_count, 1);

    page.replace_html(r#"<html><body><img src="first.jpg"><img src="second.jpg"></body></html>"#);
    wait_for_state(&engine, |state| state.detected_count == 2).await;

    assert!(engine.request(PageCommand::StopSelection).await.is_success());
    page.replace_html(
        r#"<html><body><img src="first.jpg"><img src="second.jpg"><img src="third.jpg"></body></html>"#,
    );
    tokio::time::sleep(Duration::from_millis(200)).await;
    let stopped = state(&engine).await;
    assert_eq!(stopped.mode, SelectionMode::Idle);
    assert_eq!(stopped.detected_count, 2);
}

#[tokio::test]
async fn active_lightbox_slide_is_auto_selected() {
    let lightbox = |active: usize| {
        let slides: String = (1..=3)
            .map(|n| {
                format!(
                    r#"<div class="pswp__item" aria-hidden="{}"><img class="pswp__img" src="slide-{n}.jpg"></div>"#,
                    n != active
                )
            })
            .collect();
        format!(r#"<html><body><div class="pswp__container">{slides}</div></body></html>"#)
    };
    let page = SharedPage::new(PageSnapshot::parse(BASE, lightbox(1)).unwrap());
    let source: Arc<dyn PageSource> = page.clone();
    let (engine, _) = spawn_engine(source);

    engine.request(PageCommand::StartSelection).await;
    let first = wait_for_state(&engine, |state| state.selected_count == 1).await;
    assert_eq!(first.selected[0].url, "https://example.org/album/slide-1.jpg");

    page.replace_html(lightbox(2));
    let second = wait_for_state(&engine, |state| state.selected_count == 2).await;
    assert_eq!(second.selected[1].url, "https://example.org/album/slide-2.jpg");
}

#[tokio::test]
async fn rescan_keeps_selection() {
    let page = SharedPage::new(snapshot(r#"<img src="keep.jpg">"#));
    let source: Arc<dyn PageSource> = page.clone();
    let (engine, _) = spawn_engine(source);

    engine.request(PageCommand::StartSelection).await;
    let detected = detected_ids(&engine).await;
    engine
        .request(PageCommand::ToggleItem { id: detected[0].0 })
        .await;
    engine.request(PageCommand::StopSelection).await;

    page.replace_html(r#"<html><body><img src="new.jpg"><img src="keep.jpg"></body></html>"#);
    match engine.request(PageCommand::Rescan).await {
        Response::State(state) => {
            assert_eq!(state.detected_count, 2);
            assert_eq!(state.selected_count, 1);
            assert_eq!(state.selected[0].url, "https://example.org/album/keep.jpg");
        }
        other => panic!("unexpected response {other:?}"),
    }
}

#[tokio::test]
async fn selected_media_is_returned_as_blobs() {
    let page = StaticPage::new(snapshot(r#"<img src="a.jpg"><img src="b.jpg">"#));
    let (engine, _) = spawn_engine(Arc::new(page));

    let empty = engine.request(PageCommand::FetchMediaAsBlobs).await;
    assert!(!empty.is_success());

    engine.request(PageCommand::StartSelection).await;
    let detected = detected_ids(&engine).await;
    engine
        .request(PageCommand::ToggleItem { id: detected[1].0 })
        .await;

    match engine.request(PageCommand::FetchMediaAsBlobs).await {
        Response::Blobs(bundle) => {
            assert!(bundle.success);
            assert_eq!(bundle.filenames, vec!["b.jpg"]);
            assert!(bundle.blobs[0].starts_with("data:image/jpeg;base64,"));
        }
        other => panic!("unexpected response {other:?}"),
    }
}

#[tokio::test]
async fn update_config_reaches_the_detector() {
    let page = StaticPage::new(snapshot(""));
    let (engine, detector) = spawn_engine(Arc::new(page));

    let response = engine
        .request(PageCommand::UpdateConfig {
            settings: UserSettings {
                min_width: 640,
                min_height: 480,
                ..UserSettings::default()
            },
        })
        .await;
    assert!(response.is_success());
    let config = detector.config();
    assert_eq!((config.min_width, config.min_height), (640, 480));
}

struct CountingPage {
    page: PageSnapshot,
    reads: AtomicUsize,
}

#[async_trait::async_trait]
impl PageSource for CountingPage {
    async fn snapshot(&self) -> Result<PageSnapshot, PageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.page.clone())
    }
}

#[tokio::test]
async fn unobserved_sources_are_read_once_per_poll() {
    picker_logging::initialize_for_tests();
    let html = r#"<div class="pswp__container"><div class="pswp__item" aria-hidden="false"><img class="pswp__img" src="slide-1.jpg"></div></div>"#;
    let source = Arc::new(CountingPage {
        page: snapshot(html),
        reads: AtomicUsize::new(0),
    });
    let detector = Arc::new(MediaDetector::new(DetectorConfig {
        min_width: 0,
        min_height: 0,
        ..DetectorConfig::default()
    }));
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let task = DetectionTask::spawn(
        source.clone(),
        detector,
        WatchSettings {
            fallback_poll: Duration::from_millis(60),
            slide_poll: Duration::from_millis(5),
        },
        events_tx,
    );

    tokio::time::sleep(Duration::from_millis(200)).await;
    task.stop();

    let reads = source.reads.load(Ordering::SeqCst);
    assert!((1..=4).contains(&reads), "{reads} snapshots taken");
    let mut scans = 0;
    let mut slides = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            DetectionEvent::Scanned { .. } => scans += 1,
            DetectionEvent::ActiveSlide(candidate) => {
                assert_eq!(candidate.url, "https://example.org/album/slide-1.jpg");
                slides += 1;
            }
        }
    }
    assert!(scans >= 1);
    assert_eq!(slides, 1);
}
