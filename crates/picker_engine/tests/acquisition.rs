use std::fs::File;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use picker_core::MediaKind;
use picker_engine::{
    encode_data_url, AcquireError, AcquisitionService, AcquisitionSettings, Clock,
    DirectoryDownloader, Downloader, FetchSettings, Fetcher, MediaErrorKind, MediaRequest,
    ReqwestFetcher,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fixed_clock() -> Clock {
    Arc::new(|| Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap())
}

fn service(dir: &TempDir, settings: AcquisitionSettings) -> (AcquisitionService, Arc<DirectoryDownloader>) {
    let fetcher: Arc<dyn Fetcher> = Arc::new(ReqwestFetcher::new(FetchSettings::default()));
    let downloader = Arc::new(DirectoryDownloader::new(dir.path().to_path_buf(), fetcher.clone()));
    let as_downloader: Arc<dyn Downloader> = downloader.clone();
    let service = AcquisitionService::new(fetcher, as_downloader, settings, fixed_clock());
    (service, downloader)
}

fn quick() -> AcquisitionSettings {
    AcquisitionSettings {
        download_delay: Duration::ZERO,
        ..AcquisitionSettings::default()
    }
}

async fn serve(server: &MockServer, route: &str, body: &[u8], mime: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_vec(), mime))
        .mount(server)
        .await;
}

fn archive_names(path: &std::path::Path) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

#[tokio::test]
async fn batch_zip_archives_valid_items_and_skips_the_rest() {
    let server = MockServer::start().await;
    serve(&server, "/gallery/one.jpg", b"one", "image/jpeg").await;
    serve(&server, "/gallery/two.png", b"two", "image/png").await;
    serve(&server, "/clips/three.mp4", b"three", "video/mp4").await;

    let dir = TempDir::new().unwrap();
    let (service, downloader) = service(&dir, quick());
    let base = server.uri();
    let items = vec![
        MediaRequest::new(format!("{base}/gallery/one.jpg"), MediaKind::Image),
        MediaRequest::new(format!("{base}/gallery/two.png"), MediaKind::Image),
        MediaRequest::new(format!("{base}/static/logo.png"), MediaKind::Image),
        MediaRequest::new("not a url at all", MediaKind::Image),
        MediaRequest::new(format!("{base}/clips/three.mp4"), MediaKind::Video),
    ];

    let delivery = service.download_batch_zip(&items).await.expect("archive delivered");
    assert_eq!(delivery.filename, "media-download-2024-05-01T12-30-45.zip");
    assert_eq!(delivery.archived(), 3);
    assert_eq!(delivery.result.skipped.len(), 2);
    assert!(delivery.result.failed.is_empty());
    assert!(delivery
        .result
        .skipped
        .iter()
        .all(|item| item.kind == MediaErrorKind::InvalidUrl));

    let saved = downloader.completed();
    assert_eq!(saved.len(), 1);
    let archive = saved[0].saved_to.clone().unwrap();
    assert_eq!(
        archive_names(&archive),
        vec!["one.jpg", "two.png", "three.mp4"]
    );
}

#[tokio::test]
async fn local_and_inline_media_are_packaged_without_network() {
    let pages = TempDir::new().unwrap();
    let image = pages.path().join("local.jpg");
    std::fs::write(&image, b"local jpeg").unwrap();
    let local_url = url::Url::from_file_path(&image).unwrap().to_string();
    let inline_url = encode_data_url("image/png", &[0u8; 120]);

    let dir = TempDir::new().unwrap();
    let (service, downloader) = service(&dir, quick());
    let items = vec![
        MediaRequest::new(local_url.clone(), MediaKind::Image),
        MediaRequest::new(inline_url.clone(), MediaKind::Image),
    ];

    let delivery = service.download_batch_zip(&items).await.expect("archive delivered");
    assert_eq!(delivery.archived(), 2);
    assert!(delivery.result.failed.is_empty());
    let archive = downloader.completed()[0].saved_to.clone().unwrap();
    assert_eq!(archive_names(&archive), vec!["local.jpg", "media_2.jpg"]);

    let result = service.download_individually(&items).await;
    assert_eq!(result.succeeded.len(), 2);
    assert!(result.failed.is_empty());
    assert_eq!(std::fs::read(dir.path().join("local.jpg")).unwrap(), b"local jpeg");
    assert_eq!(std::fs::read(dir.path().join("media_2.jpg")).unwrap(), vec![0u8; 120]);
}

#[tokio::test]
async fn batch_zip_with_nothing_retrieved_fails_with_advice() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (service, downloader) = service(&dir, quick());
    let items = vec![
        MediaRequest::new(format!("{}/a.jpg", server.uri()), MediaKind::Image),
        MediaRequest::new(format!("{}/b.jpg", server.uri()), MediaKind::Image),
    ];

    let err = service.download_batch_zip(&items).await.unwrap_err();
    assert!(err.to_string().contains("individual"));
    assert_eq!(err.kind(), MediaErrorKind::UnreachableResource);
    let result = err.result().unwrap();
    assert_eq!(result.failed.len(), 2);
    assert!(downloader.completed().is_empty());
}

#[tokio::test]
async fn colliding_names_get_numbered() {
    let server = MockServer::start().await;
    serve(&server, "/a/x.jpg", b"first", "image/jpeg").await;
    serve(&server, "/b/x.jpg", b"second", "image/jpeg").await;

    let dir = TempDir::new().unwrap();
    let (service, downloader) = service(&dir, quick());
    let items = vec![
        MediaRequest::new(format!("{}/a/x.jpg", server.uri()), MediaKind::Image),
        MediaRequest::new(format!("{}/b/x.jpg", server.uri()), MediaKind::Image),
    ];

    let delivery = service.download_batch_zip(&items).await.unwrap();
    let names: Vec<_> = delivery
        .result
        .succeeded
        .iter()
        .map(|item| item.filename.clone())
        .collect();
    assert_eq!(names, vec!["x.jpg", "x_1.jpg"]);
    let archive = downloader.completed()[0].saved_to.clone().unwrap();
    assert_eq!(archive_names(&archive), vec!["x.jpg", "x_1.jpg"]);
}

#[tokio::test]
async fn long_names_are_truncated_keeping_extension() {
    let server = MockServer::start().await;
    let stem = "a".repeat(60);
    serve(&server, &format!("/{stem}.jpeg"), b"jpeg", "image/jpeg").await;

    let dir = TempDir::new().unwrap();
    let settings = AcquisitionSettings {
        filename_max_len: 20,
        ..quick()
    };
    let (service, _) = service(&dir, settings);
    let items = vec![MediaRequest::new(
        format!("{}/{stem}.jpeg", server.uri()),
        MediaKind::Image,
    )];

    let delivery = service.download_batch_zip(&items).await.unwrap();
    let name = &delivery.result.succeeded[0].filename;
    assert!(name.len() <= 20, "{name}");
    assert!(name.ends_with(".jpeg"));
}

#[tokio::test]
async fn individual_downloads_continue_past_failures() {
    let server = MockServer::start().await;
    serve(&server, "/ok.jpg", b"fine", "image/jpeg").await;
    Mock::given(method("GET"))
        .and(path("/gone.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    serve(&server, "/later.webm", b"video", "video/webm").await;

    let dir = TempDir::new().unwrap();
    let (service, downloader) = service(&dir, quick());
    let items = vec![
        MediaRequest::new(format!("{}/ok.jpg", server.uri()), MediaKind::Image),
        MediaRequest::new(format!("{}/gone.jpg", server.uri()), MediaKind::Image),
        MediaRequest::new("javascript:void(0)", MediaKind::Image),
        MediaRequest::new(format!("{}/later.webm", server.uri()), MediaKind::Video),
    ];

    let result = service.download_individually(&items).await;
    assert_eq!(result.succeeded.len(), 2);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.skipped.len(), 1);
    assert!(result.succeeded.iter().all(|item| item.download_id.is_some()));
    assert!(dir.path().join("ok.jpg").is_file());
    assert!(dir.path().join("later.webm").is_file());

    let status = service.status();
    assert_eq!(status.completed, 2);
    assert_eq!(status.failed, 1);
    assert_eq!(status.active, 0);
    assert_eq!(downloader.failed().len(), 1);
}

#[tokio::test]
async fn blobs_are_zipped_without_network() {
    let dir = TempDir::new().unwrap();
    let (service, downloader) = service(&dir, quick());
    let blobs = vec![
        encode_data_url("image/jpeg", b"first image"),
        "data:image/png;base64,@@not-base64@@".to_string(),
        encode_data_url("image/png", b"second image"),
    ];
    let filenames = vec![
        "photo.jpg".to_string(),
        "broken.png".to_string(),
        "photo.jpg".to_string(),
    ];

    let delivery = service.create_zip_from_blobs(&blobs, &filenames).await.unwrap();
    assert_eq!(delivery.archived(), 2);
    assert_eq!(delivery.result.failed.len(), 1);
    assert_eq!(delivery.result.failed[0].kind, MediaErrorKind::EmptyPayload);

    let archive = downloader.completed()[0].saved_to.clone().unwrap();
    assert_eq!(archive_names(&archive), vec!["photo.jpg", "photo_1.jpg"]);
}

#[tokio::test]
async fn unnamed_blobs_take_extension_from_mime() {
    let dir = TempDir::new().unwrap();
    let (service, downloader) = service(&dir, quick());
    let blobs = vec![
        encode_data_url("video/webm", b"clip"),
        encode_data_url("image/png", b"still"),
    ];
    let filenames = vec!["???".to_string(), "".to_string()];

    let delivery = service.create_zip_from_blobs(&blobs, &filenames).await.unwrap();
    assert_eq!(delivery.archived(), 2);
    let archive = downloader.completed()[0].saved_to.clone().unwrap();
    assert_eq!(archive_names(&archive), vec!["media_1.mp4", "media_2.jpg"]);
}

#[tokio::test]
async fn blob_and_filename_counts_must_match() {
    let dir = TempDir::new().unwrap();
    let (service, _) = service(&dir, quick());
    let blobs = vec![encode_data_url("image/jpeg", b"x")];
    let err = service.create_zip_from_blobs(&blobs, &[]).await.unwrap_err();
    assert!(matches!(err, AcquireError::MismatchedBlobs { blobs: 1, filenames: 0 }));
}

#[tokio::test]
async fn single_download_uses_derived_name() {
    let server = MockServer::start().await;
    serve(&server, "/photos/sunset%20beach.jpg", b"jpg", "image/jpeg").await;

    let dir = TempDir::new().unwrap();
    let (service, _) = service(&dir, quick());

    let photo = service
        .download_single(&MediaRequest::new(
            format!("{}/photos/sunset%20beach.jpg", server.uri()),
            MediaKind::Image,
        ))
        .await
        .unwrap();
    assert_eq!(photo.filename, "sunset_beach.jpg");
    assert!(dir.path().join("sunset_beach.jpg").is_file());

    let err = service
        .download_single(&MediaRequest::new("blob:https://x/123", MediaKind::Video))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), MediaErrorKind::InvalidUrl);
}

#[tokio::test]
async fn empty_batches_are_rejected() {
    let dir = TempDir::new().unwrap();
    let (service, _) = service(&dir, quick());
    assert!(matches!(
        service.download_batch_zip(&[]).await,
        Err(AcquireError::NoItems)
    ));
}
