use std::sync::Arc;
use std::time::Duration;

use picker_engine::{
    encode_data_url, Credentials, FailureKind, FetchSettings, Fetcher, HttpPageSource, PageSource,
    ReqwestFetcher,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn fetcher_returns_bytes_and_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photo.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0xff, 0xd8, 0xff], "image/jpeg"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let url = format!("{}/photo.jpg", server.uri());

    let output = fetcher.fetch(&url, Credentials::Include).await.expect("fetch ok");
    assert_eq!(output.metadata.original_url, url);
    assert_eq!(output.metadata.redirect_count, 0);
    assert_eq!(output.metadata.mime().as_deref(), Some("image/jpeg"));
    assert_eq!(output.bytes.as_ref(), &[0xff, 0xd8, 0xff]);
}

#[tokio::test]
async fn credential_headers_only_sent_when_included() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/private.png"))
        .and(header("cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"png".to_vec(), "image/png"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private.png"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        credential_headers: vec![("cookie".to_string(), "session=abc".to_string())],
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);
    let url = format!("{}/private.png", server.uri());

    assert!(fetcher.fetch(&url, Credentials::Include).await.is_ok());
    let err = fetcher.fetch(&url, Credentials::Omit).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(403));
}

#[tokio::test]
async fn fetcher_fails_on_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let url = format!("{}/missing.jpg", server.uri());

    let err = fetcher.fetch(&url, Credentials::Include).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn fetcher_times_out_on_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default().with_timeout(Duration::from_millis(50)));
    let url = format!("{}/slow.mp4", server.uri());

    let err = fetcher.fetch(&url, Credentials::Omit).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn fetcher_rejects_too_large_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "image/jpeg")
                .set_body_string("01234567890"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);
    let url = format!("{}/large.jpg", server.uri());

    let err = fetcher.fetch(&url, Credentials::Include).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}

#[tokio::test]
async fn empty_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empty.gif"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let url = format!("{}/empty.gif", server.uri());

    let err = fetcher.fetch(&url, Credentials::Include).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::EmptyBody);
}

#[tokio::test]
async fn page_settings_reject_non_html() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"{}".to_vec(), "application/json"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::for_pages());
    let url = format!("{}/feed", server.uri());

    let err = fetcher.fetch(&url, Credentials::Include).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::UnsupportedContentType {
            content_type: "application/json".to_string()
        }
    );
}

#[tokio::test]
async fn unsupported_schemes_are_invalid() {
    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let err = fetcher
        .fetch("ftp://files.example/a.jpg", Credentials::Include)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}

#[tokio::test]
async fn local_files_are_read_from_disk() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("local.jpg");
    std::fs::write(&path, b"jpeg bytes").unwrap();
    let url = url::Url::from_file_path(&path).unwrap().to_string();

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let output = fetcher.fetch(&url, Credentials::Include).await.expect("file read");
    assert_eq!(output.bytes.as_ref(), b"jpeg bytes");
    assert_eq!(output.metadata.final_url, url);

    let missing = url.replace("local.jpg", "missing.jpg");
    let err = fetcher.fetch(&missing, Credentials::Omit).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Network);
}

#[tokio::test]
async fn data_urls_are_decoded_in_place() {
    let url = encode_data_url("image/png", &[0x89, b'P', b'N', b'G']);
    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let output = fetcher.fetch(&url, Credentials::Omit).await.expect("inline payload");
    assert_eq!(output.bytes.as_ref(), &[0x89, b'P', b'N', b'G']);
    assert_eq!(output.metadata.mime().as_deref(), Some("image/png"));

    let pages = ReqwestFetcher::new(FetchSettings::for_pages());
    let err = pages.fetch(&url, Credentials::Omit).await.unwrap_err();
    assert!(matches!(err.kind, FailureKind::UnsupportedContentType { .. }));
}

#[tokio::test]
async fn http_page_source_decodes_declared_charset() {
    let server = MockServer::start().await;
    let mut body = b"<html><body><p>caf".to_vec();
    body.push(0xe9);
    body.extend_from_slice(b"</p><img src=\"a.jpg\"></body></html>");
    Mock::given(method("GET"))
        .and(path("/gallery/index.html"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=windows-1252"))
        .mount(&server)
        .await;

    let fetcher = Arc::new(ReqwestFetcher::new(FetchSettings::for_pages()));
    let url = format!("{}/gallery/index.html", server.uri());
    let snapshot = HttpPageSource::new(url.clone(), fetcher)
        .snapshot()
        .await
        .expect("page loads");

    assert_eq!(snapshot.base_url.as_str(), url);
    assert!(snapshot.html.contains("café"));
}
