//! Integration Tests for File Serving
//!
//! Tests the full request/response cycle through the router, and one
//! end-to-end run against a real listener.

use std::io::Read;
use std::path::Path;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use flate2::read::GzDecoder;
use serde_json::Value;
use static_cache::{api::create_router, AppState, Config};
use tempfile::TempDir;
use tokio_test::assert_ok;
use tower::ServiceExt;

// == Helper Functions ==

const CSS: &str = "/* theme */\nbody {\n  color : red ;\n}\n";

fn site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("css")).unwrap();
    std::fs::write(dir.path().join("css/site.css"), CSS).unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>hello</h1>").unwrap();
    std::fs::write(dir.path().join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
    std::fs::write(dir.path().join(".env"), "SECRET=1").unwrap();
    dir
}

fn app_with(config: Config) -> (Router, AppState) {
    let state = AppState::from_config(&config).unwrap();
    (create_router(state.clone()), state)
}

fn app(dir: &Path) -> (Router, AppState) {
    app_with(Config::for_root(dir))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_to_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn gunzip(data: &[u8]) -> String {
    let mut out = String::new();
    GzDecoder::new(data).read_to_string(&mut out).unwrap();
    out
}

// == Fresh Reads ==

#[tokio::test]
async fn test_serves_file_with_headers() {
    let dir = site();
    let (app, _) = app(dir.path());

    let response = send(&app, get("/index.html")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "text/html");
    assert_eq!(
        headers[header::CACHE_CONTROL],
        "public, max-age=172800, must-revalidate"
    );
    assert!(headers[header::LAST_MODIFIED].to_str().unwrap().ends_with("GMT"));
    assert!(headers.get(header::CONTENT_ENCODING).is_none());
    assert_eq!(body_bytes(response).await, b"<h1>hello</h1>");
}

#[tokio::test]
async fn test_gzip_negotiated() {
    let dir = site();
    let (app, _) = app(dir.path());

    let request = Request::builder()
        .uri("/css/site.css")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
    assert_eq!(response.headers()[header::VARY], "Accept-Encoding");
    assert_eq!(gunzip(&body_bytes(response).await), CSS);
}

#[tokio::test]
async fn test_binary_never_compressed() {
    let dir = site();
    let (app, _) = app(dir.path());

    let request = Request::builder()
        .uri("/logo.png")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    assert_eq!(body_bytes(response).await, [0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn test_minify_then_gzip() {
    let dir = site();
    let (app, _) = app_with(Config {
        minify: true,
        ..Config::for_root(dir.path())
    });

    let request = Request::builder()
        .uri("/css/site.css")
        .header(header::ACCEPT_ENCODING, "gzip")
        .body(Body::empty())
        .unwrap();
    let gzipped = send(&app, request).await;
    assert_eq!(gunzip(&body_bytes(gzipped).await), "body{color:red}");

    // The cached body is gzip, so this one is minified afresh
    let plain = send(&app, get("/css/site.css")).await;
    assert!(plain.headers().get(header::CONTENT_ENCODING).is_none());
    assert_eq!(body_bytes(plain).await, b"body{color:red}");
}

#[tokio::test]
async fn test_extra_headers_applied() {
    let dir = site();
    let (app, _) = app_with(Config {
        headers: static_cache::config::parse_headers("X-Served-By=static-cache").unwrap(),
        ..Config::for_root(dir.path())
    });

    let response = send(&app, get("/index.html")).await;
    assert_eq!(response.headers()["x-served-by"], "static-cache");
}

// == Cache Path ==

#[tokio::test]
async fn test_second_request_served_from_cache() {
    let dir = site();
    let (app, state) = app(dir.path());

    let first = send(&app, get("/index.html")).await;
    assert!(first.headers().get(header::CONTENT_LENGTH).is_none());
    body_bytes(first).await;

    let second = send(&app, get("/index.html")).await;
    assert_eq!(second.headers()[header::CONTENT_LENGTH], "14");
    assert_eq!(body_bytes(second).await, b"<h1>hello</h1>");

    let stats = state.cache.stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.total_bytes, 14);
}

#[tokio::test]
async fn test_equivalent_urls_share_entry() {
    let dir = site();
    let (app, state) = app(dir.path());

    body_bytes(send(&app, get("/css/site.css")).await).await;
    body_bytes(send(&app, get("/css//site.css")).await).await;
    body_bytes(send(&app, get("/css/./site.css")).await).await;

    let stats = state.cache.stats().await;
    assert_eq!(stats.total_entries, 1);
    assert_eq!(stats.hits, 2);
}

#[tokio::test]
async fn test_oversized_file_not_cached() {
    let dir = site();
    let mut config = Config::for_root(dir.path());
    config.cache.max_bytes = 8;
    let (app, state) = app_with(config);

    let response = send(&app, get("/index.html")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"<h1>hello</h1>");

    // Known to be too large before reading, so never offered to the cache
    let stats = state.cache.stats().await;
    assert_eq!(stats.total_entries, 0);
    assert_eq!(stats.rejections, 0);
}

// == Conditional Requests ==

async fn revalidates(app: &Router, uri: &str) {
    let first = send(app, get(uri)).await;
    let stamp = first.headers()[header::LAST_MODIFIED].clone();
    body_bytes(first).await;

    let request = Request::builder()
        .uri(uri)
        .header(header::IF_MODIFIED_SINCE, stamp)
        .body(Body::empty())
        .unwrap();
    let response = send(app, request).await;

    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_if_modified_since_exact_match_is_304_from_cache() {
    let dir = site();
    let (app, state) = app(dir.path());

    revalidates(&app, "/index.html").await;
    assert_eq!(state.cache.stats().await.hits, 1);
}

#[tokio::test]
async fn test_if_modified_since_exact_match_is_304_from_disk() {
    let dir = site();
    let (app, state) = app_with(Config {
        cache_enabled: false,
        ..Config::for_root(dir.path())
    });

    revalidates(&app, "/index.html").await;
    assert_eq!(state.cache.stats().await.total_entries, 0);
}

#[tokio::test]
async fn test_if_modified_since_mismatch_serves_body() {
    let dir = site();
    let (app, _) = app(dir.path());

    let request = Request::builder()
        .uri("/index.html")
        .header(header::IF_MODIFIED_SINCE, "Sun, 06 Nov 1994 08:49:37 GMT")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"<h1>hello</h1>");
}

#[tokio::test]
async fn test_zero_max_age_never_304() {
    let dir = site();
    let (app, _) = app_with(Config {
        max_age: 0,
        ..Config::for_root(dir.path())
    });

    let first = send(&app, get("/index.html")).await;
    assert_eq!(
        first.headers()[header::CACHE_CONTROL],
        "no-store, no-cache, must-revalidate"
    );
    let stamp = first.headers()[header::LAST_MODIFIED].clone();
    body_bytes(first).await;

    let request = Request::builder()
        .uri("/index.html")
        .header(header::IF_MODIFIED_SINCE, stamp)
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// == Request Errors ==

#[tokio::test]
async fn test_missing_file_is_404_json() {
    let dir = site();
    let (app, _) = app(dir.path());

    let response = send(&app, get("/nope.js")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_to_json(response).await;
    let message = json["error"].as_str().unwrap();
    assert_eq!(message, "Not found: /nope.js");
    assert!(!message.contains(&*dir.path().to_string_lossy()));
}

#[tokio::test]
async fn test_not_found_page_body() {
    let dir = site();
    let page = dir.path().join("404.html");
    std::fs::write(&page, "<p>no such page</p>").unwrap();
    let (app, _) = app_with(Config {
        not_found_page: Some(page),
        ..Config::for_root(dir.path())
    });

    let response = send(&app, get("/nope.js")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
    assert_eq!(body_bytes(response).await, b"<p>no such page</p>");
}

#[tokio::test]
async fn test_subdirectories_disabled() {
    let dir = site();
    let (app, _) = app_with(Config {
        subdirs: false,
        ..Config::for_root(dir.path())
    });

    let nested = send(&app, get("/css/site.css")).await;
    assert_eq!(nested.status(), StatusCode::FORBIDDEN);

    let top = send(&app, get("/index.html")).await;
    assert_eq!(top.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_directory_is_404() {
    let dir = site();
    let (app, _) = app(dir.path());

    let response = send(&app, get("/css")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_hidden_and_traversal_forbidden() {
    let dir = site();
    let (app, _) = app(dir.path());

    for uri in ["/.env", "/css/%2e%2e/%2e%2e/etc/passwd"] {
        let response = send(&app, get(uri)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{}", uri);
    }
}

#[tokio::test]
async fn test_hidden_files_when_enabled() {
    let dir = site();
    let (app, _) = app_with(Config {
        hidden: true,
        ..Config::for_root(dir.path())
    });

    let response = send(&app, get("/.env")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_post_is_405() {
    let dir = site();
    let (app, _) = app(dir.path());

    let request = Request::builder()
        .method("POST")
        .uri("/index.html")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_head_has_headers_only() {
    let dir = site();
    let (app, state) = app(dir.path());

    let request = Request::builder()
        .method("HEAD")
        .uri("/index.html")
        .body(Body::empty())
        .unwrap();
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "14");
    assert!(body_bytes(response).await.is_empty());
    assert_eq!(state.cache.stats().await.total_entries, 0);
}

#[tokio::test]
async fn test_mount_prefix() {
    let dir = site();
    let (app, _) = app_with(Config {
        mount: "/static".to_string(),
        ..Config::for_root(dir.path())
    });

    let inside = send(&app, get("/static/index.html")).await;
    assert_eq!(inside.status(), StatusCode::OK);

    let outside = send(&app, get("/index.html")).await;
    assert_eq!(outside.status(), StatusCode::NOT_FOUND);
}

// == Operational Endpoints ==

#[tokio::test]
async fn test_stats_endpoint_reports_activity() {
    let dir = site();
    let (app, _) = app(dir.path());

    body_bytes(send(&app, get("/index.html")).await).await;
    body_bytes(send(&app, get("/index.html")).await).await;

    let json = body_to_json(send(&app, get("/_cache/stats")).await).await;
    assert_eq!(json["hits"], 1);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["total_entries"], 1);
    assert_eq!(json["hit_rate"], 0.5);
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = site();
    let (app, _) = app(dir.path());

    let json = body_to_json(send(&app, get("/_cache/health")).await).await;
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

// == End to End ==

#[tokio::test]
async fn test_large_file_over_real_socket() {
    let dir = site();
    let data: Vec<u8> = (0..600_000u32).map(|i| (i % 241) as u8).collect();
    std::fs::write(dir.path().join("big.bin"), &data).unwrap();

    let mut config = Config::for_root(dir.path());
    config.cache.segment_threshold = 64 * 1024;
    let (app, state) = app_with(config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    let client = reqwest::Client::new();
    let url = format!("http://{}/big.bin", addr);

    // Streamed from disk, then segmented from the cache
    for _ in 0..2 {
        let response = assert_ok!(client.get(&url).send().await);
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body = assert_ok!(response.bytes().await);
        assert_eq!(body.len(), data.len());
        assert!(body[..] == data[..]);
    }

    let stats = state.cache.stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.total_bytes, data.len());

    server.abort();
}
