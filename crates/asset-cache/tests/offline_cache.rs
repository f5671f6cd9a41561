//! Integration tests for the offline asset cache
//!
//! These tests run the HTTP fetcher against a wiremock server and drive
//! install, activation and interception end to end.

use asset_cache::{
    AssetCache, AssetCacheConfig, AssetCacheController, AssetCacheError, CacheStorage, FetchError,
    Fetcher, HttpFetcher, HttpFetcherConfig, Method, Request, SledCacheStorage, WorkerState,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn fetcher_for(server: &MockServer) -> Arc<HttpFetcher> {
    Arc::new(HttpFetcher::new(HttpFetcherConfig::new(server.uri())).unwrap())
}

// =============================================================================
// HTTP Fetcher Tests
// =============================================================================

#[tokio::test]
async fn test_fetcher_captures_status_headers_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/css/app.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/css")
                .set_body_string("body { margin: 0 }"),
        )
        .mount(&server)
        .await;

    let response = fetcher_for(&server).fetch(&Request::get("/css/app.css")).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.header_value("content-type"), Some("text/css"));
    assert_eq!(response.body, b"body { margin: 0 }".to_vec());
}

#[tokio::test]
async fn test_fetcher_forwards_method_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/save"))
        .and(header("X-Request-Id", "42"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::new(Method::Post, "/api/save").header("X-Request-Id", "42").body("text");
    let response = fetcher_for(&server).fetch(&request).await.unwrap();

    assert_eq!(response.status, 201);
}

#[tokio::test]
async fn test_fetcher_reports_error_statuses_as_responses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let response = fetcher_for(&server).fetch(&Request::get("/missing.js")).await.unwrap();
    assert_eq!(response.status, 404);
    assert!(!response.is_ok());
}

#[tokio::test]
async fn test_fetcher_timeout_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let config = HttpFetcherConfig::new(server.uri()).timeout(Duration::from_millis(100));
    let fetcher = HttpFetcher::new(config).unwrap();

    let err = fetcher.fetch(&Request::get("/slow")).await.unwrap_err();
    assert!(matches!(err, FetchError::Network(_)));
}

// =============================================================================
// Install / Activate Tests
// =============================================================================

#[tokio::test]
async fn test_install_activate_and_serve_offline() {
    let server = MockServer::start().await;
    serve(&server, "/index.html", "<html>shell</html>").await;
    serve(&server, "/js/app.js", "main()").await;

    let storage = Arc::new(SledCacheStorage::temporary().unwrap());
    let fetcher = fetcher_for(&server);
    let controller = AssetCacheController::new(fetcher.clone());

    let worker = Arc::new(AssetCache::new(
        AssetCacheConfig::new("1.0").manifest(["/index.html", "/js/app.js"]),
        storage.clone(),
        fetcher,
    ));
    controller.register(worker.clone()).await.unwrap();
    assert_eq!(worker.state(), WorkerState::Active);

    // Every further request must come from the cache.
    server.reset().await;

    let response = controller.fetch(Request::get("/index.html")).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"<html>shell</html>".to_vec());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_absolute_url_hits_entry_installed_by_path() {
    let server = MockServer::start().await;
    serve(&server, "/index.html", "<html>shell</html>").await;

    let storage = Arc::new(SledCacheStorage::temporary().unwrap());
    let fetcher = fetcher_for(&server);
    let controller = AssetCacheController::new(fetcher.clone());
    let worker = Arc::new(AssetCache::new(
        AssetCacheConfig::new("1.0").origin(server.uri()).manifest(["/index.html"]),
        storage,
        fetcher,
    ));
    controller.register(worker).await.unwrap();
    server.reset().await;

    let absolute = format!("{}/index.html", server.uri());
    let response = controller.fetch(Request::get(absolute)).await.unwrap();
    assert_eq!(response.body, b"<html>shell</html>".to_vec());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_install_fails_on_missing_resource() {
    let server = MockServer::start().await;
    serve(&server, "/index.html", "<html></html>").await;
    Mock::given(method("GET"))
        .and(path("/js/missing.js"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let storage = Arc::new(SledCacheStorage::temporary().unwrap());
    let worker = AssetCache::new(
        AssetCacheConfig::new("1.0").manifest(["/index.html", "/js/missing.js"]),
        storage.clone(),
        fetcher_for(&server),
    );

    let err = worker.install().await.unwrap_err();
    assert!(matches!(err, AssetCacheError::InstallFailed { ref url, .. } if url == "/js/missing.js"));
    assert!(!storage.has("text-dev-v1.0").await.unwrap());
}

#[tokio::test]
async fn test_upgrade_deletes_old_generation() {
    let server = MockServer::start().await;
    serve(&server, "/index.html", "<html></html>").await;

    let storage = Arc::new(SledCacheStorage::temporary().unwrap());
    storage.open("text-dev-v0.9.2").await.unwrap();

    let fetcher = fetcher_for(&server);
    let controller = AssetCacheController::new(fetcher.clone());
    let worker = Arc::new(AssetCache::new(
        AssetCacheConfig::default().manifest(["/index.html"]),
        storage.clone(),
        fetcher,
    ));

    let deleted = controller.register(worker).await.unwrap();

    assert_eq!(deleted, vec!["text-dev-v0.9.2"]);
    assert_eq!(storage.keys().await.unwrap(), vec!["text-dev-v0.9.3"]);
}

#[tokio::test]
async fn test_runtime_responses_are_cached() {
    let server = MockServer::start().await;
    serve(&server, "/index.html", "<html></html>").await;
    Mock::given(method("GET"))
        .and(path("/img/icon.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
        .expect(1)
        .mount(&server)
        .await;

    let storage = Arc::new(SledCacheStorage::temporary().unwrap());
    let fetcher = fetcher_for(&server);
    let controller = AssetCacheController::new(fetcher.clone());
    controller
        .register(Arc::new(AssetCache::new(
            AssetCacheConfig::new("1.0").manifest(["/index.html"]),
            storage,
            fetcher,
        )))
        .await
        .unwrap();

    let first = controller.fetch(Request::get("/img/icon.png")).await.unwrap();
    controller.settle().await;
    let second = controller.fetch(Request::get("/img/icon.png")).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.body, vec![0x89, b'P', b'N', b'G']);
}
