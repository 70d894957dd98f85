//! reqwest fetcher against a local mock server.

use adm_gateway::{CacheMode, FetchError, Fetcher, HttpFetcher, Method, Request, Url};
use httpmock::prelude::*;

fn get(url: &str) -> Request {
    Request::get(Url::parse(url).unwrap())
}

#[tokio::test]
async fn ok_response_is_buffered_with_headers() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET).path("/admin.html");
            then.status(200)
                .header("content-type", "text/html")
                .body("<html>admin</html>");
        })
        .await;

    let resp = HttpFetcher::new()
        .fetch(&get(&server.url("/admin.html")))
        .await
        .unwrap();

    m.assert_async().await;
    assert!(resp.ok());
    assert_eq!(resp.body, b"<html>admin</html>");
    assert_eq!(resp.header("Content-Type"), Some("text/html"));
}

#[tokio::test]
async fn non_2xx_is_a_response_not_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/gone.js");
            then.status(404);
        })
        .await;

    let resp = HttpFetcher::new()
        .fetch(&get(&server.url("/gone.js")))
        .await
        .unwrap();
    assert_eq!(resp.status, 404);
    assert!(!resp.ok());
}

#[tokio::test]
async fn reload_sends_no_cache_headers() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/index.html")
                .header("cache-control", "no-cache")
                .header("pragma", "no-cache");
            then.status(200).body("fresh");
        })
        .await;

    let req = get(&server.url("/index.html")).with_cache(CacheMode::Reload);
    let resp = HttpFetcher::new().fetch(&req).await.unwrap();
    m.assert_async().await;
    assert_eq!(resp.body, b"fresh");
}

#[tokio::test]
async fn method_is_forwarded() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(POST).path("/orders");
            then.status(201);
        })
        .await;

    let req = Request::new(Method::POST, Url::parse(&server.url("/orders")).unwrap());
    let resp = HttpFetcher::new().fetch(&req).await.unwrap();
    m.assert_async().await;
    assert_eq!(resp.status, 201);
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    // Port 9 (discard) is not listening on test hosts.
    let err = HttpFetcher::new()
        .fetch(&get("http://127.0.0.1:9/admin.html"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Network(_)), "{err}");
}
