mod support;

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use support::*;
use tokio::net::TcpListener;
use tokio::sync::watch;

use cellar::cache::{Cache, MemoryCache};
use cellar::server;
use cellar::transport::{CacheTransport, RoundTripper};
use cellar::upstream::UpstreamClient;

/// Boots the proxy shell against `target` and returns its address plus the
/// shutdown handle.
async fn start_proxy(target: &str) -> (String, watch::Sender<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind proxy");
    let addr = listener.local_addr().expect("proxy addr");
    let target: Uri = target.parse().expect("target uri");

    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    let upstream = Arc::new(UpstreamClient::new());
    let transport: Arc<dyn RoundTripper> = Arc::new(CacheTransport::new(upstream, cache));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = server::serve(listener, target, transport, shutdown_rx).await;
    });

    (format!("http://{addr}"), shutdown_tx)
}

async fn fetch(client: &UpstreamClient, url: &str, headers: HeaderMap) -> TestResponse {
    let mut req = Request::builder()
        .method(Method::GET)
        .uri(url)
        .body(Full::new(Bytes::new()))
        .expect("request");
    *req.headers_mut() = headers;
    let resp = client.round_trip(req).await.expect("proxy request");
    let (parts, body) = resp.into_parts();
    let body = body.collect().await.expect("body").to_bytes();
    TestResponse {
        status: parts.status,
        headers: parts.headers,
        body,
    }
}

#[tokio::test]
async fn test_host_is_rewritten_to_target() {
    let origin = MockServer::start(|req| {
        let seen_host = req
            .headers()
            .get("Host")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let mut headers = origin_headers(Some(3600));
        headers.insert("X-Seen-Host", seen_host.parse().unwrap());
        build_response(StatusCode::OK, headers, Bytes::from_static(b"origin body"))
    })
    .await;

    let (proxy_url, _shutdown) = start_proxy(&origin.url("")).await;
    let client = UpstreamClient::new();

    let resp = fetch(&client, &format!("{proxy_url}/hosty"), HeaderMap::new()).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.header("X-Seen-Host"), origin.addr().to_string());
    assert_eq!(resp.body.as_ref(), b"origin body");
}

#[tokio::test]
async fn test_cache_indicator_visible_through_shell() {
    let origin = MockServer::start(|_req| {
        build_response(
            StatusCode::OK,
            origin_headers(Some(3600)),
            Bytes::from_static(b"cached through shell"),
        )
    })
    .await;

    let (proxy_url, _shutdown) = start_proxy(&origin.url("")).await;
    let client = UpstreamClient::new();
    let url = format!("{proxy_url}/asset");

    let first = fetch(&client, &url, HeaderMap::new()).await;
    assert!(!first.from_cache());

    let second = fetch(&client, &url, HeaderMap::new()).await;
    assert!(second.from_cache());
    assert_eq!(second.body, first.body);
}

#[tokio::test]
async fn test_dead_origin_becomes_bad_gateway() {
    let (proxy_url, _shutdown) = start_proxy("http://127.0.0.1:9").await;
    let client = UpstreamClient::new();

    let resp = fetch(&client, &format!("{proxy_url}/"), HeaderMap::new()).await;
    assert_eq!(resp.status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_shutdown_signal_stops_accept_loop() {
    let origin = MockServer::start(|_req| {
        build_response(StatusCode::OK, origin_headers(None), Bytes::new())
    })
    .await;
    let (proxy_url, shutdown) = start_proxy(&origin.url("")).await;
    let client = UpstreamClient::new();

    let resp = fetch(&client, &format!("{proxy_url}/"), HeaderMap::new()).await;
    assert_eq!(resp.status, StatusCode::OK);

    shutdown.send(true).expect("signal shutdown");
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // A fresh client forces a new connection; the listener is gone.
    let fresh = UpstreamClient::new();
    let req = Request::builder()
        .method(Method::GET)
        .uri(format!("{proxy_url}/"))
        .body(Full::new(Bytes::new()))
        .expect("request");
    assert!(fresh.round_trip(req).await.is_err());
}
