use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use http::{HeaderMap, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;

use cellar::cache::{Cache, MemoryCache};
use cellar::constants;
use cellar::transport::{CacheTransport, RoundTripper};
use cellar::upstream::UpstreamClient;

#[derive(Clone)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> String {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    }

    pub fn from_cache(&self) -> bool {
        self.header(constants::FROM_CACHE_KEY) == constants::FROM_CACHE_VALUE
    }
}

/// Client whose outbound pipeline is a caching transport, the way the proxy
/// shell wires it up.
pub struct CachingClient {
    transport: Arc<dyn RoundTripper>,
}

impl CachingClient {
    pub fn new() -> Self {
        Self::with_cache(Arc::new(MemoryCache::new()))
    }

    pub fn with_cache(cache: Arc<dyn Cache>) -> Self {
        let upstream = Arc::new(UpstreamClient::new());
        Self::with_transport(CacheTransport::new(upstream, cache))
    }

    pub fn with_transport(transport: CacheTransport) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub async fn get(&self, url: &str, headers: HeaderMap) -> TestResponse {
        self.send(Method::GET, url, headers).await
    }

    pub async fn send(&self, method: Method, url: &str, headers: HeaderMap) -> TestResponse {
        let mut req = Request::builder()
            .method(method)
            .uri(url)
            .body(Full::new(Bytes::new()))
            .expect("request");
        *req.headers_mut() = headers;

        let resp = self.transport.round_trip(req).await.expect("round trip");
        let (parts, body) = resp.into_parts();
        let body = body.collect().await.expect("body").to_bytes();
        TestResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }
}

pub struct MockServer {
    addr: SocketAddr,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MockServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(Request<Incoming>) -> Response<Full<Bytes>> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown, mut rx) = tokio::sync::oneshot::channel();
        let handler = Arc::new(handler);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut rx => break,
                    res = listener.accept() => {
                        let (stream, _) = match res { Ok(v) => v, Err(_) => break };
                        let io = TokioIo::new(stream);
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let resp = handler(req);
                                async move { Ok::<_, hyper::Error>(resp) }
                            });
                            let builder = ConnBuilder::new(TokioExecutor::new());
                            let _ = builder.serve_connection(io, service).await;
                        });
                    }
                }
            }
        });

        Self {
            addr,
            shutdown: Some(shutdown),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Response headers every mock origin sends: a parseable Date plus an
/// optional freshness lifetime.
pub fn origin_headers(max_age: Option<u64>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "Date",
        httpdate::fmt_http_date(SystemTime::now()).parse().unwrap(),
    );
    if let Some(secs) = max_age {
        headers.insert(
            "Cache-Control",
            format!("max-age={secs}").parse().unwrap(),
        );
    }
    headers
}

pub fn build_response(status: StatusCode, headers: HeaderMap, body: Bytes) -> Response<Full<Bytes>> {
    let mut resp = Response::builder()
        .status(status)
        .body(Full::new(body))
        .unwrap();
    *resp.headers_mut() = headers;
    resp
}
