use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use http::header::HOST;
use http::{Request, Response, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::constants;
use crate::transport::RoundTripper;

/// Binds the listen address and serves until ctrl-c.
pub async fn run(bind: &str, target: Uri, transport: Arc<dyn RoundTripper>) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    log::info!("listening on {} for {}", listener.local_addr()?, target);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
    });

    serve(listener, target, transport, shutdown_rx).await
}

/// Accept loop, separated from [`run`] so tests can drive it with their own
/// listener and shutdown signal.
pub async fn serve(
    listener: TcpListener,
    target: Uri,
    transport: Arc<dyn RoundTripper>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                log::info!("shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, remote) = match accepted {
                    Ok(conn) => conn,
                    Err(err) => {
                        log::warn!("accept failed: {err}");
                        continue;
                    }
                };
                let io = TokioIo::new(stream);
                let target = target.clone();
                let transport = Arc::clone(&transport);
                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let target = target.clone();
                        let transport = Arc::clone(&transport);
                        async move {
                            Ok::<_, hyper::Error>(
                                proxy_request(req, &target, transport, remote).await,
                            )
                        }
                    });
                    let builder = ConnBuilder::new(TokioExecutor::new());
                    if let Err(err) = builder.serve_connection(io, service).await {
                        log::debug!("connection from {remote} ended: {err}");
                    }
                });
            }
        }
    }
}

async fn proxy_request(
    req: Request<Incoming>,
    target: &Uri,
    transport: Arc<dyn RoundTripper>,
    remote: SocketAddr,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let outbound = match rewrite_request(req, target).await {
        Ok(outbound) => outbound,
        Err(err) => {
            log::warn!("{remote} \"{method} {path}\" rejected: {err}");
            return text_response(StatusCode::BAD_REQUEST, "bad request");
        }
    };

    match transport.round_trip(outbound).await {
        Ok(resp) => {
            let cache = if resp.headers().contains_key(constants::FROM_CACHE_KEY) {
                "hit"
            } else {
                "miss"
            };
            log::info!(
                "{remote} \"{method} {path}\" {} cache={cache}",
                resp.status().as_u16()
            );
            resp
        }
        Err(err) => {
            log::warn!("{remote} \"{method} {path}\" upstream error: {err}");
            text_response(StatusCode::BAD_GATEWAY, "upstream error")
        }
    }
}

/// Redirects the inbound request at the target: absolute URI against the
/// target authority, Host rewritten to match, body buffered.
async fn rewrite_request(req: Request<Incoming>, target: &Uri) -> Result<Request<Full<Bytes>>> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await.context("read request body")?.to_bytes();

    let scheme = target.scheme_str().unwrap_or("http");
    let authority = target.authority().context("target has no authority")?;
    let base = target.path().trim_end_matches('/');
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let uri: Uri = format!("{scheme}://{authority}{base}{path}")
        .parse()
        .context("rewrite request uri")?;

    let mut out = Request::builder()
        .method(parts.method)
        .uri(uri)
        .body(Full::new(body))
        .context("build outbound request")?;
    *out.headers_mut() = parts.headers;
    out.headers_mut()
        .insert(HOST, authority.as_str().parse().context("host header")?);
    Ok(out)
}

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
