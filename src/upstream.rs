use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::transport::{BoxFuture, RoundTripper};

/// Innermost round-tripper: sends the request to the origin and buffers the
/// whole response body before handing it back.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Option<Duration>,
}

impl UpstreamClient {
    pub fn new() -> Self {
        let connector = HttpConnector::new();
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self {
            client,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    async fn fetch(&self, req: Request<Full<Bytes>>) -> Result<Response<Full<Bytes>>> {
        let pending = self.client.request(req);
        let resp = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .context("origin timed out")?,
            None => pending.await,
        }
        .context("origin request")?;

        let (parts, body) = resp.into_parts();
        let body = body.collect().await.context("read origin body")?.to_bytes();
        Ok(Response::from_parts(parts, Full::new(body)))
    }
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundTripper for UpstreamClient {
    fn round_trip(&self, req: Request<Full<Bytes>>) -> BoxFuture<Result<Response<Full<Bytes>>>> {
        let this = self.clone();
        Box::pin(async move { this.fetch(req).await })
    }
}
