use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use http::{HeaderMap, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};

use crate::cache::Cache;
use crate::cachecontrol::parse_cache_control;
use crate::clock::{Clock, SystemClock};
use crate::constants;
use crate::entry::StoredResponse;
use crate::freshness::{freshness, Freshness};
use crate::headers::{end_to_end_headers, strip_hop_headers, vary_headers};
use crate::http_range::{build_content_range, parse_content_range, parse_range, RangeError};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// One hop of the outbound pipeline. Requests carry buffered bodies so a
/// transport may clone them for conditional retries.
pub trait RoundTripper: Send + Sync {
    fn round_trip(&self, req: Request<Full<Bytes>>) -> BoxFuture<Result<Response<Full<Bytes>>>>;
}

/// Statuses a cache may store without explicit freshness information,
/// per RFC 7231 §6.1.
const CACHEABLE_STATUSES: &[u16] = &[200, 203, 204, 206, 300, 301, 404, 405, 410, 414, 501];

/// Caching round-tripper. Wraps an inner transport and interposes an HTTP/1.1
/// private cache: GET responses are stored in `cache` keyed by method and URL,
/// reused while fresh, revalidated with conditional requests when stale, and
/// sliced to answer Range requests that fall inside a stored body.
///
/// Responses whose body bytes came out of the cache carry `X-From-Cache: 1`.
#[derive(Clone)]
pub struct CacheTransport {
    inner: Arc<dyn RoundTripper>,
    cache: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
    stale_on_error: bool,
}

impl CacheTransport {
    pub fn new(inner: Arc<dyn RoundTripper>, cache: Arc<dyn Cache>) -> Self {
        Self {
            inner,
            cache,
            clock: Arc::new(SystemClock),
            stale_on_error: true,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Whether a failed revalidation (5xx or transport error) falls back to
    /// the stored entry. On by default.
    pub fn stale_on_error(mut self, enabled: bool) -> Self {
        self.stale_on_error = enabled;
        self
    }

    async fn handle(&self, req: Request<Full<Bytes>>) -> Result<Response<Full<Bytes>>> {
        let req_cc = parse_cache_control(req.headers());
        if req.method() != Method::GET || req_cc.contains_key("no-store") {
            // The cache neither answers nor records this exchange.
            return self.inner.round_trip(req).await;
        }

        let key = primary_key(&req);
        let cached = self.lookup(&key, req.headers()).await;
        let state = cached
            .as_ref()
            .map(|entry| freshness(&entry.headers, req.headers(), self.clock.as_ref()));
        let range_header = req
            .headers()
            .get("Range")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if req_cc.contains_key("only-if-cached") {
            if let (Some(entry), Some(Freshness::Fresh)) = (cached.as_ref(), state) {
                if let Some(resp) = serve_cached(entry, range_header.as_deref()) {
                    return Ok(resp);
                }
            }
            return Ok(gateway_timeout());
        }

        if let (Some(entry), Some(Freshness::Fresh)) = (cached.as_ref(), state) {
            if let Some(resp) = serve_cached(entry, range_header.as_deref()) {
                return Ok(resp);
            }
            // The requested range falls outside the stored bytes; fetch it
            // fresh and let the store decision replace the entry.
        }

        // A ranged request never revalidates; it is either answered above or
        // fetched fresh.
        let origin = match (&cached, state) {
            (Some(entry), Some(Freshness::Stale))
                if range_header.is_none()
                    && (entry.etag().is_some() || entry.last_modified().is_some()) =>
            {
                match self.revalidate(&req, entry, &key).await? {
                    Revalidated::Served(resp) => return Ok(resp),
                    Revalidated::Origin(resp) => resp,
                }
            }
            _ => self.inner.round_trip(clone_request(&req)).await?,
        };

        self.store_decision(req.headers(), &key, origin).await
    }

    async fn lookup(&self, key: &str, req_headers: &HeaderMap) -> Option<StoredResponse> {
        let raw = self.cache.get(key).await?;
        let entry = match StoredResponse::decode(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("dropping malformed cache entry for {key}: {err}");
                self.cache.delete(key).await;
                return None;
            }
        };
        if !vary_matches(&entry, req_headers) {
            return None;
        }
        Some(entry)
    }

    /// Conditional GET against the origin. A 304 refreshes the stored entry
    /// in place; failure modes fall back to the stale copy when permitted.
    async fn revalidate(
        &self,
        req: &Request<Full<Bytes>>,
        entry: &StoredResponse,
        key: &str,
    ) -> Result<Revalidated> {
        let mut conditional = clone_request(req);
        if let Some(etag) = entry.etag() {
            if let Ok(value) = etag.parse() {
                conditional.headers_mut().insert("If-None-Match", value);
            }
        }
        if let Some(last_modified) = entry.last_modified() {
            if let Ok(value) = last_modified.parse() {
                conditional.headers_mut().insert("If-Modified-Since", value);
            }
        }

        let resp = match self.inner.round_trip(conditional).await {
            Ok(resp) => resp,
            Err(err) => {
                if self.stale_on_error {
                    log::warn!("revalidation of {key} failed, serving stale: {err}");
                    return Ok(Revalidated::Served(full_response(entry)));
                }
                return Err(err);
            }
        };

        if resp.status() == StatusCode::NOT_MODIFIED {
            let merged = merge_not_modified(entry, resp.headers());
            self.cache.set(key, merged.encode()).await;
            return Ok(Revalidated::Served(full_response(&merged)));
        }
        if resp.status().is_server_error() && self.stale_on_error {
            log::debug!("origin answered {} for {key}, serving stale", resp.status());
            return Ok(Revalidated::Served(full_response(entry)));
        }
        Ok(Revalidated::Origin(resp))
    }

    /// Persists or evicts after an origin exchange, then hands the response
    /// back to the caller.
    async fn store_decision(
        &self,
        req_headers: &HeaderMap,
        key: &str,
        resp: Response<Full<Bytes>>,
    ) -> Result<Response<Full<Bytes>>> {
        let resp_cc = parse_cache_control(resp.headers());
        if resp_cc.contains_key("no-store") || resp_cc.contains_key("private") {
            self.cache.delete(key).await;
            return Ok(resp);
        }
        if !CACHEABLE_STATUSES.contains(&resp.status().as_u16()) {
            // The origin stopped serving something cacheable under this key.
            self.cache.delete(key).await;
            return Ok(resp);
        }

        let (parts, body) = resp.into_parts();
        let body = body.collect().await?.to_bytes();
        let headers = strip_hop_headers(&parts.headers);
        let entry = StoredResponse {
            status: parts.status,
            headers: headers.clone(),
            body: body.clone(),
            varied: witness_values(&headers, req_headers),
        };
        self.cache.set(key, entry.encode()).await;

        Ok(response_with_headers(parts.status, headers, body))
    }
}

impl RoundTripper for CacheTransport {
    fn round_trip(&self, req: Request<Full<Bytes>>) -> BoxFuture<Result<Response<Full<Bytes>>>> {
        let this = self.clone();
        Box::pin(async move { this.handle(req).await })
    }
}

enum Revalidated {
    /// The exchange was settled from the cache.
    Served(Response<Full<Bytes>>),
    /// The origin produced a replacement response; run the store decision.
    Origin(Response<Full<Bytes>>),
}

fn primary_key(req: &Request<Full<Bytes>>) -> String {
    format!("{} {}", req.method(), req.uri())
}

fn vary_matches(entry: &StoredResponse, req_headers: &HeaderMap) -> bool {
    for name in vary_headers(&entry.headers) {
        if name == "*" {
            return false;
        }
        let live = req_headers
            .get(name.as_str())
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let witnessed = entry.varied.get(&name).map(String::as_str).unwrap_or("");
        if live != witnessed {
            return false;
        }
    }
    true
}

/// Request-header values to witness for each name in the response's Vary
/// list. Absent headers witness as the empty string.
fn witness_values(resp_headers: &HeaderMap, req_headers: &HeaderMap) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for name in vary_headers(resp_headers) {
        if name == "*" {
            continue;
        }
        let value = req_headers
            .get(name.as_str())
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        out.insert(name, value.to_string());
    }
    out
}

/// Answers a request out of the stored entry, applying the range-subset
/// policy. `None` means the entry cannot satisfy the request and the caller
/// must go to the origin.
fn serve_cached(entry: &StoredResponse, range_header: Option<&str>) -> Option<Response<Full<Bytes>>> {
    let Some(raw_range) = range_header else {
        return Some(full_response(entry));
    };

    let stored_slice = entry
        .headers
        .get("Content-Range")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_range);

    match stored_slice {
        // Entry holds only [start, end) of a larger resource; a sub-range is
        // serviceable when it falls entirely inside the stored segment. The
        // reported total is the segment length, not the original resource
        // length, to stay wire-compatible with prior deployments.
        Some(stored) => {
            let spec = match parse_range(raw_range, stored.size) {
                Ok(spec) => spec,
                Err(RangeError::Invalid) => return Some(full_response(entry)),
                Err(RangeError::Unsatisfiable) => return None,
            };
            if spec.start < stored.start || spec.end > stored.end {
                return None;
            }
            let lo = (spec.start - stored.start) as usize;
            let hi = (spec.end - stored.start) as usize;
            if hi > entry.body.len() {
                return None;
            }
            let body = entry.body.slice(lo..hi);
            let denominator = stored.end - stored.start;
            Some(range_response(entry, spec.start, spec.end, denominator, body))
        }
        None => {
            let total = entry.body.len() as u64;
            let spec = match parse_range(raw_range, total) {
                Ok(spec) => spec,
                Err(RangeError::Invalid) => return Some(full_response(entry)),
                Err(RangeError::Unsatisfiable) => return None,
            };
            let body = entry.body.slice(spec.start as usize..spec.end as usize);
            Some(range_response(entry, spec.start, spec.end, total, body))
        }
    }
}

fn full_response(entry: &StoredResponse) -> Response<Full<Bytes>> {
    let mut headers = entry.headers.clone();
    mark_from_cache(&mut headers, entry.body.len());
    response_with_headers(entry.status, headers, entry.body.clone())
}

fn range_response(
    entry: &StoredResponse,
    start: u64,
    end: u64,
    total: u64,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let mut headers = entry.headers.clone();
    headers.insert(
        "Content-Range",
        build_content_range(start, end, total).parse().unwrap(),
    );
    mark_from_cache(&mut headers, body.len());
    response_with_headers(StatusCode::PARTIAL_CONTENT, headers, body)
}

fn mark_from_cache(headers: &mut HeaderMap, body_len: usize) {
    headers.insert(
        constants::FROM_CACHE_KEY,
        constants::FROM_CACHE_VALUE.parse().unwrap(),
    );
    headers.insert("Content-Length", body_len.to_string().parse().unwrap());
}

fn gateway_timeout() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::GATEWAY_TIMEOUT)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Folds a 304's end-to-end headers over the stored entry, restores the
/// 200 status, and drops whatever the merged result marks hop-by-hop.
fn merge_not_modified(entry: &StoredResponse, update: &HeaderMap) -> StoredResponse {
    let mut merged = entry.headers.clone();
    for name in end_to_end_headers(update) {
        merged.remove(&name);
        for value in update.get_all(&name) {
            merged.append(name.clone(), value.clone());
        }
    }
    StoredResponse {
        status: StatusCode::OK,
        headers: strip_hop_headers(&merged),
        body: entry.body.clone(),
        varied: entry.varied.clone(),
    }
}

fn clone_request(req: &Request<Full<Bytes>>) -> Request<Full<Bytes>> {
    let mut out = Request::builder()
        .method(req.method().clone())
        .uri(req.uri().clone())
        .version(req.version())
        .body(req.body().clone())
        .unwrap();
    *out.headers_mut() = req.headers().clone();
    out
}

fn response_with_headers(
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let mut resp = Response::builder()
        .status(status)
        .body(Full::new(body))
        .unwrap();
    *resp.headers_mut() = headers;
    resp
}
