use std::time::{Duration, SystemTime};

use http::HeaderMap;

use crate::cachecontrol::parse_cache_control;
use crate::clock::Clock;

/// Outcome of evaluating a cached response against a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The stored response may be served as-is.
    Fresh,
    /// The stored response must be revalidated before reuse.
    Stale,
    /// The cache must stay out of the exchange entirely.
    Transparent,
}

/// Evaluates RFC 7234 freshness for a stored response.
///
/// Pure over its three inputs; all elapsed time flows through `clock`.
pub fn freshness(resp_headers: &HeaderMap, req_headers: &HeaderMap, clock: &dyn Clock) -> Freshness {
    let req_cc = parse_cache_control(req_headers);
    let resp_cc = parse_cache_control(resp_headers);

    if req_cc.contains_key("no-cache") || pragma_no_cache(req_headers) {
        return Freshness::Transparent;
    }
    if resp_cc.contains_key("no-cache") {
        return Freshness::Stale;
    }
    if req_cc.contains_key("must-revalidate") || resp_cc.contains_key("must-revalidate") {
        return Freshness::Stale;
    }
    if req_cc.get("max-age").map(String::as_str) == Some("0") {
        return Freshness::Stale;
    }

    // Without a parseable Date there is no age to reason about.
    let Some(date) = response_date(resp_headers) else {
        return Freshness::Stale;
    };
    let mut age = clock.since(date);

    let mut lifetime = resp_cc
        .get("max-age")
        .and_then(|v| parse_secs(v))
        .or_else(|| expires_lifetime(resp_headers, date))
        .unwrap_or_default();

    // The client may cap the acceptable age below what the response allows.
    if let Some(cap) = req_cc.get("max-age").and_then(|v| parse_secs(v)) {
        lifetime = cap;
    }

    if let Some(min_fresh) = req_cc.get("min-fresh").and_then(|v| parse_secs(v)) {
        age += min_fresh;
    }

    if let Some(max_stale) = req_cc.get("max-stale") {
        if max_stale.is_empty() {
            // Bare max-stale: the client accepts arbitrary staleness.
            return Freshness::Fresh;
        }
        if let Some(slack) = parse_secs(max_stale) {
            age = age.saturating_sub(slack);
        }
    }

    if lifetime > age {
        Freshness::Fresh
    } else {
        Freshness::Stale
    }
}

fn pragma_no_cache(req_headers: &HeaderMap) -> bool {
    req_headers.get_all("Pragma").iter().any(|v| {
        v.to_str()
            .map(|v| v.split(',').any(|p| p.trim().eq_ignore_ascii_case("no-cache")))
            .unwrap_or(false)
    })
}

fn response_date(resp_headers: &HeaderMap) -> Option<SystemTime> {
    let raw = resp_headers.get("Date")?.to_str().ok()?;
    httpdate::parse_http_date(raw).ok()
}

fn expires_lifetime(resp_headers: &HeaderMap, date: SystemTime) -> Option<Duration> {
    let raw = resp_headers.get("Expires")?.to_str().ok()?;
    let expires = httpdate::parse_http_date(raw).ok()?;
    expires.duration_since(date).ok()
}

fn parse_secs(raw: &str) -> Option<Duration> {
    raw.parse::<u64>().ok().map(Duration::from_secs)
}
