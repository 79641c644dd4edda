use http::header::HeaderName;
use http::HeaderMap;

/// Headers that are per-connection under RFC 2616 §13.5.1 and never copied
/// between hops.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_header(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Header names declared hop-by-hop by the map's own `Connection` values.
fn connection_listed(headers: &HeaderMap) -> Vec<String> {
    let mut out = Vec::new();
    for value in headers.get_all("Connection") {
        let Ok(value) = value.to_str() else { continue };
        for name in value.split(',') {
            let name = name.trim();
            if !name.is_empty() {
                out.push(name.to_ascii_lowercase());
            }
        }
    }
    out
}

/// Names in `headers` that may be copied end-to-end: everything except the
/// fixed hop-by-hop set and any name listed in a `Connection` header.
pub fn end_to_end_headers(headers: &HeaderMap) -> Vec<HeaderName> {
    let listed = connection_listed(headers);
    headers
        .keys()
        .filter(|name| {
            !is_hop_header(name.as_str()) && !listed.iter().any(|l| l == name.as_str())
        })
        .cloned()
        .collect()
}

/// Copies `headers`, dropping everything [`end_to_end_headers`] excludes.
pub fn strip_hop_headers(headers: &HeaderMap) -> HeaderMap {
    let keep = end_to_end_headers(headers);
    let mut out = HeaderMap::new();
    for name in keep {
        for value in headers.get_all(&name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

/// Flattens every `Vary` instance into one lowercased name list. A literal
/// `*` is kept as-is so callers can reject the entry.
pub fn vary_headers(headers: &HeaderMap) -> Vec<String> {
    let mut out = Vec::new();
    for value in headers.get_all("Vary") {
        let Ok(value) = value.to_str() else { continue };
        for name in value.split(',') {
            let name = name.trim();
            if !name.is_empty() {
                out.push(name.to_ascii_lowercase());
            }
        }
    }
    out
}
