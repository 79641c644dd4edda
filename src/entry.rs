use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use bytes::{BufMut, Bytes, BytesMut};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};

use crate::constants::VARIED_PREFIX;

const MAX_STORED_HEADERS: usize = 100;

/// A cache entry: the wire form of a prior response plus the Vary witness
/// values recorded when it was stored.
///
/// On disk the entry is the canonical HTTP/1.1 message (status line, header
/// lines, blank line, body) with one synthetic `X-Varied-<Name>` line per
/// witnessed request header. The witnesses never reach the caller; they exist
/// only for lookup comparison.
#[derive(Debug, Clone)]
pub struct StoredResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Lowercased request-header name → value observed at store time.
    pub varied: HashMap<String, String>,
}

impl StoredResponse {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.body.len() + 512);
        buf.put_slice(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason().unwrap_or("")
            )
            .as_bytes(),
        );
        for (name, value) in &self.varied {
            buf.put_slice(format!("{}{}: {}\r\n", VARIED_PREFIX, name, value).as_bytes());
        }
        for (name, value) in self.headers.iter() {
            buf.put_slice(name.as_str().as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"\r\n");
        buf.put_slice(&self.body);
        buf.freeze()
    }

    pub fn decode(raw: &Bytes) -> Result<Self> {
        let mut parsed = [httparse::EMPTY_HEADER; MAX_STORED_HEADERS];
        let mut resp = httparse::Response::new(&mut parsed);
        let offset = match resp.parse(raw).context("parse stored response")? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(anyhow!("truncated stored response")),
        };
        let code = resp.code.ok_or_else(|| anyhow!("stored response has no status"))?;
        let status = StatusCode::from_u16(code).context("stored response status")?;

        let mut headers = HeaderMap::new();
        let mut varied = HashMap::new();
        for header in resp.headers.iter() {
            let value = std::str::from_utf8(header.value)
                .context("stored header value is not utf-8")?;
            let lower = header.name.to_ascii_lowercase();
            if let Some(witness) = lower.strip_prefix(VARIED_PREFIX) {
                varied.insert(witness.to_string(), value.to_string());
                continue;
            }
            let name: HeaderName = lower.parse().context("stored header name")?;
            let value: HeaderValue = value.parse().context("stored header value")?;
            headers.append(name, value);
        }

        Ok(Self {
            status,
            headers,
            body: raw.slice(offset..),
            varied,
        })
    }

    pub fn etag(&self) -> Option<&str> {
        self.headers.get("ETag").and_then(|v| v.to_str().ok())
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.headers.get("Last-Modified").and_then(|v| v.to_str().ok())
    }
}
