/// A resolved byte range, half-open: `start` inclusive, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub start: u64,
    pub end: u64,
}

impl RangeSpec {
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RangeError {
    Invalid,
    Unsatisfiable,
}

/// Parses a `Range` header value against a known total length.
///
/// Accepts `bytes=A-B`, `bytes=A-` and `bytes=-N`; a comma-separated list
/// resolves to its first spec. The upper bound is exclusive: `bytes=0-10`
/// covers ten bytes, and a bound at or past `total` is clamped to `total`.
pub fn parse_range(header: &str, total: u64) -> Result<RangeSpec, RangeError> {
    let header = header.trim();
    let Some(ranges) = header.strip_prefix("bytes=") else {
        return Err(RangeError::Invalid);
    };
    let spec = ranges.split(',').next().unwrap_or("").trim();
    if spec.is_empty() {
        return Err(RangeError::Invalid);
    }

    let Some((start_str, end_str)) = spec.split_once('-') else {
        return Err(RangeError::Invalid);
    };
    let start_str = start_str.trim();
    let end_str = end_str.trim();

    if start_str.is_empty() {
        // suffix form: bytes=-N, the last N bytes
        let suffix: u64 = end_str.parse().map_err(|_| RangeError::Invalid)?;
        if suffix == 0 || total == 0 {
            return Err(RangeError::Unsatisfiable);
        }
        return Ok(RangeSpec {
            start: total.saturating_sub(suffix),
            end: total,
        });
    }

    let start: u64 = start_str.parse().map_err(|_| RangeError::Invalid)?;
    if start >= total {
        return Err(RangeError::Unsatisfiable);
    }

    let end = if end_str.is_empty() {
        total
    } else {
        let end: u64 = end_str.parse().map_err(|_| RangeError::Invalid)?;
        end.min(total)
    };

    if end <= start {
        return Err(RangeError::Unsatisfiable);
    }

    Ok(RangeSpec { start, end })
}

/// A parsed `Content-Range: bytes start-end/size` header, same end-exclusive
/// convention as [`RangeSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub size: u64,
}

pub fn parse_content_range(header: &str) -> Option<ContentRange> {
    let header = header.trim();
    let rest = header.strip_prefix("bytes")?.trim_start();
    let (range_part, size_part) = rest.split_once('/')?;
    let (start, end) = range_part.trim().split_once('-')?;
    Some(ContentRange {
        start: start.parse().ok()?,
        end: end.parse().ok()?,
        size: size_part.trim().parse().ok()?,
    })
}

pub fn build_content_range(start: u64, end: u64, size: u64) -> String {
    format!("bytes {}-{}/{}", start, end, size)
}
