use std::collections::HashMap;

use http::HeaderMap;

/// Parses every `Cache-Control` instance in `headers` into a directive map.
///
/// Directive names are lowercased; bare directives map to the empty string;
/// quoted-string values have their quotes stripped. Duplicates keep the last
/// occurrence. Unknown directives are preserved untouched.
pub fn parse_cache_control(headers: &HeaderMap) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for value in headers.get_all("Cache-Control") {
        let Ok(value) = value.to_str() else { continue };
        for part in value.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match part.split_once('=') {
                Some((name, val)) => {
                    let val = val.trim();
                    let val = val
                        .strip_prefix('"')
                        .and_then(|v| v.strip_suffix('"'))
                        .unwrap_or(val);
                    out.insert(name.trim().to_ascii_lowercase(), val.to_string());
                }
                None => {
                    out.insert(part.to_ascii_lowercase(), String::new());
                }
            }
        }
    }
    out
}
