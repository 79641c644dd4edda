pub const FROM_CACHE_KEY: &str = "X-From-Cache";
pub const FROM_CACHE_VALUE: &str = "1";

/// Prefix of the synthetic witness lines prepended to a stored entry.
pub const VARIED_PREFIX: &str = "x-varied-";
