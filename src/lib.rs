pub mod cache;
pub mod cachecontrol;
pub mod clock;
pub mod config;
pub mod constants;
pub mod entry;
pub mod freshness;
pub mod headers;
pub mod http_range;
pub mod logging;
pub mod server;
pub mod transport;
pub mod upstream;
