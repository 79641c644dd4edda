use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use cellar::cache::{Cache, DiskCache, MemoryCache};
use cellar::config;
use cellar::logging;
use cellar::server;
use cellar::transport::CacheTransport;
use cellar::upstream::UpstreamClient;

const DEFAULT_BIND: &str = "127.0.0.1:8080";

#[derive(Parser, Debug)]
#[command(name = "cellar", about = "Caching HTTP reverse proxy", version)]
struct Cli {
    /// Listen address
    #[arg(long)]
    bind: Option<String>,

    /// Origin base URL to proxy for
    #[arg(long)]
    target: Option<String>,

    /// Enable verbose logging
    #[arg(long)]
    debug: bool,

    /// Bootstrap config file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Keep cache entries in this directory instead of in memory
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut cfg, ignored) = match &cli.config {
        Some(path) => config::load(path)?,
        None => (config::Bootstrap::default(), Vec::new()),
    };

    // Flags override the bootstrap file.
    if let Some(bind) = &cli.bind {
        cfg.bind = bind.clone();
    }
    if cfg.bind.trim().is_empty() {
        cfg.bind = DEFAULT_BIND.to_string();
    }
    if let Some(target) = &cli.target {
        cfg.target = target.clone();
    }
    if let Some(dir) = &cli.cache_dir {
        cfg.cache.driver = "disk".to_string();
        cfg.cache.path = dir.display().to_string();
    }

    logging::init(&cfg.logger, cli.debug)?;

    if !ignored.is_empty() {
        log::warn!("ignoring unknown config fields: {}", ignored.join(", "));
    }

    cfg.validate()?;
    let target = cfg.target_uri()?;

    let cache: Arc<dyn Cache> = match cfg.cache.driver.as_str() {
        "disk" => Arc::new(DiskCache::new(&cfg.cache.path)?),
        _ => Arc::new(MemoryCache::new()),
    };
    let upstream = Arc::new(UpstreamClient::new().with_timeout(cfg.upstream.timeout));
    let transport = Arc::new(CacheTransport::new(upstream, cache));

    log::info!("cellar starting: {} -> {}", cfg.bind, target);
    server::run(&cfg.bind, target, transport).await
}
