use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use http::Uri;
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
pub struct Bootstrap {
    #[serde(default)]
    pub bind: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub logger: Logger,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub upstream: Upstream,
}

impl Bootstrap {
    pub fn validate(&self) -> Result<()> {
        if self.bind.trim().is_empty() {
            return Err(anyhow!("bind address is required"));
        }
        if self.target.trim().is_empty() {
            return Err(anyhow!("target url is required"));
        }
        self.target_uri()?;
        Ok(())
    }

    pub fn target_uri(&self) -> Result<Uri> {
        let uri: Uri = self
            .target
            .parse()
            .with_context(|| format!("parse target url {}", self.target))?;
        if uri.authority().is_none() {
            return Err(anyhow!("target url {} has no host", self.target));
        }
        Ok(uri)
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct Logger {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct CacheConfig {
    /// "memory" (default) or "disk".
    #[serde(default)]
    pub driver: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct Upstream {
    #[serde(default, with = "humantime_serde")]
    pub timeout: Duration,
}

/// Loads the YAML bootstrap, collecting unknown field paths for the caller
/// to warn about.
pub fn load(path: &Path) -> Result<(Bootstrap, Vec<String>)> {
    let raw = fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let mut ignored = Vec::new();
    let de = serde_yaml::Deserializer::from_str(&raw);
    let cfg: Bootstrap = serde_ignored::deserialize(de, |path| {
        ignored.push(path.to_string());
    })
    .with_context(|| format!("parse config {}", path.display()))?;

    Ok((cfg, ignored))
}
