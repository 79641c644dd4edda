use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use sha1::{Digest, Sha1};

use crate::cache::Cache;
use crate::transport::BoxFuture;

/// On-disk backend: one file per key under a root directory, named by the
/// hex SHA-1 of the key. Writes land in a temp file and are renamed into
/// place so readers never observe a partial value.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: Arc<PathBuf>,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("create cache dir {}", root.display()))?;
        Ok(Self {
            root: Arc::new(root),
        })
    }

    fn entry_path(root: &Path, key: &str) -> PathBuf {
        let mut hasher = Sha1::new();
        hasher.update(key.as_bytes());
        let digest = hasher.finalize();
        let mut name = String::with_capacity(40);
        for byte in digest {
            let _ = write!(name, "{:02x}", byte);
        }
        root.join(name)
    }
}

impl Cache for DiskCache {
    fn get(&self, key: &str) -> BoxFuture<Option<Bytes>> {
        let root = Arc::clone(&self.root);
        let key = key.to_string();
        Box::pin(async move {
            let path = Self::entry_path(&root, &key);
            match std::fs::read(&path) {
                Ok(data) => Some(Bytes::from(data)),
                Err(err) if err.kind() == ErrorKind::NotFound => None,
                Err(err) => {
                    log::warn!("disk cache read {} failed: {err}", path.display());
                    None
                }
            }
        })
    }

    fn set(&self, key: &str, value: Bytes) -> BoxFuture<()> {
        let root = Arc::clone(&self.root);
        let key = key.to_string();
        Box::pin(async move {
            let path = Self::entry_path(&root, &key);
            let tmp = path.with_extension("tmp");
            if let Err(err) = std::fs::write(&tmp, &value) {
                log::warn!("disk cache write {} failed: {err}", tmp.display());
                return;
            }
            if let Err(err) = std::fs::rename(&tmp, &path) {
                log::warn!("disk cache commit {} failed: {err}", path.display());
                let _ = std::fs::remove_file(&tmp);
            }
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<()> {
        let root = Arc::clone(&self.root);
        let key = key.to_string();
        Box::pin(async move {
            let path = Self::entry_path(&root, &key);
            if let Err(err) = std::fs::remove_file(&path) {
                if err.kind() != ErrorKind::NotFound {
                    log::warn!("disk cache delete {} failed: {err}", path.display());
                }
            }
        })
    }
}
