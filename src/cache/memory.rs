use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;

use crate::cache::Cache;
use crate::transport::BoxFuture;

/// In-process backend over a guarded map. Entries live until deleted; there
/// is no size bound.
#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    inner: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> BoxFuture<Option<Bytes>> {
        let inner = Arc::clone(&self.inner);
        let key = key.to_string();
        Box::pin(async move { inner.read().await.get(&key).cloned() })
    }

    fn set(&self, key: &str, value: Bytes) -> BoxFuture<()> {
        let inner = Arc::clone(&self.inner);
        let key = key.to_string();
        Box::pin(async move {
            inner.write().await.insert(key, value);
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<()> {
        let inner = Arc::clone(&self.inner);
        let key = key.to_string();
        Box::pin(async move {
            inner.write().await.remove(&key);
        })
    }
}
