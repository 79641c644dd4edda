use bytes::Bytes;

use crate::transport::BoxFuture;

pub mod disk;
pub mod memory;

pub use disk::DiskCache;
pub use memory::MemoryCache;

/// An opaque key→bytes store the transport persists entries into.
///
/// Implementations synchronize internally and are safe for concurrent use.
/// Per-operation atomicity is all the transport relies on: racing writers for
/// one key resolve to whichever `set` lands last, and a value is never
/// observed half-written. Failures stay inside the implementation — a failed
/// read reports `None` and a failed write or delete is a no-op, so the
/// transport sees nothing worse than a cache miss.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> BoxFuture<Option<Bytes>>;
    fn set(&self, key: &str, value: Bytes) -> BoxFuture<()>;
    fn delete(&self, key: &str) -> BoxFuture<()>;
}
