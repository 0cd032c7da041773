use std::time::Duration;

use async_trait::async_trait;

mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Errors from the backing store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or answered with a transport error.
    ///
    /// Retryable by the caller; this crate performs no retry of its own.
    #[error("store unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl StoreError {
    pub(crate) fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Box::new(err))
    }
}

/// One page of a cursor scan.
///
/// A returned cursor of `0` means the scan is complete; any other value is
/// passed back to fetch the next page. The scan is not a consistent
/// snapshot, and a key may appear on more than one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    /// Keys found on this page
    pub keys: Vec<String>,
    /// Cursor for the next page, `0` when done
    pub cursor: u64,
}

/// The five primitives this crate requires of its key-value collaborator.
///
/// Implementations must be safe to share across concurrently executing
/// request handlers; every method is one short round trip with no internal
/// timeout; callers thread their own deadlines.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Value for `key`, or `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Associate `key` with `value`, expiring `ttl` from now
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
    -> Result<(), StoreError>;

    /// One page of keys starting with `prefix`; start with cursor `0`
    async fn scan_prefix(&self, prefix: &str, cursor: u64) -> Result<ScanPage, StoreError>;

    /// Add `member` to `set`, returning whether it was newly inserted
    async fn set_add(&self, set: &str, member: &str) -> Result<bool, StoreError>;

    /// Whether `member` is present in `set`
    async fn set_contains(&self, set: &str, member: &str) -> Result<bool, StoreError>;
}
