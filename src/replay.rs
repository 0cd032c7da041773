use tracing::debug;

use crate::store::{KeyValueStore, StoreError};

/// Store set holding every code that has already been accepted once.
///
/// Same key as the existing store layout, so deployments can be pointed at
/// an already-populated instance.
pub const BLACKLIST_SET: &str = "blacklisted_otps";

/// Rejects reuse of a code that is still inside its validity window.
///
/// A code can pass time-based verification for `period * (2 * window + 1)`
/// seconds; the guard is what makes it one-time. Store failures are always
/// surfaced: a failed check is never read as "not blacklisted" and a failed
/// insert is never read as "blacklisted".
#[derive(Debug, Clone)]
pub struct ReplayGuard<S> {
    store: S,
}

impl<S: KeyValueStore> ReplayGuard<S> {
    /// Guard over the shared store handle
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Whether `code` has been accepted before
    pub async fn is_blacklisted(&self, code: &str) -> Result<bool, StoreError> {
        self.store.set_contains(BLACKLIST_SET, code).await
    }

    /// Mark `code` as consumed; inserting it twice is a no-op
    pub async fn blacklist(&self, code: &str) -> Result<(), StoreError> {
        self.store.set_add(BLACKLIST_SET, code).await.map(|_| ())
    }

    /// Atomically mark `code` as consumed, reporting whether it was fresh.
    ///
    /// One round trip, insert-if-absent: of any number of concurrent calls
    /// with the same code, exactly one observes `true`.
    pub async fn consume(&self, code: &str) -> Result<bool, StoreError> {
        let fresh = self.store.set_add(BLACKLIST_SET, code).await?;
        if !fresh {
            debug!("code already present in blacklist");
        }
        Ok(fresh)
    }
}
