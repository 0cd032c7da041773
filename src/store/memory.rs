use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{KeyValueStore, ScanPage, StoreError};

/// Keys returned per scan page
const SCAN_PAGE_SIZE: usize = 10;

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    sets: HashMap<String, HashSet<String>>,
}

/// In-process store with the same observable contract as the Redis adapter:
/// expiry enforced on read, Redis-style scan cursors, membership sets.
///
/// Cloning shares the underlying state, so one handle can be passed to every
/// component the same way a connection handle would be.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut inner = self.lock();
        let expired = match inner.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.entries.remove(key);
        }
        Ok(None)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.lock().entries.insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str, cursor: u64) -> Result<ScanPage, StoreError> {
        let now = Instant::now();
        let inner = self.lock();
        let mut keys: Vec<String> = inner
            .entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.expires_at > now)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();

        // The cursor is the offset into the sorted key order; live entries
        // may shift between pages, which mirrors the non-snapshot contract.
        let start = usize::try_from(cursor).unwrap_or(usize::MAX).min(keys.len());
        let page: Vec<String> = keys[start..].iter().take(SCAN_PAGE_SIZE).cloned().collect();
        let next = start + page.len();
        let cursor = if next >= keys.len() { 0 } else { next as u64 };
        Ok(ScanPage { keys: page, cursor })
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self
            .lock()
            .sets
            .entry(set.to_owned())
            .or_default()
            .insert(member.to_owned()))
    }

    async fn set_contains(&self, set: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self
            .lock()
            .sets
            .get(set)
            .is_some_and(|members| members.contains(member)))
    }
}
