use std::time::Duration;

use compact_str::CompactString;
use fast32::base64;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};

use crate::store::{KeyValueStore, StoreError};

/// Storage key prefix for session records
const SESSION_PREFIX: &str = "sess:";

/// Default number of random bytes in a session ID (256 bits)
pub const DEFAULT_SESSION_ID_BYTES: usize = 32;

/// Default session lifetime
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(15 * 60);

/// Errors from session issuance and lookup
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The secure randomness source failed; no session may be issued without it
    #[error("secure random source failure")]
    RandomSource,

    /// The backing store could not be reached
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A live `(sessionID, principalID)` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Opaque token held by the principal
    pub session_id: String,
    /// Principal the token authenticates
    pub principal_id: String,
}

/// Generate a URL-safe session token from `byte_length` secure random bytes.
///
/// Fails only if the system randomness source does, in which case the
/// current operation must abort rather than fall back to a weaker source.
pub fn generate_session_id(byte_length: usize) -> Result<CompactString, SessionError> {
    let mut bytes = vec![0u8; byte_length];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| SessionError::RandomSource)?;
    Ok(CompactString::from(base64::RFC4648_URL_NOPAD.encode(&bytes)))
}

/// Session records over the shared store handle.
///
/// Expiry is enforced store-side: a record simply stops existing once its
/// TTL elapses, and there is no revoke operation.
#[derive(Debug, Clone)]
pub struct SessionService<S> {
    store: S,
    ttl: Duration,
}

impl<S: KeyValueStore> SessionService<S> {
    /// Service whose records expire `ttl` after creation
    pub fn new(store: S, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Associate `session_id` with `principal_id` until the TTL elapses
    pub async fn set(&self, session_id: &str, principal_id: &str) -> Result<(), StoreError> {
        let key = format!("{SESSION_PREFIX}{session_id}");
        self.store.set_with_ttl(&key, principal_id, self.ttl).await
    }

    /// Principal for `session_id`, or `None` once the record has expired.
    ///
    /// Absence and expiry are indistinguishable; an error means the store
    /// was unreachable, never "not found".
    pub async fn get(&self, session_id: &str) -> Result<Option<String>, StoreError> {
        let key = format!("{SESSION_PREFIX}{session_id}");
        self.store.get(&key).await
    }

    /// Every live session, across however many scan pages the store needs.
    ///
    /// Not a consistent snapshot: records created or expired mid-scan may be
    /// missed. A record that expires between the scan and its resolution is
    /// skipped; a store failure anywhere aborts with no partial result.
    pub async fn all(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let mut keys = Vec::new();
        let mut cursor = 0;
        loop {
            let page = self.store.scan_prefix(SESSION_PREFIX, cursor).await?;
            keys.extend(page.keys);
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }

        // SCAN may hand back a key on more than one page.
        keys.sort();
        keys.dedup();

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(principal_id) = self.store.get(&key).await? else {
                continue;
            };
            let session_id = key.strip_prefix(SESSION_PREFIX).unwrap_or(&key).to_owned();
            records.push(SessionRecord {
                session_id,
                principal_id,
            });
        }
        Ok(records)
    }
}
