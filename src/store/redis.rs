use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::{KeyValueStore, ScanPage, StoreError};

/// COUNT hint passed to SCAN
const SCAN_COUNT: usize = 10;

/// Redis-backed store.
///
/// [`ConnectionManager`] multiplexes a single connection and reconnects on
/// failure; it is cheap to clone, so one `RedisStore` handle serves every
/// concurrently executing request handler.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Wrap an established connection handle
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Connect to the Redis instance at `url`
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(StoreError::unavailable)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(StoreError::unavailable)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(StoreError::unavailable)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set_ex(key, value, ttl.as_secs())
            .await
            .map_err(StoreError::unavailable)
    }

    async fn scan_prefix(&self, prefix: &str, cursor: u64) -> Result<ScanPage, StoreError> {
        let mut conn = self.conn.clone();
        let (cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(format!("{prefix}*"))
            .arg("COUNT")
            .arg(SCAN_COUNT)
            .query_async(&mut conn)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(ScanPage { keys, cursor })
    }

    async fn set_add(&self, set: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let added: i64 = conn
            .sadd(set, member)
            .await
            .map_err(StoreError::unavailable)?;
        Ok(added == 1)
    }

    async fn set_contains(&self, set: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        conn.sismember(set, member)
            .await
            .map_err(StoreError::unavailable)
    }
}
