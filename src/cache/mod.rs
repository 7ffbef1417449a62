//! Publishing the schedule to a key-value cache.
//!
//! [`CacheStore`] is the seam between the pipeline and the store.
//! [`RedisCache`] implements it for Redis.

mod redis;

pub use self::redis::RedisCache;

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::error::CacheError;
use crate::output;
use crate::schedule::ScheduleEntry;

/// A key-value store supporting a liveness check and set-with-expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fails with [`CacheError::Connection`] when the store is unreachable.
    async fn ping(&self) -> Result<(), CacheError>;

    /// Unconditionally overwrites `key` with `value`, expiring after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

/// Pings the store, then writes `entries` as JSON under `key`.
#[tracing::instrument(skip(store, entries), fields(count = entries.len(), ttl_secs = ttl.as_secs()))]
pub async fn publish<S: CacheStore + ?Sized>(
    store: &S,
    key: &str,
    entries: &[ScheduleEntry],
    ttl: Duration,
) -> Result<(), CacheError> {
    store.ping().await?;
    let body = output::to_json(entries)?;
    store.set_ex(key, &body, ttl).await?;
    info!(key, bytes = body.len(), "Stored schedules in cache");
    Ok(())
}
