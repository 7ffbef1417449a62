use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

use super::CacheStore;
use crate::config::REDIS_URL_VAR;
use crate::error::{CacheError, ConfigError};

/// [`CacheStore`] backed by Redis.
///
/// Opening only parses the URL. A connection is made per operation, so a
/// store that is down at startup does not prevent a later run from publishing.
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn open(url: &str) -> Result<Self, ConfigError> {
        let client = redis::Client::open(url).map_err(|e| ConfigError::Invalid {
            name: REDIS_URL_VAR,
            reason: e.to_string(),
        })?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn ping(&self) -> Result<(), CacheError> {
        let mut con = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut con)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut con = self.connection().await?;
        let _: () = con
            .set_ex(key, value, ttl.as_secs())
            .await
            .map_err(classify)?;
        Ok(())
    }
}

fn classify(err: redis::RedisError) -> CacheError {
    if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
        CacheError::Connection(err.to_string())
    } else {
        CacheError::Write(err.to_string())
    }
}
