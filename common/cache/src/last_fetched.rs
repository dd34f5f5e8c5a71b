use std::marker::PhantomData;
use std::sync::Arc;

use common_redis::{Client as RedisClient, CustomRedisError};

use crate::errors::CacheAsideError;
use crate::store::CacheableEntity;

/// A single fixed redis key holding the most recently fetched entity.
///
/// The slot is shared by every request in every process pointed at the same redis, and
/// has no expiry. Writers overwrite it unconditionally.
pub struct LastFetchedSlot<E> {
    redis: Arc<dyn RedisClient + Send + Sync>,
    key: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: CacheableEntity> LastFetchedSlot<E> {
    pub fn new(redis: Arc<dyn RedisClient + Send + Sync>, key: impl Into<String>) -> Self {
        Self {
            redis,
            key: key.into(),
            _entity: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn put(&self, entity: &E) -> Result<(), CacheAsideError> {
        let serialized = serde_json::to_string(entity)?;
        self.redis.set(self.key.clone(), serialized).await?;
        Ok(())
    }

    /// `None` when nothing was ever written, or when the stored bytes don't decode.
    pub async fn get(&self) -> Result<Option<E>, CacheAsideError> {
        let raw = match self.redis.get(self.key.clone()).await {
            Ok(raw) => raw,
            Err(CustomRedisError::NotFound) => return Ok(None),
            Err(CustomRedisError::ParseError(err)) => {
                tracing::warn!(key = %self.key, "Undecodable last fetched slot: {}", err);
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(entity) => Ok(Some(entity)),
            Err(err) => {
                tracing::warn!(key = %self.key, "Undecodable last fetched slot: {}", err);
                Ok(None)
            }
        }
    }
}

impl<E> Clone for LastFetchedSlot<E> {
    fn clone(&self) -> Self {
        Self {
            redis: self.redis.clone(),
            key: self.key.clone(),
            _entity: PhantomData,
        }
    }
}
