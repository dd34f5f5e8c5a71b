use std::fmt::Display;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// An entity the coordinator can cache: serializable to a JSON snapshot and identified by
/// a key that renders into a cache key.
pub trait CacheableEntity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Id: Display + Send + Sync;

    fn id(&self) -> Self::Id;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store timed out: {0}")]
    Timeout(String),
    #[error("Store query failed: {0}")]
    Database(String),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

/// The authoritative store behind the cache.
///
/// "Not found" is never an error here: `get` returns `None` and `delete` returns `false`.
#[async_trait]
pub trait EntityStore<E: CacheableEntity>: Send + Sync {
    async fn get(&self, id: &E::Id) -> Result<Option<E>, StoreError>;

    /// Insert or replace by id, returning what was persisted.
    async fn save(&self, entity: &E) -> Result<E, StoreError>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: &E::Id) -> Result<bool, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    /// Every record, ordered by id.
    async fn find_all(&self) -> Result<Vec<E>, StoreError>;
}
