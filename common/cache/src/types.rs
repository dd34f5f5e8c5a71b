//! Cache policy and cache operation results
//!
//! - [`CachePolicy`]: per-entity configuration (region, key expression, skip predicate, TTL,
//!   eviction scope)
//! - [`CacheSource`]: where a read result came from, for logs and metrics
//! - [`CacheResult`]: a value plus its source

use std::fmt;
use std::sync::Arc;

/// Separator between the region name and the per-entity part of a key, e.g. `persons::42`
pub const REGION_SEPARATOR: &str = "::";

type KeyExpression = Arc<dyn Fn(&str) -> String + Send + Sync>;
type SkipPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// What a delete evicts from the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionScope {
    /// Every key in the region, regardless of which id was deleted
    AllEntries,
    /// Only the key of the deleted id
    Key,
}

/// Caching rules for one entity type.
///
/// Every key the policy produces lives under [`CachePolicy::region_prefix`], so a region
/// eviction always covers every entry the policy ever wrote. The key expression only
/// shapes the part after the prefix.
pub struct CachePolicy<E> {
    cache_name: String,
    key_expression: KeyExpression,
    unless: Option<SkipPredicate<E>>,
    ttl_seconds: Option<u64>,
    eviction: EvictionScope,
}

impl<E> CachePolicy<E> {
    /// Policy with the id as key suffix, no skip predicate, no expiry and region-wide
    /// eviction on delete.
    pub fn new(cache_name: impl Into<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            key_expression: Arc::new(|id: &str| id.to_string()),
            unless: None,
            ttl_seconds: None,
            eviction: EvictionScope::AllEntries,
        }
    }

    /// Expire entries after `ttl_seconds`. Zero means no expiry.
    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = (ttl_seconds > 0).then_some(ttl_seconds);
        self
    }

    /// Don't populate the cache on read when `predicate` returns true for the loaded entity.
    /// Writes ignore the predicate.
    pub fn unless<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.unless = Some(Arc::new(predicate));
        self
    }

    /// Replace how the per-entity part of the key is derived from the id's string form.
    pub fn with_key_expression<F>(mut self, expression: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.key_expression = Arc::new(expression);
        self
    }

    pub fn with_eviction(mut self, eviction: EvictionScope) -> Self {
        self.eviction = eviction;
        self
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn ttl_seconds(&self) -> Option<u64> {
        self.ttl_seconds
    }

    pub fn eviction(&self) -> EvictionScope {
        self.eviction
    }

    pub fn region_prefix(&self) -> String {
        format!("{}{}", self.cache_name, REGION_SEPARATOR)
    }

    pub fn cache_key<K: fmt::Display>(&self, id: &K) -> String {
        format!(
            "{}{}",
            self.region_prefix(),
            (self.key_expression)(&id.to_string())
        )
    }

    pub fn should_skip(&self, entity: &E) -> bool {
        self.unless
            .as_ref()
            .map(|predicate| predicate(entity))
            .unwrap_or(false)
    }
}

impl<E> Clone for CachePolicy<E> {
    fn clone(&self) -> Self {
        Self {
            cache_name: self.cache_name.clone(),
            key_expression: self.key_expression.clone(),
            unless: self.unless.clone(),
            ttl_seconds: self.ttl_seconds,
            eviction: self.eviction,
        }
    }
}

impl<E> fmt::Debug for CachePolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachePolicy")
            .field("cache_name", &self.cache_name)
            .field("has_unless", &self.unless.is_some())
            .field("ttl_seconds", &self.ttl_seconds)
            .field("eviction", &self.eviction)
            .finish()
    }
}

/// Where a read result came from
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    /// Found in redis, the store was not queried
    Cache,
    /// Cache miss, loaded from the store and written to redis
    StoreCached,
    /// Cache miss, loaded from the store but rejected by the skip predicate
    StoreSkipped,
    /// Cached bytes failed to decode, loaded from the store instead
    StoreCacheCorrupted,
    /// Cache miss and the store has no such record
    StoreNotFound,
}

impl fmt::Display for CacheSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheSource::Cache => write!(f, "cache"),
            CacheSource::StoreCached => write!(f, "store_cached"),
            CacheSource::StoreSkipped => write!(f, "store_skipped"),
            CacheSource::StoreCacheCorrupted => write!(f, "store_cache_corrupted"),
            CacheSource::StoreNotFound => write!(f, "store_not_found"),
        }
    }
}

/// Result of a coordinated read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheResult<V> {
    /// None means the record doesn't exist
    pub value: Option<V>,
    pub source: CacheSource,
}

impl<V> CacheResult<V> {
    pub fn found(value: V, source: CacheSource) -> Self {
        Self {
            value: Some(value),
            source,
        }
    }

    pub fn not_found(source: CacheSource) -> Self {
        Self {
            value: None,
            source,
        }
    }

    pub fn was_cached(&self) -> bool {
        matches!(self.source, CacheSource::Cache)
    }

    pub fn queried_store(&self) -> bool {
        !self.was_cached()
    }
}
