//! Cache-aside coordinator
//!
//! [`CacheAsideCoordinator`] sits between callers and an [`EntityStore`], applying one
//! [`CachePolicy`] to every read, write and delete for an entity type.

use std::future::Future;
use std::sync::Arc;

use common_metrics::{inc, timing_guard};
use common_redis::{Client as RedisClient, CustomRedisError};

use crate::errors::CacheAsideError;
use crate::last_fetched::LastFetchedSlot;
use crate::metrics_consts::{
    CACHE_CORRUPTED_COUNTER, CACHE_ERRORS_COUNTER, CACHE_EVICTIONS_COUNTER, CACHE_HIT_COUNTER,
    CACHE_READS_COUNTER, CACHE_SKIPPED_COUNTER, CACHE_WRITES_COUNTER, STORE_CALLS_COUNTER,
    STORE_CALL_TIME,
};
use crate::store::{CacheableEntity, EntityStore, StoreError};
use crate::types::{CachePolicy, CacheResult, CacheSource, EvictionScope};

/// Coordinates redis and the authoritative store for one entity type.
///
/// - `read`: redis first; on a miss the store is queried, the last fetched slot (if any)
///   is overwritten, and the cache is populated unless the policy's skip predicate
///   matches. A missing record is not cached.
/// - `write`: persist, then overwrite the cache entry regardless of the skip predicate.
/// - `delete`: remove from the store, then evict per [`EvictionScope`].
///
/// There is no locking or single-flight: two concurrent misses both hit the store and the
/// last cache write wins. Redis and store failures propagate, except for cached bytes
/// that fail to decode, which are treated as a miss and overwritten.
pub struct CacheAsideCoordinator<E: CacheableEntity> {
    redis: Arc<dyn RedisClient + Send + Sync>,
    store: Arc<dyn EntityStore<E>>,
    policy: CachePolicy<E>,
    last_fetched: Option<LastFetchedSlot<E>>,
}

impl<E: CacheableEntity> CacheAsideCoordinator<E> {
    pub fn new(
        redis: Arc<dyn RedisClient + Send + Sync>,
        store: Arc<dyn EntityStore<E>>,
        policy: CachePolicy<E>,
    ) -> Self {
        Self {
            redis,
            store,
            policy,
            last_fetched: None,
        }
    }

    /// Overwrite `slot` with every entity loaded from the store by `read`.
    pub fn with_last_fetched_slot(mut self, slot: LastFetchedSlot<E>) -> Self {
        self.last_fetched = Some(slot);
        self
    }

    pub fn policy(&self) -> &CachePolicy<E> {
        &self.policy
    }

    pub async fn read(&self, id: &E::Id) -> Result<CacheResult<E>, CacheAsideError> {
        let cache_key = self.policy.cache_key(id);
        inc(CACHE_READS_COUNTER, &self.labels(), 1);

        let corrupted = match self.redis.get(cache_key.clone()).await {
            Ok(raw) => match serde_json::from_str::<E>(&raw) {
                Ok(entity) => {
                    tracing::debug!(key = %cache_key, "Cache hit");
                    self.count_hit(true);
                    return Ok(CacheResult::found(entity, CacheSource::Cache));
                }
                Err(err) => {
                    tracing::warn!(
                        key = %cache_key,
                        "Corrupted cache entry, reloading from store: {}",
                        err
                    );
                    true
                }
            },
            Err(CustomRedisError::NotFound) => false,
            Err(CustomRedisError::ParseError(err)) => {
                tracing::warn!(
                    key = %cache_key,
                    "Undecodable cache entry, reloading from store: {}",
                    err
                );
                true
            }
            Err(err) => {
                self.count_error("cache_read");
                tracing::error!(key = %cache_key, "Cache read failed: {}", err);
                return Err(err.into());
            }
        };

        self.count_hit(false);
        if corrupted {
            inc(CACHE_CORRUPTED_COUNTER, &self.labels(), 1);
        }
        self.load_from_store(id, cache_key, corrupted).await
    }

    async fn load_from_store(
        &self,
        id: &E::Id,
        cache_key: String,
        corrupted: bool,
    ) -> Result<CacheResult<E>, CacheAsideError> {
        let loaded = self.timed_store_call("get", self.store.get(id)).await?;

        let Some(entity) = loaded else {
            tracing::debug!(key = %cache_key, "Not found in store");
            if corrupted {
                self.redis.del(cache_key).await?;
            }
            return Ok(CacheResult::not_found(CacheSource::StoreNotFound));
        };

        if let Some(slot) = &self.last_fetched {
            slot.put(&entity).await?;
        }

        if self.policy.should_skip(&entity) {
            tracing::debug!(key = %cache_key, "Loaded from store, skipped caching");
            inc(CACHE_SKIPPED_COUNTER, &self.labels(), 1);
            if corrupted {
                self.redis.del(cache_key).await?;
            }
            return Ok(CacheResult::found(entity, CacheSource::StoreSkipped));
        }

        self.put_in_cache(cache_key, &entity).await?;
        let source = if corrupted {
            CacheSource::StoreCacheCorrupted
        } else {
            CacheSource::StoreCached
        };
        Ok(CacheResult::found(entity, source))
    }

    /// Persist `entity` and overwrite its cache entry. The skip predicate is not consulted.
    pub async fn write(&self, entity: &E) -> Result<E, CacheAsideError> {
        let saved = self.timed_store_call("save", self.store.save(entity)).await?;

        let cache_key = self.policy.cache_key(&saved.id());
        self.put_in_cache(cache_key.clone(), &saved).await?;
        tracing::debug!(key = %cache_key, "Wrote through to cache");

        Ok(saved)
    }

    /// Remove `id` from the store and evict. Deleting a missing id is not an error and
    /// still evicts. Returns whether a record was removed.
    pub async fn delete(&self, id: &E::Id) -> Result<bool, CacheAsideError> {
        let removed = self.timed_store_call("delete", self.store.delete(id)).await?;

        let evicted = match self.policy.eviction() {
            EvictionScope::AllEntries => {
                self.redis
                    .del_prefix(self.policy.region_prefix())
                    .await
                    .inspect_err(|_| self.count_error("cache_evict"))?
            }
            EvictionScope::Key => {
                self.redis
                    .del(self.policy.cache_key(id))
                    .await
                    .inspect_err(|_| self.count_error("cache_evict"))?
            }
        };
        inc(CACHE_EVICTIONS_COUNTER, &self.labels(), evicted);

        tracing::info!(
            cache_name = self.policy.cache_name(),
            id = %id,
            removed,
            evicted,
            "Deleted and evicted"
        );
        Ok(removed)
    }

    /// The last fetched slot's content, `None` if unset or no slot is attached.
    pub async fn read_last_fetched(&self) -> Result<Option<E>, CacheAsideError> {
        match &self.last_fetched {
            Some(slot) => slot.get().await,
            None => Ok(None),
        }
    }

    /// Store passthrough, no caching.
    pub async fn count(&self) -> Result<i64, CacheAsideError> {
        self.timed_store_call("count", self.store.count()).await
    }

    /// Store passthrough, no caching.
    pub async fn find_all(&self) -> Result<Vec<E>, CacheAsideError> {
        self.timed_store_call("find_all", self.store.find_all()).await
    }

    async fn put_in_cache(&self, cache_key: String, entity: &E) -> Result<(), CacheAsideError> {
        let serialized = serde_json::to_string(entity)?;

        let written = match self.policy.ttl_seconds() {
            Some(ttl) => self.redis.setex(cache_key, serialized, ttl).await,
            None => self.redis.set(cache_key, serialized).await,
        };
        if let Err(err) = written {
            self.count_error("cache_write");
            return Err(err.into());
        }

        inc(CACHE_WRITES_COUNTER, &self.labels(), 1);
        Ok(())
    }

    async fn timed_store_call<T, F>(&self, op: &str, call: F) -> Result<T, CacheAsideError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let labels = [
            ("cache_name".to_string(), self.policy.cache_name().to_string()),
            ("op".to_string(), op.to_string()),
        ];
        inc(STORE_CALLS_COUNTER, &labels, 1);
        let _timer = timing_guard(STORE_CALL_TIME, &labels);

        call.await.map_err(|err| {
            self.count_error("store");
            tracing::error!(op, "Store call failed: {}", err);
            CacheAsideError::from(err)
        })
    }

    fn labels(&self) -> [(String, String); 1] {
        [("cache_name".to_string(), self.policy.cache_name().to_string())]
    }

    fn count_hit(&self, hit: bool) {
        let labels = [
            ("cache_name".to_string(), self.policy.cache_name().to_string()),
            ("cache_hit".to_string(), hit.to_string()),
        ];
        inc(CACHE_HIT_COUNTER, &labels, 1);
    }

    fn count_error(&self, reason: &str) {
        let labels = [
            ("cache_name".to_string(), self.policy.cache_name().to_string()),
            ("reason".to_string(), reason.to_string()),
        ];
        inc(CACHE_ERRORS_COUNTER, &labels, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::InMemoryStore;
    use common_redis::MockRedisClient;
    use serde::{Deserialize, Serialize};

    const REGION: &str = "persons";
    const SLOT_KEY: &str = "personId";

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Person {
        id: i64,
        firstname: String,
        lastname: String,
        age: i32,
    }

    impl CacheableEntity for Person {
        type Id = i64;

        fn id(&self) -> i64 {
            self.id
        }
    }

    fn person(id: i64, age: i32) -> Person {
        Person {
            id,
            firstname: format!("p{id}"),
            lastname: "test".to_string(),
            age,
        }
    }

    fn seeded_store() -> InMemoryStore<Person> {
        InMemoryStore::new()
            .with_record(person(1, 25))
            .with_record(person(2, 28))
            .with_record(person(3, 60))
    }

    fn setup(
        redis: MockRedisClient,
        store: InMemoryStore<Person>,
        policy: CachePolicy<Person>,
    ) -> CacheAsideCoordinator<Person> {
        let redis = Arc::new(redis);
        CacheAsideCoordinator::new(redis.clone(), Arc::new(store), policy)
            .with_last_fetched_slot(LastFetchedSlot::new(redis, SLOT_KEY))
    }

    fn default_policy() -> CachePolicy<Person> {
        CachePolicy::new(REGION).unless(|p: &Person| p.age < 29)
    }

    fn cached(redis: &MockRedisClient, id: i64) -> Option<Person> {
        redis
            .stored(&format!("{REGION}::{id}"))
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    #[tokio::test]
    async fn test_second_read_is_a_cache_hit_when_predicate_passes() {
        let redis = MockRedisClient::new();
        let store = seeded_store();
        let coordinator = setup(redis.clone(), store.clone(), default_policy());

        let first = coordinator.read(&3).await.unwrap();
        assert_eq!(first.source, CacheSource::StoreCached);
        assert_eq!(store.get_calls(), 1);

        let second = coordinator.read(&3).await.unwrap();
        assert_eq!(second.source, CacheSource::Cache);
        assert_eq!(second.value, Some(person(3, 60)));
        assert_eq!(store.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_skipped_entities_are_never_cached() {
        let redis = MockRedisClient::new();
        let store = seeded_store();
        let coordinator = setup(redis.clone(), store.clone(), default_policy());

        for expected_calls in 1..=3 {
            let result = coordinator.read(&2).await.unwrap();
            assert_eq!(result.source, CacheSource::StoreSkipped);
            assert_eq!(result.value, Some(person(2, 28)));
            assert_eq!(store.get_calls(), expected_calls);
        }
        assert_eq!(cached(&redis, 2), None);
    }

    #[tokio::test]
    async fn test_write_bypasses_the_skip_predicate() {
        let redis = MockRedisClient::new();
        let store = seeded_store();
        let coordinator = setup(redis.clone(), store.clone(), default_policy());

        let saved = coordinator.write(&person(1, 20)).await.unwrap();
        assert_eq!(saved, person(1, 20));
        assert_eq!(store.save_calls(), 1);

        let result = coordinator.read(&1).await.unwrap();
        assert_eq!(result.source, CacheSource::Cache);
        assert_eq!(result.value, Some(person(1, 20)));
        assert_eq!(store.get_calls(), 0);
    }

    #[tokio::test]
    async fn test_delete_evicts_the_whole_region() {
        let store = InMemoryStore::new()
            .with_record(person(10, 40))
            .with_record(person(11, 50));
        let redis = MockRedisClient::new().with_value("other::10", "untouched");
        let coordinator = setup(redis.clone(), store.clone(), default_policy());

        coordinator.read(&10).await.unwrap();
        coordinator.read(&11).await.unwrap();
        assert!(cached(&redis, 10).is_some());
        assert!(cached(&redis, 11).is_some());

        assert!(coordinator.delete(&10).await.unwrap());
        assert_eq!(cached(&redis, 11), None);

        store.reset_calls();
        let result = coordinator.read(&11).await.unwrap();
        assert_eq!(result.source, CacheSource::StoreCached);
        assert_eq!(store.get_calls(), 1);

        assert_eq!(redis.stored("other::10"), Some("untouched".to_string()));
        assert!(redis.stored(SLOT_KEY).is_some());
    }

    #[tokio::test]
    async fn test_key_eviction_leaves_other_entries() {
        let store = InMemoryStore::new()
            .with_record(person(10, 40))
            .with_record(person(11, 50));
        let redis = MockRedisClient::new();
        let policy = default_policy().with_eviction(EvictionScope::Key);
        let coordinator = setup(redis.clone(), store, policy);

        coordinator.read(&10).await.unwrap();
        coordinator.read(&11).await.unwrap();
        coordinator.delete(&10).await.unwrap();

        assert_eq!(cached(&redis, 10), None);
        assert_eq!(cached(&redis, 11), Some(person(11, 50)));
        assert!(redis.calls_for("del_prefix").is_empty());
    }

    #[tokio::test]
    async fn test_key_eviction_counts_only_removed_keys() {
        use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
        use std::sync::OnceLock;

        static SNAPSHOTTER: OnceLock<Snapshotter> = OnceLock::new();
        let snapshotter = SNAPSHOTTER.get_or_init(|| {
            let recorder = DebuggingRecorder::new();
            let snapshotter = recorder.snapshotter();
            drop(recorder.install());
            snapshotter
        });

        let store = InMemoryStore::new()
            .with_record(person(10, 40))
            .with_record(person(11, 50));
        let policy = CachePolicy::new("evictions")
            .unless(|p: &Person| p.age < 29)
            .with_eviction(EvictionScope::Key);
        let coordinator = setup(MockRedisClient::new(), store, policy);

        // never read, so nothing cached
        coordinator.delete(&10).await.unwrap();
        coordinator.read(&11).await.unwrap();
        coordinator.delete(&11).await.unwrap();

        let evicted: u64 = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter(|(key, _, _, _)| {
                key.key().name() == CACHE_EVICTIONS_COUNTER
                    && key
                        .key()
                        .labels()
                        .any(|l| l.key() == "cache_name" && l.value() == "evictions")
            })
            .map(|(_, _, _, value)| match value {
                DebugValue::Counter(n) => n,
                _ => 0,
            })
            .sum();
        assert_eq!(evicted, 1);
    }

    #[tokio::test]
    async fn test_deleting_missing_id_is_not_an_error() {
        let redis = MockRedisClient::new();
        let coordinator = setup(redis.clone(), seeded_store(), default_policy());

        assert!(!coordinator.delete(&999).await.unwrap());
        assert_eq!(redis.calls_for("del_prefix").len(), 1);
    }

    #[tokio::test]
    async fn test_missing_record_is_not_cached() {
        let redis = MockRedisClient::new();
        let store = seeded_store();
        let coordinator = setup(redis.clone(), store.clone(), default_policy());

        let first = coordinator.read(&42).await.unwrap();
        assert_eq!(first.value, None);
        assert_eq!(first.source, CacheSource::StoreNotFound);

        coordinator.read(&42).await.unwrap();
        assert_eq!(store.get_calls(), 2);
        assert!(redis.keys().is_empty());
    }

    #[tokio::test]
    async fn test_slot_follows_every_store_read() {
        let redis = MockRedisClient::new();
        let coordinator = setup(redis, seeded_store(), default_policy());

        assert_eq!(coordinator.read_last_fetched().await.unwrap(), None);

        coordinator.read(&1).await.unwrap();
        assert_eq!(
            coordinator.read_last_fetched().await.unwrap(),
            Some(person(1, 25))
        );

        coordinator.read(&3).await.unwrap();
        assert_eq!(
            coordinator.read_last_fetched().await.unwrap(),
            Some(person(3, 60))
        );

        coordinator.read(&2).await.unwrap();
        assert_eq!(
            coordinator.read_last_fetched().await.unwrap(),
            Some(person(2, 28))
        );
    }

    #[tokio::test]
    async fn test_cache_hit_does_not_touch_the_slot() {
        let redis = MockRedisClient::new();
        let coordinator = setup(redis.clone(), seeded_store(), default_policy());

        coordinator.read(&3).await.unwrap();
        coordinator.read(&1).await.unwrap();
        redis.clear_calls();

        let result = coordinator.read(&3).await.unwrap();
        assert!(result.was_cached());
        assert!(redis.calls_for("set").is_empty());
        assert_eq!(
            coordinator.read_last_fetched().await.unwrap(),
            Some(person(1, 25))
        );
    }

    #[tokio::test]
    async fn test_missing_record_does_not_touch_the_slot() {
        let redis = MockRedisClient::new();
        let coordinator = setup(redis, seeded_store(), default_policy());

        coordinator.read(&3).await.unwrap();
        coordinator.read(&42).await.unwrap();

        assert_eq!(
            coordinator.read_last_fetched().await.unwrap(),
            Some(person(3, 60))
        );
    }

    #[tokio::test]
    async fn test_without_slot_last_fetched_is_none() {
        let redis = Arc::new(MockRedisClient::new());
        let coordinator =
            CacheAsideCoordinator::new(redis, Arc::new(seeded_store()), default_policy());

        coordinator.read(&3).await.unwrap();
        assert_eq!(coordinator.read_last_fetched().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_is_passed_to_setex() {
        let redis = MockRedisClient::new();
        let coordinator = setup(redis.clone(), seeded_store(), default_policy().with_ttl(300));

        coordinator.read(&3).await.unwrap();
        coordinator.write(&person(1, 20)).await.unwrap();

        assert_eq!(redis.calls_for("setex").len(), 2);
        assert_eq!(redis.stored_ttl("persons::3"), Some(300));
        assert_eq!(redis.stored_ttl("persons::1"), Some(300));
        // the slot never expires
        assert_eq!(redis.stored_ttl(SLOT_KEY), None);
    }

    #[tokio::test]
    async fn test_corrupted_entry_is_reloaded_and_refreshed() {
        let redis = MockRedisClient::new().with_value("persons::3", "{\"id\":");
        let store = seeded_store();
        let coordinator = setup(redis.clone(), store.clone(), default_policy());

        let result = coordinator.read(&3).await.unwrap();
        assert_eq!(result.source, CacheSource::StoreCacheCorrupted);
        assert_eq!(result.value, Some(person(3, 60)));
        assert_eq!(cached(&redis, 3), Some(person(3, 60)));

        let result = coordinator.read(&3).await.unwrap();
        assert_eq!(result.source, CacheSource::Cache);
        assert_eq!(store.get_calls(), 1);
    }

    #[tokio::test]
    async fn test_corrupted_entry_for_skipped_entity_is_removed() {
        let redis = MockRedisClient::new().with_value("persons::1", "garbage");
        let coordinator = setup(redis.clone(), seeded_store(), default_policy());

        let result = coordinator.read(&1).await.unwrap();
        assert_eq!(result.source, CacheSource::StoreSkipped);
        assert_eq!(redis.stored("persons::1"), None);
    }

    #[tokio::test]
    async fn test_cache_outage_propagates() {
        let redis = MockRedisClient::new().fail_op("get", CustomRedisError::Timeout);
        let store = seeded_store();
        let coordinator = setup(redis, store.clone(), default_policy());

        let err = coordinator.read(&3).await.unwrap_err();
        assert!(matches!(
            err,
            CacheAsideError::CacheUnavailable(CustomRedisError::Timeout)
        ));
        assert!(err.is_timeout());
        assert_eq!(store.get_calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_write_failure_propagates_after_store_save() {
        let redis = MockRedisClient::new().fail_op(
            "set",
            CustomRedisError::from_redis_kind(common_redis::RedisErrorKind::IoError, "reset"),
        );
        let store = seeded_store();
        let coordinator = setup(redis, store.clone(), default_policy());

        let err = coordinator.write(&person(3, 30)).await.unwrap_err();
        assert!(matches!(err, CacheAsideError::CacheUnavailable(_)));
        assert_eq!(store.get(&3).await.unwrap(), Some(person(3, 30)));
    }

    #[tokio::test]
    async fn test_store_outage_propagates() {
        let redis = MockRedisClient::new();
        let store = seeded_store();
        store.set_unavailable(true);
        let coordinator = setup(redis.clone(), store, default_policy());

        assert!(matches!(
            coordinator.read(&3).await,
            Err(CacheAsideError::StoreUnavailable(StoreError::Unavailable(_)))
        ));
        assert!(matches!(
            coordinator.delete(&3).await,
            Err(CacheAsideError::StoreUnavailable(_))
        ));
        assert!(redis.calls_for("del_prefix").is_empty());
    }

    #[tokio::test]
    async fn test_count_and_find_all_go_to_the_store() {
        let redis = MockRedisClient::new();
        let coordinator = setup(redis.clone(), seeded_store(), default_policy());

        assert_eq!(coordinator.count().await.unwrap(), 3);
        let all = coordinator.find_all().await.unwrap();
        assert_eq!(
            all.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(redis.get_calls().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_misses_both_populate() {
        let redis = MockRedisClient::new();
        let store = seeded_store();
        let coordinator = Arc::new(setup(redis.clone(), store.clone(), default_policy()));

        let reads = (0..2).map(|_| {
            let coordinator = coordinator.clone();
            async move { coordinator.read(&3).await }
        });
        let results = futures::future::join_all(reads).await;

        for result in results {
            assert_eq!(result.unwrap().value, Some(person(3, 60)));
        }
        assert_eq!(cached(&redis, 3), Some(person(3, 60)));
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let redis = MockRedisClient::new();
        let store = seeded_store();
        let coordinator = setup(redis.clone(), store.clone(), default_policy());

        let result = coordinator.read(&1).await.unwrap();
        assert_eq!(result.value, Some(person(1, 25)));
        assert_eq!(cached(&redis, 1), None);
        assert_eq!(
            coordinator.read_last_fetched().await.unwrap(),
            Some(person(1, 25))
        );

        coordinator.read(&3).await.unwrap();
        assert_eq!(cached(&redis, 3), Some(person(3, 60)));
        assert_eq!(
            coordinator.read_last_fetched().await.unwrap(),
            Some(person(3, 60))
        );

        coordinator.write(&person(3, 30)).await.unwrap();
        assert_eq!(cached(&redis, 3), Some(person(3, 30)));

        coordinator.delete(&3).await.unwrap();
        assert!(redis.keys().iter().all(|key| !key.starts_with("persons::")));

        let result = coordinator.read(&3).await.unwrap();
        assert_eq!(result.value, None);
        assert_eq!(
            coordinator.read_last_fetched().await.unwrap(),
            Some(person(3, 60))
        );
    }
}
