use std::sync::Arc;

use common_cache::{
    CacheAsideCoordinator, CachePolicy, CacheableEntity, EntityStore, EvictionScope,
    LastFetchedSlot,
};
use common_redis::Client as RedisClient;
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Redis region holding per-id person snapshots, keys look like `persons::42`
pub const PERSON_CACHE_NAME: &str = "persons";

/// Fixed redis key overwritten with every person loaded from postgres
pub const LAST_FETCHED_PERSON_KEY: &str = "personId";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Person {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub age: i32,
}

impl CacheableEntity for Person {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }
}

pub fn person_cache_policy(config: &Config) -> CachePolicy<Person> {
    let min_age = config.person_cache_min_age;
    let eviction = if *config.person_cache_evict_all {
        EvictionScope::AllEntries
    } else {
        EvictionScope::Key
    };

    CachePolicy::new(PERSON_CACHE_NAME)
        .with_ttl(config.person_cache_ttl_seconds)
        .unless(move |person: &Person| person.age < min_age)
        .with_eviction(eviction)
}

/// Coordinator for persons, with the last fetched slot at [`LAST_FETCHED_PERSON_KEY`]
/// in the same redis as the cache.
pub fn person_coordinator(
    redis: Arc<dyn RedisClient + Send + Sync>,
    store: Arc<dyn EntityStore<Person>>,
    config: &Config,
) -> CacheAsideCoordinator<Person> {
    CacheAsideCoordinator::new(redis.clone(), store, person_cache_policy(config))
        .with_last_fetched_slot(LastFetchedSlot::new(redis, LAST_FETCHED_PERSON_KEY))
}
