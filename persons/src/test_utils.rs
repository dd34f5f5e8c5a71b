use std::sync::Arc;

use axum::Router;
use common_cache::InMemoryStore;
use common_redis::MockRedisClient;

use crate::config::Config;
use crate::persons::person_models::{person_coordinator, Person};
use crate::router::router;
use crate::seed::demo_persons;

/// A router wired to in-memory redis and store doubles, plus handles on both so tests
/// can inspect what the requests did.
pub struct TestApp {
    pub router: Router,
    pub redis: MockRedisClient,
    pub store: InMemoryStore<Person>,
}

impl TestApp {
    pub fn new(config: &Config, redis: MockRedisClient, store: InMemoryStore<Person>) -> Self {
        let persons = Arc::new(person_coordinator(
            Arc::new(redis.clone()),
            Arc::new(store.clone()),
            config,
        ));
        let router = router(persons, Arc::new(redis.clone()), None, None, config);

        Self {
            router,
            redis,
            store,
        }
    }

    /// Store seeded with the three demo persons, empty redis.
    pub fn seeded(config: &Config) -> Self {
        let store = demo_persons()
            .into_iter()
            .fold(InMemoryStore::<Person>::new(), |store, person| store.with_record(person));

        Self::new(config, MockRedisClient::new(), store)
    }
}
