use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::store::{CacheableEntity, EntityStore, StoreError};

/// Map-backed [`EntityStore`] that counts calls per operation.
///
/// Used to run the coordinator without postgres, and by tests to assert how often the
/// store was actually queried. Clones share state.
pub struct InMemoryStore<E: CacheableEntity> {
    records: Arc<Mutex<BTreeMap<E::Id, E>>>,
    counters: Arc<StoreCounters>,
    unavailable: Arc<AtomicBool>,
}

#[derive(Default)]
struct StoreCounters {
    get: AtomicUsize,
    save: AtomicUsize,
    delete: AtomicUsize,
    count: AtomicUsize,
    find_all: AtomicUsize,
}

impl<E> InMemoryStore<E>
where
    E: CacheableEntity,
    E::Id: Ord,
{
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(BTreeMap::new())),
            counters: Arc::new(StoreCounters::default()),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Insert directly, without counting a `save`.
    pub fn with_record(self, entity: E) -> Self {
        self.lock().insert(entity.id(), entity);
        self
    }

    /// While set, every operation fails with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.counters.get.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> usize {
        self.counters.save.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.counters.delete.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        for counter in [
            &self.counters.get,
            &self.counters.save,
            &self.counters.delete,
            &self.counters.count,
            &self.counters.find_all,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<E::Id, E>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check(&self, counter: &AtomicUsize) -> Result<(), StoreError> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store offline".to_string()));
        }
        Ok(())
    }
}

impl<E> Default for InMemoryStore<E>
where
    E: CacheableEntity,
    E::Id: Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E: CacheableEntity> Clone for InMemoryStore<E> {
    fn clone(&self) -> Self {
        Self {
            records: self.records.clone(),
            counters: self.counters.clone(),
            unavailable: self.unavailable.clone(),
        }
    }
}

#[async_trait]
impl<E> EntityStore<E> for InMemoryStore<E>
where
    E: CacheableEntity,
    E::Id: Ord,
{
    async fn get(&self, id: &E::Id) -> Result<Option<E>, StoreError> {
        self.check(&self.counters.get)?;
        Ok(self.lock().get(id).cloned())
    }

    async fn save(&self, entity: &E) -> Result<E, StoreError> {
        self.check(&self.counters.save)?;
        self.lock().insert(entity.id(), entity.clone());
        Ok(entity.clone())
    }

    async fn delete(&self, id: &E::Id) -> Result<bool, StoreError> {
        self.check(&self.counters.delete)?;
        Ok(self.lock().remove(id).is_some())
    }

    async fn count(&self) -> Result<i64, StoreError> {
        self.check(&self.counters.count)?;
        Ok(self.lock().len() as i64)
    }

    async fn find_all(&self) -> Result<Vec<E>, StoreError> {
        self.check(&self.counters.find_all)?;
        Ok(self.lock().values().cloned().collect())
    }
}
