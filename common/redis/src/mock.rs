use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{Client, CustomRedisError};

/// In-memory stand-in for redis.
///
/// Unlike a canned-response mock it keeps state, so a `set` is visible to a later `get`,
/// which is what cache-aside tests need. Clones share the same state. Every call is
/// recorded and can be inspected with `get_calls`. Failures can be forced per operation
/// with `fail_op`.
///
/// TTLs are recorded but never enforced.
#[derive(Clone, Default)]
pub struct MockRedisClient {
    data: Arc<Mutex<HashMap<String, MockEntry>>>,
    failures: Arc<Mutex<HashMap<String, CustomRedisError>>>,
    calls: Arc<Mutex<Vec<MockRedisCall>>>,
}

#[derive(Debug, Clone)]
struct MockEntry {
    value: String,
    ttl_seconds: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRedisValue {
    None,
    String(String),
    StringWithTTL(String, u64),
}

#[derive(Debug, Clone)]
pub struct MockRedisCall {
    pub op: String,
    pub key: String,
    pub value: MockRedisValue,
}

// Poisoning only happens if a test panicked mid-call; keep going with the inner data
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MockRedisClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, bypassing call recording.
    pub fn with_value(&mut self, key: &str, value: &str) -> Self {
        lock(&self.data).insert(
            key.to_owned(),
            MockEntry {
                value: value.to_owned(),
                ttl_seconds: None,
            },
        );
        self.clone()
    }

    /// Make every subsequent call to `op` ("get", "set", "setex", "del", "del_prefix",
    /// "ping") fail with `err`.
    pub fn fail_op(&mut self, op: &str, err: CustomRedisError) -> Self {
        lock(&self.failures).insert(op.to_owned(), err);
        self.clone()
    }

    /// Undo `fail_op` for `op`.
    pub fn recover_op(&mut self, op: &str) -> Self {
        lock(&self.failures).remove(op);
        self.clone()
    }

    pub fn get_calls(&self) -> Vec<MockRedisCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_for(&self, op: &str) -> Vec<MockRedisCall> {
        lock(&self.calls)
            .iter()
            .filter(|call| call.op == op)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Current raw value at `key`, without recording a call.
    pub fn stored(&self, key: &str) -> Option<String> {
        lock(&self.data).get(key).map(|entry| entry.value.clone())
    }

    /// TTL the value at `key` was written with, if any.
    pub fn stored_ttl(&self, key: &str) -> Option<u64> {
        lock(&self.data).get(key).and_then(|entry| entry.ttl_seconds)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.data).keys().cloned().collect();
        keys.sort();
        keys
    }

    fn record(&self, op: &str, key: &str, value: MockRedisValue) -> Result<(), CustomRedisError> {
        lock(&self.calls).push(MockRedisCall {
            op: op.to_string(),
            key: key.to_string(),
            value,
        });

        match lock(&self.failures).get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Client for MockRedisClient {
    async fn get(&self, k: String) -> Result<String, CustomRedisError> {
        self.record("get", &k, MockRedisValue::None)?;

        match lock(&self.data).get(&k) {
            Some(entry) => Ok(entry.value.clone()),
            None => Err(CustomRedisError::NotFound),
        }
    }

    async fn set(&self, k: String, v: String) -> Result<(), CustomRedisError> {
        self.record("set", &k, MockRedisValue::String(v.clone()))?;

        lock(&self.data).insert(
            k,
            MockEntry {
                value: v,
                ttl_seconds: None,
            },
        );
        Ok(())
    }

    async fn setex(&self, k: String, v: String, seconds: u64) -> Result<(), CustomRedisError> {
        self.record("setex", &k, MockRedisValue::StringWithTTL(v.clone(), seconds))?;

        lock(&self.data).insert(
            k,
            MockEntry {
                value: v,
                ttl_seconds: Some(seconds),
            },
        );
        Ok(())
    }

    async fn del(&self, k: String) -> Result<u64, CustomRedisError> {
        self.record("del", &k, MockRedisValue::None)?;

        Ok(lock(&self.data).remove(&k).map_or(0, |_| 1))
    }

    async fn del_prefix(&self, prefix: String) -> Result<u64, CustomRedisError> {
        self.record("del_prefix", &prefix, MockRedisValue::None)?;

        let mut data = lock(&self.data);
        let before = data.len();
        data.retain(|key, _| !key.starts_with(&prefix));
        Ok((before - data.len()) as u64)
    }

    async fn ping(&self) -> Result<(), CustomRedisError> {
        self.record("ping", "", MockRedisValue::None)
    }
}
