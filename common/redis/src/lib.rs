use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use redis::ErrorKind as RedisErrorKind;

#[derive(Error, Debug, Clone)]
pub enum CustomRedisError {
    #[error("Not found in redis")]
    NotFound,
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Timeout error")]
    Timeout,
    #[error(transparent)]
    Redis(#[from] Arc<redis::RedisError>),
}

impl From<redis::RedisError> for CustomRedisError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            CustomRedisError::Timeout
        } else {
            CustomRedisError::Redis(Arc::new(err))
        }
    }
}

impl From<std::string::FromUtf8Error> for CustomRedisError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        CustomRedisError::ParseError(err.to_string())
    }
}

impl CustomRedisError {
    /// Create a Redis error from an ErrorKind (primarily for testing)
    pub fn from_redis_kind(kind: redis::ErrorKind, description: &'static str) -> Self {
        CustomRedisError::Redis(Arc::new(redis::RedisError::from((kind, description))))
    }

    /// True when the error means the server could not be reached or did not answer,
    /// as opposed to a key being absent or a value failing to decode.
    pub fn is_unavailable(&self) -> bool {
        match self {
            CustomRedisError::Timeout => true,
            CustomRedisError::Redis(err) => {
                err.is_io_error()
                    || err.is_connection_dropped()
                    || err.is_connection_refusal()
                    || err.is_timeout()
            }
            CustomRedisError::NotFound
            | CustomRedisError::InvalidConfiguration(_)
            | CustomRedisError::ParseError(_) => false,
        }
    }
}

/// Minimal key-value surface used by the cache layer.
///
/// Values are UTF-8 strings (JSON snapshots in practice). A missing key is
/// reported as `CustomRedisError::NotFound` rather than an empty value.
#[async_trait]
pub trait Client {
    async fn get(&self, k: String) -> Result<String, CustomRedisError>;
    async fn set(&self, k: String, v: String) -> Result<(), CustomRedisError>;
    async fn setex(&self, k: String, v: String, seconds: u64) -> Result<(), CustomRedisError>;
    /// Returns how many keys were removed, 0 when `k` did not exist.
    async fn del(&self, k: String) -> Result<u64, CustomRedisError>;

    /// Delete every key starting with `prefix`. Returns how many keys were removed.
    async fn del_prefix(&self, prefix: String) -> Result<u64, CustomRedisError>;

    async fn ping(&self) -> Result<(), CustomRedisError>;
}

mod client;
mod mock;

pub use client::RedisClient;
pub use mock::{MockRedisCall, MockRedisClient, MockRedisValue};
