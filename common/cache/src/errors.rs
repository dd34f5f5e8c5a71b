use common_redis::CustomRedisError;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum CacheAsideError {
    #[error("Cache operation failed: {0}")]
    CacheUnavailable(#[from] CustomRedisError),
    #[error("Store operation failed: {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("Failed to serialize cache entry: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheAsideError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            CacheAsideError::CacheUnavailable(CustomRedisError::Timeout)
                | CacheAsideError::StoreUnavailable(StoreError::Timeout(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_detected_on_both_sides() {
        assert!(CacheAsideError::from(CustomRedisError::Timeout).is_timeout());
        assert!(CacheAsideError::from(StoreError::Timeout("acquire".to_string())).is_timeout());
        assert!(!CacheAsideError::from(StoreError::Database("syntax".to_string())).is_timeout());
    }
}
