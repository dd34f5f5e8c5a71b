use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common_cache::{CacheAsideError, StoreError};
use common_redis::CustomRedisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersonError {
    #[error("Person {0} not found")]
    PersonNotFound(i64),
    #[error("failed to parse request: {0}")]
    RequestParsingError(String),
    #[error("Redis is unavailable")]
    RedisUnavailable,
    #[error("Database is unavailable")]
    DatabaseUnavailable,
    #[error("Timed out: {0}")]
    TimeoutError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PersonError {
    /// Returns (error_code, status_code) for this error.
    fn error_metadata(&self) -> (&'static str, StatusCode) {
        match self {
            PersonError::PersonNotFound(_) => ("person_not_found", StatusCode::NOT_FOUND),
            PersonError::RequestParsingError(_) => {
                ("request_parsing_error", StatusCode::BAD_REQUEST)
            }
            PersonError::RedisUnavailable => {
                ("redis_unavailable", StatusCode::SERVICE_UNAVAILABLE)
            }
            PersonError::DatabaseUnavailable => {
                ("database_unavailable", StatusCode::SERVICE_UNAVAILABLE)
            }
            PersonError::TimeoutError(_) => ("timeout", StatusCode::SERVICE_UNAVAILABLE),
            PersonError::DatabaseError(_) => {
                ("database_error", StatusCode::INTERNAL_SERVER_ERROR)
            }
            PersonError::Internal(_) => ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    pub fn error_code(&self) -> &'static str {
        self.error_metadata().0
    }

    pub fn status_code(&self) -> StatusCode {
        self.error_metadata().1
    }
}

impl IntoResponse for PersonError {
    fn into_response(self) -> Response {
        let (error_code, status) = self.error_metadata();

        if status.is_server_error() {
            tracing::error!(error_code, "Request failed: {}", self);
        }

        let message = match &self {
            PersonError::PersonNotFound(_) | PersonError::RequestParsingError(_) => {
                self.to_string()
            }
            PersonError::RedisUnavailable
            | PersonError::DatabaseUnavailable
            | PersonError::TimeoutError(_) => {
                "Service is currently unavailable. Please try again later.".to_string()
            }
            PersonError::DatabaseError(_) | PersonError::Internal(_) => {
                "An internal server error occurred.".to_string()
            }
        };

        (status, message).into_response()
    }
}

impl From<CustomRedisError> for PersonError {
    fn from(e: CustomRedisError) -> Self {
        match e {
            CustomRedisError::Timeout => PersonError::TimeoutError("redis".to_string()),
            CustomRedisError::ParseError(err) => PersonError::Internal(err),
            CustomRedisError::NotFound
            | CustomRedisError::InvalidConfiguration(_)
            | CustomRedisError::Redis(_) => PersonError::RedisUnavailable,
        }
    }
}

impl From<StoreError> for PersonError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(_) => PersonError::DatabaseUnavailable,
            StoreError::Timeout(msg) => PersonError::TimeoutError(msg),
            StoreError::Database(msg) => PersonError::DatabaseError(msg),
        }
    }
}

impl From<CacheAsideError> for PersonError {
    fn from(e: CacheAsideError) -> Self {
        match e {
            CacheAsideError::CacheUnavailable(err) => err.into(),
            CacheAsideError::StoreUnavailable(err) => err.into(),
            CacheAsideError::Serialization(err) => PersonError::Internal(err.to_string()),
        }
    }
}
