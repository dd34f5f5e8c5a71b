use std::time::Duration;

use sqlx::{
    postgres::{PgPool, PgPoolOptions},
    Error as SqlxError,
};
use thiserror::Error;

pub const DEFAULT_TIMEOUTS: DatabaseTimeouts = DatabaseTimeouts {
    statement_timeout: Duration::from_millis(1000),
    acquire_timeout: Duration::from_millis(1000),
    idle_timeout: Duration::from_secs(300),
    max_lifetime: Duration::from_secs(1800),
};

#[derive(Error, Debug)]
pub enum CustomDatabaseError {
    #[error("Pg error: {0}")]
    Other(#[from] sqlx::Error),

    #[error("Client timeout error")]
    Timeout(#[from] tokio::time::error::Elapsed),
}

impl CustomDatabaseError {
    pub fn is_timeout(&self) -> bool {
        match self {
            CustomDatabaseError::Timeout(_) => true,
            CustomDatabaseError::Other(err) => is_timeout_error(err),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseTimeouts {
    pub statement_timeout: Duration,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl DatabaseTimeouts {
    pub fn new(statement_timeout: Duration, acquire_timeout: Duration) -> Self {
        Self {
            statement_timeout,
            acquire_timeout,
            ..DEFAULT_TIMEOUTS
        }
    }
}

pub async fn get_pool_with_timeouts(
    url: &str,
    max_connections: u32,
    timeouts: DatabaseTimeouts,
) -> Result<PgPool, sqlx::Error> {
    let statement_ms = i64::try_from(timeouts.statement_timeout.as_millis()).unwrap_or(i64::MAX);

    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(timeouts.acquire_timeout)
        .test_before_acquire(true)
        .idle_timeout(timeouts.idle_timeout)
        .max_lifetime(timeouts.max_lifetime)
        // Session-level statement timeout for every connection in the pool
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                // SET doesn't accept bind parameters
                sqlx::query(&format!("SET statement_timeout = '{statement_ms}ms'"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(url)
        .await
}

/// Determines if a sqlx::Error represents a timeout-related failure
pub fn is_timeout_error(error: &SqlxError) -> bool {
    match error {
        SqlxError::PoolTimedOut => true,
        SqlxError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => true,
        SqlxError::Protocol(msg) => msg.to_lowercase().contains("timeout"),
        SqlxError::Database(db_error) => match db_error.code() {
            // 57014: query_canceled (statement_timeout)
            // 55P03: lock_not_available (lock_timeout)
            Some(code) => code.as_ref() == "57014" || code.as_ref() == "55P03",
            None => db_error.message().to_lowercase().contains("timeout"),
        },
        _ => false,
    }
}

/// Determines if a sqlx::Error means postgres could not be reached at all
pub fn is_unavailable_error(error: &SqlxError) -> bool {
    match error {
        SqlxError::Io(_) | SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Tls(_) => {
            true
        }
        // 08***: connection exception, 57P0*: admin/crash shutdown
        SqlxError::Database(db_error) => db_error
            .code()
            .map(|code| code.starts_with("08") || code.starts_with("57P0"))
            .unwrap_or(false),
        _ => false,
    }
}
