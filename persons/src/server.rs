use std::future::Future;
use std::sync::Arc;

use anyhow::Context;

use common_database::{get_pool_with_timeouts, DatabaseTimeouts};
use common_metrics::setup_metrics_recorder;
use common_redis::RedisClient;
use tokio::net::TcpListener;

use crate::config::Config;
use crate::persons::person_models::person_coordinator;
use crate::persons::person_operations::PgPersonStore;
use crate::router;
use crate::seed::seed_persons;

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let redis_client = RedisClient::with_config(
        config.redis_url.clone(),
        Some(config.redis_response_timeout()),
        Some(config.redis_connection_timeout()),
    )
    .await
    .with_context(|| format!("Failed to create Redis client for URL {}", config.redis_url))?;
    let redis_client = Arc::new(redis_client);

    let timeouts = DatabaseTimeouts::new(config.statement_timeout(), config.acquire_timeout());
    let pool = get_pool_with_timeouts(&config.database_url, config.max_pg_connections, timeouts)
        .await
        .context("Failed to create database pool")?;

    if *config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;
    }

    let store = Arc::new(PgPersonStore::new(pool.clone()));

    if *config.seed_persons {
        seed_persons(store.as_ref())
            .await
            .context("Failed to seed persons")?;
    }

    let persons = Arc::new(person_coordinator(redis_client.clone(), store, &config));

    // Don't install metrics unless asked to
    // Global metrics recorders can play poorly with e.g. tests
    let metrics = if *config.enable_metrics {
        Some(setup_metrics_recorder().context("Failed to install metrics recorder")?)
    } else {
        None
    };

    let app = router::router(persons, redis_client, Some(pool), metrics, &config);

    match listener.local_addr() {
        Ok(addr) => tracing::info!("listening on {:?}", addr),
        Err(e) => tracing::warn!("listening on an unknown address: {}", e),
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")
}
