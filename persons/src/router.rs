use std::future::ready;
use std::sync::Arc;

use axum::{extract, http::StatusCode, routing::get, routing::put, Router};
use common_cache::CacheAsideCoordinator;
use common_metrics::track_metrics;
use common_redis::Client as RedisClient;
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoint;
use crate::config::Config;
use crate::persons::person_models::Person;

#[derive(Clone)]
pub struct State {
    pub persons: Arc<CacheAsideCoordinator<Person>>,
    pub redis_client: Arc<dyn RedisClient + Send + Sync>,
    // None when persons aren't stored in postgres, readiness then only checks redis
    pub postgres: Option<PgPool>,
}

pub fn router(
    persons: Arc<CacheAsideCoordinator<Person>>,
    redis_client: Arc<dyn RedisClient + Send + Sync>,
    postgres: Option<PgPool>,
    metrics: Option<PrometheusHandle>,
    config: &Config,
) -> Router {
    let state = State {
        persons,
        redis_client,
        postgres,
    };

    let status_router = Router::new()
        .route("/", get(index))
        .route("/_readiness", get(readiness))
        .route("/_liveness", get(|| ready("ok")));

    // Static segments take priority over `/:id`
    let persons_router = Router::new()
        .route("/persons", get(endpoint::list_persons))
        .route("/persons/count", get(endpoint::count_persons))
        .route(
            "/personByRedisTemplate",
            get(endpoint::get_last_fetched_person),
        )
        .route("/update", put(endpoint::update_person))
        .route(
            "/:id",
            get(endpoint::get_person).delete(endpoint::delete_person),
        )
        .layer(ConcurrencyLimitLayer::new(config.max_concurrency.get()));

    let router = Router::new()
        .merge(status_router)
        .merge(persons_router)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    match metrics {
        Some(recorder_handle) => {
            router.route("/metrics", get(move || ready(recorder_handle.render())))
        }
        None => router,
    }
}

pub async fn index() -> &'static str {
    "persons cache-aside service"
}

pub async fn readiness(
    extract::State(state): extract::State<State>,
) -> Result<&'static str, (StatusCode, String)> {
    state.redis_client.ping().await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("redis unavailable: {e}"),
        )
    })?;

    if let Some(pool) = &state.postgres {
        sqlx::query("SELECT 1").execute(pool).await.map_err(|e| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("postgres unavailable: {e}"),
            )
        })?;
    }

    Ok("ready")
}
