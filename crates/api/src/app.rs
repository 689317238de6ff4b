use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use persistence::repositories::{NotificationRepository, WorkQueueRepository};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{health, notifications};
use crate::services::NotificationService;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub service: Arc<NotificationService>,
}

/// Builds the notification service over the given pool.
pub fn build_service(pool: &PgPool) -> Arc<NotificationService> {
    Arc::new(NotificationService::new(
        NotificationRepository::new(pool.clone()),
        WorkQueueRepository::new(pool.clone()),
    ))
}

pub fn create_app(config: Config, pool: PgPool) -> Router {
    let config = Arc::new(config);
    let service = build_service(&pool);

    let state = AppState {
        pool,
        config: config.clone(),
        service,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Versioned API routes
    let api_routes = Router::new()
        .route(
            "/api/v1/notifications",
            post(notifications::create_notification),
        )
        .route(
            "/api/v1/notifications/failed",
            get(notifications::list_failed_notifications),
        )
        .route(
            "/api/v1/notifications/:id",
            get(notifications::get_notification).delete(notifications::cancel_notification),
        )
        .route(
            "/api/v1/notifications/:id/retry",
            post(notifications::retry_notification),
        );

    // Operational routes (no versioning)
    let ops_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(api_routes)
        .merge(ops_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
