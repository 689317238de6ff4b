use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use domain::services::RetryDelayCalculator;
use persistence::repositories::{NotificationRepository, WorkQueueRepository};

use notifier_api::adapters::{AdapterRegistry, GenericHttpAdapter, VendorAdapter};
use notifier_api::app;
use notifier_api::config::Config;
use notifier_api::jobs::{JobScheduler, PoolMetricsJob, RetrySweeperJob};
use notifier_api::middleware::{init_metrics, logging::init_logging};
use notifier_api::worker::{DeliveryWorker, WorkerPool};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()?;

    // Initialize logging and metrics
    init_logging(&config.logging);
    init_metrics();

    info!("Starting notifier API v{}", env!("CARGO_PKG_VERSION"));

    // Create database pool, sized to keep the worker fleet from starving
    let pool = persistence::db::create_pool(
        &persistence::db::DatabaseConfig {
            url: config.database.url.clone(),
            max_connections: config.database.max_connections,
            min_connections: config.database.min_connections,
            connect_timeout_secs: config.database.connect_timeout_secs,
            idle_timeout_secs: config.database.idle_timeout_secs,
        },
        config.delivery.worker_count as u32,
    )
    .await?;

    // Run migrations
    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations").run(&pool).await?;
    info!("Migrations completed");

    // Wire the delivery pipeline
    let adapters: Vec<Arc<dyn VendorAdapter>> = vec![Arc::new(GenericHttpAdapter::new(
        config.delivery.http_timeout(),
    ))];
    let registry = Arc::new(AdapterRegistry::new(adapters)?);
    let calculator = Arc::new(RetryDelayCalculator::new(
        config.delivery.initial_retry_delay(),
        config.delivery.max_retry_delay(),
    )?);

    let service = app::build_service(&pool);
    let queue = WorkQueueRepository::new(pool.clone());

    let worker = Arc::new(DeliveryWorker::new(
        service.clone(),
        queue.clone(),
        registry,
        calculator,
        config.delivery.max_retry_count,
        config.delivery.lease(),
    ));
    let worker_pool = WorkerPool::start(
        worker,
        config.delivery.worker_count,
        config.delivery.poll_interval(),
    );

    // Background jobs
    let mut scheduler = JobScheduler::new();
    scheduler.register(RetrySweeperJob::new(
        NotificationRepository::new(pool.clone()),
        queue.clone(),
        config.delivery.sweep_interval_secs,
        config.delivery.sweep_batch_size,
        config.delivery.sweep_initial_grace_secs,
    ));
    scheduler.register(PoolMetricsJob::new(pool.clone(), queue));
    scheduler.start();

    // Build application
    let addr = config.socket_addr();
    let app = app::create_app(config, pool);

    // Start server
    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain background work before exit
    info!("Shutting down");
    scheduler.shutdown();
    worker_pool.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(10)).await;
    worker_pool.wait_for_shutdown(Duration::from_secs(30)).await;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Shutdown signal received");
}
