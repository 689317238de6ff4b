//! Background job to record connection pool and queue depth metrics.

use std::time::Duration;

use metrics::gauge;
use sqlx::PgPool;

use persistence::repositories::WorkQueueRepository;

use super::scheduler::Job;

/// Job that periodically records database pool and work queue gauges.
pub struct PoolMetricsJob {
    pool: PgPool,
    queue: WorkQueueRepository,
}

impl PoolMetricsJob {
    /// Create a new pool metrics job.
    pub fn new(pool: PgPool, queue: WorkQueueRepository) -> Self {
        Self { pool, queue }
    }
}

#[async_trait::async_trait]
impl Job for PoolMetricsJob {
    fn name(&self) -> &'static str {
        "pool_metrics"
    }

    fn interval(&self) -> Duration {
        // Frequent enough for near-real-time gauges.
        Duration::from_secs(10)
    }

    async fn execute(&self) -> Result<(), String> {
        persistence::metrics::record_pool_metrics(&self.pool);

        let depth = self
            .queue
            .depth()
            .await
            .map_err(|e| format!("Failed to read queue depth: {}", e))?;
        gauge!("work_queue_depth").set(depth as f64);

        let due = self
            .queue
            .due_count()
            .await
            .map_err(|e| format!("Failed to read due count: {}", e))?;
        gauge!("work_queue_due").set(due as f64);

        Ok(())
    }
}
