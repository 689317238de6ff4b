//! Durable work queue for delivery dispatch.
//!
//! Postgres-backed broker: publishing inserts a row, consuming claims the
//! next due row under `FOR UPDATE SKIP LOCKED` and stamps a lease, ack
//! deletes the row, nack clears the lease. A worker that dies mid-attempt
//! simply lets its lease expire and the item becomes claimable again, which
//! keeps delivery at-least-once.

use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::WorkItemEntity;
use crate::metrics::QueryTimer;

/// Repository for work queue operations.
#[derive(Clone)]
pub struct WorkQueueRepository {
    pool: PgPool,
}

impl WorkQueueRepository {
    /// Creates a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Enqueues a work item for immediate processing.
    pub async fn publish(&self, notification_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO work_queue (notification_id, retry_count, available_at)
            VALUES ($1, 0, NOW())
            "#,
        )
        .bind(notification_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Enqueues a work item that becomes visible to consumers after `delay`.
    ///
    /// `retry_count` rides along for observability; consumers decide from
    /// the stored notification, not from this field.
    pub async fn publish_with_delay(
        &self,
        notification_id: Uuid,
        retry_count: i32,
        delay: Duration,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO work_queue (notification_id, retry_count, available_at)
            VALUES ($1, $2, NOW() + make_interval(secs => $3))
            "#,
        )
        .bind(notification_id)
        .bind(retry_count)
        .bind(delay.as_secs_f64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Claims the next due item, if any, stamping a lease of the given
    /// length. Parallel consumers skip each other's locked rows, so each
    /// message is handed to exactly one live worker at a time.
    pub async fn claim(&self, lease: Duration) -> Result<Option<WorkItemEntity>, sqlx::Error> {
        let timer = QueryTimer::new("claim_work_item");
        let item = sqlx::query_as::<_, WorkItemEntity>(
            r#"
            UPDATE work_queue
            SET lease_expires_at = NOW() + make_interval(secs => $1)
            WHERE id = (
                SELECT id FROM work_queue
                WHERE available_at <= NOW()
                  AND (lease_expires_at IS NULL OR lease_expires_at <= NOW())
                ORDER BY available_at, id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, notification_id, retry_count, available_at, lease_expires_at, created_at
            "#,
        )
        .bind(lease.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;
        timer.record();

        Ok(item)
    }

    /// Acknowledges a processed item. Call only after the outcome of the
    /// attempt has been durably stored.
    pub async fn ack(&self, item_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(r#"DELETE FROM work_queue WHERE id = $1"#)
            .bind(item_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Returns a claimed item to the queue for immediate redelivery.
    pub async fn nack(&self, item_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(r#"UPDATE work_queue SET lease_expires_at = NULL WHERE id = $1"#)
            .bind(item_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Number of queued items (leased or not) for a notification.
    pub async fn pending_for(&self, notification_id: Uuid) -> Result<i64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as(r#"SELECT COUNT(*) FROM work_queue WHERE notification_id = $1"#)
                .bind(notification_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count.0)
    }

    /// Total queue depth. Surfaced by the health endpoint and the metrics
    /// job.
    pub async fn depth(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM work_queue"#)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    /// Items due and unleased right now. A value that stays high while
    /// workers are running means the fleet is not keeping up.
    pub async fn due_count(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM work_queue
            WHERE available_at <= NOW()
              AND (lease_expires_at IS NULL OR lease_expires_at <= NOW())
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }
}
