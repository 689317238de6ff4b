//! Notification repository.
//!
//! System of record for notifications and their attempt history. Status
//! transitions are guarded: every update carries its precondition in the
//! WHERE clause, so a transition that lost a race affects zero rows and is
//! reported as `None` instead of overwriting a terminal state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use domain::models::{DeliveryAttempt, NewNotification, Notification, NotificationStatus};

use crate::entities::{DeliveryAttemptEntity, NotificationEntity};
use crate::metrics::QueryTimer;

const NOTIFICATION_COLUMNS: &str = "id, notification_id, vendor_name, target_url, http_method, \
     headers, body, idempotency_key, status, retry_count, next_retry_at, created_at, updated_at";

/// Repository for notification operations.
#[derive(Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Creates a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a new notification in PENDING state.
    ///
    /// Returns `None` when a concurrent insert with the same idempotency key
    /// won the race; the surviving row is reachable via
    /// [`find_by_idempotency_key`](Self::find_by_idempotency_key).
    pub async fn create(&self, new: &NewNotification) -> Result<Option<Notification>, sqlx::Error> {
        let timer = QueryTimer::new("create_notification");

        let entity = sqlx::query_as::<_, NotificationEntity>(&format!(
            r#"
            INSERT INTO notifications (vendor_name, target_url, http_method, headers, body, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (idempotency_key) WHERE idempotency_key IS NOT NULL DO NOTHING
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(&new.vendor_name)
        .bind(&new.target_url)
        .bind(new.http_method.as_str())
        .bind(sqlx::types::Json(&new.headers))
        .bind(&new.body)
        .bind(&new.idempotency_key)
        .fetch_optional(&self.pool)
        .await?;
        timer.record();

        match entity {
            Some(entity) => Ok(Some(entity.into_domain(Vec::new())?)),
            None => Ok(None),
        }
    }

    /// Point lookup by public notification id.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, sqlx::Error> {
        let entity = sqlx::query_as::<_, NotificationEntity>(&format!(
            r#"SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE notification_id = $1"#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match entity {
            Some(entity) => {
                let attempts = self.attempts_for(id).await?;
                Ok(Some(entity.into_domain(attempts)?))
            }
            None => Ok(None),
        }
    }

    /// Point lookup via the sparse unique idempotency-key index.
    pub async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Notification>, sqlx::Error> {
        let entity = sqlx::query_as::<_, NotificationEntity>(&format!(
            r#"SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE idempotency_key = $1"#
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        match entity {
            Some(entity) => {
                let attempts = self.attempts_for(entity.notification_id).await?;
                Ok(Some(entity.into_domain(attempts)?))
            }
            None => Ok(None),
        }
    }

    /// All notifications in the given status.
    pub async fn find_by_status(
        &self,
        status: NotificationStatus,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let entities = sqlx::query_as::<_, NotificationEntity>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS} FROM notifications
            WHERE status = $1
            ORDER BY created_at
            "#
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        self.with_attempts(entities).await
    }

    /// Notifications for one vendor in the given status.
    pub async fn find_by_vendor_and_status(
        &self,
        vendor_name: &str,
        status: NotificationStatus,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let entities = sqlx::query_as::<_, NotificationEntity>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS} FROM notifications
            WHERE status = $1 AND vendor_name = $2
            ORDER BY created_at
            "#
        ))
        .bind(status.as_str())
        .bind(vendor_name)
        .fetch_all(&self.pool)
        .await?;

        self.with_attempts(entities).await
    }

    pub async fn count_by_status(&self, status: NotificationStatus) -> Result<i64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as(r#"SELECT COUNT(*) FROM notifications WHERE status = $1"#)
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(count.0)
    }

    pub async fn count_by_vendor_and_status(
        &self,
        vendor_name: &str,
        status: NotificationStatus,
    ) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM notifications WHERE status = $1 AND vendor_name = $2"#,
        )
        .bind(status.as_str())
        .bind(vendor_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    /// PENDING notifications whose scheduled retry is due on or before `before`.
    ///
    /// Backed by the (status, next_retry_at) index.
    pub async fn find_due_for_retry(
        &self,
        before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let entities = sqlx::query_as::<_, NotificationEntity>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS} FROM notifications
            WHERE status = 'pending' AND next_retry_at IS NOT NULL AND next_retry_at <= $1
            ORDER BY next_retry_at
            LIMIT $2
            "#
        ))
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        self.with_attempts(entities).await
    }

    /// Ids of PENDING notifications that should be on the queue but are not:
    /// a due retry, or an initial publish older than the grace cutoff, with
    /// no outstanding work item. Used by the sweeper.
    pub async fn find_stranded(
        &self,
        retry_due_before: DateTime<Utc>,
        initial_created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT n.notification_id FROM notifications n
            WHERE n.status = 'pending'
              AND (
                    (n.next_retry_at IS NOT NULL AND n.next_retry_at <= $1)
                 OR (n.next_retry_at IS NULL AND n.created_at <= $2)
                  )
              AND NOT EXISTS (
                    SELECT 1 FROM work_queue q WHERE q.notification_id = n.notification_id
                  )
            ORDER BY n.updated_at
            LIMIT $3
            "#,
        )
        .bind(retry_due_before)
        .bind(initial_created_before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Records a successful delivery: appends the attempt and moves the
    /// notification to DELIVERED, provided it is still PENDING.
    pub async fn mark_delivered(
        &self,
        id: Uuid,
        attempt: &DeliveryAttempt,
    ) -> Result<Option<Notification>, sqlx::Error> {
        self.transition_with_attempt(
            id,
            attempt,
            r#"
            UPDATE notifications
            SET status = 'delivered', next_retry_at = NULL, updated_at = NOW()
            WHERE notification_id = $1 AND status = 'pending'
            "#,
        )
        .await
    }

    /// Records a terminally failed delivery: appends the attempt and moves
    /// the notification to FAILED, provided it is still PENDING.
    pub async fn mark_failed(
        &self,
        id: Uuid,
        attempt: &DeliveryAttempt,
    ) -> Result<Option<Notification>, sqlx::Error> {
        self.transition_with_attempt(
            id,
            attempt,
            r#"
            UPDATE notifications
            SET status = 'failed', next_retry_at = NULL, updated_at = NOW()
            WHERE notification_id = $1 AND status = 'pending'
            "#,
        )
        .await
    }

    /// Records a retryable failure: appends the attempt, bumps the retry
    /// count, and stamps the next retry time, provided the notification is
    /// still PENDING.
    pub async fn schedule_retry(
        &self,
        id: Uuid,
        attempt: &DeliveryAttempt,
        next_retry_at: DateTime<Utc>,
    ) -> Result<Option<Notification>, sqlx::Error> {
        let timer = QueryTimer::new("schedule_retry");
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE notifications
            SET retry_count = retry_count + 1, next_retry_at = $2, updated_at = NOW()
            WHERE notification_id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(next_retry_at)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        insert_attempt(&mut tx, id, attempt).await?;
        tx.commit().await?;
        timer.record();

        self.find_by_id(id).await
    }

    /// PENDING -> CANCELLED. Returns `None` for any other current status.
    pub async fn cancel(&self, id: Uuid) -> Result<Option<Notification>, sqlx::Error> {
        let updated = sqlx::query(
            r#"
            UPDATE notifications
            SET status = 'cancelled', next_retry_at = NULL, updated_at = NOW()
            WHERE notification_id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_id(id).await
    }

    /// FAILED -> PENDING with a fresh retry budget. Returns `None` for any
    /// other current status.
    pub async fn reset_for_retry(&self, id: Uuid) -> Result<Option<Notification>, sqlx::Error> {
        let updated = sqlx::query(
            r#"
            UPDATE notifications
            SET status = 'pending', retry_count = 0, next_retry_at = NULL, updated_at = NOW()
            WHERE notification_id = $1 AND status = 'failed'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        self.find_by_id(id).await
    }

    async fn transition_with_attempt(
        &self,
        id: Uuid,
        attempt: &DeliveryAttempt,
        update_sql: &str,
    ) -> Result<Option<Notification>, sqlx::Error> {
        let timer = QueryTimer::new("notification_transition");
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(update_sql).bind(id).execute(&mut *tx).await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        insert_attempt(&mut tx, id, attempt).await?;
        tx.commit().await?;
        timer.record();

        self.find_by_id(id).await
    }

    async fn attempts_for(&self, id: Uuid) -> Result<Vec<DeliveryAttemptEntity>, sqlx::Error> {
        sqlx::query_as::<_, DeliveryAttemptEntity>(
            r#"
            SELECT id, notification_id, attempted_at, response_code, response_body, error_message
            FROM delivery_attempts
            WHERE notification_id = $1
            ORDER BY id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
    }

    /// Joins attempt histories onto a batch of rows with a single query.
    async fn with_attempts(
        &self,
        entities: Vec<NotificationEntity>,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = entities.iter().map(|e| e.notification_id).collect();
        let attempt_rows = sqlx::query_as::<_, DeliveryAttemptEntity>(
            r#"
            SELECT id, notification_id, attempted_at, response_code, response_body, error_message
            FROM delivery_attempts
            WHERE notification_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<DeliveryAttemptEntity>> = HashMap::new();
        for row in attempt_rows {
            grouped.entry(row.notification_id).or_default().push(row);
        }

        entities
            .into_iter()
            .map(|entity| {
                let attempts = grouped.remove(&entity.notification_id).unwrap_or_default();
                entity.into_domain(attempts)
            })
            .collect()
    }
}

async fn insert_attempt(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    attempt: &DeliveryAttempt,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO delivery_attempts (notification_id, attempted_at, response_code, response_body, error_message)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(attempt.timestamp)
    .bind(attempt.response_code)
    .bind(&attempt.response_body)
    .bind(&attempt.error_message)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
