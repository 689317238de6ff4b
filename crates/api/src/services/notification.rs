//! Notification service.
//!
//! Transactional facade over the store and the work queue. Creation
//! persists before publishing: a publish for a missing record would be
//! unrecoverable, while a lost publish is swept back onto the queue later.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use domain::models::{DeliveryAttempt, NewNotification, Notification, NotificationStatus};
use persistence::repositories::{NotificationRepository, WorkQueueRepository};

use crate::middleware::metrics;

/// Service for notification business logic.
pub struct NotificationService {
    repository: NotificationRepository,
    queue: WorkQueueRepository,
}

impl NotificationService {
    /// Create a new notification service.
    pub fn new(repository: NotificationRepository, queue: WorkQueueRepository) -> Self {
        Self { repository, queue }
    }

    /// Accepts a notification for dispatch.
    ///
    /// A non-empty idempotency key that resolves to an existing record
    /// returns that record unchanged, without another publish. Otherwise the
    /// record is persisted first and then enqueued, so the queue never
    /// references an id the store does not know.
    pub async fn create(&self, new: NewNotification) -> Result<Notification, sqlx::Error> {
        if let Some(key) = &new.idempotency_key {
            if let Some(existing) = self.repository.find_by_idempotency_key(key).await? {
                info!(
                    notification_id = %existing.id,
                    idempotency_key = %key,
                    "Returning existing notification for idempotency key"
                );
                return Ok(existing);
            }
        }

        match self.repository.create(&new).await? {
            Some(created) => {
                info!(
                    notification_id = %created.id,
                    vendor_name = %created.vendor_name,
                    "Created notification"
                );
                metrics::record_received(&created.vendor_name);
                metrics::record_pending(&created.vendor_name);

                self.queue.publish(created.id).await?;
                Ok(created)
            }
            // A concurrent create with the same key won the insert race;
            // that caller published, this one only reads.
            None => match &new.idempotency_key {
                Some(key) => self
                    .repository
                    .find_by_idempotency_key(key)
                    .await?
                    .ok_or(sqlx::Error::RowNotFound),
                None => Err(sqlx::Error::RowNotFound),
            },
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, sqlx::Error> {
        self.repository.find_by_id(id).await
    }

    pub async fn find_by_status(
        &self,
        status: NotificationStatus,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        self.repository.find_by_status(status).await
    }

    pub async fn find_by_vendor_and_status(
        &self,
        vendor_name: &str,
        status: NotificationStatus,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        self.repository
            .find_by_vendor_and_status(vendor_name, status)
            .await
    }

    pub async fn count_by_status(&self, status: NotificationStatus) -> Result<i64, sqlx::Error> {
        self.repository.count_by_status(status).await
    }

    pub async fn count_by_vendor_and_status(
        &self,
        vendor_name: &str,
        status: NotificationStatus,
    ) -> Result<i64, sqlx::Error> {
        self.repository
            .count_by_vendor_and_status(vendor_name, status)
            .await
    }

    /// Records a successful delivery. Returns `None` when the notification
    /// was no longer PENDING; the outcome is then discarded.
    pub async fn mark_delivered(
        &self,
        id: Uuid,
        attempt: &DeliveryAttempt,
    ) -> Result<Option<Notification>, sqlx::Error> {
        let updated = self.repository.mark_delivered(id, attempt).await?;
        if let Some(notification) = &updated {
            info!(notification_id = %id, "Notification marked as DELIVERED");
            metrics::record_delivered(&notification.vendor_name);
        }
        Ok(updated)
    }

    /// Records a terminal failure. Returns `None` when the notification was
    /// no longer PENDING.
    pub async fn mark_failed(
        &self,
        id: Uuid,
        attempt: &DeliveryAttempt,
    ) -> Result<Option<Notification>, sqlx::Error> {
        let updated = self.repository.mark_failed(id, attempt).await?;
        if let Some(notification) = &updated {
            info!(notification_id = %id, "Notification marked as FAILED");
            metrics::record_failed(&notification.vendor_name);
        }
        Ok(updated)
    }

    /// Records a retryable failure and stamps the next retry time. Returns
    /// `None` when the notification was no longer PENDING.
    pub async fn schedule_retry(
        &self,
        id: Uuid,
        attempt: &DeliveryAttempt,
        next_retry_at: DateTime<Utc>,
    ) -> Result<Option<Notification>, sqlx::Error> {
        let updated = self
            .repository
            .schedule_retry(id, attempt, next_retry_at)
            .await?;
        if let Some(notification) = &updated {
            info!(
                notification_id = %id,
                next_retry_at = %next_retry_at,
                retry_count = notification.retry_count,
                "Notification scheduled for retry"
            );
            metrics::record_retry(&notification.vendor_name);
        }
        Ok(updated)
    }

    /// Cancels a pending notification. Returns `None` when the notification
    /// was not in PENDING.
    pub async fn cancel_notification(
        &self,
        id: Uuid,
    ) -> Result<Option<Notification>, sqlx::Error> {
        let cancelled = self.repository.cancel(id).await?;
        if cancelled.is_some() {
            info!(notification_id = %id, "Notification cancelled");
        }
        Ok(cancelled)
    }

    /// Resets a failed notification for manual retry and requeues it.
    /// Returns `None` when the notification was not in FAILED.
    pub async fn reset_for_retry(&self, id: Uuid) -> Result<Option<Notification>, sqlx::Error> {
        let reset = self.repository.reset_for_retry(id).await?;
        if let Some(notification) = &reset {
            info!(notification_id = %id, "Notification reset for retry");
            metrics::record_pending(&notification.vendor_name);
            self.queue.publish(id).await?;
        }
        Ok(reset)
    }
}
