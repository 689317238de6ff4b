//! Delivery worker.
//!
//! Consumes work items from the queue, runs the vendor adapter, classifies
//! the result, and records the outcome. Items are acked only after the
//! state transition is durably stored; a store or queue failure nacks the
//! item for redelivery, which may cost a duplicate attempt but never loses
//! one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use domain::models::{DeliveryAttempt, DeliveryResult, Notification, NotificationStatus};
use domain::services::RetryDelayCalculator;
use persistence::entities::WorkItemEntity;
use persistence::repositories::WorkQueueRepository;

use crate::adapters::{AdapterRegistry, VendorAdapter};
use crate::middleware::metrics;
use crate::services::NotificationService;

/// Maximum stored length of a vendor response body.
const MAX_RESPONSE_BODY_LENGTH: usize = 1000;
const TRUNCATION_SENTINEL: &str = "... [truncated]";

/// Result of one poll of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// No work was due.
    Idle,
    /// One item was claimed and settled (acked or nacked).
    Processed,
}

/// Processes one work item at a time to completion.
pub struct DeliveryWorker {
    service: Arc<NotificationService>,
    queue: WorkQueueRepository,
    registry: Arc<AdapterRegistry>,
    calculator: Arc<RetryDelayCalculator>,
    max_retry_count: i32,
    lease: Duration,
}

impl DeliveryWorker {
    pub fn new(
        service: Arc<NotificationService>,
        queue: WorkQueueRepository,
        registry: Arc<AdapterRegistry>,
        calculator: Arc<RetryDelayCalculator>,
        max_retry_count: i32,
        lease: Duration,
    ) -> Self {
        Self {
            service,
            queue,
            registry,
            calculator,
            max_retry_count,
            lease,
        }
    }

    /// Claims and settles the next due work item, if any.
    pub async fn process_next(&self) -> Result<ProcessOutcome, sqlx::Error> {
        let Some(item) = self.queue.claim(self.lease).await? else {
            return Ok(ProcessOutcome::Idle);
        };

        match self.process_item(&item).await {
            Ok(()) => self.queue.ack(item.id).await?,
            Err(err) => {
                error!(
                    notification_id = %item.notification_id,
                    error = %err,
                    "Failed to record delivery outcome, returning item to queue"
                );
                self.queue.nack(item.id).await?;
            }
        }

        Ok(ProcessOutcome::Processed)
    }

    /// Handles one claimed item. The item's retry_count is advisory only;
    /// every decision below reads the stored record.
    async fn process_item(&self, item: &WorkItemEntity) -> Result<(), sqlx::Error> {
        let id = item.notification_id;
        info!(notification_id = %id, "Processing notification");

        let Some(notification) = self.service.find_by_id(id).await? else {
            warn!(notification_id = %id, "Notification not found, skipping");
            return Ok(());
        };

        // Redeliveries of settled work and cancellations land here.
        if notification.status != NotificationStatus::Pending {
            info!(
                notification_id = %id,
                status = %notification.status,
                "Notification is not pending, skipping"
            );
            return Ok(());
        }

        let Some(adapter) = self.registry.get(&notification.vendor_name) else {
            error!(
                notification_id = %id,
                vendor_name = %notification.vendor_name,
                "No adapter found for vendor, marking notification as failed"
            );
            let attempt = DeliveryAttempt::failure(
                0,
                None,
                Some(format!(
                    "No adapter found for vendor: {}",
                    notification.vendor_name
                )),
            );
            self.service.mark_failed(id, &attempt).await?;
            return Ok(());
        };

        let delivery_start = Instant::now();
        let result = adapter.deliver(&notification).await;
        metrics::record_delivery_duration(
            &notification.vendor_name,
            delivery_start.elapsed().as_secs_f64(),
        );

        self.handle_delivery_result(&notification, adapter.as_ref(), result)
            .await
    }

    async fn handle_delivery_result(
        &self,
        notification: &Notification,
        adapter: &dyn VendorAdapter,
        result: DeliveryResult,
    ) -> Result<(), sqlx::Error> {
        let id = notification.id;
        let response_body = result
            .response_body
            .as_deref()
            .map(truncate_response_body);

        if result.success {
            let attempt = DeliveryAttempt::success(result.status_code as i32, response_body);
            if self.service.mark_delivered(id, &attempt).await?.is_none() {
                info!(
                    notification_id = %id,
                    "Delivery succeeded but notification left pending state, outcome discarded"
                );
            }
            return Ok(());
        }

        let attempt = DeliveryAttempt::failure(
            result.status_code as i32,
            response_body,
            result.error_message.clone(),
        );

        if adapter.is_retryable(result.status_code, result.response_body.as_deref()) {
            if notification.retry_count >= self.max_retry_count {
                warn!(
                    notification_id = %id,
                    max_retry_count = self.max_retry_count,
                    "Notification exceeded max retries, marking as FAILED"
                );
                self.service.mark_failed(id, &attempt).await?;
            } else {
                self.schedule_retry(notification, &attempt).await?;
            }
        } else {
            warn!(
                notification_id = %id,
                status_code = result.status_code,
                "Delivery failed with non-retryable error"
            );
            self.service.mark_failed(id, &attempt).await?;
        }

        Ok(())
    }

    /// Schedules the next attempt with exponential backoff. The record is
    /// updated before the delayed publish; if the publish is lost to a
    /// crash, the sweeper re-enqueues from the stored next_retry_at.
    async fn schedule_retry(
        &self,
        notification: &Notification,
        attempt: &DeliveryAttempt,
    ) -> Result<(), sqlx::Error> {
        let id = notification.id;
        let delay = self.calculator.calculate_delay(notification.retry_count as u32);
        let next_retry_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::hours(1));

        let scheduled = self
            .service
            .schedule_retry(id, attempt, next_retry_at)
            .await?;

        // A concurrent cancel leaves nothing to requeue.
        if scheduled.is_some() {
            self.queue
                .publish_with_delay(id, notification.retry_count + 1, delay)
                .await?;
            info!(
                notification_id = %id,
                delay_ms = delay.as_millis() as u64,
                retry_count = notification.retry_count + 1,
                "Notification scheduled for retry"
            );
        }

        Ok(())
    }
}

/// Truncates a response body before persistence.
fn truncate_response_body(body: &str) -> String {
    if body.chars().count() <= MAX_RESPONSE_BODY_LENGTH {
        return body.to_string();
    }

    let mut truncated: String = body.chars().take(MAX_RESPONSE_BODY_LENGTH).collect();
    truncated.push_str(TRUNCATION_SENTINEL);
    truncated
}

/// Pool of delivery workers, each pulling one message at a time.
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `count` workers that poll the queue until shutdown.
    pub fn start(worker: Arc<DeliveryWorker>, count: usize, poll_interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        info!(worker_count = count, "Starting delivery workers");

        let mut handles = Vec::with_capacity(count);
        for worker_id in 0..count {
            let worker = Arc::clone(&worker);
            let mut shutdown_rx = shutdown_rx.clone();

            handles.push(tokio::spawn(async move {
                info!(worker_id, "Delivery worker started");

                while !*shutdown_rx.borrow() {
                    match worker.process_next().await {
                        Ok(ProcessOutcome::Processed) => continue,
                        Ok(ProcessOutcome::Idle) => {
                            tokio::select! {
                                _ = tokio::time::sleep(poll_interval) => {}
                                _ = shutdown_rx.changed() => {}
                            }
                        }
                        Err(err) => {
                            error!(worker_id, error = %err, "Delivery worker poll failed");
                            tokio::select! {
                                _ = tokio::time::sleep(poll_interval) => {}
                                _ = shutdown_rx.changed() => {}
                            }
                        }
                    }
                }

                info!(worker_id, "Delivery worker stopped");
            }));
        }

        Self {
            shutdown_tx,
            handles,
        }
    }

    /// Signals all workers to stop after their current message.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Waits for all workers to finish, up to `timeout`.
    pub async fn wait_for_shutdown(self, timeout: Duration) {
        let join_all = async {
            for handle in self.handles {
                if let Err(err) = handle.await {
                    warn!("Delivery worker task panicked: {}", err);
                }
            }
        };

        match tokio::time::timeout(timeout, join_all).await {
            Ok(()) => info!("All delivery workers stopped"),
            Err(_) => warn!("Delivery worker shutdown timed out after {:?}", timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_body_unchanged() {
        assert_eq!(truncate_response_body("ok"), "ok");
    }

    #[test]
    fn test_truncate_exact_limit_unchanged() {
        let body = "a".repeat(1000);
        assert_eq!(truncate_response_body(&body), body);
    }

    #[test]
    fn test_truncate_long_body_appends_sentinel() {
        let body = "a".repeat(1001);
        let truncated = truncate_response_body(&body);
        assert_eq!(truncated.chars().count(), 1000 + TRUNCATION_SENTINEL.len());
        assert!(truncated.ends_with("... [truncated]"));
        assert!(truncated.starts_with("aaaa"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let body = "é".repeat(1500);
        let truncated = truncate_response_body(&body);
        assert!(truncated.ends_with("... [truncated]"));
        assert_eq!(truncated.chars().count(), 1000 + TRUNCATION_SENTINEL.len());
    }
}
