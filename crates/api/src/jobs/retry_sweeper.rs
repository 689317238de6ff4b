//! Retry sweeper background job.
//!
//! Safety net for the delivery pipeline: finds PENDING notifications that
//! should be on the queue but are not (a delayed publish lost to a crash
//! between schedule and enqueue, or an initial publish that never landed)
//! and puts them back. Republishing is safe because the worker skips
//! anything that is no longer PENDING.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use persistence::repositories::{NotificationRepository, WorkQueueRepository};

use super::scheduler::Job;

/// Background job that republishes stranded notifications.
pub struct RetrySweeperJob {
    repository: NotificationRepository,
    queue: WorkQueueRepository,
    interval_secs: u64,
    batch_size: i64,
    initial_grace_secs: u64,
}

impl RetrySweeperJob {
    /// Create a new retry sweeper.
    ///
    /// `initial_grace_secs` is how long a PENDING notification with no
    /// scheduled retry may sit without a queue entry before it is treated
    /// as a lost initial publish.
    pub fn new(
        repository: NotificationRepository,
        queue: WorkQueueRepository,
        interval_secs: u64,
        batch_size: i64,
        initial_grace_secs: u64,
    ) -> Self {
        Self {
            repository,
            queue,
            interval_secs,
            batch_size,
            initial_grace_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for RetrySweeperJob {
    fn name(&self) -> &'static str {
        "retry_sweeper"
    }

    fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    // Replicas sweeping the same store should not scan in lockstep.
    fn staggered_start(&self) -> bool {
        true
    }

    async fn execute(&self) -> Result<(), String> {
        let now = Utc::now();
        let initial_cutoff = now - Duration::seconds(self.initial_grace_secs as i64);

        let stranded = self
            .repository
            .find_stranded(now, initial_cutoff, self.batch_size)
            .await
            .map_err(|e| format!("Failed to scan for stranded notifications: {}", e))?;

        if stranded.is_empty() {
            return Ok(());
        }

        let mut republished = 0usize;
        for notification_id in &stranded {
            match self.queue.publish(*notification_id).await {
                Ok(()) => republished += 1,
                Err(e) => {
                    warn!(
                        notification_id = %notification_id,
                        error = %e,
                        "Failed to republish stranded notification"
                    );
                }
            }
        }

        info!(
            republished,
            scanned = stranded.len(),
            "Republished stranded notifications"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_cutoff_is_in_the_past() {
        let now = Utc::now();
        let cutoff = now - Duration::seconds(120);
        assert!(cutoff < now);
    }
}
