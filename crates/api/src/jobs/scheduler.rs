//! Background job scheduler.
//!
//! Runs the sweeper and metrics jobs on fixed intervals. Sweep-style jobs
//! start after a random fraction of their interval so that several service
//! replicas do not scan the store in lockstep, the same decorrelation idea
//! the retry jitter applies to vendor calls.

use std::sync::Arc;
use std::time::Duration;
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Consecutive failures after which a job is flagged as degraded.
const FAILURE_ALERT_THRESHOLD: u32 = 3;

/// Trait for implementing background jobs.
#[async_trait::async_trait]
pub trait Job: Send + Sync {
    /// The name of this job (used for logging).
    fn name(&self) -> &'static str;

    /// Time between runs.
    fn interval(&self) -> Duration;

    /// Whether the first run is delayed by a random fraction of the
    /// interval. Jobs that scan shared tables set this so replicas spread
    /// out; jobs reporting purely local state do not need it.
    fn staggered_start(&self) -> bool {
        false
    }

    /// Execute the job. Returns Ok(()) on success, Err with message on failure.
    async fn execute(&self) -> Result<(), String>;
}

/// Delay before a job's first run.
fn initial_delay(job: &dyn Job) -> Duration {
    let interval = job.interval();
    if job.staggered_start() {
        interval.mul_f64(rand::thread_rng().gen::<f64>())
    } else {
        interval
    }
}

/// Background job scheduler.
pub struct JobScheduler {
    jobs: Vec<Arc<dyn Job>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl JobScheduler {
    /// Create a new job scheduler.
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            jobs: Vec::new(),
            shutdown_tx,
            shutdown_rx,
            handles: Vec::new(),
        }
    }

    /// Register a job with the scheduler.
    pub fn register<J: Job + 'static>(&mut self, job: J) {
        self.jobs.push(Arc::new(job));
    }

    /// Start all registered jobs.
    pub fn start(&mut self) {
        info!("Starting job scheduler with {} jobs", self.jobs.len());

        for job in &self.jobs {
            let job = Arc::clone(job);
            let mut shutdown_rx = self.shutdown_rx.clone();

            let handle = tokio::spawn(async move {
                let name = job.name();
                let interval = job.interval();
                let first_run_in = initial_delay(job.as_ref());

                info!(
                    job = name,
                    interval_secs = interval.as_secs(),
                    first_run_in_ms = first_run_in.as_millis() as u64,
                    "Job scheduled"
                );

                tokio::select! {
                    _ = tokio::time::sleep(first_run_in) => {}
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!(job = name, "Job shutting down");
                            return;
                        }
                    }
                }

                let mut ticker = tokio::time::interval(interval);
                let mut consecutive_failures = 0u32;

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let start = std::time::Instant::now();

                            match job.execute().await {
                                Ok(()) => {
                                    consecutive_failures = 0;
                                    info!(
                                        job = name,
                                        elapsed_ms = start.elapsed().as_millis() as u64,
                                        "Job completed"
                                    );
                                }
                                Err(e) => {
                                    consecutive_failures += 1;
                                    error!(
                                        job = name,
                                        elapsed_ms = start.elapsed().as_millis() as u64,
                                        consecutive_failures,
                                        error = %e,
                                        "Job failed"
                                    );
                                    if consecutive_failures >= FAILURE_ALERT_THRESHOLD {
                                        warn!(
                                            job = name,
                                            consecutive_failures,
                                            "Job keeps failing; stranded-work recovery may be degraded"
                                        );
                                    }
                                }
                            }
                        }
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                info!(job = name, "Job shutting down");
                                break;
                            }
                        }
                    }
                }
            });

            self.handles.push(handle);
        }
    }

    /// Initiate graceful shutdown of all jobs.
    /// Returns immediately after signaling shutdown.
    pub fn shutdown(&self) {
        info!("Initiating job scheduler shutdown");
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for all jobs to complete with timeout.
    pub async fn wait_for_shutdown(self, timeout: Duration) {
        info!("Waiting for jobs to complete (timeout: {:?})", timeout);

        let shutdown_future = async {
            for handle in self.handles {
                if let Err(e) = handle.await {
                    warn!("Job task panicked: {}", e);
                }
            }
        };

        match tokio::time::timeout(timeout, shutdown_future).await {
            Ok(()) => info!("All jobs completed gracefully"),
            Err(_) => warn!("Job shutdown timed out after {:?}", timeout),
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestJob {
        run_count: Arc<AtomicUsize>,
        staggered: bool,
        should_fail: bool,
    }

    #[async_trait::async_trait]
    impl Job for TestJob {
        fn name(&self) -> &'static str {
            "test_job"
        }

        fn interval(&self) -> Duration {
            Duration::from_secs(1)
        }

        fn staggered_start(&self) -> bool {
            self.staggered
        }

        async fn execute(&self) -> Result<(), String> {
            self.run_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err("Test failure".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn test_job(staggered: bool) -> TestJob {
        TestJob {
            run_count: Arc::new(AtomicUsize::new(0)),
            staggered,
            should_fail: false,
        }
    }

    #[test]
    fn test_initial_delay_without_stagger_is_one_interval() {
        let job = test_job(false);
        assert_eq!(initial_delay(&job), job.interval());
    }

    #[test]
    fn test_initial_delay_with_stagger_is_within_interval() {
        let job = test_job(true);
        for _ in 0..50 {
            let delay = initial_delay(&job);
            assert!(delay <= job.interval());
        }
    }

    #[test]
    fn test_scheduler_creation() {
        let scheduler = JobScheduler::new();
        assert!(scheduler.jobs.is_empty());
        assert!(scheduler.handles.is_empty());
    }

    #[test]
    fn test_scheduler_register() {
        let mut scheduler = JobScheduler::new();
        scheduler.register(test_job(false));
        assert_eq!(scheduler.jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_scheduler_shutdown() {
        let mut scheduler = JobScheduler::new();
        scheduler.register(test_job(false));
        scheduler.start();

        // Give it a moment to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        scheduler.shutdown();
        scheduler.wait_for_shutdown(Duration::from_secs(2)).await;
    }

    #[test]
    fn test_job_trait() {
        let job = test_job(true);
        assert_eq!(job.name(), "test_job");
        assert_eq!(job.interval(), Duration::from_secs(1));
        assert!(job.staggered_start());
    }
}
