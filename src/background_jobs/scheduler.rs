use super::context::JobContext;
use super::job::{BackgroundJob, JobError, ShutdownBehavior};
use crate::server::metrics;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Longest the scheduler sleeps before re-checking its jobs.
const MAX_SLEEP: Duration = Duration::from_secs(60);

/// Manages background job scheduling and execution.
pub struct JobScheduler {
    jobs: HashMap<&'static str, Arc<dyn BackgroundJob>>,

    /// Next due time per job, kept in memory only.
    next_runs: HashMap<&'static str, DateTime<Utc>>,

    /// Currently running jobs with their task handles.
    running_handles: HashMap<&'static str, JoinHandle<()>>,

    /// Cancellation tokens for each running job.
    job_cancel_tokens: HashMap<&'static str, CancellationToken>,

    /// Token to signal scheduler shutdown.
    shutdown_token: CancellationToken,

    /// Shared context provided to jobs during execution.
    job_context: JobContext,
}

impl JobScheduler {
    pub fn new(shutdown_token: CancellationToken, job_context: JobContext) -> Self {
        Self {
            jobs: HashMap::new(),
            next_runs: HashMap::new(),
            running_handles: HashMap::new(),
            job_cancel_tokens: HashMap::new(),
            shutdown_token,
            job_context,
        }
    }

    /// Register a job with the scheduler. Its first run is the first
    /// scheduled time after now.
    pub fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        let job_id = job.id();
        match job.schedule().next_run_after(Utc::now()) {
            Some(next_run) => {
                info!(
                    "Registering job: {} - {} (next run {})",
                    job_id,
                    job.description(),
                    next_run
                );
                self.next_runs.insert(job_id, next_run);
            }
            None => warn!("Job {} has no computable schedule, it will never run", job_id),
        }
        self.jobs.insert(job_id, job);
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Main scheduler loop. Returns once the shutdown token is cancelled and
    /// running jobs have been wound down.
    pub async fn run(&mut self) {
        info!("Starting job scheduler with {} registered jobs", self.job_count());

        loop {
            self.cleanup_completed_jobs().await;

            let sleep_duration = self.time_until_next_scheduled_job();
            debug!(
                "Scheduler sleeping for {:?} until next scheduled job",
                sleep_duration
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.run_due_jobs();
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    fn time_until_next_scheduled_job(&self) -> Duration {
        let now = Utc::now();
        self.next_runs
            .values()
            .map(|next_run| (*next_run - now).to_std().unwrap_or(Duration::ZERO))
            .min()
            .unwrap_or(MAX_SLEEP)
            .min(MAX_SLEEP)
    }

    fn run_due_jobs(&mut self) {
        let now = Utc::now();
        let due: Vec<&'static str> = self
            .next_runs
            .iter()
            .filter(|(_, next_run)| **next_run <= now)
            .map(|(job_id, _)| *job_id)
            .collect();

        for job_id in due {
            let Some(job) = self.jobs.get(job_id).cloned() else {
                continue;
            };
            match job.schedule().next_run_after(now) {
                Some(next_run) => {
                    self.next_runs.insert(job_id, next_run);
                }
                None => {
                    self.next_runs.remove(job_id);
                }
            }

            if self.running_handles.contains_key(job_id) {
                warn!("Skipping scheduled run of {}: previous run still active", job_id);
                continue;
            }
            self.spawn_job(job);
        }
    }

    fn spawn_job(&mut self, job: Arc<dyn BackgroundJob>) {
        let job_id = job.id();
        info!("Starting job: {}", job_id);
        metrics::set_background_job_running(job_id, true);

        let cancel_token = self.job_context.cancellation_token.child_token();
        self.job_cancel_tokens.insert(job_id, cancel_token.clone());
        let ctx = self.job_context.with_token(cancel_token);

        let handle = tokio::spawn(async move {
            let start_time = Instant::now();
            let result = tokio::task::spawn_blocking(move || job.execute(&ctx)).await;
            let elapsed = start_time.elapsed();

            let status_label = match result {
                Ok(Ok(())) => {
                    info!("Job {} completed successfully in {:?}", job_id, elapsed);
                    "success"
                }
                Ok(Err(JobError::Cancelled)) => {
                    info!("Job {} was cancelled after {:?}", job_id, elapsed);
                    "cancelled"
                }
                Ok(Err(e)) => {
                    error!("Job {} failed after {:?}: {}", job_id, elapsed, e);
                    "failed"
                }
                Err(e) => {
                    error!("Job {} panicked after {:?}: {}", job_id, elapsed, e);
                    "panic"
                }
            };

            metrics::record_background_job_execution(job_id, status_label, elapsed);
            metrics::set_background_job_running(job_id, false);
        });

        self.running_handles.insert(job_id, handle);
    }

    async fn cleanup_completed_jobs(&mut self) {
        let completed: Vec<&'static str> = self
            .running_handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(job_id, _)| *job_id)
            .collect();

        for job_id in completed {
            if let Some(handle) = self.running_handles.remove(job_id) {
                let _ = handle.await;
            }
            self.job_cancel_tokens.remove(job_id);
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        for (job_id, token) in &self.job_cancel_tokens {
            let behavior = self
                .jobs
                .get(job_id)
                .map(|job| job.shutdown_behavior())
                .unwrap_or_default();
            if behavior == ShutdownBehavior::Cancellable {
                debug!("Cancelling job: {}", job_id);
                token.cancel();
            }
        }

        for (job_id, handle) in self.running_handles.drain() {
            info!("Waiting for job {} to finish...", job_id);
            if tokio::time::timeout(Duration::from_secs(30), handle)
                .await
                .is_err()
            {
                warn!("Job {} did not finish within 30s", job_id);
            }
        }

        self.job_cancel_tokens.clear();
        info!("Scheduler shutdown complete");
    }
}
