use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule},
};
use crate::server::metrics;
use std::time::Duration;
use tracing::debug;

/// Drops expired response cache entries and publishes the cache size.
pub struct CacheCleanupJob {
    interval: Duration,
}

impl CacheCleanupJob {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl BackgroundJob for CacheCleanupJob {
    fn id(&self) -> &'static str {
        "cache_cleanup"
    }

    fn name(&self) -> &'static str {
        "Cache Cleanup"
    }

    fn description(&self) -> &'static str {
        "Remove expired entries from the response cache"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Interval(self.interval)
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        let removed = ctx.cache.cleanup_expired();
        let remaining = ctx.cache.len();
        metrics::set_cache_entries(remaining);
        if removed > 0 {
            debug!("Removed {} expired cache entries, {} remaining", removed, remaining);
        }
        Ok(())
    }
}
