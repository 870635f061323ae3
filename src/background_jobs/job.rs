use super::context::JobContext;
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::time::Duration;

/// Schedule for when a job should run.
#[derive(Debug, Clone)]
pub enum JobSchedule {
    /// Run once a day at a wall-clock time in a timezone
    Daily { hour: u32, minute: u32, timezone: Tz },
    /// Run at fixed intervals
    Interval(Duration),
}

impl JobSchedule {
    /// First run strictly after `after`, or `None` if it cannot be computed.
    pub fn next_run_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            JobSchedule::Daily {
                hour,
                minute,
                timezone,
            } => next_daily_run(after, *hour, *minute, *timezone),
            JobSchedule::Interval(interval) => {
                Some(after + chrono::Duration::from_std(*interval).ok()?)
            }
        }
    }
}

/// Next instant after `after` at which the clock in `timezone` shows
/// `hour:minute`. Days where that time does not exist (DST gaps) are skipped.
fn next_daily_run(after: DateTime<Utc>, hour: u32, minute: u32, timezone: Tz) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let mut date = after.with_timezone(&timezone).date_naive();
    for _ in 0..4 {
        if let Some(candidate) = timezone.from_local_datetime(&date.and_time(time)).earliest() {
            let candidate = candidate.with_timezone(&Utc);
            if candidate > after {
                return Some(candidate);
            }
        }
        date = date.succ_opt()?;
    }
    None
}

/// How a job should be handled during server shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownBehavior {
    /// Job can be cancelled immediately
    #[default]
    Cancellable,
    /// Wait for job to complete before shutdown
    WaitForCompletion,
}

/// Errors that can occur during job execution.
#[derive(Debug)]
pub enum JobError {
    ExecutionFailed(String),
    Cancelled,
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobError::ExecutionFailed(msg) => write!(f, "Execution failed: {}", msg),
            JobError::Cancelled => write!(f, "Job was cancelled"),
        }
    }
}

impl std::error::Error for JobError {}

/// Trait for background jobs.
///
/// Jobs are executed synchronously in a blocking context.
pub trait BackgroundJob: Send + Sync {
    /// Unique identifier for this job.
    fn id(&self) -> &'static str;

    /// Human-readable name for this job.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn schedule(&self) -> JobSchedule;

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        ShutdownBehavior::Cancellable
    }

    /// Execute the job.
    ///
    /// Called from `spawn_blocking`. Async work goes through `ctx.runtime`.
    /// Long-running jobs should check `ctx.is_cancelled()` between steps.
    fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}
