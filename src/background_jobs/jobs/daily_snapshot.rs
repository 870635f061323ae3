//! Daily chart snapshot job.
//!
//! Ingests every configured market once a day, then refreshes the current
//! year's rollups so yearly reads hit precomputed rows.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule, ShutdownBehavior},
};
use crate::utils::today_in_timezone;
use chrono::Datelike;
use chrono_tz::Tz;
use tracing::{error, info};

pub struct DailySnapshotJob {
    hour: u32,
    minute: u32,
    timezone: Tz,
    refresh_aggregates: bool,
}

impl DailySnapshotJob {
    pub fn new(hour: u32, minute: u32, timezone: Tz, refresh_aggregates: bool) -> Self {
        Self {
            hour,
            minute,
            timezone,
            refresh_aggregates,
        }
    }
}

impl BackgroundJob for DailySnapshotJob {
    fn id(&self) -> &'static str {
        "daily_chart_snapshot"
    }

    fn name(&self) -> &'static str {
        "Daily Chart Snapshot"
    }

    fn description(&self) -> &'static str {
        "Ingest today's chart for every market and refresh yearly aggregates"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Daily {
            hour: self.hour,
            minute: self.minute,
            timezone: self.timezone,
        }
    }

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        // A run interrupted mid-market would leave that market without a snapshot
        ShutdownBehavior::WaitForCompletion
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let results = ctx.runtime.block_on(ctx.ingestion.run_all_markets());
        let mut failures = Vec::new();
        for (market, result) in results {
            match result {
                Ok(report) => info!(
                    "Daily snapshot for {}: {} tracks on {}",
                    market, report.tracks_processed, report.snapshot_date
                ),
                Err(e) => failures.push(format!("ingest {}: {}", market, e)),
            }
        }

        if self.refresh_aggregates {
            for market in ctx.ingestion.markets() {
                if ctx.is_cancelled() {
                    return Err(JobError::Cancelled);
                }
                let year = today_in_timezone(market.timezone).year();
                if let Err(e) = ctx.aggregator.refresh(year, &market.code) {
                    error!("Aggregate refresh for {} {} failed: {}", year, market.code, e);
                    failures.push(format!("aggregate {} {}: {}", year, market.code, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(JobError::ExecutionFailed(failures.join("; ")))
        }
    }
}
