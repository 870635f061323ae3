mod cache_cleanup;
mod daily_snapshot;

pub use cache_cleanup::CacheCleanupJob;
pub use daily_snapshot::DailySnapshotJob;
