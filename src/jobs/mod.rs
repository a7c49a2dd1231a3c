/// Background Recomputation Scheduler
///
/// Three periodic loops keep the score cache warm without blocking reads:
/// an hourly full recompute of stale or missing base scores, a 30-minute
/// trending-component refresh over recent content, and a daily cleanup that
/// evicts rows for dormant old content. Pass failures are logged and the
/// loop continues; nothing here is load-bearing for correctness, only for
/// read-path latency.
pub mod recompute;

pub use recompute::{CleanupOptions, JobError, PassStats, RecomputeJob, RecomputeOptions};

use crate::config::SchedulerConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Spawn the three scheduler loops. The first tick of each interval fires
/// immediately, so the cache warms at startup.
pub fn spawn_scheduler(config: SchedulerConfig, job: Arc<RecomputeJob>) -> Vec<JoinHandle<()>> {
    info!(
        full_pass_interval_secs = config.full_pass_interval_secs,
        trending_pass_interval_secs = config.trending_pass_interval_secs,
        cleanup_interval_secs = config.cleanup_interval_secs,
        "Starting recompute scheduler"
    );

    let full_options = RecomputeOptions {
        batch_size: config.batch_size,
        ..Default::default()
    };
    let cleanup_options = CleanupOptions {
        retention_days: config.retention_days,
    };

    let full = {
        let job = job.clone();
        let interval = Duration::from_secs(config.full_pass_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = job.run_full_pass(&full_options).await {
                    error!(error = %e, "Full recompute pass failed");
                }
            }
        })
    };

    let trending = {
        let job = job.clone();
        let interval = Duration::from_secs(config.trending_pass_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = job.run_trending_pass().await {
                    error!(error = %e, "Trending pass failed");
                }
            }
        })
    };

    let cleanup = {
        let interval = Duration::from_secs(config.cleanup_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = job.run_cleanup(&cleanup_options).await {
                    error!(error = %e, "Cleanup pass failed");
                }
            }
        })
    };

    vec![full, trending, cleanup]
}
