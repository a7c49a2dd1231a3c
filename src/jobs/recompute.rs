use crate::services::cache::{CacheTier, ScoreCache};
use crate::services::scoring::ScoringEngine;
use crate::store::{ContentProvider, InteractionStore, StoreError};
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("content listing unavailable: {0}")]
    ContentUnavailable(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, JobError>;

/// Parameters of the administrative recompute trigger.
#[derive(Debug, Clone)]
pub struct RecomputeOptions {
    pub batch_size: usize,
    /// Recompute everything regardless of staleness; used after weight or
    /// formula changes.
    pub force_all: bool,
    /// Restrict to content created inside the trending window.
    pub recent_only: bool,
}

impl Default for RecomputeOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            force_all: false,
            recent_only: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CleanupOptions {
    pub retention_days: i64,
}

/// Outcome of a single pass.
#[derive(Debug, Clone, Default)]
pub struct PassStats {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub candidates: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub removed: usize,
    pub duration_ms: u64,
}

/// Drives the three scheduled passes: hourly full recompute, 30-minute
/// trending refresh, daily cleanup. Every pass is idempotent — recomputation
/// overwrites rows, never accumulates — so overlapping or interrupted runs
/// are safe; whatever is left stale is picked up next time.
pub struct RecomputeJob {
    engine: Arc<ScoringEngine>,
    cache: Arc<ScoreCache>,
    content: Arc<dyn ContentProvider>,
    interactions: Arc<InteractionStore>,
}

impl RecomputeJob {
    pub fn new(
        engine: Arc<ScoringEngine>,
        cache: Arc<ScoreCache>,
        content: Arc<dyn ContentProvider>,
        interactions: Arc<InteractionStore>,
    ) -> Self {
        Self {
            engine,
            cache,
            content,
            interactions,
        }
    }

    /// Full pass: recompute base scores for stale, expired or uncached
    /// content, oldest-stale-first, in bounded parallel batches. Per-item
    /// failures are logged and skipped, never abort the batch.
    pub async fn run_full_pass(&self, options: &RecomputeOptions) -> Result<PassStats> {
        let start = Instant::now();
        let mut stats = PassStats {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let candidates = self.select_candidates(options).await?;
        stats.candidates = candidates.len();

        info!(
            candidates = candidates.len(),
            batch_size = options.batch_size,
            force_all = options.force_all,
            recent_only = options.recent_only,
            "Starting full recompute pass"
        );

        let batch_size = options.batch_size.max(1);
        for batch in candidates.chunks(batch_size) {
            // Batches operate on disjoint content IDs, so items inside one
            // can score concurrently.
            let results = join_all(batch.iter().map(|&content_id| async move {
                (content_id, self.engine.compute_base(content_id).await)
            }))
            .await;

            for (content_id, result) in results {
                stats.processed += 1;
                match result {
                    Ok(score) => {
                        self.cache.put_base(score, CacheTier::Base);
                        stats.succeeded += 1;
                    }
                    Err(e) => {
                        stats.failed += 1;
                        warn!(
                            content_id = %content_id,
                            error = %e,
                            "Recompute failed, item stays stale for next pass"
                        );
                    }
                }
            }
        }

        stats.completed_at = Some(Utc::now());
        stats.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            processed = stats.processed,
            succeeded = stats.succeeded,
            failed = stats.failed,
            duration_ms = stats.duration_ms,
            "Full recompute pass completed"
        );

        Ok(stats)
    }

    /// Trending pass: refresh only the trending component for content
    /// created inside the trending window, reusing the other stored
    /// components. Cheap, so it runs at twice the full-pass cadence.
    pub async fn run_trending_pass(&self) -> Result<PassStats> {
        let start = Instant::now();
        let mut stats = PassStats {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let now = Utc::now();
        let window = Duration::hours(self.engine.config().trending_window_hours);
        let recent = self.recent_content(now - window).await?;
        stats.candidates = recent.len();

        for content_id in recent {
            stats.processed += 1;
            let result = match self.cache.peek_base(content_id) {
                Some(mut score) => {
                    score.components.trending =
                        self.engine.trending_component(content_id, now);
                    score.final_score = self.engine.combine(&score.components);
                    score.computed_at = now;
                    Ok(score)
                }
                // Nothing cached yet: a full single-item compute seeds it.
                None => self.engine.compute_base(content_id).await,
            };

            match result {
                Ok(score) => {
                    self.cache.put_base(score, CacheTier::Trending);
                    stats.succeeded += 1;
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(content_id = %content_id, error = %e, "Trending refresh failed");
                }
            }
        }

        stats.completed_at = Some(Utc::now());
        stats.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            processed = stats.processed,
            succeeded = stats.succeeded,
            failed = stats.failed,
            duration_ms = stats.duration_ms,
            "Trending pass completed"
        );

        Ok(stats)
    }

    /// Cleanup pass: drop score rows for content past the retention
    /// threshold with no interactions inside it, bounding storage growth.
    pub async fn run_cleanup(&self, options: &CleanupOptions) -> Result<PassStats> {
        let start = Instant::now();
        let mut stats = PassStats {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let cutoff = Utc::now() - Duration::days(options.retention_days.max(0));
        let cached = self.cache.cached_content_ids();
        stats.candidates = cached.len();

        for content_id in cached {
            stats.processed += 1;

            let created_at = match self.content.content_meta(content_id).await {
                Ok(meta) => meta.created_at,
                // Content gone upstream: its rows are unservable anyway.
                Err(_) => {
                    self.cache.evict_content(content_id);
                    stats.removed += 1;
                    continue;
                }
            };

            let last_interaction = self.interactions.last_interaction_at(content_id);
            let dormant = last_interaction.map(|t| t < cutoff).unwrap_or(true);

            if created_at < cutoff && dormant {
                self.cache.evict_content(content_id);
                stats.removed += 1;
            }
        }

        stats.completed_at = Some(Utc::now());
        stats.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            checked = stats.processed,
            removed = stats.removed,
            retention_days = options.retention_days,
            "Cleanup pass completed"
        );

        Ok(stats)
    }

    /// Work selection for the full pass: uncached first, then stale or
    /// expired rows, oldest computation first.
    async fn select_candidates(&self, options: &RecomputeOptions) -> Result<Vec<Uuid>> {
        let mut ids = self.content.list_content_ids().await?;

        if options.recent_only {
            let window = Duration::hours(self.engine.config().trending_window_hours);
            let recent = self.recent_content(Utc::now() - window).await?;
            let recent: std::collections::HashSet<Uuid> = recent.into_iter().collect();
            ids.retain(|id| recent.contains(id));
        }

        let mut candidates: Vec<(Uuid, Option<DateTime<Utc>>)> = Vec::new();
        for content_id in ids {
            match self.cache.base_status(content_id) {
                None => candidates.push((content_id, None)),
                Some(status) if options.force_all || status.stale || status.expired => {
                    candidates.push((content_id, Some(status.computed_at)))
                }
                Some(_) => {}
            }
        }

        candidates.sort_by_key(|(_, computed_at)| *computed_at);
        Ok(candidates.into_iter().map(|(id, _)| id).collect())
    }

    async fn recent_content(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let ids = self.content.list_content_ids().await?;
        let metas = join_all(
            ids.into_iter()
                .map(|id| async move { self.content.content_meta(id).await }),
        )
        .await;

        Ok(metas
            .into_iter()
            .flatten()
            .filter(|meta| meta.created_at >= cutoff)
            .map(|meta| meta.content_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, ScoringConfig};
    use crate::models::{ContentMeta, InteractionEvent, InteractionKind};
    use crate::store::{InMemoryContentStore, InMemoryReputation, InMemorySocialGraph};

    struct Fixture {
        job: RecomputeJob,
        cache: Arc<ScoreCache>,
        content: Arc<InMemoryContentStore>,
        interactions: Arc<InteractionStore>,
    }

    fn fixture() -> Fixture {
        let content = Arc::new(InMemoryContentStore::new());
        let interactions = Arc::new(InteractionStore::new());
        let cache = Arc::new(ScoreCache::new(CacheConfig::default()));
        let engine = Arc::new(ScoringEngine::new(
            ScoringConfig::default(),
            content.clone(),
            interactions.clone(),
            Arc::new(InMemorySocialGraph::new()),
            Arc::new(InMemoryReputation::new()),
        ));

        Fixture {
            job: RecomputeJob::new(engine, cache.clone(), content.clone(), interactions.clone()),
            cache,
            content,
            interactions,
        }
    }

    fn seed(f: &Fixture, age_hours: i64) -> Uuid {
        let content_id = Uuid::new_v4();
        f.content.insert(ContentMeta {
            content_id,
            author_id: Uuid::new_v4(),
            created_at: Utc::now() - Duration::hours(age_hours),
            topics: vec![],
        });
        content_id
    }

    #[tokio::test]
    async fn test_full_pass_fills_cache() {
        let f = fixture();
        let a = seed(&f, 1);
        let b = seed(&f, 10);

        let stats = f
            .job
            .run_full_pass(&RecomputeOptions::default())
            .await
            .unwrap();

        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 0);
        assert!(f.cache.get_base(a).is_some());
        assert!(f.cache.get_base(b).is_some());
    }

    #[tokio::test]
    async fn test_full_pass_skips_fresh_unless_forced() {
        let f = fixture();
        seed(&f, 1);

        let first = f
            .job
            .run_full_pass(&RecomputeOptions::default())
            .await
            .unwrap();
        assert_eq!(first.succeeded, 1);

        // Fresh, not stale: nothing to do
        let second = f
            .job
            .run_full_pass(&RecomputeOptions::default())
            .await
            .unwrap();
        assert_eq!(second.candidates, 0);

        let forced = f
            .job
            .run_full_pass(&RecomputeOptions {
                force_all: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(forced.succeeded, 1);
    }

    #[tokio::test]
    async fn test_full_pass_picks_up_stale_entries() {
        let f = fixture();
        let content_id = seed(&f, 1);

        f.job
            .run_full_pass(&RecomputeOptions::default())
            .await
            .unwrap();
        f.cache.mark_stale(content_id);

        let stats = f
            .job
            .run_full_pass(&RecomputeOptions::default())
            .await
            .unwrap();
        assert_eq!(stats.succeeded, 1);
        assert!(!f.cache.base_status(content_id).unwrap().stale);
    }

    #[tokio::test]
    async fn test_pass_is_idempotent() {
        let f = fixture();
        seed(&f, 2);

        let options = RecomputeOptions {
            force_all: true,
            ..Default::default()
        };
        f.job.run_full_pass(&options).await.unwrap();
        let len_after_first = f.cache.base_len();
        f.job.run_full_pass(&options).await.unwrap();

        // Overwrites, never accumulates
        assert_eq!(f.cache.base_len(), len_after_first);
    }

    #[tokio::test]
    async fn test_trending_pass_only_touches_recent_content() {
        let f = fixture();
        let recent = seed(&f, 2);
        let old = seed(&f, 100);

        let stats = f.job.run_trending_pass().await.unwrap();
        assert_eq!(stats.candidates, 1);
        assert!(f.cache.peek_base(recent).is_some());
        assert!(f.cache.peek_base(old).is_none());
    }

    #[tokio::test]
    async fn test_trending_pass_refreshes_component_only() {
        let f = fixture();
        let content_id = seed(&f, 2);

        f.job
            .run_full_pass(&RecomputeOptions::default())
            .await
            .unwrap();
        let before = f.cache.peek_base(content_id).unwrap();

        // New likes land inside the trending window
        for _ in 0..10 {
            f.interactions.append(InteractionEvent {
                viewer_id: Uuid::new_v4(),
                content_id,
                kind: InteractionKind::Like,
                occurred_at: Utc::now(),
            });
        }

        f.job.run_trending_pass().await.unwrap();
        let after = f.cache.peek_base(content_id).unwrap();

        assert!(after.components.trending > before.components.trending);
        assert!(after.final_score > before.final_score);
        // Recency was carried over, not recomputed
        assert!((after.components.recency - before.components.recency).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_cleanup_removes_dormant_old_content() {
        let f = fixture();
        let old_dormant = seed(&f, 24 * 200);
        let old_active = seed(&f, 24 * 200);
        let fresh = seed(&f, 1);

        f.job
            .run_full_pass(&RecomputeOptions {
                force_all: true,
                ..Default::default()
            })
            .await
            .unwrap();

        f.interactions.append(InteractionEvent {
            viewer_id: Uuid::new_v4(),
            content_id: old_active,
            kind: InteractionKind::Comment,
            occurred_at: Utc::now(),
        });

        let stats = f
            .job
            .run_cleanup(&CleanupOptions { retention_days: 90 })
            .await
            .unwrap();

        assert_eq!(stats.removed, 1);
        assert!(f.cache.peek_base(old_dormant).is_none());
        assert!(f.cache.peek_base(old_active).is_some());
        assert!(f.cache.peek_base(fresh).is_some());
    }

    #[tokio::test]
    async fn test_cleanup_evicts_rows_for_deleted_content() {
        let f = fixture();
        let content_id = seed(&f, 5);

        f.job
            .run_full_pass(&RecomputeOptions::default())
            .await
            .unwrap();
        f.content.remove(content_id);

        let stats = f
            .job
            .run_cleanup(&CleanupOptions { retention_days: 90 })
            .await
            .unwrap();
        assert_eq!(stats.removed, 1);
        assert_eq!(f.cache.base_len(), 0);
    }
}
