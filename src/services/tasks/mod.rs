/// Task Dispatch
///
/// The recorder must never block its caller on cache bookkeeping, so
/// invalidation signals go through a `TaskRunner` capability. Two
/// implementations exist: a queue-backed runner that hands work to a
/// dedicated worker task, and an inline runner that applies it on the
/// caller's task. The queue runner degrades to inline execution if its
/// worker is gone, so call sites never crash on a missing backend.
use crate::config::TaskRunnerMode;
use crate::services::cache::ScoreCache;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub enum EngineTask {
    /// Flag cached scores for a content item as stale.
    MarkStale(Uuid),
}

fn apply(cache: &ScoreCache, task: EngineTask) {
    match task {
        EngineTask::MarkStale(content_id) => cache.mark_stale(content_id),
    }
}

pub trait TaskRunner: Send + Sync {
    /// Fire-and-forget; must not block on recomputation.
    fn dispatch(&self, task: EngineTask);
}

/// Applies tasks synchronously on the caller's task. Marking entries stale
/// is a flag write, so inline execution is still non-blocking in practice.
pub struct InlineTaskRunner {
    cache: Arc<ScoreCache>,
}

impl InlineTaskRunner {
    pub fn new(cache: Arc<ScoreCache>) -> Self {
        Self { cache }
    }
}

impl TaskRunner for InlineTaskRunner {
    fn dispatch(&self, task: EngineTask) {
        apply(&self.cache, task);
    }
}

/// Queue-backed runner: tasks go over an unbounded channel to a worker task
/// spawned at construction. If the worker has shut down, dispatch falls back
/// to inline execution rather than dropping the signal.
pub struct QueueTaskRunner {
    tx: mpsc::UnboundedSender<EngineTask>,
    cache: Arc<ScoreCache>,
}

impl QueueTaskRunner {
    /// Must be called from within a tokio runtime.
    pub fn new(cache: Arc<ScoreCache>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<EngineTask>();
        let worker_cache = cache.clone();

        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                apply(&worker_cache, task);
            }
            debug!("Task runner worker stopped");
        });

        Self { tx, cache }
    }
}

impl TaskRunner for QueueTaskRunner {
    fn dispatch(&self, task: EngineTask) {
        if let Err(e) = self.tx.send(task) {
            warn!(error = %e, "Task queue unavailable, applying inline");
            apply(&self.cache, e.0);
        }
    }
}

/// Select a runner from configuration.
pub fn build_runner(mode: TaskRunnerMode, cache: Arc<ScoreCache>) -> Arc<dyn TaskRunner> {
    match mode {
        TaskRunnerMode::Queue => Arc::new(QueueTaskRunner::new(cache)),
        TaskRunnerMode::Inline => Arc::new(InlineTaskRunner::new(cache)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::models::{RankingScore, ScoreComponents};
    use chrono::Utc;
    use std::time::Duration;

    fn cache_with_entry(content_id: Uuid) -> Arc<ScoreCache> {
        let cache = Arc::new(ScoreCache::new(CacheConfig::default()));
        cache.put_base(
            RankingScore {
                content_id,
                viewer_id: None,
                components: ScoreComponents::default(),
                final_score: 1.0,
                computed_at: Utc::now(),
            },
            crate::services::cache::CacheTier::Base,
        );
        cache
    }

    #[test]
    fn test_inline_runner_marks_stale() {
        let content_id = Uuid::new_v4();
        let cache = cache_with_entry(content_id);
        let runner = InlineTaskRunner::new(cache.clone());

        runner.dispatch(EngineTask::MarkStale(content_id));
        assert!(cache.base_status(content_id).unwrap().stale);
    }

    #[tokio::test]
    async fn test_queue_runner_marks_stale() {
        let content_id = Uuid::new_v4();
        let cache = cache_with_entry(content_id);
        let runner = QueueTaskRunner::new(cache.clone());

        runner.dispatch(EngineTask::MarkStale(content_id));

        // The worker runs on its own task; poll briefly for the flag.
        for _ in 0..50 {
            if cache
                .base_status(content_id)
                .map(|s| s.stale)
                .unwrap_or(false)
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("queue runner never applied the staleness mark");
    }
}
