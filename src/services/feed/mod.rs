/// Feed Assembler
///
/// Read path of the engine: merges cached scores with live recomputation
/// (cache-aside), applies request filters, orders deterministically and
/// paginates with a write-stable cursor.
///
/// Feeds never hard-fail on ranking trouble: an item whose score cannot be
/// computed is served on plain recency, and a page where every item degraded
/// is flagged as fallback ordering.
use crate::config::FeedConfig;
use crate::models::{ContentMeta, FeedCursor, FeedEntry, RankingScore};
use crate::services::cache::ScoreCache;
use crate::services::interest::{InterestProfile, InterestProfileBuilder, InterestSummary};
use crate::services::scoring::{rank_ordering, ScoringEngine};
use crate::store::{ContentProvider, InteractionStore, SocialGraphProvider, StoreError};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("content listing unavailable: {0}")]
    ContentUnavailable(#[from] StoreError),

    #[error("invalid feed request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, FeedError>;

/// Pagination portion of a feed request. When a cursor is present it wins
/// over the page number, since only cursors are stable under concurrent
/// writes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedRequest {
    /// 1-based; 0 is treated as 1.
    pub page: usize,
    /// 0 means the configured default.
    pub page_size: usize,
    pub cursor: Option<String>,
}

/// Optional filters for smart feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedFilters {
    pub boost_followed: bool,
    pub topics: Vec<String>,
    pub exclude_seen: bool,
}

impl Default for FeedFilters {
    fn default() -> Self {
        Self {
            boost_followed: true,
            topics: Vec::new(),
            exclude_seen: false,
        }
    }
}

/// Which factors went into the served ordering, for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmInfo {
    pub factors: Vec<String>,
    pub personalized: bool,
    /// True when every entry degraded to recency-only ordering.
    pub recency_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPage {
    pub entries: Vec<FeedEntry>,
    pub page: usize,
    pub page_size: usize,
    pub next_cursor: Option<String>,
    pub algorithm_info: AlgorithmInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartFeedPage {
    pub entries: Vec<FeedEntry>,
    pub page: usize,
    pub page_size: usize,
    pub next_cursor: Option<String>,
    pub interests: InterestSummary,
    pub applied_filters: FeedFilters,
    pub algorithm_info: AlgorithmInfo,
}

/// One scored candidate before pagination.
struct Ranked {
    entry: FeedEntry,
    created_at: DateTime<Utc>,
    /// Request-scoped ordering score; may differ from the stored score when
    /// boost is disabled or interest bias applies.
    sort_score: f64,
    degraded: bool,
}

pub struct FeedAssembler {
    config: FeedConfig,
    engine: Arc<ScoringEngine>,
    cache: Arc<ScoreCache>,
    content: Arc<dyn ContentProvider>,
    graph: Arc<dyn SocialGraphProvider>,
    interactions: Arc<InteractionStore>,
    profiles: Arc<InterestProfileBuilder>,
}

impl FeedAssembler {
    pub fn new(
        config: FeedConfig,
        engine: Arc<ScoringEngine>,
        cache: Arc<ScoreCache>,
        content: Arc<dyn ContentProvider>,
        graph: Arc<dyn SocialGraphProvider>,
        interactions: Arc<InteractionStore>,
        profiles: Arc<InterestProfileBuilder>,
    ) -> Self {
        Self {
            config,
            engine,
            cache,
            content,
            graph,
            interactions,
            profiles,
        }
    }

    /// Personalized ranked feed with default filters (follow boost on).
    pub async fn ranked_feed(&self, viewer_id: Uuid, request: FeedRequest) -> Result<FeedPage> {
        let filters = FeedFilters::default();
        let (entries, page, page_size, next_cursor, info) =
            self.assemble(viewer_id, &request, &filters, None).await?;

        Ok(FeedPage {
            entries,
            page,
            page_size,
            next_cursor,
            algorithm_info: info,
        })
    }

    /// Filtered feed biased by the viewer's interest profile; echoes the
    /// applied filters and a profile summary.
    pub async fn smart_feed(
        &self,
        viewer_id: Uuid,
        request: FeedRequest,
        filters: FeedFilters,
    ) -> Result<SmartFeedPage> {
        let profile = self.profiles.profile(viewer_id).await;
        let summary = self.profiles.summarize(&profile);

        let (entries, page, page_size, next_cursor, info) = self
            .assemble(viewer_id, &request, &filters, Some(&profile))
            .await?;

        Ok(SmartFeedPage {
            entries,
            page,
            page_size,
            next_cursor,
            interests: summary,
            applied_filters: filters,
            algorithm_info: info,
        })
    }

    async fn assemble(
        &self,
        viewer_id: Uuid,
        request: &FeedRequest,
        filters: &FeedFilters,
        profile: Option<&InterestProfile>,
    ) -> Result<(Vec<FeedEntry>, usize, usize, Option<String>, AlgorithmInfo)> {
        let page = request.page.max(1);
        let page_size = match request.page_size {
            0 => self.config.default_page_size,
            n => n.min(self.config.max_page_size),
        };
        let cursor = match &request.cursor {
            Some(token) => Some(
                FeedCursor::from_token(token)
                    .ok_or_else(|| FeedError::InvalidRequest("malformed cursor".to_string()))?,
            ),
            None => None,
        };

        let content_ids = self.content.list_content_ids().await?;

        // The social graph is resolved once per request; an unavailable
        // graph degrades to no boost rather than failing the feed.
        let following = match self.graph.following(viewer_id).await {
            Ok(set) => set,
            Err(e) => {
                warn!(viewer_id = %viewer_id, error = %e, "Social graph unavailable, no follow boost");
                HashSet::new()
            }
        };

        let seen = if filters.exclude_seen {
            self.interactions.viewed_content(viewer_id)
        } else {
            HashSet::new()
        };

        let candidates = join_all(content_ids.into_iter().map(|content_id| {
            self.rank_one(viewer_id, content_id, filters, profile, &following, &seen)
        }))
        .await;

        let mut ranked: Vec<Ranked> = candidates.into_iter().flatten().collect();
        let total = ranked.len();
        let degraded = ranked.iter().filter(|r| r.degraded).count();

        ranked.sort_by(|a, b| {
            rank_ordering(
                (a.sort_score, a.created_at, a.entry.content_id),
                (b.sort_score, b.created_at, b.entry.content_id),
            )
        });

        let page_items: Vec<&Ranked> = match cursor {
            Some(cursor) => ranked
                .iter()
                .filter(|r| {
                    rank_ordering(
                        (r.sort_score, r.created_at, r.entry.content_id),
                        (cursor.score, cursor.created_at, cursor.content_id),
                    ) == std::cmp::Ordering::Greater
                })
                .take(page_size)
                .collect(),
            None => ranked
                .iter()
                .skip((page - 1) * page_size)
                .take(page_size)
                .collect(),
        };

        let next_cursor = page_items.last().map(|last| {
            FeedCursor {
                score: last.sort_score,
                created_at: last.created_at,
                content_id: last.entry.content_id,
            }
            .to_token()
        });

        let mut factors = vec![
            "engagement".to_string(),
            "recency".to_string(),
            "quality".to_string(),
            "author_reputation".to_string(),
            "trending".to_string(),
        ];
        if filters.boost_followed {
            factors.push("follow_boost".to_string());
        }
        if profile.is_some() {
            factors.push("interest_bias".to_string());
        }

        let info = AlgorithmInfo {
            factors,
            personalized: true,
            recency_fallback: total > 0 && degraded == total,
        };

        debug!(
            viewer_id = %viewer_id,
            candidates = total,
            served = page_items.len(),
            degraded = degraded,
            page = page,
            "Feed page assembled"
        );

        let entries = page_items.into_iter().map(|r| r.entry.clone()).collect();
        Ok((entries, page, page_size, next_cursor, info))
    }

    /// Score one candidate cache-aside; never fails, degrading to recency.
    async fn rank_one(
        &self,
        viewer_id: Uuid,
        content_id: Uuid,
        filters: &FeedFilters,
        profile: Option<&InterestProfile>,
        following: &HashSet<Uuid>,
        seen: &HashSet<Uuid>,
    ) -> Option<Ranked> {
        if seen.contains(&content_id) {
            return None;
        }

        let meta = match self.content.content_meta(content_id).await {
            Ok(meta) => meta,
            // Listed but no longer resolvable: visibility is upstream's
            // call, so the item is simply not served.
            Err(_) => return None,
        };

        if !filters.topics.is_empty()
            && !meta.topics.iter().any(|t| filters.topics.contains(t))
        {
            return None;
        }

        let (score, degraded) = self.personalized_score(viewer_id, content_id, &meta, following).await;

        // Request-scoped adjustments never touch the stored row.
        let mut components = score.components;
        if !filters.boost_followed {
            components.follow_boost = 0.0;
        }
        let mut sort_score = self.engine.combine(&components);
        if let Some(profile) = profile {
            sort_score += self.interest_bonus(profile, &meta);
        }

        Some(Ranked {
            entry: FeedEntry {
                content_id,
                score: self.engine.combine(&components),
                components,
            },
            created_at: meta.created_at,
            sort_score,
            degraded,
        })
    }

    /// Cache-aside personalized score; a compute failure yields a
    /// recency-only stand-in so the feed stays available.
    async fn personalized_score(
        &self,
        viewer_id: Uuid,
        content_id: Uuid,
        meta: &ContentMeta,
        following: &HashSet<Uuid>,
    ) -> (RankingScore, bool) {
        if let Some(cached) = self.cache.get_personalized(viewer_id, content_id) {
            return (cached, false);
        }

        match self
            .engine
            .compute_with_following(viewer_id, content_id, following)
            .await
        {
            Ok(score) => {
                self.cache.put_personalized(viewer_id, score.clone());
                (score, false)
            }
            Err(e) => {
                warn!(
                    content_id = %content_id,
                    error = %e,
                    "Score computation failed, serving recency-only"
                );
                let age_hours =
                    (Utc::now() - meta.created_at).num_seconds() as f64 / 3600.0;
                let mut components = crate::models::ScoreComponents::default();
                components.recency = self.engine.recency_score(age_hours);
                let final_score = self.engine.combine(&components);
                (
                    RankingScore {
                        content_id,
                        viewer_id: Some(viewer_id),
                        components,
                        final_score,
                        computed_at: Utc::now(),
                    },
                    true,
                )
            }
        }
    }

    /// Bounded affinity bonus from the viewer's interest profile, applied at
    /// assembly time only.
    fn interest_bonus(&self, profile: &InterestProfile, meta: &ContentMeta) -> f64 {
        let topic_affinity: f64 = meta
            .topics
            .iter()
            .filter_map(|topic| profile.topic_affinity.get(topic))
            .sum();
        let author_affinity = profile
            .author_affinity
            .get(&meta.author_id)
            .copied()
            .unwrap_or(0.0);

        (topic_affinity + author_affinity).min(10.0) * self.config.interest_bonus_weight
    }
}
