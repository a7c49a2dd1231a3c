use super::Result;
use crate::config::ScoringConfig;
use crate::models::{ContentMeta, InteractionKind, RankingScore, ScoreComponents};
use crate::store::{
    ContentProvider, InteractionStore, ReputationProvider, SocialGraphProvider,
};
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Deterministic feed ordering: final score descending, then newer
/// `created_at`, then lower content ID.
pub fn rank_ordering(
    a: (f64, DateTime<Utc>, Uuid),
    b: (f64, DateTime<Utc>, Uuid),
) -> Ordering {
    b.0.partial_cmp(&a.0)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.1.cmp(&a.1))
        .then_with(|| a.2.cmp(&b.2))
}

/// Composite relevance scorer.
pub struct ScoringEngine {
    config: ScoringConfig,
    content: Arc<dyn ContentProvider>,
    interactions: Arc<InteractionStore>,
    graph: Arc<dyn SocialGraphProvider>,
    reputation: Arc<dyn ReputationProvider>,
}

impl ScoringEngine {
    pub fn new(
        config: ScoringConfig,
        content: Arc<dyn ContentProvider>,
        interactions: Arc<InteractionStore>,
        graph: Arc<dyn SocialGraphProvider>,
        reputation: Arc<dyn ReputationProvider>,
    ) -> Self {
        Self {
            config,
            content,
            interactions,
            graph,
            reputation,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Weighted sum of all interaction counts. Unbounded; grows with raw
    /// popularity.
    pub fn engagement_score(&self, counts: &HashMap<InteractionKind, u64>) -> f64 {
        counts
            .iter()
            .map(|(kind, count)| self.config.interaction_weights.weight(*kind) * *count as f64)
            .sum()
    }

    /// Exponential decay from the configured baseline, halving every
    /// `recency_half_life_hours`.
    pub fn recency_score(&self, age_hours: f64) -> f64 {
        let age_hours = age_hours.max(0.0);
        self.config.recency_baseline
            * (-std::f64::consts::LN_2 * age_hours / self.config.recency_half_life_hours).exp()
    }

    /// Non-view interactions per view, with a floor of one view and a cap on
    /// the ratio so near-zero view counts cannot blow the score up.
    pub fn quality_score(&self, counts: &HashMap<InteractionKind, u64>) -> f64 {
        let views = counts.get(&InteractionKind::View).copied().unwrap_or(0);
        let non_view: u64 = counts
            .iter()
            .filter(|(kind, _)| **kind != InteractionKind::View)
            .map(|(_, count)| *count)
            .sum();

        (non_view as f64 / views.max(1) as f64).min(self.config.quality_cap)
    }

    /// Engagement velocity inside the trailing trending window, scaled down
    /// relative to all-time engagement so old viral posts fade.
    pub fn trending_component(&self, content_id: Uuid, now: DateTime<Utc>) -> f64 {
        let cutoff = now - Duration::hours(self.config.trending_window_hours);
        let windowed = self.interactions.counts_since(content_id, Some(cutoff));
        self.engagement_score(&windowed) * self.config.trending_scale
    }

    /// Recombine stored components into the final score using the fixed
    /// formula. `follow_boost` enters flat, the rest weighted.
    pub fn combine(&self, components: &ScoreComponents) -> f64 {
        let w = &self.config.weights;
        components.follow_boost
            + components.engagement * w.engagement
            + components.recency * w.recency
            + components.quality * w.quality
            + components.author_reputation * w.author_reputation
            + components.trending * w.trending
    }

    /// Non-personalized baseline score (follow boost zero).
    pub async fn compute_base(&self, content_id: Uuid) -> Result<RankingScore> {
        let meta = self.content.content_meta(content_id).await?;
        let components = self.compute_components(&meta, Utc::now()).await;
        Ok(self.assemble(content_id, None, components))
    }

    /// Personalized score: baseline components plus the follow boost when the
    /// viewer follows the content's author.
    pub async fn compute_for_viewer(
        &self,
        viewer_id: Uuid,
        content_id: Uuid,
    ) -> Result<RankingScore> {
        let following = self.graph.following(viewer_id).await?;
        self.compute_with_following(viewer_id, content_id, &following)
            .await
    }

    /// Personalized variant with a pre-fetched follow set, so feed assembly
    /// resolves the social graph once per request rather than per item.
    pub async fn compute_with_following(
        &self,
        viewer_id: Uuid,
        content_id: Uuid,
        following: &HashSet<Uuid>,
    ) -> Result<RankingScore> {
        let meta = self.content.content_meta(content_id).await?;
        let mut components = self.compute_components(&meta, Utc::now()).await;

        if following.contains(&meta.author_id) {
            components.follow_boost = self.config.weights.follow_boost;
        }

        Ok(self.assemble(content_id, Some(viewer_id), components))
    }

    async fn compute_components(&self, meta: &ContentMeta, now: DateTime<Utc>) -> ScoreComponents {
        let counts = self.interactions.counts(meta.content_id);
        let age_hours = (now - meta.created_at).num_seconds() as f64 / 3600.0;

        let author_reputation = match self.reputation.author_reputation(meta.author_id).await {
            Ok(Some(reputation)) => reputation.clamp(0.0, 1.0),
            Ok(None) => self.config.default_author_reputation,
            Err(e) => {
                warn!(
                    author_id = %meta.author_id,
                    error = %e,
                    "Reputation signal unavailable, using default"
                );
                self.config.default_author_reputation
            }
        };

        ScoreComponents {
            engagement: self.engagement_score(&counts),
            recency: self.recency_score(age_hours),
            quality: self.quality_score(&counts),
            author_reputation,
            trending: self.trending_component(meta.content_id, now),
            follow_boost: 0.0,
        }
    }

    fn assemble(
        &self,
        content_id: Uuid,
        viewer_id: Option<Uuid>,
        components: ScoreComponents,
    ) -> RankingScore {
        let final_score = self.combine(&components);

        debug!(
            content_id = %content_id,
            engagement = components.engagement,
            recency = components.recency,
            trending = components.trending,
            follow_boost = components.follow_boost,
            final_score = final_score,
            "Score computed"
        );

        RankingScore {
            content_id,
            viewer_id,
            components,
            final_score,
            computed_at: Utc::now(),
        }
    }
}
