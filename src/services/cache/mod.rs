/// Score Cache & Invalidation Layer
///
/// Holds the latest computed ranking scores with tiered expiry:
/// personalized overlays 5 minutes, base scores 10 minutes, trending-only
/// refreshes 30 minutes. Interaction events mark entries stale without
/// evicting them; a stale entry stays servable until it expires or a
/// scheduled pass overwrites it, which avoids thundering-herd recomputes.
///
/// A missing entry always means "needs computation", never "zero score" —
/// nothing is stored on a miss.
use crate::config::CacheConfig;
use crate::models::RankingScore;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

/// Which TTL tier a base row was written under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Base,
    /// Rows refreshed by the trending-only pass live longer.
    Trending,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    score: RankingScore,
    stored_at: DateTime<Utc>,
    ttl: Duration,
    stale: bool,
}

impl CacheEntry {
    fn new(score: RankingScore, ttl: Duration) -> Self {
        Self {
            score,
            stored_at: Utc::now(),
            ttl,
            stale: false,
        }
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.stored_at + self.ttl
    }
}

/// Freshness of a cached base row, used by the scheduler to order work.
#[derive(Debug, Clone, Copy)]
pub struct BaseStatus {
    pub computed_at: DateTime<Utc>,
    pub stale: bool,
    pub expired: bool,
}

pub struct ScoreCache {
    config: CacheConfig,
    base: DashMap<Uuid, CacheEntry>,
    personalized: DashMap<(Uuid, Uuid), CacheEntry>,
}

impl ScoreCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            base: DashMap::new(),
            personalized: DashMap::new(),
        }
    }

    fn ttl_secs(&self, tier: CacheTier) -> i64 {
        let secs = match tier {
            CacheTier::Base => self.config.base_ttl_secs,
            CacheTier::Trending => self.config.trending_ttl_secs,
        };
        secs as i64
    }

    /// Fresh base score, or `None` when absent or expired (either way the
    /// caller recomputes). Stale-but-unexpired entries are still served.
    pub fn get_base(&self, content_id: Uuid) -> Option<RankingScore> {
        self.get_base_at(content_id, Utc::now())
    }

    pub fn get_base_at(&self, content_id: Uuid, now: DateTime<Utc>) -> Option<RankingScore> {
        let entry = self.base.get(&content_id)?;
        if entry.is_expired_at(now) {
            return None;
        }
        Some(entry.score.clone())
    }

    /// Latest stored base row regardless of freshness. The trending pass
    /// reuses the unchanged components from here.
    pub fn peek_base(&self, content_id: Uuid) -> Option<RankingScore> {
        self.base.get(&content_id).map(|e| e.score.clone())
    }

    pub fn put_base(&self, score: RankingScore, tier: CacheTier) {
        let ttl = Duration::seconds(self.ttl_secs(tier));
        self.base
            .insert(score.content_id, CacheEntry::new(score, ttl));
    }

    pub fn get_personalized(&self, viewer_id: Uuid, content_id: Uuid) -> Option<RankingScore> {
        self.get_personalized_at(viewer_id, content_id, Utc::now())
    }

    pub fn get_personalized_at(
        &self,
        viewer_id: Uuid,
        content_id: Uuid,
        now: DateTime<Utc>,
    ) -> Option<RankingScore> {
        let entry = self.personalized.get(&(viewer_id, content_id))?;
        if entry.is_expired_at(now) {
            return None;
        }
        Some(entry.score.clone())
    }

    pub fn put_personalized(&self, viewer_id: Uuid, score: RankingScore) {
        let ttl = Duration::seconds(self.config.personalized_ttl_secs as i64);
        self.personalized
            .insert((viewer_id, score.content_id), CacheEntry::new(score, ttl));
    }

    /// Flag every entry for this content as stale without evicting. Called
    /// (fire-and-forget) when a new interaction lands.
    pub fn mark_stale(&self, content_id: Uuid) {
        if let Some(mut entry) = self.base.get_mut(&content_id) {
            entry.stale = true;
        }
        for mut entry in self.personalized.iter_mut() {
            if entry.key().1 == content_id {
                entry.stale = true;
            }
        }
        debug!(content_id = %content_id, "Cached scores marked stale");
    }

    pub fn base_status(&self, content_id: Uuid) -> Option<BaseStatus> {
        self.base_status_at(content_id, Utc::now())
    }

    pub fn base_status_at(&self, content_id: Uuid, now: DateTime<Utc>) -> Option<BaseStatus> {
        self.base.get(&content_id).map(|entry| BaseStatus {
            computed_at: entry.score.computed_at,
            stale: entry.stale,
            expired: entry.is_expired_at(now),
        })
    }

    /// Drop all rows for a content item. Used by the daily cleanup pass.
    pub fn evict_content(&self, content_id: Uuid) {
        self.base.remove(&content_id);
        self.personalized.retain(|key, _| key.1 != content_id);
    }

    /// Content IDs with a stored base row, whatever their freshness.
    pub fn cached_content_ids(&self) -> Vec<Uuid> {
        self.base.iter().map(|e| *e.key()).collect()
    }

    pub fn base_len(&self) -> usize {
        self.base.len()
    }

    pub fn personalized_len(&self) -> usize {
        self.personalized.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScoreComponents;

    fn score(content_id: Uuid, viewer_id: Option<Uuid>) -> RankingScore {
        RankingScore {
            content_id,
            viewer_id,
            components: ScoreComponents::default(),
            final_score: 1.0,
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn test_personalized_ttl_boundary() {
        let cache = ScoreCache::new(CacheConfig::default());
        let viewer = Uuid::new_v4();
        let content = Uuid::new_v4();

        cache.put_personalized(viewer, score(content, Some(viewer)));
        let written_at = Utc::now();

        // Servable one second before the 5-minute tier expires
        let just_before = written_at + Duration::seconds(4 * 60 + 59);
        assert!(cache
            .get_personalized_at(viewer, content, just_before)
            .is_some());

        // Needs recomputation one second after
        let just_after = written_at + Duration::seconds(5 * 60 + 1);
        assert!(cache
            .get_personalized_at(viewer, content, just_after)
            .is_none());
    }

    #[test]
    fn test_base_and_trending_tiers() {
        let cache = ScoreCache::new(CacheConfig::default());
        let base_id = Uuid::new_v4();
        let trending_id = Uuid::new_v4();

        cache.put_base(score(base_id, None), CacheTier::Base);
        cache.put_base(score(trending_id, None), CacheTier::Trending);

        let at_20m = Utc::now() + Duration::minutes(20);
        assert!(cache.get_base_at(base_id, at_20m).is_none());
        assert!(cache.get_base_at(trending_id, at_20m).is_some());

        let at_31m = Utc::now() + Duration::minutes(31);
        assert!(cache.get_base_at(trending_id, at_31m).is_none());
    }

    #[test]
    fn test_stale_entries_stay_servable() {
        let cache = ScoreCache::new(CacheConfig::default());
        let viewer = Uuid::new_v4();
        let content = Uuid::new_v4();

        cache.put_base(score(content, None), CacheTier::Base);
        cache.put_personalized(viewer, score(content, Some(viewer)));
        cache.mark_stale(content);

        // Stale but unexpired entries are still returned
        assert!(cache.get_base(content).is_some());
        assert!(cache.get_personalized(viewer, content).is_some());

        let status = cache.base_status(content).unwrap();
        assert!(status.stale);
        assert!(!status.expired);
    }

    #[test]
    fn test_miss_is_not_negative_cached() {
        let cache = ScoreCache::new(CacheConfig::default());
        let content = Uuid::new_v4();

        assert!(cache.get_base(content).is_none());
        // Reading a miss writes nothing
        assert_eq!(cache.base_len(), 0);
        assert!(cache.base_status(content).is_none());
    }

    #[test]
    fn test_evict_content_clears_overlays() {
        let cache = ScoreCache::new(CacheConfig::default());
        let content = Uuid::new_v4();
        let viewer_a = Uuid::new_v4();
        let viewer_b = Uuid::new_v4();

        cache.put_base(score(content, None), CacheTier::Base);
        cache.put_personalized(viewer_a, score(content, Some(viewer_a)));
        cache.put_personalized(viewer_b, score(content, Some(viewer_b)));

        cache.evict_content(content);
        assert_eq!(cache.base_len(), 0);
        assert_eq!(cache.personalized_len(), 0);
    }
}
