/// Interest Profile Builder
///
/// Maintains per-viewer decaying affinity maps over topics and authors.
/// Each new interaction bumps the affinities for the content's topics and
/// author by the interaction's weight, then decays every existing affinity
/// multiplicatively so old interests fade. Affinities never go negative.
///
/// Profiles do not enter the final score; feed assembly reads them to bias
/// optional re-ranking and filtering.
use crate::config::{EngagementWeights, InterestConfig};
use crate::models::{ContentMeta, InteractionEvent};
use crate::store::{ContentProvider, InteractionStore};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestProfile {
    pub viewer_id: Uuid,
    pub topic_affinity: HashMap<String, f64>,
    pub author_affinity: HashMap<Uuid, f64>,
    pub updated_at: DateTime<Utc>,
    /// When this profile was last built from scratch; drives the rebuild TTL.
    pub built_at: DateTime<Utc>,
}

impl InterestProfile {
    fn empty(viewer_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            viewer_id,
            topic_affinity: HashMap::new(),
            author_affinity: HashMap::new(),
            updated_at: now,
            built_at: now,
        }
    }
}

/// Top-N slice of a profile, returned alongside smart feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestSummary {
    pub top_topics: Vec<(String, f64)>,
    pub top_authors: Vec<(Uuid, f64)>,
}

pub struct InterestProfileBuilder {
    config: InterestConfig,
    weights: EngagementWeights,
    profile_ttl: Duration,
    interactions: Arc<InteractionStore>,
    content: Arc<dyn ContentProvider>,
    profiles: DashMap<Uuid, InterestProfile>,
}

impl InterestProfileBuilder {
    pub fn new(
        config: InterestConfig,
        weights: EngagementWeights,
        profile_ttl_secs: u64,
        interactions: Arc<InteractionStore>,
        content: Arc<dyn ContentProvider>,
    ) -> Self {
        Self {
            config,
            weights,
            profile_ttl: Duration::seconds(profile_ttl_secs as i64),
            interactions,
            content,
            profiles: DashMap::new(),
        }
    }

    /// Incrementally fold one interaction into the viewer's profile.
    pub fn apply_event(&self, event: &InteractionEvent, meta: &ContentMeta) {
        let mut profile = self
            .profiles
            .entry(event.viewer_id)
            .or_insert_with(|| InterestProfile::empty(event.viewer_id));
        self.fold(&mut profile, event, meta);
    }

    fn fold(&self, profile: &mut InterestProfile, event: &InteractionEvent, meta: &ContentMeta) {
        // Decay existing affinities first so the new signal enters at full
        // weight.
        for affinity in profile.topic_affinity.values_mut() {
            *affinity *= self.config.decay_factor;
        }
        for affinity in profile.author_affinity.values_mut() {
            *affinity *= self.config.decay_factor;
        }

        let weight = self.weights.weight(event.kind).max(0.0);
        for topic in &meta.topics {
            *profile.topic_affinity.entry(topic.clone()).or_insert(0.0) += weight;
        }
        *profile
            .author_affinity
            .entry(meta.author_id)
            .or_insert(0.0) += weight;

        profile
            .topic_affinity
            .retain(|_, affinity| *affinity >= self.config.min_affinity);
        profile
            .author_affinity
            .retain(|_, affinity| *affinity >= self.config.min_affinity);

        trim_to_top(&mut profile.topic_affinity, self.config.max_affinities);
        trim_to_top(&mut profile.author_affinity, self.config.max_affinities);

        profile.updated_at = event.occurred_at;
    }

    /// Current profile for a viewer. Absent or expired profiles are rebuilt
    /// from the event log.
    pub async fn profile(&self, viewer_id: Uuid) -> InterestProfile {
        let needs_rebuild = match self.profiles.get(&viewer_id) {
            Some(profile) => Utc::now() - profile.built_at >= self.profile_ttl,
            None => true,
        };

        if needs_rebuild {
            let rebuilt = self.rebuild(viewer_id).await;
            self.profiles.insert(viewer_id, rebuilt);
        }

        self.profiles
            .get(&viewer_id)
            .map(|p| p.clone())
            .unwrap_or_else(|| InterestProfile::empty(viewer_id))
    }

    async fn rebuild(&self, viewer_id: Uuid) -> InterestProfile {
        let mut profile = InterestProfile::empty(viewer_id);
        let events = self.interactions.events_by_viewer(viewer_id);
        let mut folded = 0usize;

        for event in &events {
            // Content the store no longer knows about contributes nothing.
            if let Ok(meta) = self.content.content_meta(event.content_id).await {
                self.fold(&mut profile, event, &meta);
                folded += 1;
            }
        }

        profile.built_at = Utc::now();
        debug!(
            viewer_id = %viewer_id,
            events = events.len(),
            folded = folded,
            "Interest profile rebuilt"
        );
        profile
    }

    /// Top-N topics and authors for feed responses.
    pub fn summarize(&self, profile: &InterestProfile) -> InterestSummary {
        InterestSummary {
            top_topics: top_n(&profile.topic_affinity, self.config.summary_size),
            top_authors: top_n(&profile.author_affinity, self.config.summary_size),
        }
    }
}

fn trim_to_top<K: Clone + std::hash::Hash + Eq>(map: &mut HashMap<K, f64>, max: usize) {
    if map.len() <= max {
        return;
    }
    let mut entries: Vec<(K, f64)> = map.drain().collect();
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    entries.truncate(max);
    map.extend(entries);
}

fn top_n<K: Clone + std::hash::Hash + Eq>(map: &HashMap<K, f64>, n: usize) -> Vec<(K, f64)> {
    let mut entries: Vec<(K, f64)> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    entries.truncate(n);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InteractionKind;
    use crate::store::InMemoryContentStore;

    fn builder() -> (InterestProfileBuilder, Arc<InMemoryContentStore>, Arc<InteractionStore>) {
        let interactions = Arc::new(InteractionStore::new());
        let content = Arc::new(InMemoryContentStore::new());
        let builder = InterestProfileBuilder::new(
            InterestConfig::default(),
            EngagementWeights::default(),
            21600,
            interactions.clone(),
            content.clone(),
        );
        (builder, content, interactions)
    }

    fn meta(author_id: Uuid, topics: &[&str]) -> ContentMeta {
        ContentMeta {
            content_id: Uuid::new_v4(),
            author_id,
            created_at: Utc::now(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn event(viewer: Uuid, content: Uuid, kind: InteractionKind) -> InteractionEvent {
        InteractionEvent {
            viewer_id: viewer,
            content_id: content,
            kind,
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_affinities_grow_with_interactions() {
        let (builder, _, _) = builder();
        let viewer = Uuid::new_v4();
        let author = Uuid::new_v4();
        let m = meta(author, &["ai", "devtools"]);

        builder.apply_event(&event(viewer, m.content_id, InteractionKind::Like), &m);

        let profile = builder.profile(viewer).await;
        assert_eq!(profile.topic_affinity.get("ai"), Some(&1.0));
        assert_eq!(profile.topic_affinity.get("devtools"), Some(&1.0));
        assert_eq!(profile.author_affinity.get(&author), Some(&1.0));
    }

    #[tokio::test]
    async fn test_existing_affinities_decay_on_update() {
        let (builder, _, _) = builder();
        let viewer = Uuid::new_v4();
        let ai_meta = meta(Uuid::new_v4(), &["ai"]);
        let biotech_meta = meta(Uuid::new_v4(), &["biotech"]);

        builder.apply_event(&event(viewer, ai_meta.content_id, InteractionKind::Like), &ai_meta);
        builder.apply_event(
            &event(viewer, biotech_meta.content_id, InteractionKind::Like),
            &biotech_meta,
        );

        let profile = builder.profile(viewer).await;
        // First topic decayed once, second entered at full weight
        assert!((profile.topic_affinity["ai"] - 0.98).abs() < 1e-9);
        assert!((profile.topic_affinity["biotech"] - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_affinities_never_negative() {
        let (builder, _, _) = builder();
        let viewer = Uuid::new_v4();
        let m = meta(Uuid::new_v4(), &["gaming"]);

        for _ in 0..200 {
            builder.apply_event(&event(viewer, m.content_id, InteractionKind::View), &m);
        }

        let profile = builder.profile(viewer).await;
        for affinity in profile.topic_affinity.values() {
            assert!(*affinity >= 0.0);
        }
    }

    #[tokio::test]
    async fn test_comment_weighs_more_than_like() {
        let (builder, _, _) = builder();
        let liker = Uuid::new_v4();
        let commenter = Uuid::new_v4();
        let m = meta(Uuid::new_v4(), &["climate"]);

        builder.apply_event(&event(liker, m.content_id, InteractionKind::Like), &m);
        builder.apply_event(&event(commenter, m.content_id, InteractionKind::Comment), &m);

        let like_profile = builder.profile(liker).await;
        let comment_profile = builder.profile(commenter).await;
        assert!(
            comment_profile.topic_affinity["climate"] > like_profile.topic_affinity["climate"]
        );
    }

    #[tokio::test]
    async fn test_rebuild_from_event_log() {
        let (builder, content, interactions) = builder();
        let viewer = Uuid::new_v4();
        let author = Uuid::new_v4();
        let m = meta(author, &["spacetech"]);
        content.insert(m.clone());

        // Events landed in the store without going through apply_event
        interactions.append(event(viewer, m.content_id, InteractionKind::Share));

        let profile = builder.profile(viewer).await;
        assert_eq!(profile.topic_affinity.get("spacetech"), Some(&5.0));
        assert_eq!(profile.author_affinity.get(&author), Some(&5.0));
    }

    #[tokio::test]
    async fn test_summary_orders_by_affinity() {
        let (builder, _, _) = builder();
        let viewer = Uuid::new_v4();
        let strong = meta(Uuid::new_v4(), &["ai"]);
        let weak = meta(Uuid::new_v4(), &["gaming"]);

        builder.apply_event(&event(viewer, strong.content_id, InteractionKind::Share), &strong);
        builder.apply_event(&event(viewer, weak.content_id, InteractionKind::View), &weak);

        let profile = builder.profile(viewer).await;
        let summary = builder.summarize(&profile);
        assert_eq!(summary.top_topics[0].0, "ai");
    }
}
