/// Storage Seams
///
/// The engine consumes read-only views of collaborator data (content
/// metadata, follow edges, author reputation) through provider traits, and
/// owns the append-only interaction event log. In-memory implementations
/// back the daemon form and the test suite; any representation satisfying
/// the same contracts is conformant.
use crate::models::{ContentMeta, InteractionEvent, InteractionKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("content not found: {0}")]
    ContentNotFound(Uuid),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Read-only view of the external content store.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn content_meta(&self, content_id: Uuid) -> Result<ContentMeta>;

    /// All content IDs visible to the engine, in no particular order.
    async fn list_content_ids(&self) -> Result<Vec<Uuid>>;
}

/// Read-only view of the external social graph.
#[async_trait]
pub trait SocialGraphProvider: Send + Sync {
    async fn following(&self, viewer_id: Uuid) -> Result<HashSet<Uuid>>;
}

/// Read-only view of the external author-reputation signal.
#[async_trait]
pub trait ReputationProvider: Send + Sync {
    /// Normalized reputation in [0, 1]; `None` when the signal is absent.
    async fn author_reputation(&self, author_id: Uuid) -> Result<Option<f64>>;
}

/// In-memory content view, used by the daemon wiring and tests.
#[derive(Default)]
pub struct InMemoryContentStore {
    items: DashMap<Uuid, ContentMeta>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, meta: ContentMeta) {
        self.items.insert(meta.content_id, meta);
    }

    pub fn remove(&self, content_id: Uuid) {
        self.items.remove(&content_id);
    }
}

#[async_trait]
impl ContentProvider for InMemoryContentStore {
    async fn content_meta(&self, content_id: Uuid) -> Result<ContentMeta> {
        self.items
            .get(&content_id)
            .map(|e| e.value().clone())
            .ok_or(StoreError::ContentNotFound(content_id))
    }

    async fn list_content_ids(&self) -> Result<Vec<Uuid>> {
        Ok(self.items.iter().map(|e| *e.key()).collect())
    }
}

#[derive(Default)]
pub struct InMemorySocialGraph {
    edges: DashMap<Uuid, HashSet<Uuid>>,
}

impl InMemorySocialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn follow(&self, follower_id: Uuid, followed_id: Uuid) {
        self.edges.entry(follower_id).or_default().insert(followed_id);
    }

    pub fn unfollow(&self, follower_id: Uuid, followed_id: Uuid) {
        if let Some(mut set) = self.edges.get_mut(&follower_id) {
            set.remove(&followed_id);
        }
    }
}

#[async_trait]
impl SocialGraphProvider for InMemorySocialGraph {
    async fn following(&self, viewer_id: Uuid) -> Result<HashSet<Uuid>> {
        Ok(self
            .edges
            .get(&viewer_id)
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryReputation {
    scores: DashMap<Uuid, f64>,
}

impl InMemoryReputation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, author_id: Uuid, reputation: f64) {
        self.scores.insert(author_id, reputation.clamp(0.0, 1.0));
    }
}

#[async_trait]
impl ReputationProvider for InMemoryReputation {
    async fn author_reputation(&self, author_id: Uuid) -> Result<Option<f64>> {
        Ok(self.scores.get(&author_id).map(|e| *e.value()))
    }
}

/// Append-only interaction event log, indexed by content for scoring and by
/// viewer for seen-exclusion. Events are independent, so concurrent appends
/// from many viewers need no cross-viewer coordination.
#[derive(Default)]
pub struct InteractionStore {
    by_content: DashMap<Uuid, Vec<InteractionEvent>>,
    views_by_viewer: DashMap<Uuid, HashSet<Uuid>>,
}

impl InteractionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, event: InteractionEvent) {
        if event.kind == InteractionKind::View {
            self.views_by_viewer
                .entry(event.viewer_id)
                .or_default()
                .insert(event.content_id);
        }
        self.by_content
            .entry(event.content_id)
            .or_default()
            .push(event);
    }

    /// All-time interaction counts per kind for a content item.
    pub fn counts(&self, content_id: Uuid) -> HashMap<InteractionKind, u64> {
        self.counts_since(content_id, None)
    }

    /// Interaction counts per kind, restricted to events at or after `cutoff`.
    pub fn counts_since(
        &self,
        content_id: Uuid,
        cutoff: Option<DateTime<Utc>>,
    ) -> HashMap<InteractionKind, u64> {
        let mut counts = HashMap::new();
        if let Some(events) = self.by_content.get(&content_id) {
            for event in events.iter() {
                if let Some(cutoff) = cutoff {
                    if event.occurred_at < cutoff {
                        continue;
                    }
                }
                *counts.entry(event.kind).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn has_viewed(&self, viewer_id: Uuid, content_id: Uuid) -> bool {
        self.views_by_viewer
            .get(&viewer_id)
            .map(|seen| seen.contains(&content_id))
            .unwrap_or(false)
    }

    /// Content IDs the viewer has generated a view event for.
    pub fn viewed_content(&self, viewer_id: Uuid) -> HashSet<Uuid> {
        self.views_by_viewer
            .get(&viewer_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    /// All events a viewer has generated, newest last. Used when rebuilding
    /// interest profiles.
    pub fn events_by_viewer(&self, viewer_id: Uuid) -> Vec<InteractionEvent> {
        let mut events: Vec<InteractionEvent> = self
            .by_content
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|e| e.viewer_id == viewer_id)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        events.sort_by_key(|e| e.occurred_at);
        events
    }

    pub fn last_interaction_at(&self, content_id: Uuid) -> Option<DateTime<Utc>> {
        self.by_content
            .get(&content_id)
            .and_then(|events| events.iter().map(|e| e.occurred_at).max())
    }

    /// Content that has seen at least one interaction at or after `cutoff`.
    pub fn content_interacted_since(&self, cutoff: DateTime<Utc>) -> HashSet<Uuid> {
        self.by_content
            .iter()
            .filter(|entry| entry.value().iter().any(|e| e.occurred_at >= cutoff))
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.by_content.iter().map(|e| e.value().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(viewer: Uuid, content: Uuid, kind: InteractionKind) -> InteractionEvent {
        InteractionEvent {
            viewer_id: viewer,
            content_id: content,
            kind,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn test_counts_by_kind() {
        let store = InteractionStore::new();
        let content = Uuid::new_v4();

        store.append(event(Uuid::new_v4(), content, InteractionKind::Like));
        store.append(event(Uuid::new_v4(), content, InteractionKind::Like));
        store.append(event(Uuid::new_v4(), content, InteractionKind::Comment));

        let counts = store.counts(content);
        assert_eq!(counts.get(&InteractionKind::Like), Some(&2));
        assert_eq!(counts.get(&InteractionKind::Comment), Some(&1));
        assert_eq!(counts.get(&InteractionKind::Share), None);
    }

    #[test]
    fn test_counts_since_cutoff() {
        let store = InteractionStore::new();
        let content = Uuid::new_v4();
        let viewer = Uuid::new_v4();

        let old = InteractionEvent {
            viewer_id: viewer,
            content_id: content,
            kind: InteractionKind::Like,
            occurred_at: Utc::now() - chrono::Duration::hours(72),
        };
        store.append(old);
        store.append(event(viewer, content, InteractionKind::Like));

        let cutoff = Utc::now() - chrono::Duration::hours(48);
        let windowed = store.counts_since(content, Some(cutoff));
        assert_eq!(windowed.get(&InteractionKind::Like), Some(&1));

        let all_time = store.counts(content);
        assert_eq!(all_time.get(&InteractionKind::Like), Some(&2));
    }

    #[test]
    fn test_viewed_content_index() {
        let store = InteractionStore::new();
        let viewer = Uuid::new_v4();
        let seen = Uuid::new_v4();
        let unseen = Uuid::new_v4();

        store.append(event(viewer, seen, InteractionKind::View));
        store.append(event(viewer, unseen, InteractionKind::Like));

        assert!(store.has_viewed(viewer, seen));
        // Non-view interactions do not mark content as seen
        assert!(!store.has_viewed(viewer, unseen));
        assert_eq!(store.viewed_content(viewer).len(), 1);
    }

    #[tokio::test]
    async fn test_social_graph_provider() {
        let graph = InMemorySocialGraph::new();
        let follower = Uuid::new_v4();
        let followed = Uuid::new_v4();

        graph.follow(follower, followed);
        let set = graph.following(follower).await.unwrap();
        assert!(set.contains(&followed));

        graph.unfollow(follower, followed);
        let set = graph.following(follower).await.unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_reputation_clamped() {
        let reputation = InMemoryReputation::new();
        let author = Uuid::new_v4();

        reputation.set(author, 1.7);
        assert_eq!(reputation.author_reputation(author).await.unwrap(), Some(1.0));
        assert_eq!(
            reputation.author_reputation(Uuid::new_v4()).await.unwrap(),
            None
        );
    }
}
