/// Interaction Recorder
///
/// Boundary where raw upstream interactions become typed events: validates
/// IDs and kind, deduplicates repeat views inside a rolling window, appends
/// to the event log, feeds the interest profile builder, and fires a
/// non-blocking staleness signal at the cache. The caller never waits on
/// score recomputation.
use crate::config::RecorderConfig;
use crate::models::{InteractionEvent, InteractionKind, RawInteraction};
use crate::services::interest::InterestProfileBuilder;
use crate::services::tasks::{EngineTask, TaskRunner};
use crate::store::{ContentProvider, InteractionStore};
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("invalid interaction event: {0}")]
    InvalidEvent(String),
}

pub type Result<T> = std::result::Result<T, RecorderError>;

/// What happened to a submitted interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Recorded,
    /// A view of the same (viewer, content) pair inside the dedup window;
    /// dropped so it counts once.
    DuplicateView,
}

pub struct InteractionRecorder {
    config: RecorderConfig,
    interactions: Arc<InteractionStore>,
    content: Arc<dyn ContentProvider>,
    profiles: Arc<InterestProfileBuilder>,
    tasks: Arc<dyn TaskRunner>,
    /// Last recorded view per (viewer, content) pair.
    recent_views: DashMap<(Uuid, Uuid), chrono::DateTime<Utc>>,
}

impl InteractionRecorder {
    pub fn new(
        config: RecorderConfig,
        interactions: Arc<InteractionStore>,
        content: Arc<dyn ContentProvider>,
        profiles: Arc<InterestProfileBuilder>,
        tasks: Arc<dyn TaskRunner>,
    ) -> Self {
        Self {
            config,
            interactions,
            content,
            profiles,
            tasks,
            recent_views: DashMap::new(),
        }
    }

    /// Validate and persist one interaction.
    pub async fn record(&self, raw: RawInteraction) -> Result<RecordStatus> {
        let viewer_id = parse_id(&raw.viewer_id, "viewer_id")?;
        let content_id = parse_id(&raw.content_id, "content_id")?;
        let kind = InteractionKind::parse(&raw.kind)
            .ok_or_else(|| RecorderError::InvalidEvent(format!("unknown kind: {}", raw.kind)))?;

        let now = Utc::now();

        if kind == InteractionKind::View {
            let key = (viewer_id, content_id);
            if let Some(last) = self.recent_views.get(&key) {
                let window = Duration::seconds(self.config.view_dedup_window_secs);
                if now - *last < window {
                    debug!(
                        viewer_id = %viewer_id,
                        content_id = %content_id,
                        "Duplicate view inside dedup window, dropped"
                    );
                    return Ok(RecordStatus::DuplicateView);
                }
            }
            self.recent_views.insert(key, now);
        }

        let event = InteractionEvent {
            viewer_id,
            content_id,
            kind,
            occurred_at: now,
        };
        self.interactions.append(event.clone());

        // Interest profiles need the content's topics and author. A missing
        // metadata row only skips the profile update; the event itself stays.
        match self.content.content_meta(content_id).await {
            Ok(meta) => self.profiles.apply_event(&event, &meta),
            Err(e) => warn!(
                content_id = %content_id,
                error = %e,
                "Content metadata unavailable, interest profile not updated"
            ),
        }

        // Fire-and-forget: the cache learns the content's scores are stale,
        // recomputation happens on the next read or scheduled pass.
        self.tasks.dispatch(EngineTask::MarkStale(content_id));

        debug!(
            viewer_id = %viewer_id,
            content_id = %content_id,
            kind = kind.as_str(),
            "Interaction recorded"
        );

        Ok(RecordStatus::Recorded)
    }
}

fn parse_id(raw: &str, field: &str) -> Result<Uuid> {
    if raw.trim().is_empty() {
        return Err(RecorderError::InvalidEvent(format!("empty {field}")));
    }
    let id = Uuid::parse_str(raw)
        .map_err(|_| RecorderError::InvalidEvent(format!("malformed {field}: {raw}")))?;
    if id.is_nil() {
        return Err(RecorderError::InvalidEvent(format!("nil {field}")));
    }
    Ok(id)
}
