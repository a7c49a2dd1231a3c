use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of interaction kinds accepted by the recorder.
///
/// Upstream clients send kinds as loose strings; `parse` is the single
/// place where they become typed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    View,
    Like,
    Comment,
    Share,
    Bookmark,
    ProfileClick,
    LinkClick,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::View => "view",
            InteractionKind::Like => "like",
            InteractionKind::Comment => "comment",
            InteractionKind::Share => "share",
            InteractionKind::Bookmark => "bookmark",
            InteractionKind::ProfileClick => "profile_click",
            InteractionKind::LinkClick => "link_click",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "view" => Some(InteractionKind::View),
            "like" => Some(InteractionKind::Like),
            "comment" => Some(InteractionKind::Comment),
            "share" => Some(InteractionKind::Share),
            "bookmark" => Some(InteractionKind::Bookmark),
            "profile_click" => Some(InteractionKind::ProfileClick),
            "link_click" => Some(InteractionKind::LinkClick),
            _ => None,
        }
    }

    pub const ALL: [InteractionKind; 7] = [
        InteractionKind::View,
        InteractionKind::Like,
        InteractionKind::Comment,
        InteractionKind::Share,
        InteractionKind::Bookmark,
        InteractionKind::ProfileClick,
        InteractionKind::LinkClick,
    ];
}

/// Raw interaction payload as received from upstream UI actions,
/// validated at the recorder boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInteraction {
    pub viewer_id: String,
    pub content_id: String,
    pub kind: String,
}

/// Validated, append-only interaction event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub viewer_id: Uuid,
    pub content_id: Uuid,
    pub kind: InteractionKind,
    pub occurred_at: DateTime<Utc>,
}

/// Read-only view of a content item owned by the external content store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentMeta {
    pub content_id: Uuid,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub topics: Vec<String>,
}

/// Individual signal scores that combine into the final score.
///
/// Components are kept alongside the final score so a stored row can be
/// re-weighted or audited without replaying raw events.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreComponents {
    pub engagement: f64,
    pub recency: f64,
    pub quality: f64,
    pub author_reputation: f64,
    pub trending: f64,
    pub follow_boost: f64,
}

/// Computed relevance score for a content item, optionally personalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingScore {
    pub content_id: Uuid,
    /// `None` for the non-personalized baseline row.
    pub viewer_id: Option<Uuid>,
    pub components: ScoreComponents,
    pub final_score: f64,
    pub computed_at: DateTime<Utc>,
}

/// One entry of an assembled feed page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEntry {
    pub content_id: Uuid,
    pub score: f64,
    pub components: ScoreComponents,
}

/// Pagination cursor pinning the last-served (score, created_at, content_id)
/// tuple so concurrent writes cannot shift already-served pages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FeedCursor {
    pub score: f64,
    pub created_at: DateTime<Utc>,
    pub content_id: Uuid,
}

impl FeedCursor {
    /// Opaque token form handed to API callers.
    pub fn to_token(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_token(token: &str) -> Option<Self> {
        serde_json::from_str(token).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_round_trip() {
        for kind in InteractionKind::ALL {
            assert_eq!(InteractionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(InteractionKind::parse("downvote"), None);
        assert_eq!(InteractionKind::parse(""), None);
    }

    #[test]
    fn test_cursor_token_round_trip() {
        let cursor = FeedCursor {
            score: 12.5,
            created_at: Utc::now(),
            content_id: Uuid::new_v4(),
        };

        let token = cursor.to_token();
        let decoded = FeedCursor::from_token(&token).unwrap();
        assert_eq!(decoded.content_id, cursor.content_id);
        assert!((decoded.score - cursor.score).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert!(FeedCursor::from_token("not-a-cursor").is_none());
    }
}
