use crate::models::InteractionKind;
use serde::Deserialize;
use std::env;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Per-kind interaction weight table used by the engagement, trending and
/// interest-profile computations. Injectable so formulas are testable with
/// alternate weights.
#[derive(Debug, Clone, Deserialize)]
pub struct EngagementWeights {
    pub view: f64,
    pub like: f64,
    pub comment: f64,
    pub share: f64,
    pub bookmark: f64,
    pub profile_click: f64,
    pub link_click: f64,
}

impl Default for EngagementWeights {
    fn default() -> Self {
        Self {
            view: 0.01,
            like: 1.0,
            comment: 3.0,
            share: 5.0,
            bookmark: 2.0,
            profile_click: 0.5,
            link_click: 0.5,
        }
    }
}

impl EngagementWeights {
    pub fn weight(&self, kind: InteractionKind) -> f64 {
        match kind {
            InteractionKind::View => self.view,
            InteractionKind::Like => self.like,
            InteractionKind::Comment => self.comment,
            InteractionKind::Share => self.share,
            InteractionKind::Bookmark => self.bookmark,
            InteractionKind::ProfileClick => self.profile_click,
            InteractionKind::LinkClick => self.link_click,
        }
    }
}

/// Final-score combination weights. The composite score is always
/// `follow_boost + engagement*w + recency*w + quality*w + reputation*w + trending*w`
/// with these multipliers, so a stored component row can be recombined at
/// any time without replaying events.
#[derive(Debug, Clone, Deserialize)]
pub struct RankingWeights {
    pub engagement: f64,
    pub recency: f64,
    pub quality: f64,
    pub author_reputation: f64,
    pub trending: f64,
    /// Flat bonus when the viewer follows the content author.
    pub follow_boost: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            engagement: 1.0,
            recency: 0.5,
            quality: 0.3,
            author_reputation: 0.2,
            trending: 0.8,
            follow_boost: 10.0,
        }
    }
}

/// Tunables for the individual score components.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    pub interaction_weights: EngagementWeights,
    pub weights: RankingWeights,
    /// Recency score of a brand-new post, before the final-score multiplier.
    pub recency_baseline: f64,
    pub recency_half_life_hours: f64,
    /// Trailing window for engagement velocity.
    pub trending_window_hours: i64,
    /// Scales windowed engagement down relative to all-time engagement.
    pub trending_scale: f64,
    /// Cap on the interactions-per-view quality ratio.
    pub quality_cap: f64,
    /// Used when the external reputation signal is absent.
    pub default_author_reputation: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            interaction_weights: EngagementWeights::default(),
            weights: RankingWeights::default(),
            recency_baseline: 10.0,
            recency_half_life_hours: 24.0,
            trending_window_hours: 48,
            trending_scale: 0.1,
            quality_cap: 10.0,
            default_author_reputation: 0.5,
        }
    }
}

/// Tiered cache expiry, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub personalized_ttl_secs: u64,
    pub base_ttl_secs: u64,
    pub trending_ttl_secs: u64,
    pub profile_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            personalized_ttl_secs: 5 * 60,
            base_ttl_secs: 10 * 60,
            trending_ttl_secs: 30 * 60,
            profile_ttl_secs: 6 * 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecorderConfig {
    /// Rolling window inside which repeat views of the same (viewer, content)
    /// pair count once.
    pub view_dedup_window_secs: i64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            view_dedup_window_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterestConfig {
    /// Multiplicative decay applied to all existing affinities on each update.
    pub decay_factor: f64,
    /// Affinities below this are dropped from the profile.
    pub min_affinity: f64,
    /// Maximum affinities kept per map (topics, authors).
    pub max_affinities: usize,
    /// Top-N entries returned in feed summaries.
    pub summary_size: usize,
}

impl Default for InterestConfig {
    fn default() -> Self {
        Self {
            decay_factor: 0.98,
            min_affinity: 0.01,
            max_affinities: 100,
            summary_size: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    pub full_pass_interval_secs: u64,
    pub trending_pass_interval_secs: u64,
    pub cleanup_interval_secs: u64,
    pub batch_size: usize,
    pub retention_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            full_pass_interval_secs: 3600,
            trending_pass_interval_secs: 1800,
            cleanup_interval_secs: 86400,
            batch_size: 1000,
            retention_days: 90,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Multiplier on interest-profile affinity when smart feeds re-rank;
    /// applied at assembly time only, never stored.
    pub interest_bonus_weight: f64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            interest_bonus_weight: 0.5,
        }
    }
}

/// How cache-invalidation signals are dispatched from the recorder.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskRunnerMode {
    /// Queue-backed worker; falls back to inline if the queue is gone.
    Queue,
    /// Run invalidations synchronously on the caller's task.
    Inline,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service_name: String,
    pub scoring: ScoringConfig,
    pub cache: CacheConfig,
    pub recorder: RecorderConfig,
    pub interest: InterestConfig,
    pub scheduler: SchedulerConfig,
    pub feed: FeedConfig,
    pub task_runner: TaskRunnerMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "orbit-ranking".to_string(),
            scoring: ScoringConfig::default(),
            cache: CacheConfig::default(),
            recorder: RecorderConfig::default(),
            interest: InterestConfig::default(),
            scheduler: SchedulerConfig::default(),
            feed: FeedConfig::default(),
            task_runner: TaskRunnerMode::Queue,
        }
    }
}

impl Config {
    /// Load config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let task_runner = match env::var("TASK_RUNNER_MODE").as_deref() {
            Ok("inline") => TaskRunnerMode::Inline,
            Ok("queue") | Err(_) => TaskRunnerMode::Queue,
            Ok(other) => {
                tracing::warn!(mode = other, "Unknown TASK_RUNNER_MODE, using queue");
                TaskRunnerMode::Queue
            }
        };

        Config {
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| defaults.service_name.clone()),
            scoring: ScoringConfig {
                recency_baseline: env_parse(
                    "RECENCY_BASELINE",
                    defaults.scoring.recency_baseline,
                ),
                recency_half_life_hours: env_parse(
                    "RECENCY_HALF_LIFE_HOURS",
                    defaults.scoring.recency_half_life_hours,
                ),
                trending_window_hours: env_parse(
                    "TRENDING_WINDOW_HOURS",
                    defaults.scoring.trending_window_hours,
                ),
                trending_scale: env_parse("TRENDING_SCALE", defaults.scoring.trending_scale),
                quality_cap: env_parse("QUALITY_CAP", defaults.scoring.quality_cap),
                default_author_reputation: env_parse(
                    "DEFAULT_AUTHOR_REPUTATION",
                    defaults.scoring.default_author_reputation,
                ),
                ..defaults.scoring
            },
            cache: CacheConfig {
                personalized_ttl_secs: env_parse(
                    "CACHE_PERSONALIZED_TTL_SECS",
                    defaults.cache.personalized_ttl_secs,
                ),
                base_ttl_secs: env_parse("CACHE_BASE_TTL_SECS", defaults.cache.base_ttl_secs),
                trending_ttl_secs: env_parse(
                    "CACHE_TRENDING_TTL_SECS",
                    defaults.cache.trending_ttl_secs,
                ),
                profile_ttl_secs: env_parse(
                    "CACHE_PROFILE_TTL_SECS",
                    defaults.cache.profile_ttl_secs,
                ),
            },
            recorder: RecorderConfig {
                view_dedup_window_secs: env_parse(
                    "VIEW_DEDUP_WINDOW_SECS",
                    defaults.recorder.view_dedup_window_secs,
                ),
            },
            interest: defaults.interest.clone(),
            scheduler: SchedulerConfig {
                full_pass_interval_secs: env_parse(
                    "FULL_PASS_INTERVAL_SECS",
                    defaults.scheduler.full_pass_interval_secs,
                ),
                trending_pass_interval_secs: env_parse(
                    "TRENDING_PASS_INTERVAL_SECS",
                    defaults.scheduler.trending_pass_interval_secs,
                ),
                cleanup_interval_secs: env_parse(
                    "CLEANUP_INTERVAL_SECS",
                    defaults.scheduler.cleanup_interval_secs,
                ),
                batch_size: env_parse("RECOMPUTE_BATCH_SIZE", defaults.scheduler.batch_size),
                retention_days: env_parse("RETENTION_DAYS", defaults.scheduler.retention_days),
            },
            feed: FeedConfig {
                default_page_size: env_parse(
                    "FEED_DEFAULT_PAGE_SIZE",
                    defaults.feed.default_page_size,
                ),
                max_page_size: env_parse("FEED_MAX_PAGE_SIZE", defaults.feed.max_page_size),
                interest_bonus_weight: env_parse(
                    "FEED_INTEREST_BONUS_WEIGHT",
                    defaults.feed.interest_bonus_weight,
                ),
            },
            task_runner,
        }
    }
}
