/// Orbit Ranking Engine
///
/// Personalized content ranking and feed assembly for the Orbit platform:
/// records interaction events, maintains decaying interest profiles, scores
/// content with a six-component formula, caches scores in TTL tiers and
/// assembles paginated feeds, with a background scheduler keeping the cache
/// warm.
pub mod config;
pub mod jobs;
pub mod models;
pub mod services;
pub mod store;

pub use config::Config;
pub use services::{
    FeedAssembler, InteractionRecorder, InterestProfileBuilder, ScoreCache, ScoringEngine,
};
