use orbit_ranking::config::Config;
use orbit_ranking::jobs::{spawn_scheduler, RecomputeJob};
use orbit_ranking::services::tasks::build_runner;
use orbit_ranking::services::{
    FeedAssembler, InteractionRecorder, InterestProfileBuilder, ScoreCache, ScoringEngine,
};
use orbit_ranking::store::{
    InMemoryContentStore, InMemoryReputation, InMemorySocialGraph, InteractionStore,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "orbit_ranking=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(service = %config.service_name, "Starting ranking engine");

    let content = Arc::new(InMemoryContentStore::new());
    let interactions = Arc::new(InteractionStore::new());
    let graph = Arc::new(InMemorySocialGraph::new());
    let reputation = Arc::new(InMemoryReputation::new());
    let cache = Arc::new(ScoreCache::new(config.cache.clone()));

    let engine = Arc::new(ScoringEngine::new(
        config.scoring.clone(),
        content.clone(),
        interactions.clone(),
        graph.clone(),
        reputation.clone(),
    ));

    let profiles = Arc::new(InterestProfileBuilder::new(
        config.interest.clone(),
        config.scoring.interaction_weights.clone(),
        config.cache.profile_ttl_secs,
        interactions.clone(),
        content.clone(),
    ));

    let tasks = build_runner(config.task_runner, cache.clone());

    let _recorder = Arc::new(InteractionRecorder::new(
        config.recorder.clone(),
        interactions.clone(),
        content.clone(),
        profiles.clone(),
        tasks,
    ));

    let _feeds = Arc::new(FeedAssembler::new(
        config.feed.clone(),
        engine.clone(),
        cache.clone(),
        content.clone(),
        graph.clone(),
        interactions.clone(),
        profiles,
    ));

    let job = Arc::new(RecomputeJob::new(
        engine,
        cache,
        content,
        interactions,
    ));
    let handles = spawn_scheduler(config.scheduler.clone(), job);

    info!("Ranking engine ready");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping scheduler");

    for handle in handles {
        handle.abort();
    }

    Ok(())
}
