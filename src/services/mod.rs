pub mod cache;
pub mod feed;
pub mod interest;
pub mod recorder;
pub mod scoring;
pub mod tasks;

pub use cache::ScoreCache;
pub use feed::FeedAssembler;
pub use interest::InterestProfileBuilder;
pub use recorder::InteractionRecorder;
pub use scoring::ScoringEngine;
