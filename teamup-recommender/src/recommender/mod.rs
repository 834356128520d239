pub mod cache;
pub mod generator;
pub mod service;

pub use cache::{FileCache, FreshnessPolicy, MemoryCache, RecommendationCache};
pub use service::{Limits, Recommender, Served, Source};
