pub mod cache;
pub mod engine;
pub mod routes;

pub use engine::{recommend, RecommendParams, RecommendationItem};
