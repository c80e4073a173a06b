use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

#[derive(Queryable, Selectable, Debug, Serialize, Clone)]
#[diesel(table_name = crate::schema::recommendation_cache)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RecommendationCacheEntry {
    pub base_link: String,
    pub normalized_link: String,
    pub hours_window: i32,
    pub top_k: i32,
    pub stance_threshold: f64,
    pub recommendations: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::recommendation_cache)]
pub struct NewRecommendationCacheEntry {
    pub base_link: String,
    pub normalized_link: String,
    pub hours_window: i32,
    pub top_k: i32,
    pub stance_threshold: f64,
    pub recommendations: serde_json::Value,
}
