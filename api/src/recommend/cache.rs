//! Read-through recommendation cache: TTL freshness, stale-while-revalidate,
//! and batch precompute.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Serialize;

use super::engine::{self, RecommendError, RecommendParams, RecommendResult};
use crate::app::App;
use crate::error::AppError;
use crate::models::cache::{NewRecommendationCacheEntry, RecommendationCacheEntry};
use crate::schema::{article, recommendation_cache};

fn cache_key_params(params: &RecommendParams) -> (i32, i32, f64) {
    (params.hours_window as i32, params.top_k as i32, params.stance_threshold)
}

async fn find_entry(
    conn: &mut diesel_async::AsyncPgConnection,
    clicked: &str,
    normalized: &str,
    params: &RecommendParams,
) -> Result<Option<RecommendationCacheEntry>, diesel::result::Error> {
    let (hours_window, top_k, stance_threshold) = cache_key_params(params);

    recommendation_cache::table
        .filter(
            recommendation_cache::base_link
                .eq(clicked)
                .or(recommendation_cache::normalized_link.eq(normalized)),
        )
        .filter(recommendation_cache::hours_window.eq(hours_window))
        .filter(recommendation_cache::top_k.eq(top_k))
        .filter(recommendation_cache::stance_threshold.eq(stance_threshold))
        .order(recommendation_cache::updated_at.desc())
        .select(RecommendationCacheEntry::as_select())
        .first(conn)
        .await
        .optional()
}

async fn upsert_entry(
    conn: &mut diesel_async::AsyncPgConnection,
    base_link: &str,
    normalized_link: &str,
    params: &RecommendParams,
    result: &RecommendResult,
) -> Result<(), diesel::result::Error> {
    let (hours_window, top_k, stance_threshold) = cache_key_params(params);
    let payload = serde_json::to_value(result).unwrap_or(serde_json::Value::Null);

    let new_entry = NewRecommendationCacheEntry {
        base_link: base_link.to_string(),
        normalized_link: normalized_link.to_string(),
        hours_window,
        top_k,
        stance_threshold,
        recommendations: payload,
    };

    diesel::insert_into(recommendation_cache::table)
        .values(&new_entry)
        .on_conflict((
            recommendation_cache::base_link,
            recommendation_cache::hours_window,
            recommendation_cache::top_k,
            recommendation_cache::stance_threshold,
        ))
        .do_update()
        .set((
            recommendation_cache::normalized_link.eq(&new_entry.normalized_link),
            recommendation_cache::recommendations.eq(&new_entry.recommendations),
            recommendation_cache::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await?;

    Ok(())
}

fn is_fresh(updated_at: DateTime<Utc>, ttl_hours: i64) -> bool {
    updated_at + chrono::Duration::hours(ttl_hours) >= Utc::now()
}

fn entry_result(entry: &RecommendationCacheEntry) -> RecommendResult {
    serde_json::from_value(entry.recommendations.clone()).unwrap_or(RecommendResult {
        clicked: entry.normalized_link.clone(),
        recommendations: Vec::new(),
    })
}

async fn compute_and_store(
    app: &App,
    clicked: &str,
    params: &RecommendParams,
) -> Result<RecommendResult, RecommendError> {
    let (normalized, result) = engine::recommend(app, clicked, params).await?;
    if let Ok(mut conn) = app.diesel.get().await {
        if let Err(e) = upsert_entry(&mut conn, clicked, &normalized, params, &result).await {
            tracing::warn!(?e, "cache write failed, falling through to direct result");
        }
    }
    Ok(result)
}

/// Read-through recommend: `(clicked, params, allow_stale)`.
pub async fn recommend_cached(
    app: &App,
    clicked: &str,
    params: &RecommendParams,
    allow_stale: bool,
) -> Result<RecommendResult, AppError> {
    let normalized = crate::urlnorm::normalize(&app.http, clicked).await.to_string();

    let entry = {
        let mut conn = app.diesel.get().await?;
        find_entry(&mut conn, clicked, &normalized, params).await?
    };

    match entry {
        None => Ok(compute_and_store(app, clicked, params).await?),
        Some(entry) if is_fresh(entry.updated_at, app.config.recommend.cache_ttl_hours) => {
            Ok(entry_result(&entry))
        }
        Some(entry) if allow_stale => {
            let stale = entry_result(&entry);
            let app = app.clone();
            let clicked = clicked.to_string();
            let params = RecommendParams {
                hours_window: params.hours_window,
                top_k: params.top_k,
                stance_threshold: params.stance_threshold,
            };
            tokio::spawn(async move {
                if let Err(e) = compute_and_store(&app, &clicked, &params).await {
                    let e: AppError = e.into();
                    tracing::warn!(?e, clicked, "background recommendation refresh failed");
                }
            });
            Ok(stale)
        }
        Some(_) => Ok(compute_and_store(app, clicked, params).await?),
    }
}

/// Cache-only read: present payload regardless of staleness, `None` on miss.
pub async fn recommend_cache_only(
    app: &App,
    clicked: &str,
    params: &RecommendParams,
) -> Result<Option<RecommendResult>, AppError> {
    let normalized = crate::urlnorm::normalize(&app.http, clicked).await.to_string();
    let mut conn = app.diesel.get().await?;
    let entry = find_entry(&mut conn, clicked, &normalized, params).await?;
    Ok(entry.map(|e| entry_result(&e)))
}

#[derive(Debug, Serialize)]
pub struct PrecomputeOutcome {
    pub scanned: usize,
    pub cached: usize,
}

/// Precompute recommendations for the most recent `max_items` links within
/// `lookback_hours`, continuing past individual article failures.
pub async fn precompute_recent(
    app: &App,
    params: &RecommendParams,
    lookback_hours: i64,
    max_items: i64,
) -> Result<PrecomputeOutcome, AppError> {
    let cutoff = Utc::now() - chrono::Duration::hours(lookback_hours);
    let links: Vec<String> = {
        let mut conn = app.diesel.get().await?;
        article::table
            .filter(article::date.ge(cutoff))
            .order(article::date.desc())
            .limit(max_items)
            .select(article::link)
            .load(&mut conn)
            .await?
    };

    let mut outcome = PrecomputeOutcome {
        scanned: links.len(),
        cached: 0,
    };

    for link in links {
        match compute_and_store(app, &link, params).await {
            Ok(_) => outcome.cached += 1,
            Err(e) => {
                let e: AppError = e.into();
                tracing::warn!(?e, link, "precompute failed for article");
            }
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_params_rounds_to_stored_column_types() {
        let params = RecommendParams {
            hours_window: 48,
            top_k: 8,
            stance_threshold: 0.12,
        };
        assert_eq!(cache_key_params(&params), (48, 8, 0.12));
    }

    #[test]
    fn is_fresh_within_ttl() {
        let updated_at = Utc::now() - chrono::Duration::hours(3);
        assert!(is_fresh(updated_at, 6));
    }

    #[test]
    fn is_fresh_false_past_ttl() {
        let updated_at = Utc::now() - chrono::Duration::hours(7);
        assert!(!is_fresh(updated_at, 6));
    }

    #[test]
    fn entry_result_falls_back_on_bad_json() {
        let entry = RecommendationCacheEntry {
            base_link: "https://example.com/a".to_string(),
            normalized_link: "https://example.com/a".to_string(),
            hours_window: 48,
            top_k: 8,
            stance_threshold: 0.1,
            recommendations: serde_json::Value::String("not an object".to_string()),
            updated_at: Utc::now(),
        };
        let result = entry_result(&entry);
        assert_eq!(result.clicked, entry.normalized_link);
        assert!(result.recommendations.is_empty());
    }
}
