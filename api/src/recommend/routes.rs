use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use super::cache;
use super::engine::RecommendParams;
use crate::app::App;
use crate::error::AppError;

pub fn route() -> Router<App> {
    Router::<App>::new()
        .route("/recommend", get(recommend))
        .route("/rec/recommend", get(recommend))
        .route("/article/recommend", get(recommend))
        .route("/recommend-cached", get(recommend_cached))
        .route("/rec/recommend-cached", get(recommend_cached))
        .route("/article/recommend-cached", get(recommend_cached))
}

#[derive(Deserialize)]
struct RecommendQuery {
    clicked_link: String,
    hours_window: Option<i64>,
    top_k: Option<i64>,
    nli_threshold: Option<f64>,
    allow_stale: Option<bool>,
}

fn clamp(v: i64, bounds: (i64, i64)) -> i64 {
    v.clamp(bounds.0, bounds.1)
}

fn clamp_f(v: f64, bounds: (f64, f64)) -> f64 {
    v.clamp(bounds.0, bounds.1)
}

fn resolve_params(ctx: &App, q: &RecommendQuery) -> RecommendParams {
    let cfg = &ctx.config.recommend;
    RecommendParams {
        hours_window: clamp(
            q.hours_window.unwrap_or(cfg.hours_window_default),
            cfg.hours_window_bounds,
        ),
        top_k: clamp(q.top_k.unwrap_or(cfg.top_k_default), cfg.top_k_bounds),
        stance_threshold: clamp_f(
            q.nli_threshold.unwrap_or(cfg.nli_threshold_default),
            cfg.nli_threshold_bounds,
        ),
    }
}

#[axum::debug_handler]
async fn recommend(
    State(ctx): State<App>,
    Query(q): Query<RecommendQuery>,
) -> Result<axum::Json<super::engine::RecommendResult>, AppError> {
    let params = resolve_params(&ctx, &q);
    let allow_stale = q.allow_stale.unwrap_or(false);
    let result = cache::recommend_cached(&ctx, &q.clicked_link, &params, allow_stale).await?;
    Ok(axum::Json(result))
}

#[axum::debug_handler]
async fn recommend_cached(
    State(ctx): State<App>,
    Query(q): Query<RecommendQuery>,
) -> Result<axum::response::Response, AppError> {
    use axum::response::IntoResponse;

    let params = resolve_params(&ctx, &q);
    match cache::recommend_cache_only(&ctx, &q.clicked_link, &params).await? {
        Some(result) => Ok(axum::Json(result).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_values_within_bounds() {
        assert_eq!(clamp(3, (6, 168)), 6);
        assert_eq!(clamp(200, (6, 168)), 168);
        assert_eq!(clamp(48, (6, 168)), 48);
    }

    #[test]
    fn clamp_f_keeps_values_within_bounds() {
        assert_eq!(clamp_f(-0.5, (0.0, 1.0)), 0.0);
        assert_eq!(clamp_f(1.5, (0.0, 1.0)), 1.0);
        assert_eq!(clamp_f(0.12, (0.0, 1.0)), 0.12);
    }
}
