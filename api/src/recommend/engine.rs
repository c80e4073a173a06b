//! Opposing-viewpoint recommendation: base lookup, lean inference,
//! time-windowed retrieval, NLI stance re-ranking, two-tier selection.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::error::AppError;
use crate::lean::Lean;
use crate::models::article::Article;
use crate::schema::article;
use crate::summarize;
use crate::vector::doc_text;

const MAX_PREMISE_CHARS: usize = 600;
const MAX_HYPOTHESIS_CHARS: usize = 600;

pub struct RecommendParams {
    pub hours_window: i64,
    pub top_k: i64,
    pub stance_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub title: String,
    pub link: String,
    pub source: Option<String>,
    pub lean: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub probs: [f32; 3],
    pub stance: f32,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendResult {
    pub clicked: String,
    pub recommendations: Vec<RecommendationItem>,
}

/// Distinguishes a structured "base article not found" outcome (the caller
/// maps it to a 404, or a cache 204) from a genuine upstream failure.
pub enum RecommendError {
    NotFound { normalized: String },
    Upstream(String),
}

impl From<RecommendError> for AppError {
    fn from(e: RecommendError) -> Self {
        match e {
            RecommendError::NotFound { normalized } => {
                AppError::NotFound(format!("article not found: {normalized}"))
            }
            RecommendError::Upstream(msg) => AppError::UpstreamUnavailable(msg),
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn host_of(link: &str) -> Option<String> {
    url::Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

async fn lookup_base_article(
    conn: &mut diesel_async::AsyncPgConnection,
    normalized: &str,
    raw: &str,
) -> Result<Option<Article>, diesel::result::Error> {
    let by_normalized: Option<Article> = article::table
        .filter(article::link.eq(normalized))
        .select(Article::as_select())
        .first(conn)
        .await
        .optional()?;
    if by_normalized.is_some() {
        return Ok(by_normalized);
    }
    if raw == normalized {
        return Ok(None);
    }
    article::table
        .filter(article::link.eq(raw))
        .select(Article::as_select())
        .first(conn)
        .await
        .optional()
}

/// `recommend(clicked_link, hours_window, top_k, stance_threshold)` per the
/// opposing-viewpoint contract. Returns the normalized link alongside the
/// result so callers (the cache layer) can key on it without renormalizing.
pub async fn recommend(
    app: &App,
    clicked_link: &str,
    params: &RecommendParams,
) -> Result<(String, RecommendResult), RecommendError> {
    let normalized = crate::urlnorm::normalize(&app.http, clicked_link)
        .await
        .to_string();

    let mut conn = app
        .diesel
        .get()
        .await
        .map_err(|e| RecommendError::Upstream(format!("database pool: {e}")))?;

    let base = lookup_base_article(&mut conn, &normalized, clicked_link)
        .await
        .map_err(|e| RecommendError::Upstream(format!("article lookup: {e}")))?
        .ok_or_else(|| RecommendError::NotFound {
            normalized: normalized.clone(),
        })?;
    drop(conn);

    let base_lean = crate::lean::infer_lean(base.lean.as_deref(), host_of(&base.link).as_deref());

    let body = base
        .summary
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(&base.content);
    let query_text = doc_text(&base.title, body);

    let base_date_ts = base.date.map(|d| d.timestamp());

    let hits = app
        .vector
        .search(
            &query_text,
            base_lean,
            base_date_ts,
            params.hours_window,
            app.config.recommend.overfetch_top_k as u64,
        )
        .await
        .map_err(|e| RecommendError::Upstream(format!("{e:?}")))?;

    let mut strong = Vec::new();
    let mut weak = Vec::new();

    for hit in hits {
        let Some(payload) = hit.payload.as_object() else {
            continue;
        };
        let link = payload.get("link").and_then(|v| v.as_str()).unwrap_or("");
        if link.is_empty() || link == base.link || link == normalized {
            continue;
        }

        let hit_lean_str = payload.get("lean").and_then(|v| v.as_str());
        let hit_lean = hit_lean_str.and_then(Lean::parse);
        if let (Some(b), Some(h)) = (base_lean, hit_lean) {
            if b == h {
                continue;
            }
        }

        let title = payload
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        let content = payload
            .get("content")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let date = payload
            .get("date")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));
        let source = payload
            .get("source")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let premise = truncate_chars(&summarize_for_premise(&base), MAX_PREMISE_CHARS);
        let hypothesis = if !content.is_empty() {
            summarize::summarize(content, 3, Some(MAX_HYPOTHESIS_CHARS))
        } else {
            truncate_chars(&title, MAX_HYPOTHESIS_CHARS)
        };

        let (_, probs) = app
            .nli
            .classify(premise, hypothesis)
            .await
            .unwrap_or(("neutral", [0.33, 0.34, 0.33]));

        let stance = probs[2] - probs[0];
        let stance_norm = ((stance + 1.0) / 2.0).clamp(0.0, 1.0);
        let score = hit.score * (0.8 + 0.2 * stance_norm);

        let item = RecommendationItem {
            title,
            link: link.to_string(),
            source,
            lean: hit_lean_str.map(str::to_string),
            date,
            probs,
            stance,
            score,
        };

        if stance.abs() as f64 >= params.stance_threshold {
            strong.push(item);
        } else {
            weak.push(item);
        }
    }

    let recommendations = select_two_tier(strong, weak, params.top_k.max(0) as usize);

    Ok((
        normalized.clone(),
        RecommendResult {
            clicked: normalized,
            recommendations,
        },
    ))
}

fn summarize_for_premise(base: &Article) -> String {
    match &base.summary {
        Some(s) if !s.is_empty() => s.clone(),
        _ => base.title.clone(),
    }
}

/// Fills `top_k` slots from `strong` (candidates clearing the stance
/// threshold) first, then tops up from `weak` if `strong` falls short. Both
/// groups are sorted by score descending before selection.
fn select_two_tier(
    mut strong: Vec<RecommendationItem>,
    mut weak: Vec<RecommendationItem>,
    top_k: usize,
) -> Vec<RecommendationItem> {
    strong.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    weak.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut recommendations: Vec<RecommendationItem> = strong.into_iter().take(top_k).collect();
    if recommendations.len() < top_k {
        let remaining = top_k - recommendations.len();
        recommendations.extend(weak.into_iter().take(remaining));
    }
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(link: &str, stance: f32, score: f32) -> RecommendationItem {
        RecommendationItem {
            title: link.to_string(),
            link: link.to_string(),
            source: None,
            lean: None,
            date: None,
            probs: [0.33, 0.34, 0.33],
            stance,
            score,
        }
    }

    #[test]
    fn two_tier_fill_uses_weak_when_strong_is_short() {
        // 10 candidates, stance_threshold = 0.5, only 2 clear it.
        let strong = vec![item("s1", 0.9, 0.6), item("s2", 0.7, 0.9)];
        let weak = vec![
            item("w1", 0.1, 0.5),
            item("w2", 0.2, 0.8),
            item("w3", 0.3, 0.2),
            item("w4", 0.4, 0.7),
            item("w5", -0.2, 0.95),
            item("w6", 0.05, 0.1),
            item("w7", 0.15, 0.3),
            item("w8", 0.25, 0.4),
        ];

        let out = select_two_tier(strong, weak, 5);
        let links: Vec<&str> = out.iter().map(|i| i.link.as_str()).collect();

        // strong, sorted by score desc, come first.
        assert_eq!(&links[..2], &["s2", "s1"]);
        // weak fill is the top 3 weak candidates by score: w5 (.95), w2 (.8), w4 (.7).
        assert_eq!(&links[2..], &["w5", "w2", "w4"]);
    }

    #[test]
    fn two_tier_caps_at_top_k_when_strong_alone_suffices() {
        let strong = vec![
            item("s1", 0.9, 0.1),
            item("s2", 0.9, 0.9),
            item("s3", 0.9, 0.5),
        ];
        let weak = vec![item("w1", 0.0, 1.0)];

        let out = select_two_tier(strong, weak, 2);
        let links: Vec<&str> = out.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(links, vec!["s2", "s3"]);
    }

    #[test]
    fn two_tier_empty_inputs_yield_empty_output() {
        let out = select_two_tier(Vec::new(), Vec::new(), 5);
        assert!(out.is_empty());
    }
}
