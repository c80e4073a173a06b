pub mod lexrank;
pub mod preclean;
pub mod sentences;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::app::App;
use crate::error::AppError;
use crate::models::article::Article;
use crate::schema::article;

const DEFAULT_MAX_SENTENCES: usize = 3;

/// Produce a short extractive summary of `text` via preclean -> LexRank
/// extractive -> lead fallback, optionally capped to `max_chars`. No
/// abstractive tier is attempted: the corpus carries no abstractive
/// summarization crate, and it's treated as optional upstream too.
pub fn summarize(text: &str, max_sentences: usize, max_chars: Option<usize>) -> String {
    let raw = preclean::preclean(text);
    if raw.is_empty() {
        return String::new();
    }
    let k = if max_sentences > 0 {
        max_sentences
    } else {
        DEFAULT_MAX_SENTENCES
    };

    let sentences = sentences::split_sentences(&raw);

    let chosen = match lexrank::extractive_select(&sentences, k) {
        Some(selected) if selected.join(" ").len() as f64 <= raw.len() as f64 * 0.7 => selected,
        _ => lead_sentences(&sentences, k),
    };

    let out = chosen.join(" ");
    match max_chars {
        Some(cap) if out.len() > cap => truncate_at_sentence_boundary(&chosen, cap),
        _ => out,
    }
}

fn lead_sentences(sentences: &[String], k: usize) -> Vec<String> {
    sentences.iter().take(k).cloned().collect()
}

fn lead_summarize(sentences: &[String], k: usize) -> String {
    lead_sentences(sentences, k).join(" ")
}

/// Keep whole sentences from `sentences` while the running join stays within
/// `max_chars`; a lone first sentence already over the cap is hard-truncated
/// since there's no smaller boundary to fall back to.
fn truncate_at_sentence_boundary(sentences: &[String], max_chars: usize) -> String {
    let mut out = String::new();
    for s in sentences {
        let candidate = if out.is_empty() {
            s.clone()
        } else {
            format!("{out} {s}")
        };
        if candidate.len() > max_chars {
            if out.is_empty() {
                return s.chars().take(max_chars).collect();
            }
            break;
        }
        out = candidate;
    }
    out
}

const ADVISORY_LOCK_KEY: i64 = 777_001;

#[derive(QueryableByName)]
struct LockResult {
    #[diesel(sql_type = diesel::sql_types::Bool)]
    locked: bool,
}

async fn try_acquire_lock(conn: &mut diesel_async::AsyncPgConnection) -> Result<bool, AppError> {
    let row: LockResult = diesel::sql_query(format!(
        "SELECT pg_try_advisory_lock({ADVISORY_LOCK_KEY}) AS locked"
    ))
    .get_result(conn)
    .await?;
    Ok(row.locked)
}

async fn release_lock(conn: &mut diesel_async::AsyncPgConnection) -> Result<(), AppError> {
    diesel::sql_query(format!("SELECT pg_advisory_unlock({ADVISORY_LOCK_KEY})"))
        .execute(conn)
        .await?;
    Ok(())
}

pub struct UpdateMissingOutcome {
    pub skipped: bool,
    pub updated: usize,
}

/// Batch-fill missing summaries (or all, if `force`) for up to `limit`
/// articles, holding the process-wide advisory lock for the whole run so
/// two summarizer batches never race on the article store.
pub async fn update_missing(
    app: &App,
    limit: i64,
    force: bool,
) -> Result<UpdateMissingOutcome, AppError> {
    let mut conn = app.diesel.get().await?;

    if !try_acquire_lock(&mut conn).await? {
        return Ok(UpdateMissingOutcome {
            skipped: true,
            updated: 0,
        });
    }

    let result = run_update_missing(&mut conn, limit, force).await;
    release_lock(&mut conn).await?;
    result
}

async fn run_update_missing(
    conn: &mut diesel_async::AsyncPgConnection,
    limit: i64,
    force: bool,
) -> Result<UpdateMissingOutcome, AppError> {
    let mut query = article::table.into_boxed();
    if !force {
        query = query.filter(
            article::summary
                .is_null()
                .or(article::summary.eq("")),
        );
    }
    let rows: Vec<Article> = query
        .order(article::id.desc())
        .limit(limit)
        .select(Article::as_select())
        .load(conn)
        .await?;

    let mut updated = 0;
    for row in rows {
        let summary = summarize(&row.content, DEFAULT_MAX_SENTENCES, None);
        if summary.is_empty() {
            continue;
        }
        diesel::update(article::table.filter(article::id.eq(row.id)))
            .set(article::summary.eq(Some(summary)))
            .execute(conn)
            .await?;
        updated += 1;
    }

    Ok(UpdateMissingOutcome {
        skipped: false,
        updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_summary() {
        assert_eq!(summarize("", 3, None), "");
        assert_eq!(summarize("   ", 3, None), "");
    }

    #[test]
    fn short_text_falls_back_to_lead_sentences() {
        let text = "A short sentence here. Another one follows.";
        let out = summarize(text, 5, None);
        assert!(out.contains("A short sentence here."));
    }

    #[test]
    fn zero_max_sentences_uses_default() {
        let text = "One. Two. Three. Four. Five.";
        let out = summarize(text, 0, None);
        assert!(!out.is_empty());
        assert!(out.split('.').count() <= DEFAULT_MAX_SENTENCES + 2);
    }

    #[test]
    fn lead_fallback_picks_first_k_sentences() {
        // Fewer sentences than max_sentences means extractive_select
        // returns None (lexrank.rs), forcing the lead fallback, which must
        // preserve original order.
        let text = "The council met today in the main hall. \
                     The mayor spoke about the budget briefly. \
                     Residents asked several pointed questions.";
        let out = summarize(text, 10, None);
        assert!(out.starts_with("The council met today in the main hall."));
        assert!(out.ends_with("Residents asked several pointed questions."));
    }

    #[test]
    fn lead_summarize_takes_first_k_sentences_in_order() {
        let sentences = vec![
            "First.".to_string(),
            "Second.".to_string(),
            "Third.".to_string(),
        ];
        assert_eq!(lead_summarize(&sentences, 2), "First. Second.");
    }

    #[test]
    fn max_chars_truncates_at_sentence_boundary() {
        let text = "First sentence here. Second sentence here. Third sentence here.";
        let out = summarize(text, 3, Some(25));
        assert_eq!(out, "First sentence here.");
        assert!(out.len() <= 25);
    }

    #[test]
    fn max_chars_hard_truncates_when_first_sentence_exceeds_cap() {
        let text = "A genuinely very long single sentence with no period in range";
        let out = summarize(text, 1, Some(10));
        assert_eq!(out.chars().count(), 10);
    }

    #[test]
    fn truncate_at_sentence_boundary_keeps_whole_sentences() {
        let sentences = vec![
            "Short one.".to_string(),
            "Another sentence follows.".to_string(),
        ];
        assert_eq!(truncate_at_sentence_boundary(&sentences, 15), "Short one.");
    }
}
