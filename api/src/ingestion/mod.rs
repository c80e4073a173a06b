pub mod extract;
pub mod sources;

use std::time::Duration;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::app::App;
use crate::error::AppError;
use crate::lean::Lean;
use crate::models::article::{Article, NewArticle};
use crate::schema::article;
use extract::PolitenessState;
use sources::FeedSource;

const FEED_FETCH_TIMEOUT: Duration = Duration::from_secs(12);

#[derive(Debug, Clone, Serialize, Default)]
pub struct CrawlStats {
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
    pub samples: Samples,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Samples {
    pub inserted: Vec<String>,
    pub updated: Vec<String>,
}

const SAMPLE_CAP: usize = 3;

struct IncomingArticle {
    link: String,
    title: String,
    content: String,
    summary: Option<String>,
    date: Option<DateTime<Utc>>,
    source: String,
    lean: Option<Lean>,
    author: Option<String>,
    section: Option<String>,
}

fn extract_rss_text(item: &rss::Item) -> String {
    if let Some(content) = item.content() {
        return strip_tags(content);
    }
    if let Some(desc) = item.description() {
        return strip_tags(desc);
    }
    String::new()
}

fn strip_tags(html: &str) -> String {
    static TAG_RE: std::sync::LazyLock<regex::Regex> =
        std::sync::LazyLock::new(|| regex::Regex::new(r"(?s)<[^>]+>").unwrap());
    TAG_RE.replace_all(html, " ").trim().to_string()
}

fn parse_item_date(item: &rss::Item) -> Option<DateTime<Utc>> {
    let raw = item.pub_date()?;
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

async fn fetch_one_feed_entries(
    http: &reqwest::Client,
    feed_url: &str,
) -> eyre::Result<Vec<rss::Item>> {
    let bytes = http
        .get(feed_url)
        .timeout(FEED_FETCH_TIMEOUT)
        .header(reqwest::header::USER_AGENT, "opviews-bot/0.1")
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    let channel = rss::Channel::read_from(&bytes[..])?;
    Ok(channel.into_items())
}

struct MergedFields {
    title: String,
    content: String,
    summary: Option<String>,
    date: Option<DateTime<Utc>>,
    source: String,
    lean: Option<String>,
    author: Option<String>,
    section: Option<String>,
}

/// The merge policy of the ingestion contract: replace title, update summary
/// only when non-empty, replace content only when strictly longer, preserve
/// the earlier date when the new one is missing, always update source/lean.
fn merge_existing(existing: &Article, incoming: IncomingArticle) -> MergedFields {
    let content = if incoming.content.len() > existing.content.len() {
        incoming.content
    } else {
        existing.content.clone()
    };
    let summary = match &incoming.summary {
        Some(s) if !s.is_empty() => incoming.summary,
        _ => existing.summary.clone(),
    };
    let date = incoming.date.or(existing.date);
    let author = incoming.author.or_else(|| existing.author.clone());
    let section = incoming.section.or_else(|| existing.section.clone());

    MergedFields {
        title: incoming.title,
        content,
        summary,
        date,
        source: incoming.source,
        lean: incoming.lean.map(|l| l.as_str().to_string()),
        author,
        section,
    }
}

/// Upsert one article, applying [`merge_existing`]'s policy against any
/// prior row sharing the same link.
async fn upsert_article(
    conn: &mut diesel_async::AsyncPgConnection,
    incoming: IncomingArticle,
) -> Result<(bool, i32), AppError> {
    let existing: Option<Article> = article::table
        .filter(article::link.eq(&incoming.link))
        .select(Article::as_select())
        .first(conn)
        .await
        .optional()?;

    match existing {
        Some(existing) => {
            let id = existing.id;
            let merged = merge_existing(&existing, incoming);

            diesel::update(article::table.filter(article::id.eq(id)))
                .set((
                    article::title.eq(merged.title),
                    article::content.eq(merged.content),
                    article::summary.eq(merged.summary),
                    article::date.eq(merged.date),
                    article::source.eq(Some(merged.source)),
                    article::lean.eq(merged.lean),
                    article::author.eq(merged.author),
                    article::section.eq(merged.section),
                    article::updated_at.eq(diesel::dsl::now),
                ))
                .execute(conn)
                .await?;
            Ok((false, id))
        }
        None => {
            let lean_str = incoming.lean.map(|l| l.as_str().to_string());
            let new_article = NewArticle {
                link: incoming.link,
                title: incoming.title,
                content: incoming.content,
                summary: incoming.summary,
                date: incoming.date,
                source: Some(incoming.source),
                lean: lean_str,
                origin: "rss".to_string(),
                author: incoming.author,
                section: incoming.section,
            };
            let inserted: Article = diesel::insert_into(article::table)
                .values(&new_article)
                .returning(Article::as_returning())
                .get_result(conn)
                .await?;
            Ok((true, inserted.id))
        }
    }
}

async fn ingest_entry(
    app: &App,
    politeness: &PolitenessState,
    feed: &FeedSource,
    item: rss::Item,
) -> eyre::Result<(bool, String)> {
    let link = item
        .link()
        .ok_or_else(|| eyre::eyre!("rss entry missing link"))?
        .to_string();
    let url = url::Url::parse(&link)?;

    let rss_text = extract_rss_text(&item);
    let origin = extract::fetch_origin(politeness, &app.http, &url).await.ok();

    let origin_text = origin.as_ref().map(|(_, text, _)| text.as_str()).unwrap_or("");
    let content = if origin_text.len() > rss_text.len() {
        origin_text.to_string()
    } else {
        rss_text
    };

    // Canonicalize per the ingestion contract: prefer rel=canonical in the
    // fetched HTML, then og:url, else the tracking-stripped/collapsed RSS
    // link (urlnorm::normalize covers the latter plus aggregator resolution).
    let canonical = match origin.as_ref().and_then(|(_, _, html)| {
        crate::urlnorm::canonicalize_fetched(&url, html)
    }) {
        Some(canon) => canon,
        None => crate::urlnorm::normalize(&app.http, &link).await,
    };

    let incoming = IncomingArticle {
        link: canonical.to_string(),
        title: item.title().unwrap_or("untitled").to_string(),
        content,
        summary: item.description().map(strip_tags),
        date: parse_item_date(&item),
        source: feed.name.to_string(),
        lean: Some(feed.lean),
        author: item.author().map(|s| s.to_string()),
        section: Some("politics".to_string()),
    };

    let mut conn = app.diesel.get().await?;
    let (inserted, _id) = upsert_article(&mut conn, incoming).await?;
    Ok((inserted, link))
}

pub async fn crawl_one_feed(app: &App, feed: &FeedSource) -> eyre::Result<CrawlStats> {
    let items = fetch_one_feed_entries(&app.http, feed.feed_url).await?;

    let results = stream::iter(items)
        .map(|item| {
            let politeness = app.politeness.as_ref();
            async move { ingest_entry(app, politeness, feed, item).await }
        })
        .buffer_unordered(extract::MAX_CONCURRENT_FETCHES)
        .collect::<Vec<_>>()
        .await;

    let mut stats = CrawlStats::default();
    for result in results {
        stats.processed += 1;
        match result {
            Ok((true, link)) => {
                stats.inserted += 1;
                if stats.samples.inserted.len() < SAMPLE_CAP {
                    stats.samples.inserted.push(link);
                }
            }
            Ok((false, link)) => {
                stats.updated += 1;
                if stats.samples.updated.len() < SAMPLE_CAP {
                    stats.samples.updated.push(link);
                }
            }
            Err(err) => {
                tracing::warn!(?err, source = feed.name, "failed to ingest rss entry");
            }
        }
    }

    Ok(stats)
}

#[derive(Default, Serialize)]
pub struct CrawlTotals {
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
}

#[derive(Default, Serialize)]
pub struct CrawlReport {
    pub by_source: std::collections::HashMap<String, CrawlStats>,
    pub total: CrawlTotals,
}

/// Crawl every configured feed (or the named subset), isolating per-feed
/// failures so one broken feed doesn't abort the run.
pub async fn crawl_rss(app: &App, only: Option<&[String]>) -> CrawlReport {
    let mut report = CrawlReport::default();

    for feed in sources::FEEDS {
        if let Some(only) = only {
            if !only.iter().any(|n| n == feed.name) {
                continue;
            }
        }
        match crawl_one_feed(app, feed).await {
            Ok(stats) => {
                report.total.processed += stats.processed;
                report.total.inserted += stats.inserted;
                report.total.updated += stats.updated;
                report.by_source.insert(feed.name.to_string(), stats);
            }
            Err(err) => {
                tracing::error!(?err, source = feed.name, "feed crawl failed");
                report.by_source.insert(
                    feed.name.to_string(),
                    CrawlStats {
                        processed: 0,
                        inserted: 0,
                        updated: 0,
                        samples: Samples::default(),
                    },
                );
            }
        }
    }

    report
}

pub mod routes {
    use std::collections::HashMap;

    use axum::extract::{Path, Query, State};
    use axum::routing::get;
    use axum::Router;
    use diesel::prelude::*;
    use diesel_async::RunQueryDsl;
    use serde::Deserialize;

    use super::{crawl_one_feed, crawl_rss, sources};
    use crate::app::App;
    use crate::error::AppError;
    use crate::models::article::Article;
    use crate::schema::article;

    pub fn route() -> Router<App> {
        Router::<App>::new()
            .route("/rss/run", get(run_all))
            .route("/rss/run/{source}", get(run_one))
            .route("/rss/stats", get(stats))
            .route("/rss/recent", get(recent))
    }

    #[derive(Deserialize)]
    struct RunQuery {
        sources: Option<String>,
    }

    #[axum::debug_handler]
    async fn run_all(
        State(ctx): State<App>,
        Query(q): Query<RunQuery>,
    ) -> Result<axum::Json<super::CrawlReport>, AppError> {
        let only = q
            .sources
            .map(|s| s.split(',').map(|s| s.trim().to_string()).collect::<Vec<_>>());
        let report = crawl_rss(&ctx, only.as_deref()).await;
        Ok(axum::Json(report))
    }

    #[axum::debug_handler]
    async fn run_one(
        State(ctx): State<App>,
        Path(source): Path<String>,
    ) -> Result<axum::Json<super::CrawlStats>, AppError> {
        let feed = sources::by_name(&source)
            .ok_or_else(|| AppError::NotFound(format!("unknown source `{source}`")))?;
        let stats = crawl_one_feed(&ctx, feed)
            .await
            .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;
        Ok(axum::Json(stats))
    }

    #[derive(Deserialize)]
    struct StatsQuery {
        since_hours: Option<i64>,
    }

    #[derive(serde::Serialize)]
    struct SourceStats {
        count: i64,
        within_window: i64,
        latest_article_date: Option<chrono::DateTime<chrono::Utc>>,
    }

    #[axum::debug_handler]
    async fn stats(
        State(ctx): State<App>,
        Query(q): Query<StatsQuery>,
    ) -> Result<axum::Json<HashMap<String, SourceStats>>, AppError> {
        let since_hours = q.since_hours.unwrap_or(24);
        let mut conn = ctx.diesel.get().await?;
        let cutoff = chrono::Utc::now() - chrono::Duration::hours(since_hours);

        let mut out = HashMap::new();
        for feed in sources::FEEDS {
            let count: i64 = article::table
                .filter(article::source.eq(feed.name))
                .count()
                .get_result(&mut conn)
                .await?;
            let within_window: i64 = article::table
                .filter(article::source.eq(feed.name))
                .filter(article::date.ge(cutoff))
                .count()
                .get_result(&mut conn)
                .await?;
            let latest: Option<chrono::DateTime<chrono::Utc>> = article::table
                .filter(article::source.eq(feed.name))
                .select(diesel::dsl::max(article::date))
                .first(&mut conn)
                .await?;
            out.insert(
                feed.name.to_string(),
                SourceStats {
                    count,
                    within_window,
                    latest_article_date: latest,
                },
            );
        }
        Ok(axum::Json(out))
    }

    #[derive(Deserialize)]
    struct RecentQuery {
        source: Option<String>,
        limit: Option<i64>,
    }

    #[axum::debug_handler]
    async fn recent(
        State(ctx): State<App>,
        Query(q): Query<RecentQuery>,
    ) -> Result<axum::Json<Vec<Article>>, AppError> {
        let mut conn = ctx.diesel.get().await?;
        let limit = q.limit.unwrap_or(50).clamp(1, 500);

        let mut query = article::table.into_boxed();
        if let Some(source) = &q.source {
            query = query.filter(article::source.eq(source));
        }
        let rows: Vec<Article> = query
            .order(article::date.desc())
            .limit(limit)
            .select(Article::as_select())
            .load(&mut conn)
            .await?;
        Ok(axum::Json(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_article() -> Article {
        Article {
            id: 1,
            link: "https://press.example/a".to_string(),
            title: "Old Title".to_string(),
            content: "short body".to_string(),
            summary: Some("old summary".to_string()),
            date: Some(Utc::now() - chrono::Duration::hours(5)),
            source: Some("The Daily Current".to_string()),
            lean: Some("progressive".to_string()),
            origin: "rss".to_string(),
            author: Some("Old Author".to_string()),
            section: Some("politics".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn base_incoming() -> IncomingArticle {
        IncomingArticle {
            link: "https://press.example/a".to_string(),
            title: "New Title".to_string(),
            content: "short body".to_string(),
            summary: None,
            date: None,
            source: "The Daily Current".to_string(),
            lean: Some(Lean::Progressive),
            author: None,
            section: None,
        }
    }

    #[test]
    fn title_always_replaced() {
        let merged = merge_existing(&base_article(), base_incoming());
        assert_eq!(merged.title, "New Title");
    }

    #[test]
    fn content_kept_unless_incoming_is_strictly_longer() {
        let existing = base_article();
        let mut incoming = base_incoming();
        incoming.content = "x".to_string();
        let merged = merge_existing(&existing, incoming);
        assert_eq!(merged.content, "short body");

        let existing = base_article();
        let mut incoming = base_incoming();
        incoming.content = "a much longer replacement body than before".to_string();
        let longer = incoming.content.clone();
        let merged = merge_existing(&existing, incoming);
        assert_eq!(merged.content, longer);
    }

    #[test]
    fn summary_kept_when_incoming_is_empty_or_absent() {
        let existing = base_article();
        let mut incoming = base_incoming();
        incoming.summary = Some(String::new());
        let merged = merge_existing(&existing, incoming);
        assert_eq!(merged.summary, Some("old summary".to_string()));

        let existing = base_article();
        let incoming = base_incoming();
        let merged = merge_existing(&existing, incoming);
        assert_eq!(merged.summary, Some("old summary".to_string()));
    }

    #[test]
    fn summary_replaced_when_incoming_non_empty() {
        let existing = base_article();
        let mut incoming = base_incoming();
        incoming.summary = Some("fresh summary".to_string());
        let merged = merge_existing(&existing, incoming);
        assert_eq!(merged.summary, Some("fresh summary".to_string()));
    }

    #[test]
    fn date_preserved_when_incoming_missing() {
        let existing = base_article();
        let existing_date = existing.date;
        let incoming = base_incoming();
        let merged = merge_existing(&existing, incoming);
        assert_eq!(merged.date, existing_date);
    }

    #[test]
    fn date_replaced_when_incoming_present() {
        let existing = base_article();
        let mut incoming = base_incoming();
        let new_date = Utc::now();
        incoming.date = Some(new_date);
        let merged = merge_existing(&existing, incoming);
        assert_eq!(merged.date, Some(new_date));
    }

    #[test]
    fn strip_tags_removes_markup_and_trims() {
        assert_eq!(strip_tags("<p>Hello <b>world</b></p>  "), "Hello world");
    }
}
