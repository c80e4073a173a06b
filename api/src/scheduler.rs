//! Background scheduler: periodic crawl+summarize+reindex, periodic
//! recommendation precompute, and a deferred startup bootstrap. Each job is
//! single-instance; a trigger observed while the job's mutex is already held
//! is dropped rather than queued.

use std::sync::Arc;
use std::time::Duration;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tokio::sync::Mutex;

use crate::app::App;
use crate::ingestion;
use crate::recommend::cache::{self, PrecomputeOutcome};
use crate::recommend::engine::RecommendParams;
use crate::schema::article;
use crate::summarize;
use crate::vector::IndexableArticle;

pub struct SchedulerState {
    crawl_lock: Arc<Mutex<()>>,
    recommend_refresh_lock: Arc<Mutex<()>>,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerState {
    pub fn new() -> Self {
        SchedulerState {
            crawl_lock: Arc::new(Mutex::new(())),
            recommend_refresh_lock: Arc::new(Mutex::new(())),
        }
    }
}

async fn full_reindex(app: &App) -> eyre::Result<usize> {
    let mut conn = app.diesel.get().await?;
    let rows: Vec<crate::models::article::Article> = article::table
        .select(crate::models::article::Article::as_select())
        .load(&mut conn)
        .await?;
    drop(conn);

    let articles: Vec<IndexableArticle> = rows
        .into_iter()
        .map(|a| IndexableArticle {
            id: a.id,
            title: a.title,
            content: a.content,
            link: a.link,
            source: a.source,
            lean: a.lean.as_deref().and_then(crate::lean::Lean::parse),
            date_ts: a.date.map(|d| d.timestamp()),
            date: a.date.map(|d| d.to_rfc3339()),
        })
        .collect();

    app.vector.train_and_index(&articles).await
}

/// crawl_all: ingest every configured feed, fill in missing summaries, then
/// fully reindex the vector store. Dropped (not queued) if already running.
pub async fn crawl_all(app: &App) {
    let Ok(_guard) = app.scheduler.crawl_lock.try_lock() else {
        tracing::debug!("crawl_all already running, skipping this trigger");
        return;
    };

    tracing::info!("crawl_all: starting");
    let report = ingestion::crawl_rss(app, None).await;
    tracing::info!(
        processed = report.total.processed,
        inserted = report.total.inserted,
        updated = report.total.updated,
        "crawl_all: ingestion complete"
    );

    match summarize::update_missing(app, app.config.scheduler.summarize_batch_limit, false).await {
        Ok(outcome) if outcome.skipped => {
            tracing::warn!("crawl_all: summarizer lock already held, skipped");
        }
        Ok(outcome) => {
            tracing::info!(updated = outcome.updated, "crawl_all: summaries filled");
        }
        Err(err) => tracing::error!(?err, "crawl_all: summarizer batch failed"),
    }

    match full_reindex(app).await {
        Ok(count) => tracing::info!(count, "crawl_all: reindex complete"),
        Err(err) => tracing::error!(?err, "crawl_all: reindex failed"),
    }
}

/// periodic_recommend_refresh: precompute recommendations for recently
/// published articles so cache hits dominate user traffic.
pub async fn periodic_recommend_refresh(app: &App) {
    let Ok(_guard) = app.scheduler.recommend_refresh_lock.try_lock() else {
        tracing::debug!("periodic_recommend_refresh already running, skipping this trigger");
        return;
    };

    let params = RecommendParams {
        hours_window: app.config.recommend.hours_window_default,
        top_k: app.config.recommend.top_k_default,
        stance_threshold: app.config.recommend.nli_threshold_default,
    };

    match cache::precompute_recent(
        app,
        &params,
        app.config.scheduler.recommend_refresh_lookback_hours,
        app.config.scheduler.recommend_refresh_max_items,
    )
    .await
    {
        Ok(PrecomputeOutcome { scanned, cached }) => {
            tracing::info!(scanned, cached, "periodic_recommend_refresh complete");
        }
        Err(err) => tracing::error!(?err, "periodic_recommend_refresh failed"),
    }
}

async fn bootstrap_once(app: App) {
    crawl_all(&app).await;

    let params = RecommendParams {
        hours_window: app.config.recommend.hours_window_default,
        top_k: app.config.recommend.top_k_default,
        stance_threshold: app.config.recommend.nli_threshold_default,
    };
    match cache::precompute_recent(
        &app,
        &params,
        app.config.scheduler.bootstrap_precompute_lookback_hours,
        app.config.scheduler.recommend_refresh_max_items,
    )
    .await
    {
        Ok(PrecomputeOutcome { scanned, cached }) => {
            tracing::info!(scanned, cached, "bootstrap precompute complete");
        }
        Err(err) => tracing::error!(?err, "bootstrap precompute failed"),
    }
}

/// Start the three scheduled jobs plus the deferred NLI warm-up. Called once
/// at process startup.
pub fn start(app: App) {
    let crawl_app = app.clone();
    let crawl_interval = Duration::from_secs(app.config.scheduler.crawl_interval_mins * 60);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(crawl_interval);
        interval.tick().await;
        loop {
            interval.tick().await;
            crawl_all(&crawl_app).await;
        }
    });

    let refresh_app = app.clone();
    let refresh_interval =
        Duration::from_secs(app.config.scheduler.recommend_refresh_interval_mins * 60);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(refresh_interval);
        interval.tick().await;
        loop {
            interval.tick().await;
            periodic_recommend_refresh(&refresh_app).await;
        }
    });

    let bootstrap_app = app.clone();
    let bootstrap_delay = Duration::from_secs(app.config.scheduler.bootstrap_delay_secs);
    tokio::spawn(async move {
        tokio::time::sleep(bootstrap_delay).await;
        bootstrap_once(bootstrap_app).await;
    });

    let nli_app = app.clone();
    let warmup_delay = Duration::from_secs(app.config.scheduler.nli_warmup_delay_secs);
    tokio::spawn(async move {
        tokio::time::sleep(warmup_delay).await;
        if let Err(err) = nli_app.nli.get().await {
            tracing::error!(?err, "NLI model warm-up failed");
        } else {
            tracing::info!("NLI model warm-up complete");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn per_job_mutex_drops_overlapping_trigger() {
        let state = SchedulerState::new();
        let guard = state.crawl_lock.try_lock();
        assert!(guard.is_ok());

        // A second attempt while the first guard is held must observe the
        // lock as busy and be dropped by the caller, not queued.
        let second = state.crawl_lock.try_lock();
        assert!(second.is_err());

        drop(guard);
        assert!(state.crawl_lock.try_lock().is_ok());
    }

    #[test]
    fn crawl_and_refresh_locks_are_independent() {
        let state = SchedulerState::new();
        let _crawl_guard = state.crawl_lock.try_lock().unwrap();
        // Holding the crawl lock must not block the refresh job.
        assert!(state.recommend_refresh_lock.try_lock().is_ok());
    }
}
