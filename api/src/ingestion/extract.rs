//! Origin-article fetch: robots.txt politeness, per-host rate limiting,
//! full-text extraction and markdown conversion.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use eyre::eyre;
use robotxt::Robots;
use tokio::sync::Mutex;

const ROBOTS_USER_AGENT: &str = "opviews-bot";
const DEFAULT_CRAWL_DELAY: Duration = Duration::from_secs(1);

/// Per-host politeness: a robots.txt cache and a next-allowed-fetch clock,
/// shared across every feed being ingested concurrently.
pub struct PolitenessState {
    robots_cache: Mutex<HashMap<String, Robots>>,
    next_allowed: Mutex<HashMap<String, Instant>>,
}

impl Default for PolitenessState {
    fn default() -> Self {
        Self::new()
    }
}

impl PolitenessState {
    pub fn new() -> Self {
        PolitenessState {
            robots_cache: Mutex::new(HashMap::new()),
            next_allowed: Mutex::new(HashMap::new()),
        }
    }

    async fn wait(&self, domain: &str, delay: Duration) {
        loop {
            let sleep_for = {
                let mut guard = self.next_allowed.lock().await;
                let now = Instant::now();
                match guard.get(domain) {
                    Some(next) if *next > now => Some(*next - now),
                    _ => {
                        guard.insert(domain.to_string(), now + delay);
                        None
                    }
                }
            };
            match sleep_for {
                Some(d) => tokio::time::sleep(d).await,
                None => break,
            }
        }
    }

    async fn robots_for(&self, http: &reqwest::Client, url: &url::Url) -> eyre::Result<Robots> {
        let host = url.host_str().ok_or_else(|| eyre!("missing host"))?.to_string();

        {
            let cache = self.robots_cache.lock().await;
            if let Some(info) = cache.get(&host).cloned() {
                return Ok(info);
            }
        }

        self.wait(&host, DEFAULT_CRAWL_DELAY).await;

        let base = url::Url::parse(&format!("{}://{}/", url.scheme(), host))?;
        let robots_url = robotxt::create_url(&base).map_err(|e| eyre!(e))?;
        let body = match http.get(robots_url).send().await {
            Ok(resp) => resp.text().await.unwrap_or_default(),
            Err(_) => String::new(),
        };

        let robots = if body.is_empty() {
            Robots::from_always(true, ROBOTS_USER_AGENT)
        } else {
            Robots::from_bytes(body.as_bytes(), ROBOTS_USER_AGENT)
        };

        self.robots_cache.lock().await.insert(host, robots.clone());
        Ok(robots)
    }
}

/// Fetch an origin article's full text, respecting robots.txt and the
/// per-host crawl delay. Returns `(title, markdown_body, raw_html)` — the
/// raw HTML is kept around so the caller can canonicalize the link via its
/// `rel=canonical`/`og:url` tags.
pub async fn fetch_origin(
    politeness: &PolitenessState,
    http: &reqwest::Client,
    url: &url::Url,
) -> eyre::Result<(Option<String>, String, String)> {
    let domain = url.host_str().ok_or_else(|| eyre!("missing host"))?;

    let robots = politeness.robots_for(http, url).await?;
    if !robots.is_absolute_allowed(url) {
        return Err(eyre!("robots.txt disallows crawling this URL"));
    }

    politeness
        .wait(domain, robots.crawl_delay().unwrap_or(DEFAULT_CRAWL_DELAY))
        .await;

    let article = article_scraper::ArticleScraper::new(None)
        .await
        .parse(url, false, http, None)
        .await?;

    let html = article
        .html
        .ok_or_else(|| eyre!("no html content found"))?;
    let markdown = html_to_markdown_rs::convert(&html, None)?;

    Ok((article.title, markdown, html))
}
