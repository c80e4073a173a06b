//! Canonicalizes article URLs: strips tracking params, collapses mobile
//! subdomains and AMP paths, and resolves aggregator pages to their origin
//! article link.

use std::time::Duration;

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

const TRACKING_KEYS: &[&str] = &[
    "gclid", "fbclid", "ncid", "ref", "ref_src", "referrer", "spm",
];

static AMP_PATH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)/amp(?:/|$)").unwrap());

static ORIGIN_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<a[^>]+(?:class="[^"]*\b(?:origin-link|origin_link)\b[^"]*"|aria-label="Original Article")[^>]*href="([^"]+)""#,
    )
    .unwrap()
});

static CANONICAL_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<link[^>]+rel=["']canonical["'][^>]*href=["']([^"']+)["']"#).unwrap()
});

static OG_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<meta[^>]+property=["']og:url["'][^>]*content=["']([^"']+)["']"#).unwrap()
});

/// Hosts belonging to the configured news-aggregator family (mirroring/link
/// aggregation rather than original reporting).
const AGGREGATOR_HOSTS: &[&str] = &["newshub.example"];

const AGGREGATOR_TIMEOUT: Duration = Duration::from_secs(10);

fn is_aggregator_host(host: &str) -> bool {
    AGGREGATOR_HOSTS.iter().any(|h| host.ends_with(*h))
}

fn is_naver_like(host: &str) -> bool {
    // The aggregator family is exempt from mobile-subdomain collapsing: its
    // `m.` subdomain serves distinct content, not a mobile mirror.
    is_aggregator_host(host)
}

pub(crate) fn strip_tracking_params(url: &Url) -> Url {
    let mut out = url.clone();
    let filtered: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !(TRACKING_KEYS.contains(&k.as_ref()) || k.starts_with("utm_")))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if filtered.is_empty() {
        out.set_query(None);
    } else {
        let qs = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(filtered)
            .finish();
        out.set_query(Some(&qs));
    }
    out
}

pub(crate) fn collapse_variants(url: &Url) -> Url {
    let mut out = url.clone();
    if let Some(host) = url.host_str() {
        if let Some(stripped) = host.strip_prefix("m.") {
            if !is_naver_like(host) {
                let _ = out.set_host(Some(stripped));
            }
        }
    }
    let path = AMP_PATH_RE.replace(out.path(), "/").into_owned();
    out.set_path(&path);
    out
}

/// Extract the origin-article href from an aggregator page's HTML, resolved
/// against the page URL.
fn extract_origin_href(page_url: &Url, html: &str) -> Option<Url> {
    let href = ORIGIN_LINK_RE.captures(html)?.get(1)?.as_str();
    page_url.join(href).ok()
}

/// Resolve an aggregator URL to the origin article it links to, fetching the
/// page once. Returns `None` on any network/parse failure or absence of an
/// origin link, in which case the caller falls back to the collapsed URL.
async fn resolve_aggregator_origin(client: &reqwest::Client, url: &Url) -> Option<Url> {
    let html = client
        .get(url.clone())
        .timeout(AGGREGATOR_TIMEOUT)
        .header(reqwest::header::USER_AGENT, "opviews-bot/0.1")
        .send()
        .await
        .ok()?
        .error_for_status()
        .ok()?
        .text()
        .await
        .ok()?;
    let origin = extract_origin_href(url, &html)?;
    Some(collapse_variants(&strip_tracking_params(&origin)))
}

/// Canonicalize a fetched article's link: prefer a `rel=canonical` link tag
/// in its HTML, then an `og:url` meta tag, else `None` (caller falls back to
/// the tracking-stripped RSS link). Hits are resolved against `page_url` and
/// tracking-stripped/variant-collapsed before being returned.
pub(crate) fn canonicalize_fetched(page_url: &Url, html: &str) -> Option<Url> {
    let href = CANONICAL_LINK_RE
        .captures(html)
        .or_else(|| OG_URL_RE.captures(html))?
        .get(1)?
        .as_str();
    let resolved = page_url.join(href).ok()?;
    Some(collapse_variants(&strip_tracking_params(&resolved)))
}

/// Full normalization pipeline: strip tracking params, collapse mobile/AMP
/// variants, and if the host belongs to the aggregator family, recursively
/// resolve to the origin article.
pub async fn normalize(client: &reqwest::Client, raw: &str) -> Url {
    let Ok(parsed) = Url::parse(raw) else {
        return Url::parse("about:invalid").expect("static url parses");
    };
    let collapsed = collapse_variants(&strip_tracking_params(&parsed));

    let Some(host) = collapsed.host_str() else {
        return collapsed;
    };

    if is_aggregator_host(host) {
        if let Some(origin) = resolve_aggregator_origin(client, &collapsed).await {
            return origin;
        }
    }

    collapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tracking_params_only() {
        let u = Url::parse("https://press.example/a?utm_source=x&gclid=1&id=5").unwrap();
        let stripped = strip_tracking_params(&u);
        assert_eq!(stripped.query(), Some("id=5"));
    }

    #[test]
    fn collapses_mobile_subdomain() {
        let u = Url::parse("https://m.press.example/amp/article/1").unwrap();
        let collapsed = collapse_variants(&u);
        assert_eq!(collapsed.host_str(), Some("press.example"));
        assert_eq!(collapsed.path(), "/article/1");
    }

    #[test]
    fn keeps_aggregator_mobile_subdomain() {
        let u = Url::parse("https://m.newshub.example/story/1").unwrap();
        let collapsed = collapse_variants(&u);
        assert_eq!(collapsed.host_str(), Some("m.newshub.example"));
    }

    #[test]
    fn extracts_origin_link_from_html() {
        let page = Url::parse("https://newshub.example/story/1").unwrap();
        let html = r#"<a class="origin-link" href="/redirect?x=1">origin</a>"#;
        let origin = extract_origin_href(&page, html).unwrap();
        assert_eq!(origin.path(), "/redirect");
    }

    #[test]
    fn collapse_and_strip_is_idempotent() {
        let u = Url::parse("https://m.press.example/amp/article/1?utm_source=x&id=5").unwrap();
        let once = collapse_variants(&strip_tracking_params(&u));
        let twice = collapse_variants(&strip_tracking_params(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn canonicalize_fetched_prefers_canonical_link() {
        let page = Url::parse("https://press.example/a?utm_source=x").unwrap();
        let html = r#"<html><head>
            <link rel="canonical" href="https://press.example/a-canonical" />
            <meta property="og:url" content="https://press.example/a-og" />
        </head></html>"#;
        let canon = canonicalize_fetched(&page, html).unwrap();
        assert_eq!(canon.path(), "/a-canonical");
    }

    #[test]
    fn canonicalize_fetched_falls_back_to_og_url() {
        let page = Url::parse("https://press.example/a").unwrap();
        let html = r#"<meta property="og:url" content="https://press.example/a-og?gclid=1" />"#;
        let canon = canonicalize_fetched(&page, html).unwrap();
        assert_eq!(canon.path(), "/a-og");
        assert_eq!(canon.query(), None);
    }

    #[test]
    fn canonicalize_fetched_none_when_absent() {
        let page = Url::parse("https://press.example/a").unwrap();
        let html = "<html><head></head></html>";
        assert!(canonicalize_fetched(&page, html).is_none());
    }

    #[tokio::test]
    async fn normalize_passes_through_non_aggregator_host() {
        let client = reqwest::Client::new();
        let out = normalize(&client, "https://m.press.example/amp/a?utm_source=x&id=5").await;
        assert_eq!(out.host_str(), Some("press.example"));
        assert_eq!(out.path(), "/a");
        assert_eq!(out.query(), Some("id=5"));
    }
}
