#[derive(Clone)]
pub enum Env {
    Dev,
    Staging,
    Production,
}

pub struct ServerConfig {
    pub env: Env,

    /// Postgres connection string for the article store / recommendation cache.
    pub database_url: String,

    pub qdrant: QdrantSettings,

    /// Directory the NLI tokenizer/model files are loaded from.
    pub nli_model_dir: String,

    /// Path the fitted TF-IDF vectorizer is persisted to/loaded from across
    /// restarts.
    pub vectorizer_path: String,

    pub recommend: RecommendSettings,
    pub scheduler: SchedulerSettings,
}

pub struct QdrantSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
}

pub struct RecommendSettings {
    pub cache_ttl_hours: i64,
    pub hours_window_default: i64,
    pub hours_window_bounds: (i64, i64),
    pub top_k_default: i64,
    pub top_k_bounds: (i64, i64),
    pub nli_threshold_default: f64,
    pub nli_threshold_bounds: (f64, f64),
    pub overfetch_top_k: i64,
}

pub struct SchedulerSettings {
    pub crawl_interval_mins: u64,
    pub recommend_refresh_interval_mins: u64,
    pub recommend_refresh_lookback_hours: i64,
    pub recommend_refresh_max_items: i64,
    pub bootstrap_delay_secs: u64,
    pub bootstrap_precompute_lookback_hours: i64,
    pub nli_warmup_delay_secs: u64,
    pub summarize_batch_limit: i64,
}

fn var(key: &str) -> Result<Option<String>, String> {
    match std::env::var(key) {
        Ok(env) => Ok(Some(env)),
        Err(e) => {
            tracing::warn!("Mising environment variable `{key}`");
            match e {
                std::env::VarError::NotPresent => Ok(None),
                std::env::VarError::NotUnicode(_) => Err(format!(
                    "Could not get the environment variable `{key}` due to unicode error"
                )),
            }
        }
    }
}

fn required_var(key: &str) -> String {
    let val = var(key);
    match val {
        Ok(val) => match val {
            Some(val) => val,
            None => {
                tracing::error!("Environment variable `{key}` is required");
                std::process::exit(1)
            }
        },
        Err(e) => {
            tracing::error!(
                "Environment variable `{key}` is required, but could not retrieve: {e}"
            );
            std::process::exit(1)
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    var(key).ok().flatten().unwrap_or_else(|| default.to_string())
}

fn var_parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .flatten()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    pub fn new_from_env() -> Self {
        let env = match var("ENVIRONMENT") {
            Ok(Some(env)) => match env.as_str() {
                "dev" => Env::Dev,
                "staging" => Env::Staging,
                "production" => Env::Production,
                _ => Env::Dev,
            },
            _ => Env::Dev,
        };

        let database_url = required_var("DATABASE_URL");

        let qdrant = QdrantSettings {
            url: var_or("QDRANT_URL", "http://localhost:6334"),
            api_key: var("QDRANT_API_KEY").ok().flatten(),
            collection: var_or("QDRANT_COLLECTION", "article_tfidf"),
        };

        let nli_model_dir = var_or("NLI_MODEL_DIR", ".cache/nli-model");
        let vectorizer_path = var_or("VECTORIZER_PATH", ".cache/tfidf-vectorizer.json");

        let recommend = RecommendSettings {
            cache_ttl_hours: var_parsed_or("RECOMMEND_CACHE_TTL_HOURS", 6),
            hours_window_default: var_parsed_or("RECOMMEND_HOURS_WINDOW_DEFAULT", 48),
            hours_window_bounds: (6, 168),
            top_k_default: var_parsed_or("RECOMMEND_TOP_K_DEFAULT", 8),
            top_k_bounds: (1, 20),
            nli_threshold_default: var_parsed_or("RECOMMEND_NLI_THRESHOLD_DEFAULT", 0.15),
            nli_threshold_bounds: (0.0, 1.0),
            overfetch_top_k: var_parsed_or("RECOMMEND_OVERFETCH_TOP_K", 80),
        };

        let scheduler = SchedulerSettings {
            crawl_interval_mins: var_parsed_or("SCHEDULER_CRAWL_INTERVAL_MINS", 180),
            recommend_refresh_interval_mins: var_parsed_or(
                "SCHEDULER_RECOMMEND_REFRESH_INTERVAL_MINS",
                30,
            ),
            recommend_refresh_lookback_hours: var_parsed_or(
                "SCHEDULER_RECOMMEND_REFRESH_LOOKBACK_HOURS",
                72,
            ),
            recommend_refresh_max_items: var_parsed_or(
                "SCHEDULER_RECOMMEND_REFRESH_MAX_ITEMS",
                600,
            ),
            bootstrap_delay_secs: var_parsed_or("SCHEDULER_BOOTSTRAP_DELAY_SECS", 2),
            bootstrap_precompute_lookback_hours: var_parsed_or(
                "SCHEDULER_BOOTSTRAP_PRECOMPUTE_LOOKBACK_HOURS",
                168,
            ),
            nli_warmup_delay_secs: var_parsed_or("SCHEDULER_NLI_WARMUP_DELAY_SECS", 1),
            summarize_batch_limit: var_parsed_or("SCHEDULER_SUMMARIZE_BATCH_LIMIT", 200),
        };

        ServerConfig {
            env,
            database_url,
            qdrant,
            nli_model_dir,
            vectorizer_path,
            recommend,
            scheduler,
        }
    }
}
