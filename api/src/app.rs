//! Shared application state: the connection pool, HTTP client, vector index,
//! NLI scorer handle, and the ambient services background jobs coordinate
//! through. One instance is built at startup and cloned into every request
//! handler and background task.

use std::sync::Arc;

use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

use crate::config::ServerConfig;
use crate::ingestion::extract::PolitenessState;
use crate::nli::NliHandle;
use crate::scheduler::SchedulerState;
use crate::vector::VectorIndex;

#[derive(Clone)]
pub struct App {
    pub diesel: Pool<AsyncPgConnection>,
    pub http: reqwest::Client,
    pub config: Arc<ServerConfig>,
    pub vector: Arc<VectorIndex>,
    pub nli: Arc<NliHandle>,
    pub politeness: Arc<PolitenessState>,
    pub scheduler: Arc<SchedulerState>,
}

impl App {
    pub async fn bootstrap(config: ServerConfig) -> eyre::Result<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);
        let diesel = Pool::builder(manager)
            .max_size(10)
            .runtime(deadpool_runtime::Runtime::Tokio1)
            .build()?;

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(12))
            .build()?;

        let vector = VectorIndex::connect(&config.qdrant, &config.vectorizer_path).await?;
        match vector.load_persisted_model() {
            Ok(true) => tracing::info!(path = %config.vectorizer_path, "loaded persisted vectorizer"),
            Ok(false) => tracing::info!("no persisted vectorizer found, waiting for first reindex"),
            Err(err) => tracing::warn!(?err, "failed to load persisted vectorizer, waiting for first reindex"),
        }
        let nli = NliHandle::new(config.nli_model_dir.clone());

        Ok(App {
            diesel,
            http,
            config: Arc::new(config),
            vector: Arc::new(vector),
            nli: Arc::new(nli),
            politeness: Arc::new(PolitenessState::new()),
            scheduler: Arc::new(SchedulerState::new()),
        })
    }
}
