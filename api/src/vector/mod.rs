//! Corpus-wide TF-IDF index backed by Qdrant: training, batched indexing,
//! and opposing-lean time-windowed search with fallback.

pub mod tfidf;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures::stream::{self, StreamExt};
use qdrant_client::qdrant::{
    vectors_config::Config as VectorsConfigOneOf, Condition, CreateCollectionBuilder, Distance,
    Filter, PointStruct, Range, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParams, VectorsConfig,
};
use qdrant_client::Qdrant;
use serde_json::Value;

use crate::config::QdrantSettings;
use crate::error::AppError;
use crate::lean::Lean;
use tfidf::{SparseVector, TfidfModel, TfidfParams};

const UPSERT_BATCH_SIZE: usize = 1000;
const MAX_CONCURRENT_BATCHES: usize = 4;

const TRAIN_PARAMS: TfidfParams = TfidfParams {
    min_df: 3,
    max_df: 0.9,
    ngram_range: (1, 2),
    max_features: Some(20_000),
    sublinear_tf: true,
};

/// Source article fed into training/indexing.
pub struct IndexableArticle {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub link: String,
    pub source: Option<String>,
    pub lean: Option<Lean>,
    pub date_ts: Option<i64>,
    pub date: Option<String>,
}

pub struct SearchHit {
    pub id: i32,
    pub score: f32,
    pub payload: Value,
}

/// Query-time view: the fitted vectorizer, hot-swappable so a reindex can
/// publish a new model without blocking in-flight queries.
pub struct VectorIndex {
    client: Qdrant,
    collection: String,
    model: ArcSwap<Option<TfidfModel>>,
    model_path: std::path::PathBuf,
}

pub(crate) fn doc_text(title: &str, body: &str) -> String {
    // Title doubled for weight, matching the training document construction.
    let clipped: String = body.chars().take(400).collect();
    format!("{title} {title} {clipped}")
}

fn dense_vector(v: &SparseVector, dim: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; dim];
    for (id, w) in v {
        if (*id as usize) < dim {
            out[*id as usize] = *w;
        }
    }
    out
}

fn article_payload(a: &IndexableArticle) -> HashMap<String, QdrantValue> {
    let mut payload = HashMap::new();
    payload.insert("id".to_string(), QdrantValue::from(a.id as i64));
    payload.insert("title".to_string(), QdrantValue::from(a.title.clone()));
    payload.insert("content".to_string(), QdrantValue::from(a.content.clone()));
    payload.insert("link".to_string(), QdrantValue::from(a.link.clone()));
    if let Some(source) = &a.source {
        payload.insert("source".to_string(), QdrantValue::from(source.clone()));
    }
    if let Some(lean) = a.lean {
        payload.insert("lean".to_string(), QdrantValue::from(lean.as_str().to_string()));
    }
    if let Some(ts) = a.date_ts {
        payload.insert("date_ts".to_string(), QdrantValue::from(ts));
    }
    if let Some(date) = &a.date {
        payload.insert("date".to_string(), QdrantValue::from(date.clone()));
    }
    payload
}

impl VectorIndex {
    pub async fn connect(settings: &QdrantSettings, model_path: &str) -> eyre::Result<Self> {
        let mut builder = Qdrant::from_url(&settings.url);
        if let Some(api_key) = &settings.api_key {
            builder = builder.api_key(api_key.clone());
        }
        let client = builder
            .skip_compatibility_check()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(VectorIndex {
            client,
            collection: settings.collection.clone(),
            model: ArcSwap::new(Arc::new(None)),
            model_path: std::path::PathBuf::from(model_path),
        })
    }

    pub fn load_model(&self, model: TfidfModel) {
        self.model.store(Arc::new(Some(model)));
    }

    /// Load a previously persisted vectorizer artifact from disk, if one
    /// exists, publishing it the same way a fresh reindex would. Called once
    /// at startup so queries aren't stuck erroring until the first
    /// `crawl_all` completes.
    pub fn load_persisted_model(&self) -> eyre::Result<bool> {
        if !self.model_path.exists() {
            return Ok(false);
        }
        let model = TfidfModel::load_from_path(&self.model_path)?;
        self.load_model(model);
        Ok(true)
    }

    fn current_model(&self) -> Result<Arc<Option<TfidfModel>>, AppError> {
        let guard = self.model.load_full();
        if guard.is_none() {
            return Err(AppError::Corrupted("vectorizer not loaded".into()));
        }
        Ok(guard)
    }

    /// Stored vector dimension of the live collection, if it exists.
    async fn stored_collection_dim(&self) -> eyre::Result<Option<usize>> {
        let collections = self.client.list_collections().await?;
        let existing = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection);
        if !existing {
            return Ok(None);
        }
        let info = self.client.collection_info(&self.collection).await?;
        Ok(info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|c| match c {
                VectorsConfigOneOf::Params(p) => Some(p.size as usize),
                _ => None,
            }))
    }

    async fn ensure_collection_dim(&self, dim: usize) -> eyre::Result<()> {
        let current_dim = self.stored_collection_dim().await?;
        let needs_recreate = current_dim != Some(dim);
        let existing = current_dim.is_some();

        if needs_recreate {
            if existing {
                self.client.delete_collection(&self.collection).await?;
            }
            let create = CreateCollectionBuilder::new(&self.collection).vectors_config(
                VectorsConfig {
                    config: Some(VectorsConfigOneOf::Params(VectorParams {
                        size: dim as u64,
                        distance: Distance::Cosine.into(),
                        ..Default::default()
                    })),
                },
            );
            self.client.create_collection(create).await?;
        }

        Ok(())
    }

    /// Train the vectorizer over the full corpus and reindex every article.
    /// The new model is published via an atomic pointer swap only after the
    /// reindex completes successfully, so concurrent queries never observe a
    /// model whose dimension doesn't match the live collection.
    pub async fn train_and_index(&self, articles: &[IndexableArticle]) -> eyre::Result<usize> {
        let docs: Vec<String> = articles
            .iter()
            .map(|a| doc_text(&a.title, &a.content))
            .collect();
        let (model, vectors) = TfidfModel::fit_transform(&docs, &TRAIN_PARAMS);
        let dim = model.dim();

        self.ensure_collection_dim(dim).await?;

        let points: Vec<PointStruct> = articles
            .iter()
            .zip(vectors.iter())
            .map(|(article, vec)| {
                PointStruct::new(
                    article.id as u64,
                    dense_vector(vec, dim),
                    article_payload(article),
                )
            })
            .collect();

        let collection = self.collection.clone();
        let batches: Vec<Vec<PointStruct>> = points
            .chunks(UPSERT_BATCH_SIZE)
            .map(|c| c.to_vec())
            .collect();

        let client = &self.client;
        stream::iter(batches)
            .map(|batch| {
                let collection = collection.clone();
                async move {
                    let upsert = UpsertPointsBuilder::new(collection, batch);
                    client.upsert_points(upsert).await
                }
            })
            .buffer_unordered(MAX_CONCURRENT_BATCHES)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        if let Err(err) = model.save_to_path(&self.model_path) {
            tracing::warn!(?err, path = %self.model_path.display(), "failed to persist vectorizer artifact");
        }
        self.load_model(model);

        let count = self
            .client
            .count(qdrant_client::qdrant::CountPointsBuilder::new(&self.collection).exact(true))
            .await?
            .result
            .map(|r| r.count)
            .unwrap_or(0);

        Ok(count as usize)
    }

    /// Search for opposing-lean articles within a time window, falling back
    /// to the date-only filter if the combined must+should filter returns no
    /// hits.
    pub async fn search(
        &self,
        query_text: &str,
        base_lean: Option<Lean>,
        base_date_ts: Option<i64>,
        hours_window: i64,
        top_k: u64,
    ) -> Result<Vec<SearchHit>, AppError> {
        let model_guard = self.current_model()?;
        let model = model_guard.as_ref().as_ref().expect("checked non-none above");

        if let Some(stored_dim) = self
            .stored_collection_dim()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("collection info: {e}")))?
        {
            if stored_dim != model.dim() {
                return Err(AppError::Corrupted(format!(
                    "vectorizer dim {} does not match collection dim {stored_dim}",
                    model.dim()
                )));
            }
        }

        let query_vec = dense_vector(&model.transform(query_text), model.dim());

        let mut must = Vec::new();
        if let Some(center) = base_date_ts {
            let span = hours_window * 3600;
            must.push(Condition::range(
                "date_ts",
                Range {
                    gte: Some((center - span) as f64),
                    lte: Some((center + span) as f64),
                    ..Default::default()
                },
            ));
        }

        let opposites: Vec<String> = base_lean
            .map(|l| l.opposites().iter().map(|o| o.as_str().to_string()).collect())
            .unwrap_or_default();

        let run_search = |filter: Filter| {
            let query_vec = query_vec.clone();
            async move {
                let search = SearchPointsBuilder::new(&self.collection, query_vec, top_k)
                    .with_payload(true)
                    .filter(filter);
                self.client.search_points(search).await
            }
        };

        if !opposites.is_empty() {
            let mut should = Vec::new();
            for lean in &opposites {
                should.push(Condition::matches("lean", lean.clone()));
            }
            let combined = Filter {
                must: must.clone(),
                should,
                ..Default::default()
            };
            let result = run_search(combined)
                .await
                .map_err(|e| AppError::UpstreamUnavailable(format!("vector search: {e}")))?;
            if !result.result.is_empty() {
                return Ok(result.result.into_iter().map(hit_from_scored_point).collect());
            }
        }

        let fallback = Filter {
            must,
            ..Default::default()
        };
        let result = run_search(fallback)
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("vector search: {e}")))?;
        Ok(result.result.into_iter().map(hit_from_scored_point).collect())
    }
}

fn hit_from_scored_point(point: qdrant_client::qdrant::ScoredPoint) -> SearchHit {
    let id = point
        .payload
        .get("id")
        .and_then(|v| v.as_integer())
        .unwrap_or(0) as i32;
    let payload = point
        .payload
        .into_iter()
        .map(|(k, v)| (k, qdrant_value_to_json(v)))
        .collect::<serde_json::Map<_, _>>();
    SearchHit {
        id,
        score: point.score,
        payload: Value::Object(payload),
    }
}

fn qdrant_value_to_json(v: QdrantValue) -> Value {
    match v.kind {
        Some(qdrant_client::qdrant::value::Kind::NullValue(_)) => Value::Null,
        Some(qdrant_client::qdrant::value::Kind::BoolValue(b)) => Value::Bool(b),
        Some(qdrant_client::qdrant::value::Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(qdrant_client::qdrant::value::Kind::DoubleValue(f)) => {
            Value::Number(serde_json::Number::from_f64(f).unwrap_or_else(|| 0.into()))
        }
        Some(qdrant_client::qdrant::value::Kind::StringValue(s)) => Value::String(s),
        Some(qdrant_client::qdrant::value::Kind::ListValue(list)) => {
            Value::Array(list.values.into_iter().map(qdrant_value_to_json).collect())
        }
        Some(qdrant_client::qdrant::value::Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, qdrant_value_to_json(v)))
                .collect(),
        ),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_text_doubles_title_weight_and_clips_body() {
        let body: String = "word ".repeat(200);
        let text = doc_text("Headline", &body);
        assert!(text.starts_with("Headline Headline "));
        // body clipped to 400 chars before appending.
        assert_eq!(text.chars().count(), "Headline Headline ".chars().count() + 400);
    }

    #[test]
    fn dense_vector_ignores_out_of_range_ids() {
        let sparse: SparseVector = vec![(0, 1.0), (2, 0.5), (10, 9.9)];
        let out = dense_vector(&sparse, 4);
        assert_eq!(out, vec![1.0, 0.0, 0.5, 0.0]);
    }

    #[test]
    fn dense_vector_handles_empty_sparse_and_zero_dim() {
        let sparse: SparseVector = Vec::new();
        assert_eq!(dense_vector(&sparse, 3), vec![0.0, 0.0, 0.0]);
        assert!(dense_vector(&sparse, 0).is_empty());
    }
}
