//! A small from-scratch TF-IDF vectorizer. Used both as the corpus-wide
//! persistent model behind the vector index (`vector::mod`) and as an
//! ephemeral per-article sentence vectorizer for LexRank summarization
//! (`summarize::lexrank`) — the two callers fit independent instances with
//! different parameters, there is no shared corpus state between them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static TOKEN_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"(?u)\b\w\w+\b").unwrap());

#[derive(Debug, Clone)]
pub struct TfidfParams {
    /// Minimum document frequency (absolute count) for a term to be kept.
    pub min_df: usize,
    /// Maximum document frequency, as a fraction of the corpus size.
    pub max_df: f64,
    pub ngram_range: (usize, usize),
    pub max_features: Option<usize>,
    pub sublinear_tf: bool,
}

impl Default for TfidfParams {
    fn default() -> Self {
        TfidfParams {
            min_df: 1,
            max_df: 1.0,
            ngram_range: (1, 1),
            max_features: None,
            sublinear_tf: false,
        }
    }
}

/// A document vector: sorted `(term_id, weight)` pairs, L2-normalized.
pub type SparseVector = Vec<(u32, f32)>;

#[derive(Debug, Serialize, Deserialize)]
pub struct TfidfModel {
    vocabulary: HashMap<String, u32>,
    idf: Vec<f32>,
    ngram_range: (usize, usize),
    sublinear_tf: bool,
}

fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

fn ngrams_of(tokens: &[String], range: (usize, usize)) -> Vec<String> {
    let mut out = Vec::new();
    for n in range.0..=range.1 {
        if n == 0 || n > tokens.len() {
            continue;
        }
        for window in tokens.windows(n) {
            out.push(window.join(" "));
        }
    }
    out
}

fn term_counts(doc: &str, ngram_range: (usize, usize)) -> HashMap<String, u32> {
    let tokens = tokenize(doc);
    let mut counts = HashMap::new();
    for term in ngrams_of(&tokens, ngram_range) {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}

fn l2_normalize(mut v: SparseVector) -> SparseVector {
    let norm = v.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
    if norm > 0.0 {
        for (_, w) in v.iter_mut() {
            *w /= norm;
        }
    }
    v
}

impl TfidfModel {
    pub fn dim(&self) -> usize {
        self.vocabulary.len()
    }

    /// Fit a vectorizer on a corpus and return the model plus the
    /// transformed vectors for each input document, in order.
    pub fn fit_transform(docs: &[String], params: &TfidfParams) -> (TfidfModel, Vec<SparseVector>) {
        let n_docs = docs.len().max(1);
        let per_doc_counts: Vec<HashMap<String, u32>> = docs
            .iter()
            .map(|d| term_counts(d, params.ngram_range))
            .collect();

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut corpus_freq: HashMap<String, u64> = HashMap::new();
        for counts in &per_doc_counts {
            for (term, count) in counts {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
                *corpus_freq.entry(term.clone()).or_insert(0) += *count as u64;
            }
        }

        let max_df_count = (params.max_df * n_docs as f64).floor() as usize;
        let mut kept: Vec<String> = doc_freq
            .iter()
            .filter(|(_, &df)| df >= params.min_df && df <= max_df_count.max(params.min_df))
            .map(|(term, _)| term.clone())
            .collect();

        if let Some(max_features) = params.max_features {
            kept.sort_by(|a, b| {
                corpus_freq[b]
                    .cmp(&corpus_freq[a])
                    .then_with(|| a.cmp(b))
            });
            kept.truncate(max_features);
        }
        kept.sort();

        let vocabulary: HashMap<String, u32> = kept
            .into_iter()
            .enumerate()
            .map(|(i, term)| (term, i as u32))
            .collect();

        let mut idf = vec![0.0f32; vocabulary.len()];
        for (term, &id) in &vocabulary {
            let df = doc_freq.get(term).copied().unwrap_or(0);
            idf[id as usize] = ((1.0 + n_docs as f64) / (1.0 + df as f64)).ln() as f32 + 1.0;
        }

        let model = TfidfModel {
            vocabulary,
            idf,
            ngram_range: params.ngram_range,
            sublinear_tf: params.sublinear_tf,
        };

        let vectors = per_doc_counts
            .into_iter()
            .map(|counts| model.vectorize(counts))
            .collect();

        (model, vectors)
    }

    fn vectorize(&self, counts: HashMap<String, u32>) -> SparseVector {
        let mut v: SparseVector = counts
            .into_iter()
            .filter_map(|(term, count)| {
                let id = *self.vocabulary.get(&term)?;
                let tf = if self.sublinear_tf {
                    1.0 + (count as f32).ln()
                } else {
                    count as f32
                };
                Some((id, tf * self.idf[id as usize]))
            })
            .collect();
        v.sort_by_key(|(id, _)| *id);
        l2_normalize(v)
    }

    /// Transform a new document using the fitted vocabulary/idf.
    pub fn transform(&self, doc: &str) -> SparseVector {
        self.vectorize(term_counts(doc, self.ngram_range))
    }

    /// Persist the artifact atomically: write to a sibling temp file, then
    /// rename over the target so a reader never observes a partial write.
    pub fn save_to_path(&self, path: &std::path::Path) -> eyre::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("tmp");
        let bytes = serde_json::to_vec(self)?;
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load_from_path(path: &std::path::Path) -> eyre::Result<TfidfModel> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f32 {
    let (mut i, mut j) = (0, 0);
    let mut dot = 0.0f32;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    dot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_documents_have_similarity_one() {
        let docs = vec![
            "the quick brown fox".to_string(),
            "a slow green turtle".to_string(),
            "the quick brown fox".to_string(),
        ];
        let params = TfidfParams {
            min_df: 1,
            ..Default::default()
        };
        let (_, vecs) = TfidfModel::fit_transform(&docs, &params);
        let sim = cosine_similarity(&vecs[0], &vecs[2]);
        assert!((sim - 1.0).abs() < 1e-4);
    }

    #[test]
    fn unrelated_documents_have_low_similarity() {
        let docs = vec![
            "tariffs and trade policy".to_string(),
            "recipes for sourdough bread".to_string(),
        ];
        let params = TfidfParams {
            min_df: 1,
            ..Default::default()
        };
        let (_, vecs) = TfidfModel::fit_transform(&docs, &params);
        let sim = cosine_similarity(&vecs[0], &vecs[1]);
        assert!(sim < 0.1);
    }

    #[test]
    fn min_df_drops_rare_terms() {
        let docs = vec!["alpha beta".to_string(), "gamma delta".to_string()];
        let params = TfidfParams {
            min_df: 2,
            ..Default::default()
        };
        let (model, _) = TfidfModel::fit_transform(&docs, &params);
        assert_eq!(model.dim(), 0);
    }

    #[test]
    fn transform_matches_fit_transform_for_seen_doc() {
        let docs = vec!["red fox jumps".to_string(), "blue fox sleeps".to_string()];
        let params = TfidfParams {
            min_df: 1,
            ..Default::default()
        };
        let (model, vecs) = TfidfModel::fit_transform(&docs, &params);
        let t = model.transform(&docs[0]);
        assert_eq!(t, vecs[0]);
    }

    #[test]
    fn save_and_load_round_trip_preserves_transform() {
        let docs = vec!["red fox jumps".to_string(), "blue fox sleeps".to_string()];
        let params = TfidfParams {
            min_df: 1,
            ..Default::default()
        };
        let (model, _) = TfidfModel::fit_transform(&docs, &params);

        let path = std::env::temp_dir().join(format!(
            "opviews-tfidf-roundtrip-{}.json",
            std::process::id()
        ));
        model.save_to_path(&path).unwrap();
        let loaded = TfidfModel::load_from_path(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.dim(), model.dim());
        assert_eq!(loaded.transform(&docs[0]), model.transform(&docs[0]));
    }

    #[test]
    fn save_to_path_creates_missing_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("opviews-tfidf-parent-{}", std::process::id()));
        let path = dir.join("nested").join("vectorizer.json");
        let docs = vec!["alpha beta".to_string(), "alpha gamma".to_string()];
        let params = TfidfParams {
            min_df: 1,
            ..Default::default()
        };
        let (model, _) = TfidfModel::fit_transform(&docs, &params);

        model.save_to_path(&path).unwrap();
        assert!(path.exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}
