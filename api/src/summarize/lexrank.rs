//! LexRank-style extractive scoring: sentence-sentence TF-IDF cosine
//! similarity, threshold-binarized adjacency, damped power iteration.

use crate::vector::tfidf::{cosine_similarity, TfidfModel, TfidfParams};

const SIMILARITY_THRESHOLD: f32 = 0.1;
const DAMPING: f64 = 0.85;
const TOLERANCE: f64 = 1e-6;
const MAX_ITER: usize = 100;
/// Cap the number of sentences considered, to bound the O(n^2) similarity
/// matrix cost on very long articles.
const MAX_SENTENCES_CONSIDERED: usize = 80;

fn similarity_matrix(sentences: &[String]) -> Vec<Vec<f32>> {
    let params = TfidfParams {
        min_df: 1,
        max_df: 1.0,
        ngram_range: (1, 2),
        max_features: None,
        sublinear_tf: false,
    };
    let docs: Vec<String> = sentences.to_vec();
    let (_, vectors) = TfidfModel::fit_transform(&docs, &params);

    let n = vectors.len();
    let mut sim = vec![vec![0.0f32; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let s = cosine_similarity(&vectors[i], &vectors[j]);
            sim[i][j] = s;
            sim[j][i] = s;
        }
    }
    sim
}

/// Power-iterate the damped transition matrix built from a threshold-
/// binarized, row-normalized similarity matrix. Returns one score per
/// sentence.
fn lexrank_scores(sim: &[Vec<f32>]) -> Vec<f64> {
    let n = sim.len();
    if n == 0 {
        return Vec::new();
    }

    let mut adjacency = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i != j && sim[i][j] >= SIMILARITY_THRESHOLD {
                adjacency[i][j] = 1.0;
            }
        }
    }

    // Row-normalize into a transition matrix; isolated sentences (no edges)
    // keep a zero row and contribute only the damping floor.
    let mut transition = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        let row_sum: f64 = adjacency[i].iter().sum();
        if row_sum > 0.0 {
            for j in 0..n {
                transition[i][j] = adjacency[i][j] / row_sum;
            }
        }
    }

    let mut v = vec![1.0 / n as f64; n];
    let floor = (1.0 - DAMPING) / n as f64;

    for _ in 0..MAX_ITER {
        let mut next = vec![floor; n];
        for j in 0..n {
            for i in 0..n {
                next[j] += DAMPING * transition[i][j] * v[i];
            }
        }
        let delta: f64 = next.iter().zip(&v).map(|(a, b)| (a - b).abs()).sum();
        v = next;
        if delta < TOLERANCE {
            break;
        }
    }

    v
}

/// Select the top `max_sentences` by LexRank score, reordered to the
/// article's original sentence order. Returns `None` if there aren't more
/// sentences than `max_sentences` to begin with (caller should fall back to
/// a lead summary).
pub fn extractive_select(sentences: &[String], max_sentences: usize) -> Option<Vec<String>> {
    if sentences.len() <= max_sentences {
        return None;
    }

    let considered = &sentences[..sentences.len().min(MAX_SENTENCES_CONSIDERED)];
    let sim = similarity_matrix(considered);
    let scores = lexrank_scores(&sim);

    let mut ranked: Vec<usize> = (0..considered.len()).collect();
    ranked.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap());
    let mut top: Vec<usize> = ranked.into_iter().take(max_sentences).collect();
    top.sort();

    Some(top.into_iter().map(|i| considered[i].clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_central_sentences_and_preserves_order() {
        let sentences: Vec<String> = vec![
            "The city council approved a new budget.".into(),
            "The budget includes funding for schools.".into(),
            "A local bakery won a pastry award.".into(),
            "The budget also funds road repairs.".into(),
            "Turnout at the meeting was high.".into(),
            "The mayor praised the budget process.".into(),
        ];
        let selected = extractive_select(&sentences, 3).unwrap();
        assert_eq!(selected.len(), 3);
        // Order must match original article order.
        let indices: Vec<usize> = selected
            .iter()
            .map(|s| sentences.iter().position(|o| o == s).unwrap())
            .collect();
        let mut sorted = indices.clone();
        sorted.sort();
        assert_eq!(indices, sorted);
    }

    #[test]
    fn returns_none_when_not_enough_sentences() {
        let sentences = vec!["One sentence here.".to_string(), "Another one.".to_string()];
        assert!(extractive_select(&sentences, 3).is_none());
    }
}
