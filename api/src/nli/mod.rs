//! NLI stance scorer: a 3-label (entailment/neutral/contradiction)
//! cross-encoder run through `ort`. `stance = P(contradiction) - P(entailment)`.

use std::path::Path;
use std::sync::Arc;

use ndarray::{Array2, CowArray};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tokio::sync::OnceCell;

const LABELS: [&str; 3] = ["entailment", "neutral", "contradiction"];
const DEFAULT_MAX_POSITION_EMBEDDINGS: usize = 512;

pub struct NliScorer {
    session: Session,
    tokenizer: Tokenizer,
    max_position_embeddings: usize,
}

/// Loaded once behind `NliHandle`'s `OnceCell` and shared across requests.
/// Classification runs inside `spawn_blocking` since `ort` inference is
/// synchronous CPU work.
impl NliScorer {
    pub fn load(model_dir: &str) -> eyre::Result<Self> {
        let dir = Path::new(model_dir);
        let session = Session::builder()?
            .commit_from_file(dir.join("model.onnx"))
            .map_err(|e| eyre::eyre!("failed to load NLI ONNX model from {model_dir}: {e}"))?;
        let tokenizer = Tokenizer::from_file(dir.join("tokenizer.json"))
            .map_err(|e| eyre::eyre!("failed to load NLI tokenizer from {model_dir}: {e}"))?;

        Ok(NliScorer {
            session,
            tokenizer,
            max_position_embeddings: DEFAULT_MAX_POSITION_EMBEDDINGS,
        })
    }

    /// Iteratively trim whichever of premise/hypothesis is currently longer
    /// (by token count, special tokens excluded) until the combined encoded
    /// length fits within the model's position budget.
    fn safe_pair(&self, premise: &str, hypothesis: &str) -> eyre::Result<(String, String)> {
        let max_len = self.max_position_embeddings - 3;

        let combined = self
            .tokenizer
            .encode((premise, hypothesis), true)
            .map_err(|e| eyre::eyre!("tokenize: {e}"))?;
        if combined.get_ids().len() <= self.max_position_embeddings {
            return Ok((premise.to_string(), hypothesis.to_string()));
        }

        let mut p_ids = self
            .tokenizer
            .encode(premise, false)
            .map_err(|e| eyre::eyre!("tokenize premise: {e}"))?
            .get_ids()
            .to_vec();
        let mut h_ids = self
            .tokenizer
            .encode(hypothesis, false)
            .map_err(|e| eyre::eyre!("tokenize hypothesis: {e}"))?
            .get_ids()
            .to_vec();

        while p_ids.len() + h_ids.len() + 3 > max_len {
            if p_ids.len() >= h_ids.len() {
                p_ids.pop();
            } else {
                h_ids.pop();
            }
            if p_ids.is_empty() && h_ids.is_empty() {
                break;
            }
        }

        let premise = self
            .tokenizer
            .decode(&p_ids, true)
            .map_err(|e| eyre::eyre!("decode premise: {e}"))?;
        let hypothesis = self
            .tokenizer
            .decode(&h_ids, true)
            .map_err(|e| eyre::eyre!("decode hypothesis: {e}"))?;
        Ok((premise, hypothesis))
    }

    /// Run the classifier. Empty premise/hypothesis return the fixed
    /// near-uniform fallback rather than invoking the model.
    pub fn classify(&self, premise: &str, hypothesis: &str) -> eyre::Result<(&'static str, [f32; 3])> {
        if premise.is_empty() || hypothesis.is_empty() {
            return Ok(("neutral", [0.33, 0.34, 0.33]));
        }

        let (premise, hypothesis) = self.safe_pair(premise, hypothesis)?;

        let max_len = (self.max_position_embeddings - 3).min(510);
        let encoding = self
            .tokenizer
            .encode((premise.as_str(), hypothesis.as_str()), true)
            .map_err(|e| eyre::eyre!("tokenize pair: {e}"))?;

        let ids: Vec<i64> = encoding
            .get_ids()
            .iter()
            .take(max_len)
            .map(|&x| x as i64)
            .collect();
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .take(max_len)
            .map(|&x| x as i64)
            .collect();
        let type_ids: Vec<i64> = encoding
            .get_type_ids()
            .iter()
            .take(max_len)
            .map(|&x| x as i64)
            .collect();

        let seq_len = ids.len();
        let input_ids = Array2::from_shape_vec((1, seq_len), ids)?;
        let attention_mask = Array2::from_shape_vec((1, seq_len), mask)?;
        let token_type_ids = Array2::from_shape_vec((1, seq_len), type_ids)?;

        let outputs = self.session.run(ort::inputs![
            "input_ids" => Tensor::from_array(CowArray::from(input_ids.into_dyn()))?,
            "attention_mask" => Tensor::from_array(CowArray::from(attention_mask.into_dyn()))?,
            "token_type_ids" => Tensor::from_array(CowArray::from(token_type_ids.into_dyn()))?,
        ]?)?;

        let logits = outputs[0].try_extract_tensor::<f32>()?;
        let logits = logits.as_slice().ok_or_else(|| eyre::eyre!("non-contiguous logits"))?;
        let probs = softmax3(logits);

        let (idx, _) = probs
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .expect("3 labels always present");

        Ok((LABELS[idx], probs))
    }

    /// `stance = P(contradiction) - P(entailment)`.
    pub fn stance(probs: [f32; 3]) -> f32 {
        probs[2] - probs[0]
    }
}

/// Process-wide handle around the scorer singleton. Loading is deferred
/// until first use (or an explicit warm-up call shortly after startup) so
/// the HTTP surface comes up before the ONNX model finishes loading.
pub struct NliHandle {
    cell: OnceCell<Arc<NliScorer>>,
    model_dir: String,
}

impl NliHandle {
    pub fn new(model_dir: String) -> Self {
        NliHandle {
            cell: OnceCell::new(),
            model_dir,
        }
    }

    pub async fn get(&self) -> eyre::Result<Arc<NliScorer>> {
        self.cell
            .get_or_try_init(|| async {
                let dir = self.model_dir.clone();
                let scorer = tokio::task::spawn_blocking(move || NliScorer::load(&dir)).await??;
                Ok::<_, eyre::Error>(Arc::new(scorer))
            })
            .await
            .cloned()
    }

    /// Classify on a blocking thread; `ort` inference is synchronous CPU work.
    pub async fn classify(
        &self,
        premise: String,
        hypothesis: String,
    ) -> eyre::Result<(&'static str, [f32; 3])> {
        let scorer = self.get().await?;
        tokio::task::spawn_blocking(move || scorer.classify(&premise, &hypothesis)).await?
    }
}

fn softmax3(logits: &[f32]) -> [f32; 3] {
    let max = logits.iter().cloned().fold(f32::MIN, f32::max);
    let exp: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exp.iter().sum();
    [exp[0] / sum, exp[1] / sum, exp[2] / sum]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stance_is_contradiction_minus_entailment() {
        let probs = [0.1, 0.2, 0.7];
        assert!((NliScorer::stance(probs) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn softmax_sums_to_one() {
        let probs = softmax3(&[1.0, 2.0, 0.5]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }
}
