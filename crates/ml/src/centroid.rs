use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use medbot_core::IntentCatalog;
use serde::Deserialize;
use tracing::debug;

use crate::fallback::normalize;
use crate::{EmbeddingModel, IntentScorer, ScorerError};

#[cfg(feature = "burn-ml")]
use crate::burn_impl::softmax;

const SOFTMAX_TEMPERATURE: f32 = 0.1;

/// Below this cosine similarity to every centroid the question is treated as
/// out of domain and every label scores zero.
pub const MIN_SIMILARITY: f32 = 0.25;

#[derive(Debug, Deserialize)]
struct LabeledExample {
    text: String,
    intent: String,
}

/// Nearest-centroid scorer. Produces one probability per label, in the label
/// order it was built with.
///
/// When the closest centroid is less similar than `min_similarity` every label
/// scores zero.
#[derive(Clone)]
pub struct CentroidIntentScorer {
    model_name: &'static str,
    labels: Vec<String>,
    centroids: Vec<Option<Vec<f32>>>,
    embedder: Arc<dyn EmbeddingModel>,
    min_similarity: f32,
}

impl CentroidIntentScorer {
    pub fn from_examples<I>(
        labels: &[String],
        examples: I,
        embedder: Arc<dyn EmbeddingModel>,
        model_name: &'static str,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let positions = labels
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.as_str(), idx))
            .collect::<HashMap<_, _>>();

        let mut by_label: HashMap<usize, Vec<Vec<f32>>> = HashMap::new();
        let mut skipped = 0usize;
        for (label, text) in examples {
            match positions.get(label.as_str()) {
                Some(idx) => by_label.entry(*idx).or_default().push(embedder.embed(&text)),
                None => skipped += 1,
            }
        }

        if by_label.is_empty() {
            anyhow::bail!("training examples produced zero intent centroids");
        }
        if skipped > 0 {
            debug!(skipped, "ignored training examples for labels outside the catalog");
        }

        let centroids = (0..labels.len())
            .map(|idx| by_label.get(&idx).map(|vectors| centroid(vectors)))
            .collect();

        Ok(Self {
            model_name,
            labels: labels.to_vec(),
            centroids,
            embedder,
            min_similarity: MIN_SIMILARITY,
        })
    }

    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    /// Uses each entry's `patterns` as examples of the first label in the
    /// catalog order that the entry answers to.
    pub fn from_catalog(
        catalog: &IntentCatalog,
        embedder: Arc<dyn EmbeddingModel>,
        model_name: &'static str,
    ) -> Result<Self> {
        let labels = catalog.tag_order();
        let mut examples = Vec::new();
        for entry in catalog.entries() {
            let Some(label) = labels.iter().find(|label| entry.matches(label)) else {
                continue;
            };
            examples.extend(
                entry
                    .patterns
                    .iter()
                    .map(|pattern| (label.clone(), pattern.clone())),
            );
        }

        Self::from_examples(labels, examples, embedder, model_name)
            .context("intent catalog has no usable patterns")
    }

    /// Reads `{"text": ..., "intent": ...}` lines.
    pub fn from_jsonl(
        path: impl AsRef<Path>,
        labels: &[String],
        embedder: Arc<dyn EmbeddingModel>,
        model_name: &'static str,
    ) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref()).with_context(|| {
            format!(
                "failed reading intent training dataset at {}",
                path.as_ref().display()
            )
        })?;

        let mut examples = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let example: LabeledExample = serde_json::from_str(line)
                .with_context(|| format!("invalid jsonl training line {}", line_no + 1))?;
            examples.push((example.intent.trim().to_string(), example.text));
        }

        Self::from_examples(labels, examples, embedder, model_name)
    }
}

impl IntentScorer for CentroidIntentScorer {
    fn model_name(&self) -> &'static str {
        self.model_name
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn score(&self, text: &str) -> Result<Vec<f32>, ScorerError> {
        let query = self.embedder.embed(text);
        let mut scores = vec![0.0_f32; self.labels.len()];

        let trained = self
            .centroids
            .iter()
            .enumerate()
            .filter_map(|(idx, center)| {
                center
                    .as_ref()
                    .map(|center| (idx, cosine_similarity(&query, center)))
            })
            .collect::<Vec<_>>();

        let best = trained
            .iter()
            .map(|(_, similarity)| *similarity)
            .fold(f32::NEG_INFINITY, f32::max);
        if best < self.min_similarity {
            debug!(best, floor = self.min_similarity, "question resembles no intent");
            return Ok(scores);
        }

        let logits = trained
            .iter()
            .map(|(_, similarity)| similarity / SOFTMAX_TEMPERATURE)
            .collect::<Vec<_>>();
        let probabilities = softmax(&logits)?;

        for ((idx, _), probability) in trained.iter().zip(probabilities) {
            scores[*idx] = probability;
        }
        Ok(scores)
    }
}

#[cfg(not(feature = "burn-ml"))]
fn softmax(logits: &[f32]) -> Result<Vec<f32>, ScorerError> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps = logits.iter().map(|v| (v - max).exp()).collect::<Vec<_>>();
    let sum = exps.iter().sum::<f32>();
    if !sum.is_finite() || sum <= 0.0 {
        return Err(ScorerError::Inference(
            "softmax normaliser is not positive".to_string(),
        ));
    }
    Ok(exps.into_iter().map(|v| v / sum).collect())
}

fn centroid(vectors: &[Vec<f32>]) -> Vec<f32> {
    let dims = vectors.first().map(Vec::len).unwrap_or(0);
    let mut acc = vec![0.0_f32; dims];

    for vector in vectors {
        for (idx, value) in vector.iter().enumerate() {
            acc[idx] += value;
        }
    }

    for value in &mut acc {
        *value /= vectors.len() as f32;
    }
    normalize(&mut acc);
    acc
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut a_norm = 0.0;
    let mut b_norm = 0.0;
    for (lhs, rhs) in a.iter().zip(b.iter()) {
        dot += lhs * rhs;
        a_norm += lhs * lhs;
        b_norm += rhs * rhs;
    }

    if a_norm == 0.0 || b_norm == 0.0 {
        0.0
    } else {
        dot / (a_norm.sqrt() * b_norm.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use medbot_core::IntentEntry;

    use super::*;
    use crate::HashEmbeddingModel;

    fn catalog() -> IntentCatalog {
        IntentCatalog::from_entries(vec![
            IntentEntry::new("fever", vec!["Take rest.".to_string()]).with_patterns(vec![
                "I have a fever".to_string(),
                "my temperature is very high".to_string(),
            ]),
            IntentEntry::new("headache", vec!["Lie down.".to_string()]).with_patterns(vec![
                "my head hurts".to_string(),
                "I have a pounding headache".to_string(),
            ]),
            IntentEntry::new("unused", vec!["Nothing.".to_string()]),
        ])
        .unwrap()
    }

    fn scorer() -> CentroidIntentScorer {
        CentroidIntentScorer::from_catalog(
            &catalog(),
            Arc::new(HashEmbeddingModel::new(256)),
            "test-centroid",
        )
        .unwrap()
    }

    #[test]
    fn scores_align_with_catalog_order() {
        let scorer = scorer();
        assert_eq!(scorer.labels(), catalog().tag_order());

        let scores = scorer.score("my head hurts").unwrap();
        assert_eq!(scores.len(), 3);
        assert!(scores[1] > scores[0]);
        assert_eq!(scores[2], 0.0);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let scores = scorer().score("I have a fever").unwrap();
        let total = scores.iter().sum::<f32>();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn unrelated_question_scores_zero_everywhere() {
        let scorer = scorer();
        for question in ["who won the football game", "what is the capital of France"] {
            let scores = scorer.score(question).unwrap();
            assert!(scores.iter().all(|score| *score == 0.0), "{question}: {scores:?}");
        }
    }

    #[test]
    fn question_without_words_scores_zero_everywhere() {
        let scores = scorer().score(" ?! ").unwrap();
        assert_eq!(scores, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn floor_can_be_lowered() {
        let scorer = scorer().with_min_similarity(0.0);
        let scores = scorer.score("what is the capital of France").unwrap();
        assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn catalog_without_patterns_is_rejected() {
        let catalog =
            IntentCatalog::from_entries(vec![IntentEntry::new("fever", vec!["x".to_string()])])
                .unwrap();
        let result =
            CentroidIntentScorer::from_catalog(&catalog, Arc::new(HashEmbeddingModel::new(64)), "t");
        assert!(result.is_err());
    }

    #[test]
    fn loads_jsonl_and_skips_unknown_intents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        std::fs::write(
            &path,
            "{\"text\": \"burning forehead\", \"intent\": \"fever\"}\n\n{\"text\": \"itchy skin\", \"intent\": \"rash\"}\n",
        )
        .unwrap();

        let labels = vec!["fever".to_string(), "headache".to_string()];
        let scorer = CentroidIntentScorer::from_jsonl(
            &path,
            &labels,
            Arc::new(HashEmbeddingModel::new(64)),
            "jsonl",
        )
        .unwrap();

        let scores = scorer.score("burning forehead").unwrap();
        assert_eq!(scores, vec![1.0, 0.0]);
    }

    #[test]
    fn invalid_jsonl_line_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        std::fs::write(&path, "not json\n").unwrap();

        let labels = vec!["fever".to_string()];
        let err = CentroidIntentScorer::from_jsonl(
            &path,
            &labels,
            Arc::new(HashEmbeddingModel::new(64)),
            "jsonl",
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("line 1"));
    }
}
