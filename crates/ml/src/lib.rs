mod centroid;
mod fallback;

#[cfg(feature = "burn-ml")]
mod burn_impl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use medbot_core::{IntentCatalog, PipelineError};
use thiserror::Error;
use tracing::{info, warn};

pub use centroid::{CentroidIntentScorer, MIN_SIMILARITY};
pub use fallback::{tokenize, HashEmbeddingModel};

pub trait EmbeddingModel: Send + Sync {
    fn model_name(&self) -> &'static str;
    fn embed(&self, text: &str) -> Vec<f32>;
}

#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("inference failed: {0}")]
    Inference(String),

    #[error("classifier backend unavailable: {0}")]
    Unavailable(String),
}

/// The external classifier. Returns one score per label, in `labels()` order.
pub trait IntentScorer: Send + Sync {
    fn model_name(&self) -> &'static str;
    fn labels(&self) -> &[String];
    fn score(&self, text: &str) -> Result<Vec<f32>, ScorerError>;
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error("classifier `{model}` emits {actual} labels but the catalog orders {expected}")]
    LabelCount {
        model: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("classifier `{model}` label #{index} is `{found}` but the catalog expects `{expected}`")]
    LabelMismatch {
        model: &'static str,
        index: usize,
        expected: String,
        found: String,
    },
}

/// A scorer that has been checked against the catalog's label ordering.
#[derive(Clone)]
pub struct ClassifierAdapter {
    scorer: Arc<dyn IntentScorer>,
}

impl ClassifierAdapter {
    pub fn bind(scorer: Arc<dyn IntentScorer>, catalog: &IntentCatalog) -> Result<Self, BindError> {
        let expected = catalog.tag_order();
        let found = scorer.labels();
        let model = scorer.model_name();

        if expected.len() != found.len() {
            return Err(BindError::LabelCount {
                model,
                expected: expected.len(),
                actual: found.len(),
            });
        }

        if let Some((index, (expected, found))) = expected
            .iter()
            .zip(found.iter())
            .enumerate()
            .find(|(_, (expected, found))| expected != found)
        {
            return Err(BindError::LabelMismatch {
                model,
                index,
                expected: expected.clone(),
                found: found.clone(),
            });
        }

        Ok(Self { scorer })
    }

    pub fn model_name(&self) -> &'static str {
        self.scorer.model_name()
    }

    pub fn labels(&self) -> &[String] {
        self.scorer.labels()
    }

    /// Scores `text` and checks the vector is usable for ranking.
    pub fn classify(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let scores = self
            .scorer
            .score(text)
            .map_err(|err| PipelineError::Classifier(err.to_string()))?;

        let labels = self.scorer.labels();
        if scores.len() != labels.len() {
            return Err(PipelineError::ScoreLength {
                expected: labels.len(),
                actual: scores.len(),
            });
        }
        if let Some((label, _)) = labels
            .iter()
            .zip(scores.iter())
            .find(|(_, score)| !score.is_finite())
        {
            return Err(PipelineError::NonFiniteScore(label.clone()));
        }

        Ok(scores)
    }
}

#[derive(Debug, Clone)]
pub struct MlSettings {
    pub training_path: Option<PathBuf>,
    pub embedding_dims: usize,
    pub min_similarity: f32,
}

impl Default for MlSettings {
    fn default() -> Self {
        Self {
            training_path: None,
            embedding_dims: 256,
            min_similarity: MIN_SIMILARITY,
        }
    }
}

#[derive(Clone)]
pub struct MlStack {
    pub embedder: Arc<dyn EmbeddingModel>,
    pub classifier: ClassifierAdapter,
    pub burn_enabled: bool,
}

impl MlStack {
    pub fn embedder_name(&self) -> &'static str {
        self.embedder.model_name()
    }

    /// Builds the scorer from the JSONL training file when one is configured and
    /// present, otherwise from the catalog's own patterns, then binds it to the
    /// catalog's label ordering.
    pub fn load(settings: &MlSettings, catalog: &IntentCatalog) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingModel> =
            Arc::new(HashEmbeddingModel::new(settings.embedding_dims));
        let burn_enabled = cfg!(feature = "burn-ml");

        let training_file = settings
            .training_path
            .as_ref()
            .filter(|path| {
                let exists = path.exists();
                if !exists {
                    warn!(path = %path.display(), "training dataset missing, using catalog patterns");
                }
                exists
            });

        let scorer = match training_file {
            Some(path) => CentroidIntentScorer::from_jsonl(
                path,
                catalog.tag_order(),
                embedder.clone(),
                "centroid-jsonl",
            )?,
            None => CentroidIntentScorer::from_catalog(
                catalog,
                embedder.clone(),
                "centroid-patterns",
            )?,
        }
        .with_min_similarity(settings.min_similarity);

        let classifier = ClassifierAdapter::bind(Arc::new(scorer), catalog)
            .context("classifier does not match the intent catalog")?;

        info!(
            model = classifier.model_name(),
            embedder = embedder.model_name(),
            labels = classifier.labels().len(),
            min_similarity = settings.min_similarity,
            burn_enabled,
            "intent classifier ready"
        );

        Ok(Self {
            embedder,
            classifier,
            burn_enabled,
        })
    }
}
