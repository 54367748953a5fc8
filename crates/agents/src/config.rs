use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use medbot_core::DEFAULT_CONFIDENCE_THRESHOLD;
use medbot_ml::{MlSettings, MIN_SIMILARITY};
use serde::Serialize;

pub const DEFAULT_CATALOG_PATH: &str = "data/intents.json";
pub const DEFAULT_EMBEDDING_DIMS: usize = 256;

#[derive(Debug, Clone, Serialize)]
pub struct AgentConfig {
    pub catalog_path: PathBuf,
    pub training_path: Option<PathBuf>,
    pub confidence_threshold: f32,
    pub embedding_dims: usize,
    pub min_similarity: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from(DEFAULT_CATALOG_PATH),
            training_path: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            embedding_dims: DEFAULT_EMBEDDING_DIMS,
            min_similarity: MIN_SIMILARITY,
        }
    }
}

impl AgentConfig {
    /// Reads `MEDBOT_*` variables. A threshold or similarity floor that does not
    /// parse is an error rather than a silent default.
    pub fn from_env() -> Result<Self> {
        let catalog_path = env::var("MEDBOT_CATALOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CATALOG_PATH));
        let training_path = env::var("MEDBOT_TRAINING_PATH")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        let confidence_threshold =
            env_f32("MEDBOT_CONFIDENCE_THRESHOLD")?.unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD);
        let min_similarity = env_f32("MEDBOT_MIN_SIMILARITY")?.unwrap_or(MIN_SIMILARITY);
        let embedding_dims = env::var("MEDBOT_EMBEDDING_DIMS")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(DEFAULT_EMBEDDING_DIMS);

        let config = Self {
            catalog_path,
            training_path,
            confidence_threshold,
            embedding_dims,
            min_similarity,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            anyhow::bail!(
                "confidence threshold must be within [0, 1], got {}",
                self.confidence_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.min_similarity) {
            anyhow::bail!(
                "minimum similarity must be within [0, 1], got {}",
                self.min_similarity
            );
        }
        Ok(())
    }

    pub fn ml_settings(&self) -> MlSettings {
        MlSettings {
            training_path: self.training_path.clone(),
            embedding_dims: self.embedding_dims,
            min_similarity: self.min_similarity,
        }
    }
}

fn env_f32(key: &str) -> Result<Option<f32>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<f32>()
            .map(Some)
            .with_context(|| format!("{key} is not a number: {raw}")),
        Err(_) => Ok(None),
    }
}
