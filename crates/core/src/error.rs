use std::path::PathBuf;

use thiserror::Error;

/// Problems found while loading the intent catalog. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed reading intent catalog at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed intent catalog: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("intent catalog contains no entries")]
    Empty,

    #[error("intent entry #{index} has neither a tag nor a qtype")]
    MissingTag { index: usize },

    #[error("duplicate intent tag `{0}`")]
    DuplicateTag(String),

    #[error("intent `{0}` has an empty response pool")]
    EmptyResponses(String),

    #[error("label `{0}` is listed more than once in the class list")]
    DuplicateClass(String),
}

/// Failures of the request pipeline that the caller must be able to tell apart
/// from a plain "no intent matched" fallback.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("classifier failed: {0}")]
    Classifier(String),

    #[error("classifier returned {actual} scores, expected {expected}")]
    ScoreLength { expected: usize, actual: usize },

    #[error("classifier returned a non-finite score for `{0}`")]
    NonFiniteScore(String),

    #[error("classifier task did not complete: {0}")]
    Aborted(String),
}

impl PipelineError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Classifier(_) => "classifier_failed",
            Self::ScoreLength { .. } => "classifier_score_length",
            Self::NonFiniteScore(_) => "classifier_non_finite_score",
            Self::Aborted(_) => "classifier_aborted",
        }
    }
}
