use std::cmp::Ordering;

use crate::error::PipelineError;
use crate::models::ScoredCandidate;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateRanker {
    threshold: f32,
}

impl Default for CandidateRanker {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

impl CandidateRanker {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn rank(
        &self,
        labels: &[String],
        scores: &[f32],
    ) -> Result<Vec<ScoredCandidate>, PipelineError> {
        rank_candidates(labels, scores, self.threshold)
    }
}

/// Keeps the labels whose score is strictly above `threshold`, highest first.
///
/// `labels[i]` names `scores[i]`. Equal scores keep their input order.
pub fn rank_candidates(
    labels: &[String],
    scores: &[f32],
    threshold: f32,
) -> Result<Vec<ScoredCandidate>, PipelineError> {
    if labels.len() != scores.len() {
        return Err(PipelineError::ScoreLength {
            expected: labels.len(),
            actual: scores.len(),
        });
    }

    let mut candidates = labels
        .iter()
        .zip(scores.iter().copied())
        .filter(|(_, score)| *score > threshold)
        .map(|(tag, score)| ScoredCandidate {
            tag: tag.clone(),
            score,
        })
        .collect::<Vec<_>>();

    // sort_by is stable, which is what keeps ties in catalog order.
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    Ok(candidates)
}
