mod config;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use medbot_core::{
    dispatch, normalize_text, CandidateRanker, ChatInput, ChatReply, DispatchOutcome,
    IntentCatalog, PipelineError, ScoredCandidate,
};
use medbot_ml::MlStack;
use medbot_observability::AppMetrics;
use rand::Rng;
use tracing::{info, instrument, warn};

pub use config::{AgentConfig, DEFAULT_CATALOG_PATH, DEFAULT_EMBEDDING_DIMS};
pub use medbot_ml::MIN_SIMILARITY;

/// The serving context. Built once at startup and shared read-only by every
/// request.
#[derive(Clone)]
pub struct ChatAgent {
    catalog: Arc<IntentCatalog>,
    ml_stack: MlStack,
    ranker: CandidateRanker,
    metrics: Arc<AppMetrics>,
}

impl ChatAgent {
    pub fn new(
        catalog: Arc<IntentCatalog>,
        ml_stack: MlStack,
        ranker: CandidateRanker,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            catalog,
            ml_stack,
            ranker,
            metrics,
        }
    }

    /// Loads the catalog and classifier described by `config`. Any failure here
    /// means the process must not serve.
    pub fn load(config: &AgentConfig, metrics: Arc<AppMetrics>) -> Result<Self> {
        config.validate()?;

        let catalog = Arc::new(
            IntentCatalog::from_path(&config.catalog_path).with_context(|| {
                format!(
                    "failed loading intent catalog from {}",
                    config.catalog_path.display()
                )
            })?,
        );
        let ml_stack = MlStack::load(&config.ml_settings(), &catalog)?;

        Ok(Self::new(
            catalog,
            ml_stack,
            CandidateRanker::new(config.confidence_threshold),
            metrics,
        ))
    }

    pub fn catalog(&self) -> &IntentCatalog {
        &self.catalog
    }

    pub fn ranker(&self) -> CandidateRanker {
        self.ranker
    }

    pub fn model_name(&self) -> &'static str {
        self.ml_stack.classifier.model_name()
    }

    pub fn embedder_name(&self) -> &'static str {
        self.ml_stack.embedder_name()
    }

    pub fn burn_enabled(&self) -> bool {
        self.ml_stack.burn_enabled
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    /// Ranked candidates for `text`, without dispatching.
    pub fn rank(&self, text: &str) -> Result<Vec<ScoredCandidate>, PipelineError> {
        let normalized = normalize_text(text);
        let scores = self.ml_stack.classifier.classify(&normalized)?;
        self.ranker.rank(self.catalog.tag_order(), &scores)
    }

    pub fn respond(&self, text: &str) -> Result<ChatReply, PipelineError> {
        self.respond_with_rng(text, &mut rand::rng())
    }

    pub fn respond_with_rng<R>(&self, text: &str, rng: &mut R) -> Result<ChatReply, PipelineError>
    where
        R: Rng + ?Sized,
    {
        let started = Instant::now();
        self.metrics.inc_request();

        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return Ok(self.finish(Vec::new(), rng, started));
        }

        let scores = self.track_failure(self.ml_stack.classifier.classify(&normalized))?;
        let candidates = self.track_failure(self.ranker.rank(self.catalog.tag_order(), &scores))?;
        Ok(self.finish(candidates, rng, started))
    }

    /// Async entry point. Scoring runs on the blocking pool so a slow classifier
    /// does not stall the runtime; dropping the future abandons the result.
    #[instrument(skip(self, input), fields(chars = input.text.chars().count()))]
    pub async fn handle_chat(&self, input: ChatInput) -> Result<ChatReply, PipelineError> {
        let started = Instant::now();
        self.metrics.inc_request();

        let normalized = normalize_text(&input.text);
        if normalized.is_empty() {
            return Ok(self.finish_with_thread_rng(Vec::new(), started));
        }

        let classifier = self.ml_stack.classifier.clone();
        let scores = tokio::task::spawn_blocking(move || classifier.classify(&normalized))
            .await
            .map_err(|err| PipelineError::Aborted(err.to_string()))
            .and_then(|scores| scores);
        let scores = self.track_failure(scores)?;
        let candidates = self.track_failure(self.ranker.rank(self.catalog.tag_order(), &scores))?;

        Ok(self.finish_with_thread_rng(candidates, started))
    }

    // ThreadRng is !Send, so it must never be held across an await.
    fn finish_with_thread_rng(&self, candidates: Vec<ScoredCandidate>, started: Instant) -> ChatReply {
        self.finish(candidates, &mut rand::rng(), started)
    }

    fn finish<R>(&self, candidates: Vec<ScoredCandidate>, rng: &mut R, started: Instant) -> ChatReply
    where
        R: Rng + ?Sized,
    {
        let result = dispatch(&self.catalog, &candidates, rng);

        match &result.outcome {
            DispatchOutcome::Matched { .. } => self.metrics.inc_matched(),
            DispatchOutcome::NoConfidentIntent => self.metrics.inc_fallback(),
            DispatchOutcome::UnknownTag { .. } => self.metrics.inc_unknown_tag(),
        }
        self.metrics.observe_latency(started.elapsed());

        info!(
            intent = result.outcome.matched_tag().unwrap_or("-"),
            candidates = candidates.len(),
            fallback = result.outcome.is_fallback(),
            "chat handled"
        );

        ChatReply {
            reply_text: result.response,
            intent: result.outcome.matched_tag().map(ToString::to_string),
            outcome: result.outcome,
            candidates,
            model: self.model_name().to_string(),
        }
    }

    fn track_failure<T>(&self, result: Result<T, PipelineError>) -> Result<T, PipelineError> {
        if let Err(err) = &result {
            self.metrics.inc_classifier_failure();
            warn!(error = %err, code = err.code(), "classifier adapter failed");
        }
        result
    }
}
