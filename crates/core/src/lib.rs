pub mod catalog;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod ranking;
pub mod text;

pub use catalog::IntentCatalog;
pub use dispatch::{dispatch, Dispatch, FALLBACK_RESPONSE};
pub use error::{CatalogError, PipelineError};
pub use models::*;
pub use ranking::{rank_candidates, CandidateRanker, DEFAULT_CONFIDENCE_THRESHOLD};
pub use text::normalize_text;
