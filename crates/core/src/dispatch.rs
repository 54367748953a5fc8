use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::catalog::IntentCatalog;
use crate::models::{DispatchOutcome, ScoredCandidate};

/// Returned whenever no intent can answer the utterance. Callers match on this
/// exact text.
pub const FALLBACK_RESPONSE: &str = "Sorry, this is not in my domain.";

#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub response: String,
    pub outcome: DispatchOutcome,
}

impl Dispatch {
    fn fallback(outcome: DispatchOutcome) -> Self {
        Self {
            response: FALLBACK_RESPONSE.to_string(),
            outcome,
        }
    }
}

/// Picks one response for the top-ranked candidate.
///
/// The pool is the union of every catalog entry matching the top tag by tag or
/// alias, and the draw is uniform over it. Only the first candidate is ever
/// considered; lower-ranked candidates are diagnostics.
pub fn dispatch<R>(
    catalog: &IntentCatalog,
    candidates: &[ScoredCandidate],
    rng: &mut R,
) -> Dispatch
where
    R: Rng + ?Sized,
{
    let Some(top) = candidates.first() else {
        debug!("no intent cleared the confidence threshold");
        return Dispatch::fallback(DispatchOutcome::NoConfidentIntent);
    };

    let pool = catalog.lookup(&top.tag);
    let Some(response) = pool.choose(rng) else {
        warn!(
            tag = %top.tag,
            score = top.score,
            "classifier selected a tag that has no catalog entry"
        );
        return Dispatch::fallback(DispatchOutcome::UnknownTag {
            tag: top.tag.clone(),
            score: top.score,
        });
    };

    Dispatch {
        response: (*response).to_string(),
        outcome: DispatchOutcome::Matched {
            tag: top.tag.clone(),
            score: top.score,
            pool_size: pool.len(),
        },
    }
}
