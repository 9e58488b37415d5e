//! Fetch-or-generate resolution of one topic into candidate questions.
//!
//! Variations are searched in priority order and the first one that returns
//! anything wins. A short result is topped up with generated questions; if no
//! variation matches at all, the whole batch is generated.

use tracing::{debug, info, instrument, warn};

use qforge_shared::{CandidateQuestion, ERROR_MARKER};

use crate::clients::{QuestionModel, QuestionSearch};
use crate::decompose::decompose;

/// Inputs for resolving a single topic.
#[derive(Debug, Clone)]
pub struct ResolveRequest<'a> {
    pub topic: &'a str,
    pub desired_count: usize,
    /// Context used as the sub-topic when the whole batch is generated.
    pub full_topic_name: &'a str,
    pub years: Option<u32>,
    pub max_variations: usize,
}

/// Candidates for a topic plus how they were found.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// At most `desired_count` entries, search hits first.
    pub candidates: Vec<CandidateQuestion>,
    /// The variation whose search returned results.
    pub matched_variation: Option<String>,
    pub variations_tried: usize,
}

impl Resolution {
    pub fn searched(&self) -> usize {
        self.candidates.iter().filter(|c| !c.is_generated()).count()
    }

    pub fn generated(&self) -> usize {
        self.candidates.iter().filter(|c| c.is_generated()).count()
    }
}

#[instrument(skip_all, fields(topic = %request.topic, desired = request.desired_count))]
pub async fn resolve(
    search: &dyn QuestionSearch,
    model: &dyn QuestionModel,
    request: &ResolveRequest<'_>,
) -> Resolution {
    let desired = request.desired_count;
    if desired == 0 {
        return Resolution::default();
    }

    let variations = decompose(model, request.topic, request.max_variations).await;
    let mut tried = 0;

    for variation in &variations {
        tried += 1;
        let hits = match search.search(variation, desired, request.years).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(variation = %variation, error = %e, "search failed, treating as no results");
                Vec::new()
            }
        };

        if hits.is_empty() {
            debug!(variation = %variation, "no results");
            continue;
        }

        let mut candidates: Vec<CandidateQuestion> = hits
            .into_iter()
            .filter(|h| !h.title.trim().is_empty())
            .take(desired)
            .map(|h| CandidateQuestion::searched(h.title, h.link, h.body))
            .collect();

        let deficit = desired - candidates.len();
        info!(
            variation = %variation,
            fetched = candidates.len(),
            deficit,
            "variation matched"
        );
        if deficit > 0 {
            candidates.extend(generate(model, request.topic, deficit, variation).await);
        }

        return Resolution {
            candidates,
            matched_variation: Some(variation.clone()),
            variations_tried: tried,
        };
    }

    info!(tried, "no variation matched, generating questions");
    Resolution {
        candidates: generate(model, request.topic, desired, request.full_topic_name).await,
        matched_variation: None,
        variations_tried: tried,
    }
}

/// Generate up to `count` title-only candidates.
///
/// A failed call yields a single placeholder candidate carrying the diagnostic.
async fn generate(
    model: &dyn QuestionModel,
    topic: &str,
    count: usize,
    sub_topic: &str,
) -> Vec<CandidateQuestion> {
    match model.generate(topic, count, sub_topic).await {
        Ok(questions) => questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .take(count)
            .map(CandidateQuestion::generated)
            .collect(),
        Err(e) => {
            warn!(topic, sub_topic, error = %e, "question generation failed");
            vec![CandidateQuestion::generated(format!("{ERROR_MARKER}: {e}"))]
        }
    }
}
