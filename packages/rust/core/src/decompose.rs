//! Topic decomposition: widen search recall with LLM-proposed variations.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::clients::QuestionModel;

/// Expand `topic` into at most `max` variations, in priority order.
///
/// Any failure, or a reply with no usable entries, yields `[topic]`.
pub async fn decompose(model: &dyn QuestionModel, topic: &str, max: usize) -> Vec<String> {
    let max = max.max(1);

    let proposed = match model.decompose(topic, max).await {
        Ok(variations) => variations,
        Err(e) => {
            warn!(topic, error = %e, "topic decomposition failed, using topic as-is");
            return vec![topic.to_string()];
        }
    };

    let mut seen = HashSet::new();
    let variations: Vec<String> = proposed
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && seen.insert(v.to_lowercase()))
        .take(max)
        .collect();

    if variations.is_empty() {
        warn!(topic, "decomposition returned no variations, using topic as-is");
        return vec![topic.to_string()];
    }

    debug!(topic, count = variations.len(), "topic decomposed");
    variations
}
