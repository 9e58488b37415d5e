//! Batch refinement: turn candidates into result rows, one call per candidate.

use tracing::{debug, instrument};

use qforge_shared::{CandidateQuestion, OutputRow};

use crate::clients::QuestionModel;
use crate::progress::fraction;

/// Refine every candidate in order and build its row.
///
/// Never fails: a failed refinement produces the sentinel row. After each
/// candidate, `on_progress` receives `done / desired_count`, clamped to 1.0.
#[instrument(skip_all, fields(topic = %topic, candidates = candidates.len()))]
pub async fn refine_batch(
    model: &dyn QuestionModel,
    candidates: &[CandidateQuestion],
    topic: &str,
    full_topic_name: &str,
    desired_count: usize,
    mut on_progress: Option<&mut (dyn FnMut(f64) + Send)>,
) -> Vec<OutputRow> {
    let mut rows = Vec::with_capacity(candidates.len());

    for (i, candidate) in candidates.iter().enumerate() {
        let result = model
            .refine(&candidate.title, candidate.body.as_deref())
            .await.into_result();
        if result.is_sentinel() {
            debug!(title = %candidate.title, reason = %result.use_case, "recording error row");
        }
        rows.push(OutputRow::new(full_topic_name, topic, candidate, result));

        if let Some(sink) = on_progress.as_deref_mut() {
            sink(fraction(i + 1, desired_count));
        }
    }

    rows
}
