//! End-to-end run: topics → variations → candidates → refined rows.

use chrono::Utc;
use tracing::{info, instrument};

use qforge_shared::{MAX_TOPIC_VARIATIONS, QforgeError, Result, RunId, RunReport, TopicStats};

use crate::clients::{QuestionModel, QuestionSearch};
use crate::progress::{ProgressReporter, ProgressTracker};
use crate::refine::refine_batch;
use crate::resolve::{ResolveRequest, resolve};

/// Parameters for one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Topics to process, in order.
    pub topics: Vec<String>,
    pub questions_per_topic: usize,
    /// Label written into every row. Each row uses its own topic when unset.
    pub full_topic_name: Option<String>,
    /// Only search questions from the last N years.
    pub years: Option<u32>,
    pub max_variations: usize,
}

impl RunRequest {
    pub fn new(topics: Vec<String>, questions_per_topic: usize) -> Self {
        Self {
            topics,
            questions_per_topic,
            full_topic_name: None,
            years: None,
            max_variations: MAX_TOPIC_VARIATIONS,
        }
    }

    /// Reject inputs that would make the run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.topics.is_empty() {
            return Err(QforgeError::validation("no topics selected"));
        }
        if let Some(i) = self.topics.iter().position(|t| t.trim().is_empty()) {
            return Err(QforgeError::validation(format!("topic #{} is blank", i + 1)));
        }
        if self.questions_per_topic == 0 {
            return Err(QforgeError::validation(
                "questions per topic must be at least 1",
            ));
        }
        if self.years == Some(0) {
            return Err(QforgeError::validation("years must be at least 1"));
        }
        if self.max_variations == 0 {
            return Err(QforgeError::validation("max variations must be at least 1"));
        }
        Ok(())
    }
}

/// Run the full pipeline over every topic, one at a time.
///
/// Service failures degrade to generated questions or error rows; only
/// invalid input is returned as an error.
#[instrument(skip_all, fields(topics = request.topics.len(), per_topic = request.questions_per_topic))]
pub async fn run(
    search: &dyn QuestionSearch,
    model: &dyn QuestionModel,
    request: &RunRequest,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    request.validate()?;

    let run_id = RunId::new();
    let started_at = Utc::now();
    let total = request.topics.len();
    let desired = request.questions_per_topic;

    info!(%run_id, model = model.model_id(), "starting run");
    progress.phase("Processing topics");

    let mut tracker = ProgressTracker::new(total);
    let mut rows = Vec::new();
    let mut stats = Vec::with_capacity(total);

    for (index, topic) in request.topics.iter().enumerate() {
        let topic = topic.trim();
        let full_topic_name = request.full_topic_name.as_deref().unwrap_or(topic);

        progress.topic_started(topic, index, total);
        tracker.start_topic(index);

        let resolution = resolve(
            search,
            model,
            &ResolveRequest {
                topic,
                desired_count: desired,
                full_topic_name,
                years: request.years,
                max_variations: request.max_variations,
            },
        )
        .await;

        let mut on_batch = |fraction: f64| progress.progress(tracker.set_batch(fraction));
        let topic_rows = refine_batch(
            model,
            &resolution.candidates,
            topic,
            full_topic_name,
            desired,
            Some(&mut on_batch),
        )
        .await;

        let topic_stats = TopicStats {
            topic: topic.to_string(),
            matched_variation: resolution.matched_variation.clone(),
            variations_tried: resolution.variations_tried,
            searched: resolution.searched(),
            generated: resolution.generated(),
            refine_failures: topic_rows.iter().filter(|r| r.is_error()).count(),
        };
        info!(
            topic,
            rows = topic_rows.len(),
            searched = topic_stats.searched,
            generated = topic_stats.generated,
            failures = topic_stats.refine_failures,
            "topic complete"
        );

        rows.extend(topic_rows);
        stats.push(topic_stats);
        progress.progress(tracker.finish_topic());
    }

    let report = RunReport {
        run_id,
        started_at,
        finished_at: Utc::now(),
        model: model.model_id().to_string(),
        questions_per_topic: desired,
        years: request.years,
        topics: stats,
        rows,
    };

    info!(
        run_id = %report.run_id,
        rows = report.rows.len(),
        errors = report.error_rows(),
        "run complete"
    );
    progress.done(&report);
    Ok(report)
}
