//! Run progress: two nested fractions, published after every unit of work.
//!
//! `batch` tracks refinement within the current topic and restarts at 0.0 for
//! each topic; `overall` tracks completed topics across the run. Both are
//! computed as `done / total` (never accumulated) and clamped to 1.0.

use qforge_shared::RunReport;

/// A point-in-time view of run progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Zero-based index of the topic being processed.
    pub topic_index: usize,
    pub topic_total: usize,
    /// Fraction of the current topic's question batch refined.
    ///
    /// Scoped to `topic_index`: it resets to 0.0 when the next topic starts,
    /// so it drops between topics while `overall` only grows.
    pub batch: f64,
    /// Fraction of topics completed.
    pub overall: f64,
}

/// Progress callback for the run orchestrator.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a topic is resolved.
    fn topic_started(&self, topic: &str, index: usize, total: usize);
    /// Called after every refined question and every finished topic.
    fn progress(&self, snapshot: ProgressSnapshot);
    /// Called when the run completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn topic_started(&self, _topic: &str, _index: usize, _total: usize) {}
    fn progress(&self, _snapshot: ProgressSnapshot) {}
    fn done(&self, _report: &RunReport) {}
}

/// `done / total`, clamped to `[0.0, 1.0]`. An empty total counts as complete.
pub fn fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (done as f64 / total as f64).min(1.0)
}

/// Counters owned by the orchestrator for the duration of one run.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    topic_total: usize,
    topics_done: usize,
    topic_index: usize,
    batch: f64,
}

impl ProgressTracker {
    pub(crate) fn new(topic_total: usize) -> Self {
        Self {
            topic_total,
            topics_done: 0,
            topic_index: 0,
            batch: 0.0,
        }
    }

    pub(crate) fn start_topic(&mut self, index: usize) {
        self.topic_index = index;
        self.batch = 0.0;
    }

    /// Record a batch fraction; values below the current one are ignored.
    pub(crate) fn set_batch(&mut self, fraction: f64) -> ProgressSnapshot {
        self.batch = self.batch.max(fraction.clamp(0.0, 1.0));
        self.snapshot()
    }

    /// Mark the current topic complete. Its batch is reported as full even
    /// when fewer candidates than requested were refined.
    pub(crate) fn finish_topic(&mut self) -> ProgressSnapshot {
        self.topics_done = (self.topics_done + 1).min(self.topic_total);
        self.batch = 1.0;
        self.snapshot()
    }

    pub(crate) fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            topic_index: self.topic_index,
            topic_total: self.topic_total,
            batch: self.batch,
            overall: fraction(self.topics_done, self.topic_total),
        }
    }
}
