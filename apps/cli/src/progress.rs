//! Terminal progress display for runs.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use qforge_core::{ProgressReporter, ProgressSnapshot};
use qforge_shared::RunReport;

/// Bar resolution; fractions are mapped onto `0..=SCALE`.
const SCALE: u64 = 1000;

/// Two stacked bars: topics completed, and questions refined for the current topic.
pub(crate) struct CliProgress {
    _multi: MultiProgress,
    overall: ProgressBar,
    batch: ProgressBar,
}

impl CliProgress {
    pub(crate) fn new() -> Self {
        let multi = MultiProgress::new();
        let style = ProgressStyle::with_template("{prefix:>8} [{bar:40.cyan/blue}] {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");

        let overall = multi.add(ProgressBar::new(SCALE));
        overall.set_style(style.clone());
        overall.set_prefix("topics");

        let batch = multi.add(ProgressBar::new(SCALE));
        batch.set_style(style);
        batch.set_prefix("batch");

        Self {
            _multi: multi,
            overall,
            batch,
        }
    }
}

fn position(fraction: f64) -> u64 {
    (fraction.clamp(0.0, 1.0) * SCALE as f64).round() as u64
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.overall.set_message(name.to_string());
    }

    fn topic_started(&self, topic: &str, index: usize, total: usize) {
        self.overall
            .set_message(format!("[{}/{total}] {topic}", index + 1));
        self.batch.reset();
        self.batch.set_message("resolving");
    }

    fn progress(&self, snapshot: ProgressSnapshot) {
        self.overall.set_position(position(snapshot.overall));
        self.batch.set_position(position(snapshot.batch));
        self.batch.set_message("refining");
    }

    fn done(&self, _report: &RunReport) {
        self.batch.finish_and_clear();
        self.overall.finish_and_clear();
    }
}
