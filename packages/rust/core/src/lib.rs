//! Core pipeline orchestration and domain logic for qforge.
//!
//! This crate ties together topic decomposition, fetch-or-generate
//! resolution, and batch refinement into a single sequential run
//! ([`pipeline::run`]), plus topic loading and result export.

pub mod clients;
pub mod decompose;
pub mod export;
pub mod pipeline;
pub mod progress;
pub mod refine;
pub mod resolve;
pub mod topics;

#[cfg(test)]
mod testing;

pub use clients::{QuestionModel, QuestionSearch};
pub use export::{ExportFormat, default_output_path, render_table, write_csv, write_json, write_report, write_xlsx};
pub use pipeline::{RunRequest, run};
pub use progress::{ProgressReporter, ProgressSnapshot, SilentProgress};
pub use topics::{clean_topic, load_topics, read_topics, sample_topics};
