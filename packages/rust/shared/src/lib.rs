//! Shared types, error model, and configuration for qforge.
//!
//! This crate is the foundation depended on by all other qforge crates.
//! It provides:
//! - [`QforgeError`]: the unified error type
//! - Domain types ([`CandidateQuestion`], [`EnrichmentResult`], [`OutputRow`], [`RunReport`])
//! - Configuration ([`AppConfig`], [`SearchConfig`], [`LlmConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, LlmConfig, LlmSection, MAX_TOPIC_VARIATIONS, SearchConfig,
    SearchSection, SearchSort, config_dir, config_file_path, init_config, load_config,
    load_config_from, validate_api_key,
};
pub use error::{QforgeError, Result};
pub use types::{
    CandidateQuestion, ERROR_MARKER, EnrichmentResult, OUTPUT_COLUMNS, OutputRow, Provenance,
    RefineOutcome, RunId, RunReport, TopicStats,
};
