//! Core domain types for qforge runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Literal written into `refined_question` and `domain` when refinement fails.
pub const ERROR_MARKER: &str = "Error";

/// Column headers of the result table, in export order.
pub const OUTPUT_COLUMNS: [&str; 6] = [
    "Full Topic Name",
    "Topic",
    "Question Title",
    "Domain",
    "Use Case Statement",
    "Question Link",
];

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// CandidateQuestion
// ---------------------------------------------------------------------------

/// Where a candidate question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// A real question returned by the search service.
    Search,
    /// Authored by the LLM to cover a shortfall.
    Generated,
}

/// A question waiting to be refined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateQuestion {
    /// Never empty.
    pub title: String,
    /// Empty for generated questions.
    #[serde(default)]
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub provenance: Provenance,
}

impl CandidateQuestion {
    /// A title-only candidate produced by the generation fallback.
    pub fn generated(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: String::new(),
            body: None,
            provenance: Provenance::Generated,
        }
    }

    /// A candidate backed by a real search hit.
    pub fn searched(title: impl Into<String>, link: impl Into<String>, body: Option<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            body,
            provenance: Provenance::Search,
        }
    }

    pub fn is_generated(&self) -> bool {
        self.provenance == Provenance::Generated
    }
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

/// The structured form every question is refined into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub refined_question: String,
    pub domain: String,
    pub use_case: String,
}

impl EnrichmentResult {
    /// The fixed failure record: `Error` / `Error` / diagnostic.
    pub fn sentinel(diagnostic: impl Into<String>) -> Self {
        Self {
            refined_question: ERROR_MARKER.into(),
            domain: ERROR_MARKER.into(),
            use_case: diagnostic.into(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.refined_question == ERROR_MARKER && self.domain == ERROR_MARKER
    }
}

/// Outcome of a single refine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefineOutcome {
    Refined(EnrichmentResult),
    /// Transport, quota, or structural failure, with a diagnostic.
    Failed(String),
}

impl RefineOutcome {
    /// Collapse into a record, substituting the sentinel on failure.
    pub fn into_result(self) -> EnrichmentResult {
        match self {
            Self::Refined(result) => result,
            Self::Failed(reason) => EnrichmentResult::sentinel(reason),
        }
    }
}

// ---------------------------------------------------------------------------
// OutputRow
// ---------------------------------------------------------------------------

/// One line of the result table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRow {
    #[serde(rename = "Full Topic Name")]
    pub full_topic_name: String,
    #[serde(rename = "Topic")]
    pub topic: String,
    /// The refined question, not the candidate's original title.
    #[serde(rename = "Question Title")]
    pub question_title: String,
    #[serde(rename = "Domain")]
    pub domain: String,
    #[serde(rename = "Use Case Statement")]
    pub use_case_statement: String,
    #[serde(rename = "Question Link")]
    pub question_link: String,
}

impl OutputRow {
    pub fn new(
        full_topic_name: &str,
        topic: &str,
        candidate: &CandidateQuestion,
        enrichment: EnrichmentResult,
    ) -> Self {
        Self {
            full_topic_name: full_topic_name.to_string(),
            topic: topic.to_string(),
            question_title: enrichment.refined_question,
            domain: enrichment.domain,
            use_case_statement: enrichment.use_case,
            question_link: candidate.link.clone(),
        }
    }

    /// Field values in [`OUTPUT_COLUMNS`] order.
    pub fn fields(&self) -> [&str; 6] {
        [
            &self.full_topic_name,
            &self.topic,
            &self.question_title,
            &self.domain,
            &self.use_case_statement,
            &self.question_link,
        ]
    }

    pub fn is_error(&self) -> bool {
        self.domain == ERROR_MARKER
    }
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// Per-topic accounting for a completed run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicStats {
    pub topic: String,
    /// Variation whose search produced results, if any did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_variation: Option<String>,
    pub variations_tried: usize,
    pub searched: usize,
    pub generated: usize,
    pub refine_failures: usize,
}

/// Everything a finished run hands to the presentation/export layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub model: String,
    pub questions_per_topic: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years: Option<u32>,
    pub topics: Vec<TopicStats>,
    pub rows: Vec<OutputRow>,
}

impl RunReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn error_rows(&self) -> usize {
        self.rows.iter().filter(|r| r.is_error()).count()
    }
}
