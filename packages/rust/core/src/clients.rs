//! Capabilities the pipeline consumes from external services.
//!
//! The resolver and refinement driver only see these traits, so tests can
//! substitute in-memory fakes for the Stack Exchange and LLM clients.

use async_trait::async_trait;
use tracing::warn;

use qforge_llm::LlmClient;
use qforge_search::{SearchHit, StackExchangeClient};
use qforge_shared::{RefineOutcome, Result};

/// Q&A search service.
#[async_trait]
pub trait QuestionSearch: Send + Sync {
    /// At most `limit` hits for `query`, optionally restricted to the last `years` years.
    async fn search(&self, query: &str, limit: usize, years: Option<u32>) -> Result<Vec<SearchHit>>;
}

/// LLM completion service.
#[async_trait]
pub trait QuestionModel: Send + Sync {
    /// Model identifier recorded in run reports.
    fn model_id(&self) -> &str;

    /// Restate a question as `{ refined_question, domain, use_case }`.
    /// `body` is the original question text, when one exists.
    async fn refine(&self, title: &str, body: Option<&str>) -> RefineOutcome;

    /// Author `count` new questions about `topic`, focused on `sub_topic`.
    async fn generate(&self, topic: &str, count: usize, sub_topic: &str) -> Result<Vec<String>>;

    /// Propose up to `count` variations of `topic`, most promising first.
    async fn decompose(&self, topic: &str, count: usize) -> Result<Vec<String>>;
}

#[async_trait]
impl QuestionSearch for StackExchangeClient {
    async fn search(&self, query: &str, limit: usize, years: Option<u32>) -> Result<Vec<SearchHit>> {
        StackExchangeClient::search(self, query, limit, years).await
    }
}

#[async_trait]
impl QuestionModel for LlmClient {
    fn model_id(&self) -> &str {
        self.model()
    }

    async fn refine(&self, title: &str, body: Option<&str>) -> RefineOutcome {
        match LlmClient::refine(self, title, body).await {
            Ok(result) => RefineOutcome::Refined(result),
            Err(e) => {
                warn!(title, error = %e, "refinement failed");
                RefineOutcome::Failed(e.to_string())
            }
        }
    }

    async fn generate(&self, topic: &str, count: usize, sub_topic: &str) -> Result<Vec<String>> {
        self.generate_questions(topic, count, sub_topic).await
    }

    async fn decompose(&self, topic: &str, count: usize) -> Result<Vec<String>> {
        self.topic_variations(topic, count).await
    }
}
