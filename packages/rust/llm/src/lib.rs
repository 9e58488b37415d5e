//! OpenAI-compatible chat-completion client.
//!
//! Provides the three LLM tasks the pipeline needs: refining a question into
//! a structured record, generating substitute questions, and proposing topic
//! variations. Requests are never retried; callers decide how to degrade.

pub mod parse;
mod prompts;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use qforge_shared::{EnrichmentResult, LlmConfig, QforgeError, Result};

pub use parse::{parse_enrichment, parse_string_list, strip_code_fence};

/// User-Agent string for completion requests.
const USER_AGENT: &str = concat!("qforge/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Chat-completion client. Construct once per run.
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
    endpoint: Url,
}

impl LlmClient {
    /// Create a new client with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| QforgeError::Network(format!("failed to build HTTP client: {e}")))?;

        let endpoint = config
            .base_url
            .join("chat/completions")
            .map_err(|e| QforgeError::config(format!("invalid llm base_url: {e}")))?;

        Ok(Self {
            config,
            client,
            endpoint,
        })
    }

    /// Model id sent with every request.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send one chat completion and return the first choice's text.
    pub async fn complete(&self, messages: &[Message]) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = self.endpoint.as_str();
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| QforgeError::Network(format!("{url}: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| QforgeError::Network(format!("{url}: failed to read body: {e}")))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| status.to_string());
            return Err(QforgeError::Enrichment(format!(
                "HTTP {}: {detail}",
                status.as_u16()
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| QforgeError::parse(format!("invalid completion response: {e}")))?;

        if let Some(usage) = &parsed.usage {
            debug!(
                tokens_in = usage.prompt_tokens,
                tokens_out = usage.completion_tokens,
                "completion usage"
            );
        }

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| QforgeError::Enrichment("completion returned no content".into()))
    }

    /// Refine a question into a structured record, using its body as context.
    #[instrument(skip(self, body), fields(has_body = body.is_some()))]
    pub async fn refine(&self, title: &str, body: Option<&str>) -> Result<EnrichmentResult> {
        let reply = self.complete(&prompts::refine(title, body)).await?;
        parse::parse_enrichment(&reply)
    }

    /// Generate `count` questions about `topic`, focused on `sub_topic`.
    #[instrument(skip(self))]
    pub async fn generate_questions(
        &self,
        topic: &str,
        count: usize,
        sub_topic: &str,
    ) -> Result<Vec<String>> {
        let reply = self
            .complete(&prompts::generate(topic, count, sub_topic))
            .await?;
        parse::parse_string_list(&reply)
    }

    /// Propose up to `count` search-friendly variations of `topic`.
    #[instrument(skip(self))]
    pub async fn topic_variations(&self, topic: &str, count: usize) -> Result<Vec<String>> {
        let reply = self.complete(&prompts::decompose(topic, count)).await?;
        parse::parse_string_list(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> LlmClient {
        let config = LlmConfig {
            base_url: Url::parse(&format!("{}/v1/", server.uri())).unwrap(),
            model: "test-model".into(),
            api_key: "test-key".into(),
            temperature: 0.2,
            max_tokens: 256,
            timeout: Duration::from_secs(5),
        };
        LlmClient::new(config).unwrap()
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 12}
        })
    }

    #[tokio::test]
    async fn refine_parses_fenced_json() {
        let server = MockServer::start().await;
        let content = "```json\n{\"refined_question\":\"A team must detect cycles in a dependency graph before scheduling builds.\",\"domain\":\"Graphs\",\"use_case\":\"Build scheduling\"}\n```";

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_string_contains("Kahn's algorithm"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(content)))
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server)
            .refine("How to detect a cycle?", Some("I tried Kahn's algorithm on my build graph."))
            .await
            .unwrap();
        assert_eq!(result.domain, "Graphs");
        assert_eq!(result.use_case, "Build scheduling");
    }

    #[tokio::test]
    async fn refine_unparseable_reply_is_parse_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion("Certainly! Here it is.")),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).refine("q", None).await.unwrap_err();
        assert!(matches!(err, QforgeError::Parse { .. }));
    }

    #[tokio::test]
    async fn quota_errors_are_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "You exceeded your current quota", "type": "insufficient_quota"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate_questions("graphs", 2, "bfs")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exceeded your current quota"));
    }

    #[tokio::test]
    async fn generate_returns_list() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                r#"["How does BFS find shortest paths?", "When is DFS preferable?"]"#,
            )))
            .mount(&server)
            .await;

        let questions = client_for(&server)
            .generate_questions("graphs", 2, "traversal")
            .await
            .unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[1], "When is DFS preferable?");
    }

    #[tokio::test]
    async fn empty_choice_is_enrichment_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .topic_variations("graphs", 20)
            .await
            .unwrap_err();
        assert!(matches!(err, QforgeError::Enrichment(_)));
    }
}
