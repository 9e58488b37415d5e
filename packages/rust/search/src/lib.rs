//! Stack Exchange question search.
//!
//! Wraps the `/search/advanced` endpoint: relevance or vote ranking, an
//! optional "last N years" cutoff, and client-side quality filters. Transient
//! failures (5xx, 429, timeouts) are retried with exponential backoff, and the
//! API's own `backoff` hint is honoured before the next request.

mod response;

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Months, Utc};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use qforge_shared::{QforgeError, Result, SearchConfig};

pub use response::{SearchHit, SearchPage};

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("qforge/", env!("CARGO_PKG_VERSION"));

/// Built-in Stack Exchange filter that adds `body` to each question.
const BODY_FILTER: &str = "withbody";

/// Largest page the API will serve.
const MAX_PAGE_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Stack Exchange search client. Construct once per run.
pub struct StackExchangeClient {
    config: SearchConfig,
    client: Client,
    endpoint: Url,
    /// Earliest instant the next request may be sent (API `backoff` hint).
    not_before: Mutex<Option<Instant>>,
}

impl StackExchangeClient {
    /// Create a new client with the given configuration.
    pub fn new(config: SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| QforgeError::Network(format!("failed to build HTTP client: {e}")))?;

        let endpoint = config
            .base_url
            .join("search/advanced")
            .map_err(|e| QforgeError::config(format!("invalid search base_url: {e}")))?;

        Ok(Self {
            config,
            client,
            endpoint,
            not_before: Mutex::new(None),
        })
    }

    /// Search questions matching `query`, returning at most `limit` hits.
    ///
    /// `years` restricts results to questions created within the last N years.
    #[instrument(skip(self), fields(site = %self.config.site))]
    pub async fn search(&self, query: &str, limit: usize, years: Option<u32>) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let params = self.query_params(query, limit, years, Utc::now());
        let page = self.fetch_with_retry(&params).await?;

        if let Some(remaining) = page.quota_remaining {
            debug!(remaining, "search quota");
        }

        let fetched = page.hits.len();
        let hits: Vec<SearchHit> = page
            .hits
            .into_iter()
            .filter(|hit| self.passes_quality(hit))
            .take(limit)
            .collect();

        info!(fetched, kept = hits.len(), "search complete");
        Ok(hits)
    }

    /// Build the query string for one search call.
    fn query_params(
        &self,
        query: &str,
        limit: usize,
        years: Option<u32>,
        now: DateTime<Utc>,
    ) -> Vec<(&'static str, String)> {
        // Client-side filters discard hits, so over-fetch when they are active.
        let page_size = if self.has_quality_filters() {
            MAX_PAGE_SIZE
        } else {
            limit.clamp(1, MAX_PAGE_SIZE)
        };

        let mut params = vec![
            ("order", "desc".to_string()),
            ("sort", self.config.sort.as_str().to_string()),
            ("q", query.to_string()),
            ("site", self.config.site.clone()),
            ("pagesize", page_size.to_string()),
            ("filter", BODY_FILTER.to_string()),
        ];

        if let Some(from) = years.and_then(|y| from_date(y, now)) {
            params.push(("fromdate", from.to_string()));
        }
        if self.config.answered_only {
            params.push(("answers", "1".to_string()));
        }
        if let Some(key) = &self.config.api_key {
            params.push(("key", key.clone()));
        }

        params
    }

    fn has_quality_filters(&self) -> bool {
        self.config.min_score.is_some() || self.config.answered_only
    }

    fn passes_quality(&self, hit: &SearchHit) -> bool {
        let score_ok = self.config.min_score.is_none_or(|min| hit.score >= min);
        score_ok && (!self.config.answered_only || hit.answer_count > 0)
    }

    /// Send the request, retrying transient failures with exponential backoff.
    async fn fetch_with_retry(&self, params: &[(&'static str, String)]) -> Result<SearchPage> {
        let mut attempt: u32 = 0;

        loop {
            self.wait_for_backoff().await;

            match self.fetch_once(params).await {
                Ok(page) => {
                    if let Some(secs) = page.backoff_secs {
                        warn!(secs, "search API requested backoff");
                        self.set_backoff(Duration::from_secs(secs));
                    }
                    return Ok(page);
                }
                Err(e) if e.is_transient() && attempt < self.config.max_retries => {
                    let delay = self.config.backoff_base * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(
                        error = %e,
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "transient search failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, params: &[(&'static str, String)]) -> Result<SearchPage> {
        let url = self.endpoint.as_str();
        let resp = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| QforgeError::Network(format!("{url}: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| QforgeError::Network(format!("{url}: failed to read body: {e}")))?;

        if !status.is_success() {
            debug!(%status, body = %truncate(&body, 200), "search API error response");
            return Err(QforgeError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response::parse_page(&body)
    }

    async fn wait_for_backoff(&self) {
        let deadline = *self.not_before.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(deadline) = deadline {
            let now = Instant::now();
            if deadline > now {
                tokio::time::sleep(deadline - now).await;
            }
        }
    }

    fn set_backoff(&self, wait: Duration) {
        let mut guard = self.not_before.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Instant::now() + wait);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Unix timestamp `years` years before `now`.
fn from_date(years: u32, now: DateTime<Utc>) -> Option<i64> {
    now.checked_sub_months(Months::new(years.saturating_mul(12)))
        .map(|d| d.timestamp())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qforge_shared::{AppConfig, SearchSort};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> SearchConfig {
        let mut app = AppConfig::default();
        app.search.base_url = server.uri();
        app.search.api_key_env = "QF_TEST_UNSET_SEARCH_KEY".into();
        let mut config = SearchConfig::try_from(&app).expect("search config");
        config.backoff_base = Duration::from_millis(1);
        config
    }

    fn fixture() -> String {
        std::fs::read_to_string("../../../fixtures/stackexchange/search_graphs.json")
            .expect("read search fixture")
    }

    #[test]
    fn from_date_subtracts_whole_years() {
        let now = DateTime::parse_from_rfc3339("2024-06-15T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let expected = DateTime::parse_from_rfc3339("2022-06-15T00:00:00Z")
            .unwrap()
            .timestamp();
        assert_eq!(from_date(2, now), Some(expected));
    }

    #[tokio::test]
    async fn query_params_reflect_config() {
        let server = MockServer::start().await;
        let mut config = test_config(&server);
        config.sort = SearchSort::Votes;
        config.api_key = Some("k3y".into());
        let client = StackExchangeClient::new(config).unwrap();

        let params = client.query_params("graphs", 3, Some(1), Utc::now());
        let get = |k: &str| params.iter().find(|(n, _)| *n == k).map(|(_, v)| v.as_str());
        assert_eq!(get("sort"), Some("votes"));
        assert_eq!(get("pagesize"), Some("3"));
        assert_eq!(get("key"), Some("k3y"));
        assert!(get("fromdate").is_some());
        assert!(get("answers").is_none());
    }

    #[tokio::test]
    async fn search_returns_bounded_hits() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/advanced"))
            .and(query_param("q", "graphs"))
            .and(query_param("site", "stackoverflow"))
            .and(query_param("pagesize", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
            .mount(&server)
            .await;

        let client = StackExchangeClient::new(test_config(&server)).unwrap();
        let hits = client.search("graphs", 2, None).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "What's the difference between BFS and DFS?");
        assert_eq!(hits[1].answer_count, 4);
    }

    #[tokio::test]
    async fn quality_filters_drop_weak_hits() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/advanced"))
            .and(query_param("pagesize", "100"))
            .and(query_param("answers", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
            .mount(&server)
            .await;

        let mut config = test_config(&server);
        config.min_score = Some(0);
        config.answered_only = true;
        let client = StackExchangeClient::new(config).unwrap();
        let hits = client.search("graphs", 5, None).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.score >= 0 && h.answer_count > 0));
    }

    #[tokio::test]
    async fn retries_transient_server_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/advanced"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/search/advanced"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
            .expect(1)
            .mount(&server)
            .await;

        let client = StackExchangeClient::new(test_config(&server)).unwrap();
        let hits = client.search("graphs", 3, None).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/advanced"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4)
            .mount(&server)
            .await;

        let client = StackExchangeClient::new(test_config(&server)).unwrap();
        let err = client.search("graphs", 3, None).await.unwrap_err();
        assert!(matches!(err, QforgeError::Http { status: 500, .. }));
    }

    #[tokio::test]
    async fn slow_responses_time_out_and_are_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/advanced"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(fixture())
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(4)
            .mount(&server)
            .await;

        let mut config = test_config(&server);
        config.timeout = Duration::from_millis(50);
        let client = StackExchangeClient::new(config).unwrap();

        let err = client.search("graphs", 3, None).await.unwrap_err();
        assert!(matches!(err, QforgeError::Network(_)), "{err}");
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/search/advanced"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"error_id":400,"error_name":"bad_parameter","error_message":"site is required"}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = StackExchangeClient::new(test_config(&server)).unwrap();
        let err = client.search("graphs", 3, None).await.unwrap_err();
        assert!(matches!(err, QforgeError::Http { status: 400, .. }));
    }

    #[tokio::test]
    async fn zero_limit_skips_request() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture()))
            .expect(0)
            .mount(&server)
            .await;

        let client = StackExchangeClient::new(test_config(&server)).unwrap();
        assert!(client.search("graphs", 0, None).await.unwrap().is_empty());
    }
}
