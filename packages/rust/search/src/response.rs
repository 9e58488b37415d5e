//! Stack Exchange response decoding.
//!
//! The API wraps every result list in a common envelope:
//! `{ "items": [...], "has_more": bool, "quota_remaining": n, "backoff"?: secs }`.
//! Titles arrive HTML-escaped and bodies as rendered HTML.

use chrono::{DateTime, Utc};
use scraper::Html;
use serde::Deserialize;
use tracing::debug;

use qforge_shared::{QforgeError, Result};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Common response wrapper.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    pub items: Vec<RawQuestion>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub quota_remaining: Option<u32>,
    /// Seconds the client must wait before hitting the same method again.
    #[serde(default)]
    pub backoff: Option<u64>,
    #[serde(default)]
    pub error_id: Option<u32>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawQuestion {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub answer_count: u32,
    #[serde(default)]
    pub is_answered: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub creation_date: i64,
}

// ---------------------------------------------------------------------------
// Public hit type
// ---------------------------------------------------------------------------

/// A question returned by the search service, decoded and cleaned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Plain-text title with HTML entities decoded.
    pub title: String,
    pub link: String,
    /// Question body converted to Markdown.
    pub body: Option<String>,
    pub score: i64,
    pub answer_count: u32,
    pub is_answered: bool,
    pub tags: Vec<String>,
    pub creation_date: DateTime<Utc>,
}

/// A decoded page of search results.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub hits: Vec<SearchHit>,
    pub has_more: bool,
    pub quota_remaining: Option<u32>,
    pub backoff_secs: Option<u64>,
}

/// Decode a response body into a [`SearchPage`].
///
/// Items with an empty title after decoding are dropped.
pub(crate) fn parse_page(body: &str) -> Result<SearchPage> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| QforgeError::parse(format!("invalid search response: {e}")))?;

    if let Some(id) = envelope.error_id {
        return Err(QforgeError::parse(format!(
            "search API error {id}: {}",
            envelope.error_message.unwrap_or_default()
        )));
    }

    let total = envelope.items.len();
    let hits: Vec<SearchHit> = envelope.items.into_iter().filter_map(into_hit).collect();
    if hits.len() < total {
        debug!(dropped = total - hits.len(), "dropped untitled search items");
    }

    Ok(SearchPage {
        hits,
        has_more: envelope.has_more,
        quota_remaining: envelope.quota_remaining,
        backoff_secs: envelope.backoff,
    })
}

fn into_hit(raw: RawQuestion) -> Option<SearchHit> {
    let title = decode_html_text(&raw.title);
    if title.is_empty() {
        return None;
    }

    Some(SearchHit {
        title,
        link: raw.link,
        body: raw.body.as_deref().and_then(body_to_markdown),
        score: raw.score,
        answer_count: raw.answer_count,
        is_answered: raw.is_answered,
        tags: raw.tags,
        creation_date: DateTime::from_timestamp(raw.creation_date, 0).unwrap_or_default(),
    })
}

/// Strip markup and decode entities (`&#39;`, `&quot;`, ...) from a fragment.
pub(crate) fn decode_html_text(fragment: &str) -> String {
    let doc = Html::parse_fragment(fragment);
    let text: String = doc.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Convert a question body to Markdown. `None` when empty or unconvertible.
fn body_to_markdown(html: &str) -> Option<String> {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "iframe", "img"])
        .build();

    match converter.convert(html) {
        Ok(md) => {
            let md = md.trim();
            (!md.is_empty()).then(|| md.to_string())
        }
        Err(e) => {
            debug!(error = %e, "body conversion failed");
            None
        }
    }
}
