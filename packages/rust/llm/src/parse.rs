//! Parsing of model replies into structured values.
//!
//! Models frequently wrap JSON in a Markdown code fence or surround it with
//! prose. JSON is located by decoding the first complete value from each
//! opening bracket; fences are only stripped for the plain-text list fallback.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use qforge_shared::{EnrichmentResult, QforgeError, Result};

/// Matches the first fenced block whose markers start a line, with or without
/// a language hint.
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^[ \t]*```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)^[ \t]*```").expect("fence regex")
});

/// Matches `1. item`, `2) item`, `- item`, `* item`, `• item`.
static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s+(.+?)\s*$").expect("list item regex"));

/// Remove a surrounding code fence, returning the inner text trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    match FENCE_RE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => text.trim(),
    }
}

/// Every complete JSON value in `text` that starts with `open`, in order.
///
/// Each candidate is decoded as a stream, so prose or fence markers after the
/// value are ignored.
fn json_values(text: &str, open: char) -> impl Iterator<Item = Value> + '_ {
    text.match_indices(open).filter_map(move |(start, _)| {
        serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()
            .and_then(|v| v.ok())
    })
}

/// The first JSON value starting with `open` that decodes as `T`.
fn first_json<T: DeserializeOwned>(text: &str, open: char) -> Option<T> {
    json_values(text, open).find_map(|v| serde_json::from_value(v).ok())
}

// ---------------------------------------------------------------------------
// Refinement record
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawEnrichment {
    #[serde(alias = "refined", alias = "question")]
    refined_question: String,
    domain: String,
    #[serde(alias = "use_case_statement", alias = "usecase")]
    use_case: String,
}

/// Decode a refine reply into its three fields.
///
/// Fails when the reply is not a JSON object with all three non-empty fields.
pub fn parse_enrichment(reply: &str) -> Result<EnrichmentResult> {
    let raw: RawEnrichment = match first_json(reply, '{') {
        Some(raw) => raw,
        None => {
            let detail = match json_values(reply, '{').next() {
                Some(object) => match serde_json::from_value::<RawEnrichment>(object) {
                    Err(e) => format!("malformed refine reply: {e}"),
                    Ok(_) => "malformed refine reply".to_string(),
                },
                None => format!("no JSON object in reply: {}", preview(reply.trim())),
            };
            return Err(QforgeError::parse(detail));
        }
    };

    let result = EnrichmentResult {
        refined_question: raw.refined_question.trim().to_string(),
        domain: raw.domain.trim().to_string(),
        use_case: raw.use_case.trim().to_string(),
    };

    if result.refined_question.is_empty() || result.domain.is_empty() || result.use_case.is_empty() {
        return Err(QforgeError::parse("refine reply has empty fields"));
    }

    Ok(result)
}

// ---------------------------------------------------------------------------
// String lists
// ---------------------------------------------------------------------------

/// Decode a reply holding a list of strings.
///
/// Accepts a JSON array, a JSON object with a single array field, or a
/// numbered/bulleted plain-text list. Blank entries are dropped.
pub fn parse_string_list(reply: &str) -> Result<Vec<String>> {
    if let Some(items) = parse_json_list(reply) {
        return Ok(clean_items(items));
    }

    let inner = strip_code_fence(reply);
    let items: Vec<String> = inner
        .lines()
        .filter_map(|line| LIST_ITEM_RE.captures(line))
        .map(|caps| caps[1].to_string())
        .collect();

    if items.is_empty() {
        return Err(QforgeError::parse(format!(
            "no list found in reply: {}",
            preview(inner)
        )));
    }

    Ok(clean_items(items))
}

fn parse_json_list(text: &str) -> Option<Vec<String>> {
    if let Some(items) = first_json::<Vec<String>>(text, '[') {
        return Some(items);
    }

    json_values(text, '{').find_map(|value| {
        value.as_object()?.values().find_map(|v| {
            v.as_array()?
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<String>>>()
        })
    })
}

fn clean_items(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().trim_matches('"').trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(120).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
