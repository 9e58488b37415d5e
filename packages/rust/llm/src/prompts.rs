//! Prompt builders for the three completion tasks.

use crate::Message;

/// Longest question body, in characters, included as refine context.
const MAX_BODY_CHARS: usize = 2000;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that writes precise, self-contained \
technical questions. When asked for JSON, reply with JSON only.";

fn conversation(user: String) -> Vec<Message> {
    vec![Message::system(SYSTEM_PROMPT), Message::user(user)]
}

/// Restate a question as a use-case statement with a domain label.
///
/// The question body, when known, is passed along as context.
pub(crate) fn refine(title: &str, body: Option<&str>) -> Vec<Message> {
    let details = body
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(|b| format!("Details:\n{}\n\n", clip(b, MAX_BODY_CHARS)))
        .unwrap_or_default();

    conversation(format!(
        "Rewrite the question below as a refined question framed as a use case statement \
rather than a first-person statement, so a trainer can think beyond a single scenario and \
fold in related concerns that help solve the problem. Make it one long sentence and do not \
open with filler such as \"Certainly!\".\n\n\
Also name the technical domain it belongs to and summarise the use case in a short phrase.\n\n\
Question: {title}\n\n\
{details}\
Reply with a JSON object with exactly these keys: \
\"refined_question\", \"domain\", \"use_case\"."
    ))
}

fn clip(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Author `count` fresh questions about `topic`, focused on `sub_topic`.
pub(crate) fn generate(topic: &str, count: usize, sub_topic: &str) -> Vec<Message> {
    conversation(format!(
        "Write {count} distinct, realistic questions a software developer might post on a \
Q&A site about \"{topic}\", focusing on \"{sub_topic}\". Each question must stand on its own \
and be a single sentence.\n\n\
Reply with a JSON array of {count} strings."
    ))
}

/// Propose `count` narrower variations of `topic` for search.
pub(crate) fn decompose(topic: &str, count: usize) -> Vec<Message> {
    conversation(format!(
        "Propose {count} smaller, more specific variations of the topic \"{topic}\" that \
would work well as search queries on a programming Q&A site. Include common abbreviations \
and a few likely misspellings or typos. Order them from most to least promising.\n\n\
Reply with a JSON array of {count} strings."
    ))
}
