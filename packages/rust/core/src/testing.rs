//! In-memory fakes for the search and completion services.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use qforge_search::SearchHit;
use qforge_shared::{EnrichmentResult, QforgeError, RefineOutcome, Result};

use crate::clients::{QuestionModel, QuestionSearch};

pub(crate) fn hit(title: &str, link: &str) -> SearchHit {
    SearchHit {
        title: title.to_string(),
        link: link.to_string(),
        body: None,
        score: 10,
        answer_count: 2,
        is_answered: true,
        tags: vec!["test".into()],
        creation_date: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
    }
}

/// Search fake: canned hits per query, everything else returns nothing.
#[derive(Default)]
pub(crate) struct FakeSearch {
    hits: HashMap<String, Vec<SearchHit>>,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, usize, Option<u32>)>>,
}

impl FakeSearch {
    /// Answer `query` with `count` hits.
    pub(crate) fn with_hits(mut self, query: &str, count: usize) -> Self {
        let hits = (0..count)
            .map(|i| hit(&format!("{query} question {i}"), &format!("https://q.test/{query}/{i}")))
            .collect();
        self.hits.insert(query.to_string(), hits);
        self
    }

    /// Answer `query` with a network error.
    pub(crate) fn failing(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    pub(crate) fn queries(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.0.clone()).collect()
    }

    pub(crate) fn calls(&self) -> Vec<(String, usize, Option<u32>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuestionSearch for FakeSearch {
    async fn search(&self, query: &str, limit: usize, years: Option<u32>) -> Result<Vec<SearchHit>> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), limit, years));

        if self.failing.contains(query) {
            return Err(QforgeError::Network(format!("{query}: connection reset")));
        }
        Ok(self
            .hits
            .get(query)
            .map(|hits| hits.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// Model fake with scripted decomposition, generation and refinement.
pub(crate) struct FakeModel {
    variations: Option<Vec<String>>,
    generate_fails: bool,
    /// Extra questions returned beyond the requested count.
    generate_surplus: usize,
    refine_failures: HashSet<String>,
    generate_calls: Mutex<Vec<(String, usize, String)>>,
    refine_calls: Mutex<Vec<String>>,
    refine_bodies: Mutex<Vec<Option<String>>>,
}

impl Default for FakeModel {
    fn default() -> Self {
        Self {
            variations: Some(Vec::new()),
            generate_fails: false,
            generate_surplus: 0,
            refine_failures: HashSet::new(),
            generate_calls: Mutex::new(Vec::new()),
            refine_calls: Mutex::new(Vec::new()),
            refine_bodies: Mutex::new(Vec::new()),
        }
    }
}

impl FakeModel {
    pub(crate) fn with_variations(mut self, variations: &[&str]) -> Self {
        self.variations = Some(variations.iter().map(|v| v.to_string()).collect());
        self
    }

    pub(crate) fn failing_decompose(mut self) -> Self {
        self.variations = None;
        self
    }

    pub(crate) fn failing_generate(mut self) -> Self {
        self.generate_fails = true;
        self
    }

    pub(crate) fn generating_surplus(mut self, extra: usize) -> Self {
        self.generate_surplus = extra;
        self
    }

    /// Refinement of `title` returns a failure.
    pub(crate) fn failing_refine(mut self, title: &str) -> Self {
        self.refine_failures.insert(title.to_string());
        self
    }

    pub(crate) fn generate_calls(&self) -> Vec<(String, usize, String)> {
        self.generate_calls.lock().unwrap().clone()
    }

    pub(crate) fn refine_calls(&self) -> Vec<String> {
        self.refine_calls.lock().unwrap().clone()
    }

    pub(crate) fn refine_bodies(&self) -> Vec<Option<String>> {
        self.refine_bodies.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuestionModel for FakeModel {
    fn model_id(&self) -> &str {
        "fake-model"
    }

    async fn refine(&self, title: &str, body: Option<&str>) -> RefineOutcome {
        self.refine_calls.lock().unwrap().push(title.to_string());
        self.refine_bodies
            .lock()
            .unwrap()
            .push(body.map(str::to_string));
        if self.refine_failures.contains(title) {
            return RefineOutcome::Failed(format!("unparseable reply for {title:?}"));
        }
        RefineOutcome::Refined(EnrichmentResult {
            refined_question: format!("Refined: {title}"),
            domain: "Testing".into(),
            use_case: format!("Use case for {title}"),
        })
    }

    async fn generate(&self, topic: &str, count: usize, sub_topic: &str) -> Result<Vec<String>> {
        self.generate_calls
            .lock()
            .unwrap()
            .push((topic.to_string(), count, sub_topic.to_string()));

        if self.generate_fails {
            return Err(QforgeError::Enrichment("HTTP 429: quota exceeded".into()));
        }
        Ok((0..count + self.generate_surplus)
            .map(|i| format!("Generated {sub_topic} question {i}"))
            .collect())
    }

    async fn decompose(&self, topic: &str, _count: usize) -> Result<Vec<String>> {
        self.variations
            .clone()
            .ok_or_else(|| QforgeError::parse(format!("no list in reply for {topic}")))
    }
}
