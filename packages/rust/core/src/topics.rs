//! Topic loading from CSV and random selection.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use qforge_shared::{QforgeError, Result};

/// Characters stripped from both ends of a topic cell.
fn is_debris(c: char) -> bool {
    c.is_whitespace() || matches!(c, '"' | '\'' | ',' | '[' | ']')
}

/// Strip quotes, commas and list brackets left over from exported lists.
///
/// Returns `None` when nothing is left.
pub fn clean_topic(raw: &str) -> Option<String> {
    let cleaned = raw.trim_matches(is_debris);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Load and clean the topics in `column` of the CSV file at `path`.
pub fn load_topics(path: &Path, column: &str) -> Result<Vec<String>> {
    let file = std::fs::File::open(path).map_err(|e| QforgeError::io(path, e))?;
    let topics = read_topics(file, column)?;
    info!(path = %path.display(), count = topics.len(), "loaded topics");
    Ok(topics)
}

/// Read topics from CSV data with a header row.
///
/// Cells are cleaned with [`clean_topic`]; empty cells are dropped and
/// duplicates keep their first position.
pub fn read_topics<R: Read>(reader: R, column: &str) -> Result<Vec<String>> {
    let mut csv = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers = csv
        .headers()
        .map_err(|e| QforgeError::parse(format!("invalid CSV header: {e}")))?;
    let index = headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| {
            QforgeError::validation(format!(
                "column {column:?} not found (available: {})",
                headers.iter().collect::<Vec<_>>().join(", ")
            ))
        })?;

    let mut seen = HashSet::new();
    let mut topics = Vec::new();
    for record in csv.records() {
        let record = record.map_err(|e| QforgeError::parse(format!("invalid CSV row: {e}")))?;
        let Some(topic) = record.get(index).and_then(clean_topic) else {
            continue;
        };
        if seen.insert(topic.clone()) {
            topics.push(topic);
        } else {
            debug!(topic = %topic, "duplicate topic skipped");
        }
    }

    Ok(topics)
}

/// Pick `count` distinct topics at random.
pub fn sample_topics<R: Rng + ?Sized>(
    topics: &[String],
    count: usize,
    rng: &mut R,
) -> Result<Vec<String>> {
    if count > topics.len() {
        return Err(QforgeError::validation(format!(
            "cannot select {count} topics from a list of {}",
            topics.len()
        )));
    }
    Ok(topics.choose_multiple(rng, count).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn fixture() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures/topics/topics.csv")
    }

    #[test]
    fn clean_topic_strips_list_debris() {
        assert_eq!(clean_topic("  \"Graphs,\" ").as_deref(), Some("Graphs"));
        assert_eq!(clean_topic("['Tries'").as_deref(), Some("Tries"));
        assert_eq!(clean_topic("C++").as_deref(), Some("C++"));
        assert_eq!(clean_topic(" ], "), None);
        assert_eq!(clean_topic(""), None);
    }

    #[test]
    fn load_topics_cleans_and_dedupes() {
        let topics = load_topics(&fixture(), "Topics").unwrap();
        assert_eq!(
            topics,
            vec!["Graphs", "Dynamic Programming", "Hash Tables", "Tries"]
        );
    }

    #[test]
    fn missing_column_is_validation_error() {
        let err = load_topics(&fixture(), "Subject").unwrap_err();
        assert!(matches!(err, QforgeError::Validation { .. }));
        assert!(err.to_string().contains("Owner"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_topics(Path::new("/nonexistent/topics.csv"), "Topics").unwrap_err();
        assert!(matches!(err, QforgeError::Io { .. }));
    }

    #[test]
    fn read_topics_from_memory() {
        let data = "Name,Topics\nx,Heaps\ny, heaps \nz,Heaps\n";
        let topics = read_topics(data.as_bytes(), "Topics").unwrap();
        assert_eq!(topics, vec!["Heaps", "heaps"]);
    }

    #[test]
    fn sample_is_distinct_subset() {
        let topics: Vec<String> = ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let picked = sample_topics(&topics, 3, &mut rng).unwrap();

        assert_eq!(picked.len(), 3);
        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 3);
        assert!(picked.iter().all(|p| topics.contains(p)));
    }

    #[test]
    fn sample_is_reproducible_with_seed() {
        let topics: Vec<String> = (0..10).map(|i| format!("t{i}")).collect();
        let a = sample_topics(&topics, 4, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = sample_topics(&topics, 4, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn oversized_sample_is_rejected() {
        let topics = vec!["a".to_string()];
        let err = sample_topics(&topics, 2, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, QforgeError::Validation { .. }));
    }
}
