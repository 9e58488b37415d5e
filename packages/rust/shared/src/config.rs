//! Application configuration for qforge.
//!
//! User config lives at `~/.qforge/qforge.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{QforgeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "qforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".qforge";

/// Upper bound on topic variations requested from the LLM.
pub const MAX_TOPIC_VARIATIONS: usize = 20;

// ---------------------------------------------------------------------------
// Config structs (matching qforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Run defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Q&A search service settings.
    #[serde(default)]
    pub search: SearchSection,

    /// LLM completion service settings.
    #[serde(default)]
    pub llm: LlmSection,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Questions requested per topic.
    #[serde(default = "default_questions_per_topic")]
    pub questions_per_topic: usize,

    /// How many topics to sample per run. All topics when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_count: Option<usize>,

    /// Header of the CSV column holding topics.
    #[serde(default = "default_topic_column")]
    pub topic_column: String,

    /// Only consider search results from the last N years.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years: Option<u32>,

    /// Directory the export file is written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Maximum topic variations tried per topic.
    #[serde(default = "default_max_variations")]
    pub max_variations: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            questions_per_topic: default_questions_per_topic(),
            topic_count: None,
            topic_column: default_topic_column(),
            years: None,
            output_dir: default_output_dir(),
            max_variations: default_max_variations(),
        }
    }
}

fn default_questions_per_topic() -> usize {
    5
}
fn default_topic_column() -> String {
    "Topics".into()
}
fn default_output_dir() -> String {
    ".".into()
}
fn default_max_variations() -> usize {
    MAX_TOPIC_VARIATIONS
}

/// Result ordering requested from the search service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSort {
    #[default]
    Relevance,
    Votes,
}

impl SearchSort {
    /// Value of the `sort` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::Votes => "votes",
        }
    }
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSection {
    /// API root, e.g. `https://api.stackexchange.com/2.3`.
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Stack Exchange site slug.
    #[serde(default = "default_site")]
    pub site: String,

    /// Ranking applied by the service.
    #[serde(default)]
    pub sort: SearchSort,

    /// Per-request timeout.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first attempt on transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay; doubles on every further attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Drop questions scoring below this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<i64>,

    /// Keep only questions with at least one answer.
    #[serde(default)]
    pub answered_only: bool,

    /// Name of the env var holding an optional API key (raises quota).
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            site: default_site(),
            sort: SearchSort::default(),
            timeout_secs: default_search_timeout(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            min_score: None,
            answered_only: false,
            api_key_env: default_search_key_env(),
        }
    }
}

fn default_search_base_url() -> String {
    "https://api.stackexchange.com/2.3".into()
}
fn default_site() -> String {
    "stackoverflow".into()
}
fn default_search_timeout() -> u64 {
    15
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_search_key_env() -> String {
    "STACKEXCHANGE_KEY".into()
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    /// OpenAI-compatible API root, e.g. `https://api.openai.com/v1`.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Model used for every completion.
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request timeout.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4-turbo".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_llm_timeout() -> u64 {
    120
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config file + CLI flags + environment)
// ---------------------------------------------------------------------------

/// Runtime configuration for the search client.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub base_url: Url,
    pub site: String,
    pub sort: SearchSort,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub min_score: Option<i64>,
    pub answered_only: bool,
    /// Resolved API key, if the env var is set.
    pub api_key: Option<String>,
}

impl TryFrom<&AppConfig> for SearchConfig {
    type Error = QforgeError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let section = &config.search;
        Ok(Self {
            base_url: parse_base_url(&section.base_url)?,
            site: section.site.clone(),
            sort: section.sort,
            timeout: Duration::from_secs(section.timeout_secs),
            max_retries: section.max_retries,
            backoff_base: Duration::from_millis(section.backoff_base_ms),
            min_score: section.min_score,
            answered_only: section.answered_only,
            api_key: std::env::var(&section.api_key_env)
                .ok()
                .filter(|k| !k.is_empty()),
        })
    }
}

/// Runtime configuration for the LLM client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: Url,
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl TryFrom<&AppConfig> for LlmConfig {
    type Error = QforgeError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        validate_api_key(config)?;
        let section = &config.llm;
        let api_key = std::env::var(&section.api_key_env).unwrap_or_default();
        Ok(Self {
            base_url: parse_base_url(&section.base_url)?,
            model: section.model.clone(),
            api_key,
            temperature: section.temperature,
            max_tokens: section.max_tokens,
            timeout: Duration::from_secs(section.timeout_secs),
        })
    }
}

/// Parse an API root, forcing a trailing slash so `Url::join` appends.
fn parse_base_url(raw: &str) -> Result<Url> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|e| QforgeError::config(format!("invalid base_url '{raw}': {e}")))
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.qforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| QforgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.qforge/qforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| QforgeError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| QforgeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| QforgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| QforgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| QforgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the LLM API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(QforgeError::config(format!(
            "LLM API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("questions_per_topic"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("stackoverflow"));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let toml_str = r#"
[defaults]
questions_per_topic = 3
years = 2

[search]
sort = "votes"
min_score = 1
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.questions_per_topic, 3);
        assert_eq!(config.defaults.years, Some(2));
        assert_eq!(config.defaults.topic_column, "Topics");
        assert_eq!(config.defaults.max_variations, MAX_TOPIC_VARIATIONS);
        assert_eq!(config.search.sort, SearchSort::Votes);
        assert_eq!(config.search.min_score, Some(1));
        assert_eq!(config.search.max_retries, 3);
        assert_eq!(config.llm.model, "gpt-4-turbo");
    }

    #[test]
    fn search_config_from_app_config() {
        let app = AppConfig::default();
        let search = SearchConfig::try_from(&app).expect("search config");
        assert_eq!(search.base_url.as_str(), "https://api.stackexchange.com/2.3/");
        assert_eq!(search.timeout, Duration::from_secs(15));
        assert_eq!(search.backoff_base, Duration::from_millis(500));
        assert_eq!(search.sort.as_str(), "relevance");
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let mut app = AppConfig::default();
        app.search.base_url = "not a url".into();
        let err = SearchConfig::try_from(&app).unwrap_err();
        assert!(matches!(err, QforgeError::Config { .. }));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.llm.api_key_env = "QF_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));

        assert!(LlmConfig::try_from(&config).is_err());
    }
}
