//! Error types for qforge.
//!
//! Library crates use [`QforgeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all qforge operations.
#[derive(Debug, thiserror::Error)]
pub enum QforgeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure talking to the search or LLM service.
    #[error("network error: {0}")]
    Network(String),

    /// The remote service answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// Response body could not be decoded into the expected shape.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// LLM completion error (API, quota, or empty response).
    #[error("enrichment error: {0}")]
    Enrichment(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input precondition failure. Fatal: a run must not start.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Writing the result table failed.
    #[error("export error: {0}")]
    Export(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, QforgeError>;

impl QforgeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a retry of the same request could plausibly succeed.
    ///
    /// Server-side (5xx) and throttling (429) statuses and transport
    /// failures are transient; everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = QforgeError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = QforgeError::validation("questions per topic must be at least 1");
        assert!(err.to_string().contains("at least 1"));

        let err = QforgeError::Http {
            status: 503,
            url: "https://api.example.com/search".into(),
        };
        assert_eq!(err.to_string(), "HTTP 503 from https://api.example.com/search");
    }

    #[test]
    fn transient_classification() {
        assert!(QforgeError::Network("connection reset".into()).is_transient());
        assert!(
            QforgeError::Http {
                status: 502,
                url: String::new()
            }
            .is_transient()
        );
        assert!(
            QforgeError::Http {
                status: 429,
                url: String::new()
            }
            .is_transient()
        );
        assert!(
            !QforgeError::Http {
                status: 400,
                url: String::new()
            }
            .is_transient()
        );
        assert!(!QforgeError::parse("bad json").is_transient());
    }
}
