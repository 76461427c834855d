//! Error types shared across the monitor.

use thiserror::Error;

/// Startup configuration failures. These are the only fatal errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ConfigError::Invalid(msg.into())
    }
}

/// Failures reported by a market data provider for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),

    #[error("rate limited by data source: {0}")]
    RateLimited(String),

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),
}

/// Why an interval did not produce a full evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationIssue {
    /// The fetch failed, timed out or the evaluation task died.
    #[error("no data: {0}")]
    DataUnavailable(String),

    #[error("insufficient history: need {required} bars, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    /// The anomaly guard declined to classify (flat market, undefined change).
    #[error("computation skipped: {0}")]
    ComputationSkipped(String),
}

impl From<FetchError> for EvaluationIssue {
    fn from(e: FetchError) -> Self {
        EvaluationIssue::DataUnavailable(e.to_string())
    }
}
