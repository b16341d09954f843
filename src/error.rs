// Error taxonomy for one pipeline run
// A run either yields a fully normalized table or exactly one of these.

use thiserror::Error;

/// Failure inside a record source adapter (network, I/O, decode).
///
/// Adapters own their retry/timeout policy; by the time this surfaces the
/// fetch for that city is considered failed.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FetchError {
    message: String,
}

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        FetchError {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::new(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::new(format!("invalid raw record JSON: {err}"))
    }
}

/// One typed error per failed run, naming the stage and the city or column
/// that caused it. Malformed single attribute entries are absorbed during
/// expansion and never reach this type.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A source adapter failed for one city. Fail-fast: remaining cities
    /// are not attempted.
    #[error("fetch failed for city '{city}': {source}")]
    Fetch {
        city: String,
        #[source]
        source: FetchError,
    },

    /// A coercion rule could not convert every value in its column. The
    /// whole run aborts rather than emit a partially typed column.
    #[error("column '{column}' does not convert to {target}: offending value '{value}'")]
    Conversion {
        column: String,
        value: String,
        target: &'static str,
    },

    /// Bad run configuration, reported before any fetch happens.
    #[error("invalid run configuration: {0}")]
    Configuration(String),
}
