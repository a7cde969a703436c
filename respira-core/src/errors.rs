// respira-core/src/errors.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors that end the current turn (or startup).
#[derive(Error, Debug)]
pub enum AgentError {
    /// Error related to configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// The language model could not be reached or answered with something unusable.
    #[error("Model unavailable: {0}")]
    Upstream(#[source] anyhow::Error),

    /// The hospitalization dataset could not be loaded.
    #[error("Dataset unavailable: {0}")]
    Dataset(#[from] DatasetError),

    /// A conversation invariant was violated while recording the turn.
    #[error("Conversation Error: {0}")]
    Conversation(String),
}

impl AgentError {
    pub fn config(msg: impl Into<String>) -> Self {
        AgentError::Config(msg.into())
    }
}

/// Failures raised by individual tools.
///
/// These never leave the dispatch loop: they are turned into structured
/// `{"error": ..., "kind": ...}` results for the model to narrate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    NoData(String),
}

impl ToolError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ToolError::InvalidArgument(msg.into())
    }

    pub fn no_data(msg: impl Into<String>) -> Self {
        ToolError::NoData(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidArgument(_) => "invalid_argument",
            ToolError::NoData(_) => "no_data",
        }
    }

    /// Structured payload handed back to the model.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        })
    }
}

/// Errors raised while loading CSV datasets.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path:?} is not valid UTF-8; configure encoding = \"latin1\" if the file uses Latin-1")]
    Encoding { path: PathBuf },

    #[error("malformed CSV in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path:?} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_payload_carries_kind() {
        let payload = ToolError::invalid("Parameter 'n' must be >= 1.").to_json();
        assert_eq!(payload["error"], "Parameter 'n' must be >= 1.");
        assert_eq!(payload["kind"], "invalid_argument");

        let payload = ToolError::no_data("No age data available.").to_json();
        assert_eq!(payload["kind"], "no_data");
    }
}
