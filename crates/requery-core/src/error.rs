//! Error types for requery

use thiserror::Error;

/// Result type alias using RequeryError
pub type Result<T> = std::result::Result<T, RequeryError>;

/// Error type alias for convenience
pub type Error = RequeryError;

/// Exit codes for CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NOT_FOUND: i32 = 2;
    pub const INVALID_INPUT: i32 = 3;
}

/// Main error type for requery
#[derive(Debug, Error)]
pub enum RequeryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    #[error("Unknown method '{name}' (available: {})", .available.join(", "))]
    UnknownMethod { name: String, available: Vec<&'static str> },

    #[error("Unknown dataset '{name}' (available: {})", .available.join(", "))]
    UnknownDataset { name: String, available: Vec<&'static str> },

    #[error("Unknown retriever '{name}' (available: {})", .available.join(", "))]
    UnknownRetriever { name: String, available: Vec<&'static str> },

    #[error("Retrieval failed (exit {status}): {stderr}")]
    Retrieval { status: i32, stderr: String },

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RequeryError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PromptNotFound(_) => exit_codes::NOT_FOUND,
            Self::UnknownMethod { .. }
            | Self::UnknownDataset { .. }
            | Self::UnknownRetriever { .. }
            | Self::Config(_)
            | Self::InvalidInput(_) => exit_codes::INVALID_INPUT,
            _ => exit_codes::GENERAL_ERROR,
        }
    }
}
