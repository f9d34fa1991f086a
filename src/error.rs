//! Error types for Coco.

use crate::lm::Message;
use thiserror::Error;

/// Library-level error type for Coco operations.
#[derive(Error, Debug)]
pub enum CocoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("All list arguments must produce the same number of batches (expected {expected}, found {found})")]
    BatchMismatch { expected: usize, found: usize },

    #[error("Batch {index} failed: {source}")]
    Batch {
        index: usize,
        #[source]
        source: Box<CocoError>,
    },

    #[error("Chunking failed: {0}")]
    Chunking(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Language model error: {0}")]
    LanguageModel(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    #[error("Tool '{tool}' is missing required argument '{argument}'")]
    MissingArgument { tool: String, argument: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Agent run failed after {} message(s): {source}", .history.len())]
    AgentRun {
        #[source]
        source: Box<CocoError>,
        /// Conversation accumulated before the failure.
        history: Vec<Message>,
    },

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CocoError {
    /// Wrap an error with the index of the batch that produced it.
    pub fn in_batch(self, index: usize) -> Self {
        CocoError::Batch {
            index,
            source: Box::new(self),
        }
    }

    /// Attach the partial conversation of an agent run.
    pub fn with_history(self, history: Vec<Message>) -> Self {
        CocoError::AgentRun {
            source: Box::new(self),
            history,
        }
    }
}

/// Result type alias for Coco operations.
pub type Result<T> = std::result::Result<T, CocoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_error_names_index() {
        let err = CocoError::Embedding("timeout".to_string()).in_batch(3);
        assert_eq!(err.to_string(), "Batch 3 failed: Embedding generation failed: timeout");
    }

    #[test]
    fn test_agent_error_keeps_history() {
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        let err = CocoError::ToolNotFound("nope".to_string()).with_history(history);
        assert_eq!(err.to_string(), "Agent run failed after 2 message(s): Tool 'nope' not found");
        match err {
            CocoError::AgentRun { history, .. } => assert_eq!(history.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
