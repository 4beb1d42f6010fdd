//! Error types for catalog loading.

use std::path::PathBuf;

use battlequiz_protocol::QuestionId;

/// Errors raised while loading or validating the question catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("cannot read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a JSON array of questions.
    #[error("catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A question breaks a catalog rule.
    #[error("question {id} is invalid: {reason}")]
    InvalidQuestion { id: QuestionId, reason: String },

    /// Two entries share an id.
    #[error("duplicate question id {0}")]
    DuplicateId(QuestionId),

    /// Nothing to play with.
    #[error("catalog contains no questions")]
    Empty,
}
