//! Domain-specific error types for affect-attack

use thiserror::Error;

/// Main error type for the attack pipeline
#[derive(Error, Debug)]
pub enum AttackError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Lexicon error: {message}")]
    Lexicon { message: String },

    #[error("Dataset error: {message}")]
    Dataset { message: String },

    /// Target word is not part of the word-embedding vocabulary.
    #[error("Word not in embedding vocabulary: {word}")]
    VocabularyMiss { word: String },

    /// Text carries no non-polarity affect tags, so no frequency ratio exists.
    #[error("Text has no emotion-tagged words")]
    EmptyAffectInput,

    #[error("Grammar service error: {message}")]
    Grammar { message: String },

    #[error("Embedding provider error: {message}")]
    Embedding { message: String },

    #[error("Sentence similarity error: {message}")]
    Similarity { message: String },

    #[error("Timeout error: {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AttackError {
    /// True for failures of an external backend (grammar, embeddings,
    /// sentence similarity) including timeouts. These abort the current
    /// sentence and are the only errors the batch runner retries.
    pub fn is_service_failure(&self) -> bool {
        matches!(
            self,
            AttackError::Grammar { .. }
                | AttackError::Embedding { .. }
                | AttackError::Similarity { .. }
                | AttackError::Timeout { .. }
        )
    }
}

impl From<anyhow::Error> for AttackError {
    fn from(err: anyhow::Error) -> Self {
        AttackError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AttackError {
    fn from(err: serde_json::Error) -> Self {
        AttackError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<csv::Error> for AttackError {
    fn from(err: csv::Error) -> Self {
        AttackError::Serialization {
            message: format!("CSV error: {}", err),
        }
    }
}

impl From<std::io::Error> for AttackError {
    fn from(err: std::io::Error) -> Self {
        AttackError::Io {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for AttackError {
    fn from(err: toml::de::Error) -> Self {
        AttackError::Config {
            message: format!("Invalid TOML: {}", err),
        }
    }
}

/// Result type alias for affect-attack operations
pub type Result<T> = std::result::Result<T, AttackError>;
