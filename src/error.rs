use thiserror::Error;

/// Convenience result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Error type used inside the ingestion pipeline.
///
/// None of these escape the public `process_*` entry points: a batch that hits one of them is
/// aborted, logged and reported as a diagnostic instead.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Malformed JSON text, or a typed record that could not be decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The input does not have the structure the ingestor expects.
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// The staging buffer refused an append.
    #[error("staging failed for {category}: {message}")]
    Staging {
        category: &'static str,
        message: String,
    },

    /// A profile store could not be built from a snapshot.
    #[error("profile error: {message}")]
    Profile { message: String },

    /// Invalid configuration document.
    #[error("config error: {message}")]
    Config { message: String },
}

impl IngestionError {
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }

    pub(crate) fn staging(category: &'static str, message: impl Into<String>) -> Self {
        Self::Staging {
            category,
            message: message.into(),
        }
    }
}
