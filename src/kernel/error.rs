use thiserror::Error;

/// Failures at the engine's configuration and parsing edges.
/// Collection and harvesting themselves never fail.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid rubric: {0}")]
    InvalidRubric(String),

    #[error("unrecognized color: {0:?}")]
    InvalidColor(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
