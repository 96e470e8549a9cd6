//! Error types for loading and saving traces.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    /// The document is not a valid trace: bad JSON, a missing required field,
    /// or an unrecognized `step_type` / `status` variant.
    #[error("malformed trace: {0}")]
    Json(#[from] serde_json::Error),
    /// Input that is neither a trace document nor a format an adapter knows.
    #[error("unrecognized trace format: {0}")]
    UnrecognizedFormat(String),
    #[error("cannot access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, TraceError>;
