//! Error types for the engine module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while invoking the external engine outside of an encode.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine binary could not be found.
    #[error("Transcoding engine not found at path: {path}")]
    BinaryNotFound { path: PathBuf },

    /// The engine ran but reported failure.
    #[error("Engine query failed: {reason}")]
    QueryFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// I/O error while talking to the engine process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates a query failure with the engine's stderr, if it said anything.
    pub fn query_failed(reason: impl Into<String>, stderr: &str) -> Self {
        let stderr = stderr.trim();
        Self::QueryFailed {
            reason: reason.into(),
            stderr: (!stderr.is_empty()).then(|| stderr.to_string()),
        }
    }
}
