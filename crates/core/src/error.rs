//! Request-level error taxonomy.

use std::error::Error as StdError;
use thiserror::Error;

use crate::engine::EngineError;
use crate::task::TranscodeError;

/// Everything a conversion or download request can fail with.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The client sent something unusable.
    #[error("{0}")]
    Validation(String),

    /// The engine could not list its presets.
    #[error("Error generating presets")]
    EngineQuery(#[source] EngineError),

    /// Creating, copying or removing job files failed.
    #[error("{context}")]
    Storage {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// At least one preset failed to encode.
    #[error("Error encoding videos")]
    Transcode(#[source] TranscodeError),

    #[error("Not Found")]
    NotFound(String),
}

/// Coarse classification used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    EngineQuery,
    Storage,
    Transcode,
    NotFound,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::EngineQuery => "engine_query",
            Self::Storage => "storage",
            Self::Transcode => "transcode",
            Self::NotFound => "not_found",
        }
    }
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn storage(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::EngineQuery(_) => ErrorKind::EngineQuery,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::Transcode(_) => ErrorKind::Transcode,
            Self::NotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Diagnostic text for non-production responses: the source chain, or
    /// the missing resource for `NotFound`.
    pub fn detail(&self) -> Option<String> {
        if let Self::NotFound(what) = self {
            return Some(what.clone());
        }

        let mut parts = Vec::new();
        let mut source = self.source();
        while let Some(err) = source {
            parts.push(err.to_string());
            source = err.source();
        }
        (!parts.is_empty()).then(|| parts.join(": "))
    }
}
