//! Domain errors shared by the repository, aggregation and promotion code.

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    /// Caller-fixable input problem (out-of-range marks, malformed keys).
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    #[error("{0} not found")]
    NotFound(String),

    /// The write would break a referential rule, e.g. deleting a subject that has scores.
    #[error("{message}")]
    Conflict {
        message: String,
        details: Option<Value>,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type ResultsResult<T> = Result<T, ResultsError>;

impl ResultsError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(message: impl Into<String>, details: Option<Value>) -> Self {
        Self::Conflict {
            message: message.into(),
            details,
        }
    }

    /// Wire code used in the IPC error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::Storage(_) => "db_error",
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            Self::Validation { details, .. } | Self::Conflict { details, .. } => details.clone(),
            Self::NotFound(_) | Self::Storage(_) => None,
        }
    }
}
