//! Error types for the Q&A pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid tunables; fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unparseable or empty upload; the document is not created
    #[error("Failed to ingest '{filename}': {message}")]
    Ingest { filename: String, message: String },

    /// Upload over the configured size limit; the document is not created
    #[error("Failed to ingest '{filename}': File too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { filename: String, size: usize, max: usize },

    /// Unsupported file type
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Embedding capability or index unavailable
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// Generation call failed or returned an unparseable structure
    #[error("Answer synthesis failed: {0}")]
    Synthesis(String),

    /// A multiple-choice answer did not map to exactly one listed option.
    /// Carries the raw answer so the caller can degrade instead of failing.
    #[error("Selected option is ambiguous: {raw_answer}")]
    AmbiguousSelection {
        raw_answer: String,
        reasoning_steps: Vec<String>,
    },

    /// Per-question or per-batch deadline exceeded
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Malformed question (e.g. multiple choice without options)
    #[error("Invalid question: {0}")]
    InvalidQuestion(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an ingest error
    pub fn ingest(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Ingest {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create a retrieval error
    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval(message.into())
    }

    /// Create a synthesis error
    pub fn synthesis(message: impl Into<String>) -> Self {
        Self::Synthesis(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable snake_case tag used in API payloads and batch failure records
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::Ingest { .. } | Error::FileTooLarge { .. } => "ingest_error",
            Error::UnsupportedFileType(_) => "unsupported_type",
            Error::Retrieval(_) => "retrieval_error",
            Error::Synthesis(_) => "synthesis_error",
            Error::AmbiguousSelection { .. } => "ambiguous_selection",
            Error::Timeout(_) => "timeout",
            Error::DocumentNotFound(_) => "not_found",
            Error::InvalidQuestion(_) => "invalid_question",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Http(_) => "http_error",
            Error::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::Config(_) | Error::Json(_) | Error::InvalidQuestion(_) => StatusCode::BAD_REQUEST,
            Error::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Ingest { .. } | Error::UnsupportedFileType(_) => StatusCode::BAD_REQUEST,
            Error::DocumentNotFound(_) => StatusCode::NOT_FOUND,
            Error::Retrieval(_) | Error::Synthesis(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Http(_) => StatusCode::BAD_GATEWAY,
            Error::AmbiguousSelection { .. } | Error::Io(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_status() {
        let err = Error::FileTooLarge {
            filename: "big.pdf".to_string(),
            size: 11,
            max: 10,
        };
        assert_eq!(err.kind(), "ingest_error");
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);

        // Status comes from the variant, not the message text
        let err = Error::ingest("notes.txt", "Quote says: too large to fit");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = Error::DocumentNotFound("abc".to_string());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Document not found: abc");
    }
}
