//! Error types for MedRAG
//!
//! Provides:
//! - Distinct error types for best-effort and fatal failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    PayloadTooLarge,

    // External model errors (8xxx)
    EmbeddingError,
    EntityExtractionError,
    RetrievalFailure,
    GenerationFailure,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::PayloadTooLarge => 1004,

            ErrorCode::EmbeddingError => 8002,
            ErrorCode::EntityExtractionError => 8003,
            ErrorCode::RetrievalFailure => 8004,
            ErrorCode::GenerationFailure => 8005,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    // External model errors
    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Entity extraction error: {message}")]
    EntityExtraction { message: String },

    #[error("Retrieval failed: {message}")]
    Retrieval { message: String },

    #[error("Generation failed: {message}")]
    Generation { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::EntityExtraction { .. } => ErrorCode::EntityExtractionError,
            AppError::Retrieval { .. } => ErrorCode::RetrievalFailure,
            AppError::Generation { .. } => ErrorCode::GenerationFailure,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 413 Payload Too Large
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 500 Internal Server Error
            AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::EmbeddingError { .. }
            | AppError::EntityExtraction { .. }
            | AppError::Retrieval { .. }
            | AppError::Generation { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Wrap any error raised while embedding the query or searching the index
    pub fn retrieval(err: impl std::fmt::Display) -> Self {
        AppError::Retrieval {
            message: err.to_string(),
        }
    }

    /// Wrap any error raised while generating the answer
    pub fn generation(err: impl std::fmt::Display) -> Self {
        AppError::Generation {
            message: err.to_string(),
        }
    }

    /// Whether this error aborts a request outright (no degraded answer is possible)
    pub fn is_fatal_to_request(&self) -> bool {
        matches!(self, AppError::Retrieval { .. } | AppError::Generation { .. })
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        let field = match err {
            AppError::Validation { field, .. } => field.clone(),
            _ => None,
        };

        ErrorResponse {
            error: ErrorDetails {
                code: err.code(),
                message: err.to_string(),
                field,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::from(&self);

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %body.error.message,
                code = ?body.error.code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %body.error.message,
                code = ?body.error.code,
                status = status.as_u16(),
                "Client error"
            );
        }

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_error_codes() {
        let err = AppError::retrieval("index unreachable");
        assert_eq!(err.code(), ErrorCode::RetrievalFailure);
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(err.is_fatal_to_request());

        let err = AppError::generation("empty candidate");
        assert_eq!(err.code(), ErrorCode::GenerationFailure);
        assert!(err.is_fatal_to_request());
        assert_eq!(err.to_string(), "Generation failed: empty candidate");
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "Query must not be empty".into(),
            field: Some("text".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
        assert!(!err.is_fatal_to_request());
    }

    #[test]
    fn test_error_response_shape() {
        let err = AppError::retrieval("timed out");
        let body = serde_json::to_value(ErrorResponse::from(&err)).unwrap();

        assert_eq!(body["error"]["code"], "RETRIEVAL_FAILURE");
        assert_eq!(body["error"]["message"], "Retrieval failed: timed out");
        assert!(body["error"].get("field").is_none());
    }

    #[test]
    fn test_numeric_codes_are_grouped() {
        assert_eq!(ErrorCode::RetrievalFailure.as_code() / 1000, 8);
        assert_eq!(ErrorCode::GenerationFailure.as_code() / 1000, 8);
        assert_eq!(ErrorCode::ValidationError.as_code() / 1000, 1);
    }
}
