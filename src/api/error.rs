//! Structured API error responses with error codes
//!
//! Consistent error handling across all endpoints with machine-readable
//! error codes and human-readable messages.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::infra::ServiceError;

// ============================================================================
// Error Codes
// ============================================================================

/// Error codes for API responses
///
/// These codes are stable and can be used by clients for programmatic
/// error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    /// Request body is malformed
    InvalidRequestBody,
    /// Required field is missing or empty
    MissingRequiredField,
    /// Field value is invalid
    InvalidFieldValue,

    // Session errors (2xxx)
    /// Session not present after the polling budget
    SessionNotFound,

    // Trust boundary errors (3xxx)
    /// Notary public key could not be resolved
    KeyResolutionFailed,
    /// Attestation failed verification
    VerificationFailed,
    /// Identity was not produced by a verification step
    IdentityUnverified,

    // Allocation errors (4xxx)
    /// Reward pool is exhausted
    PoolExhausted,

    // Infrastructure errors (5xxx)
    /// Backing store fault
    StorageError,
    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn numeric_code(&self) -> u32 {
        match self {
            // Validation (1xxx)
            ErrorCode::InvalidRequestBody => 1001,
            ErrorCode::MissingRequiredField => 1002,
            ErrorCode::InvalidFieldValue => 1003,

            // Session (2xxx)
            ErrorCode::SessionNotFound => 2001,

            // Trust (3xxx)
            ErrorCode::KeyResolutionFailed => 3001,
            ErrorCode::VerificationFailed => 3002,
            ErrorCode::IdentityUnverified => 3003,

            // Allocation (4xxx)
            ErrorCode::PoolExhausted => 4001,

            // Infrastructure (5xxx)
            ErrorCode::StorageError => 5001,
            ErrorCode::InternalError => 5999,
        }
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Validation -> 400
            ErrorCode::InvalidRequestBody => StatusCode::BAD_REQUEST,
            ErrorCode::MissingRequiredField => StatusCode::BAD_REQUEST,
            ErrorCode::InvalidFieldValue => StatusCode::BAD_REQUEST,

            // Session -> 404
            ErrorCode::SessionNotFound => StatusCode::NOT_FOUND,

            // Trust -> 502/400/403
            ErrorCode::KeyResolutionFailed => StatusCode::BAD_GATEWAY,
            ErrorCode::VerificationFailed => StatusCode::BAD_REQUEST,
            ErrorCode::IdentityUnverified => StatusCode::FORBIDDEN,

            // Allocation -> 410 (a terminal business condition, not a bug)
            ErrorCode::PoolExhausted => StatusCode::GONE,

            // Infrastructure -> 500
            ErrorCode::StorageError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code_str = match self {
            ErrorCode::InvalidRequestBody => "INVALID_REQUEST_BODY",
            ErrorCode::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            ErrorCode::InvalidFieldValue => "INVALID_FIELD_VALUE",
            ErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
            ErrorCode::KeyResolutionFailed => "KEY_RESOLUTION_FAILED",
            ErrorCode::VerificationFailed => "VERIFICATION_FAILED",
            ErrorCode::IdentityUnverified => "IDENTITY_UNVERIFIED",
            ErrorCode::PoolExhausted => "POOL_EXHAUSTED",
            ErrorCode::StorageError => "STORAGE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", code_str)
    }
}

// ============================================================================
// Structured Error Response
// ============================================================================

/// Structured error response for API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error details
    pub error: ErrorDetails,
}

/// Detailed error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Numeric error code for easy categorization
    pub numeric_code: u32,

    /// Human-readable error message
    pub message: String,

    /// Related resource ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetails {
                code,
                numeric_code: code.numeric_code(),
                message: message.into(),
                resource_id: None,
                details: None,
            },
        }
    }

    /// Set related resource ID
    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.error.resource_id = Some(id.into());
        self
    }

    /// Set additional details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }

    /// Get the HTTP status code
    pub fn status(&self) -> StatusCode {
        self.error.code.http_status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code_str = self.error.code.to_string();
        let mut response = (status, Json(self)).into_response();

        // Add error code header for easier debugging
        if let Ok(code_value) = axum::http::HeaderValue::from_str(&code_str) {
            response.headers_mut().insert(
                axum::http::header::HeaderName::from_static("x-error-code"),
                code_value,
            );
        }

        response
    }
}

// ============================================================================
// Conversion from ServiceError
// ============================================================================

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => ApiError::new(ErrorCode::InvalidFieldValue, msg),
            ServiceError::SessionNotFound(id) => ApiError::new(
                ErrorCode::SessionNotFound,
                format!("Session not found: {}", id),
            )
            .with_resource_id(id.to_string()),
            ServiceError::KeyResolution(msg) => ApiError::new(
                ErrorCode::KeyResolutionFailed,
                format!("Notary key resolution failed: {}", msg),
            ),
            ServiceError::Verification(msg) => ApiError::new(
                ErrorCode::VerificationFailed,
                format!("Attestation verification failed: {}", msg),
            ),
            ServiceError::IdentityUnverified(identity) => ApiError::new(
                ErrorCode::IdentityUnverified,
                format!(
                    "Identity {} has not completed verification",
                    identity
                ),
            )
            .with_resource_id(identity.to_string()),
            ServiceError::PoolExhausted => {
                ApiError::new(ErrorCode::PoolExhausted, "No rewards left")
            }
            ServiceError::Storage(msg) => {
                ApiError::new(ErrorCode::StorageError, format!("Storage error: {}", msg))
            }
            ServiceError::Internal(msg) => ApiError::new(ErrorCode::InternalError, msg),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Create a validation error with field details
pub fn validation_error(field: &str, message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::MissingRequiredField, message.into()).with_details(
        serde_json::json!({
            "field": field
        }),
    )
}

// ============================================================================
// Tests
// ============================================================================
