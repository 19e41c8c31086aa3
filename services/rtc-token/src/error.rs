//! Error types for token issuance.
//!
//! Every failure is mapped to one of the three callable error codes. The
//! message sent to the caller is fixed per variant; causes stay in the logs.

use crate::agora::SigningError;
use crate::auth::AuthError;
use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Caller message for a missing identity.
pub const MSG_UNAUTHENTICATED: &str = "The function must be called while authenticated.";
/// Caller message for a missing or empty channel name.
pub const MSG_MISSING_CHANNEL: &str = "Missing channel name in request data.";
/// Caller message for a uid outside the 32-bit unsigned range.
pub const MSG_INVALID_UID: &str = "uid must be an integer between 0 and 4294967295.";
/// Caller message when the RTC credentials are not configured.
pub const MSG_MISCONFIGURED: &str = "Server configuration error: Agora credentials not set.";
/// Caller message for signing and other internal failures.
pub const MSG_INTERNAL: &str = "Failed to generate token due to an internal server error.";
/// Caller message for an unparseable request body.
pub const MSG_BAD_REQUEST: &str = "Bad Request";

/// Token issuance errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TokenError {
    /// No verified caller identity
    #[error("Unauthenticated: {reason}")]
    Unauthenticated {
        /// Why the caller was not authenticated
        reason: String,
    },

    /// Request payload rejected
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Message returned to the caller
        message: &'static str,
    },

    /// RTC credentials are empty
    #[error("Credentials not configured: {missing:?}")]
    Misconfigured {
        /// Names of the empty credentials
        missing: Vec<&'static str>,
    },

    /// Signing primitive failed
    #[error("Token signing failed: {0}")]
    Signing(#[from] SigningError),

    /// Any other internal failure
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TokenError {
    /// No identity was presented.
    #[must_use]
    pub fn missing_identity() -> Self {
        Self::Unauthenticated {
            reason: "no caller identity".to_string(),
        }
    }

    /// Error code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthenticated { .. } => ErrorCode::Unauthenticated,
            Self::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            Self::Misconfigured { .. } | Self::Signing(_) | Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Message safe to return to the caller.
    #[must_use]
    pub fn caller_message(&self) -> &'static str {
        match self {
            Self::Unauthenticated { .. } => MSG_UNAUTHENTICATED,
            Self::InvalidArgument { message } => *message,
            Self::Misconfigured { .. } => MSG_MISCONFIGURED,
            Self::Signing(_) | Self::Internal(_) => MSG_INTERNAL,
        }
    }
}

impl From<AuthError> for TokenError {
    fn from(err: AuthError) -> Self {
        Self::Unauthenticated {
            reason: err.to_string(),
        }
    }
}

/// Callable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// No verified caller identity (HTTP 401)
    Unauthenticated,
    /// Malformed request payload (HTTP 400)
    InvalidArgument,
    /// Server-side failure (HTTP 500)
    Internal,
}

impl ErrorCode {
    /// Status string of the callable protocol.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Internal => "INTERNAL",
        }
    }

    /// HTTP status for this code.
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::InvalidArgument => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Structured error response with correlation ID
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code
    pub status: ErrorCode,
    /// Fixed caller message
    pub message: &'static str,
    /// Correlation ID for tracing
    #[serde(skip)]
    pub correlation_id: Uuid,
}

impl ErrorResponse {
    /// Create a response from a `TokenError`.
    #[must_use]
    pub fn from_error(error: &TokenError, correlation_id: Uuid) -> Self {
        Self {
            status: error.code(),
            message: error.caller_message(),
            correlation_id,
        }
    }

    /// Response for a body that is not a callable request.
    #[must_use]
    pub const fn bad_request(correlation_id: Uuid) -> Self {
        Self {
            status: ErrorCode::InvalidArgument,
            message: MSG_BAD_REQUEST,
            correlation_id,
        }
    }
}
