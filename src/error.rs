// src/error.rs
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::ValidationError;

/// Management API error envelope: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Failure of a single zone or record-set operation.
///
/// Every variant displays the underlying message verbatim.
#[derive(Debug, Error)]
pub enum DnsError {
    #[error("{0}")]
    AuthenticationFailed(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    NotFound(String),

    /// The presented concurrency token no longer matches.
    #[error("{0}")]
    PreconditionFailed(String),

    /// Network failure, timeout or throttling; safe to retry.
    #[error("{0}")]
    Transient(String),

    #[error("{0}")]
    Invalid(String),

    #[error("{message}")]
    Unknown {
        status: Option<u16>,
        message: String,
    },
}

impl DnsError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        DnsError::NotFound(msg.into())
    }

    pub fn precondition_failed(msg: impl Into<String>) -> Self {
        DnsError::PreconditionFailed(msg.into())
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        DnsError::Unknown {
            status: None,
            message: msg.into(),
        }
    }

    /// Classify an unsuccessful HTTP status from the management API.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => DnsError::AuthenticationFailed(message),
            404 => DnsError::NotFound(message),
            409 => DnsError::AlreadyExists(message),
            412 => DnsError::PreconditionFailed(message),
            400 => DnsError::Invalid(message),
            408 | 429 | 500..=599 => DnsError::Transient(message),
            _ => DnsError::Unknown {
                status: Some(status),
                message,
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DnsError::Transient(_))
    }

    /// Error code placed in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            DnsError::AuthenticationFailed(_) => "AuthenticationFailed",
            DnsError::AlreadyExists(_) | DnsError::PreconditionFailed(_) => "PreconditionFailed",
            DnsError::NotFound(_) => "NotFound",
            DnsError::Transient(_) => "ServiceUnavailable",
            DnsError::Invalid(_) => "BadRequest",
            DnsError::Unknown { .. } => "InternalServerError",
        }
    }

    /// HTTP status the service answers with. An existing resource guarded by
    /// `If-None-Match: *` is a failed precondition on the wire.
    pub fn status(&self) -> StatusCode {
        match self {
            DnsError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            DnsError::AlreadyExists(_) | DnsError::PreconditionFailed(_) => {
                StatusCode::PRECONDITION_FAILED
            }
            DnsError::NotFound(_) => StatusCode::NOT_FOUND,
            DnsError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            DnsError::Invalid(_) => StatusCode::BAD_REQUEST,
            DnsError::Unknown { status, .. } => status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl From<ValidationError> for DnsError {
    fn from(err: ValidationError) -> Self {
        DnsError::Invalid(err.to_string())
    }
}

impl From<reqwest::Error> for DnsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            return DnsError::Transient(err.to_string());
        }
        let status = err.status().map(|s| s.as_u16());
        if err.is_decode() {
            return DnsError::Unknown {
                status,
                message: format!("malformed response: {err}"),
            };
        }
        DnsError::Unknown {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for DnsError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponseBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        });
        (status, body).into_response()
    }
}
