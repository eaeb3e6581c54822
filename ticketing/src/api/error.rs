//! Error type for HTTP handlers.
//!
//! Bridges [`TicketingError`] to HTTP responses through its [`ErrorKind`]:
//!
//! | Kind | Status |
//! |---|---|
//! | `NotFound` | 404 |
//! | `Forbidden` | 403 |
//! | `Conflict`, `InvalidState` | 409 |
//! | `OutOfWindow` | 410 |
//! | `Validation` | 422 |
//! | `Storage` | 503 with `Retry-After` |

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;
use turnstile_core::{ErrorKind, TicketingError};

/// Seconds a client should wait before retrying after a storage failure.
const STORAGE_RETRY_AFTER_SECS: u64 = 1;

/// HTTP error returned by handlers.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: &'static str,
    /// Whether the same request may succeed later
    retryable: bool,
    /// Seconds to wait before retrying
    retry_after: Option<u64>,
}

impl ApiError {
    /// Create a new API error.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            message: message.into(),
            code,
            retryable: false,
            retry_after: None,
        }
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, "UNAUTHORIZED")
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, "BAD_REQUEST")
    }

    /// HTTP status of this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Error code of this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Conflict | ErrorKind::InvalidState => StatusCode::CONFLICT,
        ErrorKind::OutOfWindow => StatusCode::GONE,
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Storage => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<TicketingError> for ApiError {
    fn from(error: TicketingError) -> Self {
        let kind = error.kind();
        let status = status_for(kind);
        let retryable = error.is_retryable();

        if kind == ErrorKind::Storage {
            tracing::error!(error = %error, "Storage failure while handling request");
        }

        Self {
            status,
            message: error.to_string(),
            code: kind.as_str(),
            retryable,
            retry_after: (kind == ErrorKind::Storage).then_some(STORAGE_RETRY_AFTER_SECS),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: &'static str,
    /// Human-readable error message.
    message: String,
    /// Whether the request may be retried.
    retryable: bool,
    /// Seconds to wait before retrying.
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.code,
            message: self.message,
            retryable: self.retryable,
            retry_after: self.retry_after,
        };

        let mut response = (self.status, Json(body)).into_response();
        if let Some(seconds) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile_core::StoreError;
    use turnstile_core::types::{EventId, TicketId};

    #[test]
    fn test_kind_to_status_mapping() {
        let cases = [
            (TicketingError::EventNotFound(EventId::new()), StatusCode::NOT_FOUND),
            (TicketingError::NotTicketOwner(TicketId::new()), StatusCode::FORBIDDEN),
            (TicketingError::TransferPending(TicketId::new()), StatusCode::CONFLICT),
            (TicketingError::SelfClaim, StatusCode::CONFLICT),
            (TicketingError::TransferExpired, StatusCode::GONE),
            (TicketingError::MissingRecipient, StatusCode::UNPROCESSABLE_ENTITY),
            (
                TicketingError::Storage(StoreError::Unavailable("pool timed out".to_string())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status(), status);
        }
    }

    #[test]
    fn test_storage_errors_carry_retry_after() {
        let error = ApiError::from(TicketingError::Storage(StoreError::Unavailable(
            "deadlock".to_string(),
        )));
        assert_eq!(error.code(), "STORAGE_UNAVAILABLE");
        let response = error.into_response();
        assert_eq!(
            response.headers().get(header::RETRY_AFTER),
            Some(&HeaderValue::from(1_u64))
        );
    }
}
