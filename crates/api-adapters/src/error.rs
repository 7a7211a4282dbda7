//! HTTP error responses.
//!
//! Every failure leaves the API as an [`Envelope`] with `success: false`.
//! Internal errors are logged here and reach the client as a generic
//! message; the detail rides along in a response extension that only the
//! [`crate::middleware::reveal_internal_errors`] layer ever writes out.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domains::DomainError;

use crate::envelope::Envelope;

/// Detail of an internal error, attached to the response for optional
/// disclosure.
#[derive(Debug, Clone)]
pub struct InternalDetail(pub String);

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: Envelope<()>,
    detail: Option<String>,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: Envelope::failure(message, None),
            detail: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(detail) = self.detail {
            response.extensions_mut().insert(InternalDetail(detail));
        }
        response
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(errors) => ApiError {
                status: StatusCode::BAD_REQUEST,
                body: Envelope::failure("validation failed", Some(errors)),
                detail: None,
            },
            DomainError::Auth(reason) => api_unauthorized(&reason),
            DomainError::Forbidden(reason) => api_forbidden(&reason),
            err @ DomainError::NotFound(_) => api_not_found(&err.to_string()),
            DomainError::Conflict(reason) => api_conflict(&reason),
            DomainError::Internal(detail) => api_internal(detail),
        }
    }
}

pub fn api_bad_request(message: &str) -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, message)
}

pub fn api_unauthorized(message: &str) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, message)
}

pub fn api_forbidden(message: &str) -> ApiError {
    ApiError::new(StatusCode::FORBIDDEN, message)
}

pub fn api_not_found(message: &str) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, message)
}

pub fn api_conflict(message: &str) -> ApiError {
    ApiError::new(StatusCode::CONFLICT, message)
}

/// Logs `detail` server-side and returns a generic 500.
pub fn api_internal(detail: impl Into<String>) -> ApiError {
    let detail = detail.into();
    tracing::error!(error = %detail, "request failed");
    ApiError {
        detail: Some(detail),
        ..ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}
