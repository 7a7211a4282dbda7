//! # DomainError
//!
//! Centralized error taxonomy for the campus board.
//! Every service operation returns `Result<T, DomainError>`; the HTTP layer
//! translates the variant into a status code.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-range input, one message per offending field.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Uniqueness or referential conflict (duplicate name, department in use).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Referenced entity is absent.
    #[error("{0} not found")]
    NotFound(String),

    /// An access-control gate refused the action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Missing, expired, revoked or otherwise invalid credentials.
    #[error("unauthenticated: {0}")]
    Auth(String),

    /// Infrastructure failure (storage unavailable, codec failure).
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(vec![message.into()])
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        DomainError::NotFound(what.into())
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        DomainError::Forbidden(reason.into())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        DomainError::Conflict(reason.into())
    }

    pub fn auth(reason: impl Into<String>) -> Self {
        DomainError::Auth(reason.into())
    }

    /// Wraps an adapter failure. The detail stays server-side.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        DomainError::Internal(detail.to_string())
    }
}

/// Conflict reasons every user store reports, so callers can tell a taken
/// email from a taken username.
pub const EMAIL_TAKEN: &str = "email already in use";
pub const USERNAME_TAKEN: &str = "username already in use";

/// A specialized Result type for campus board logic.
pub type Result<T> = std::result::Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display_joins_field_messages() {
        let err = DomainError::Validation(vec!["email is malformed".into(), "username is empty".into()]);
        assert_eq!(
            err.to_string(),
            "validation failed: email is malformed; username is empty"
        );
    }

    #[test]
    fn not_found_names_the_entity() {
        assert_eq!(DomainError::not_found("post").to_string(), "post not found");
    }
}
