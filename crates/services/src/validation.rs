//! Input checks shared by the services.
//!
//! Checks push human-readable messages into a [`FieldErrors`] collector so a
//! request with several bad fields reports all of them at once.

use domains::DomainError;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_USERNAME_LEN: usize = 50;
pub const DEPARTMENT_NAME_MIN: usize = 2;
pub const DEPARTMENT_NAME_MAX: usize = 50;
pub const DEPARTMENT_DESCRIPTION_MAX: usize = 500;
pub const POST_TITLE_MAX: usize = 200;
pub const NOTICE_TITLE_MAX: usize = 200;
pub const CONTENT_MAX: usize = 10_000;

#[derive(Debug, Default)]
pub struct FieldErrors(Vec<String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn check(&mut self, ok: bool, message: impl Into<String>) {
        if !ok {
            self.push(message);
        }
    }

    /// `Ok(())` when nothing was collected, `Validation` otherwise.
    pub fn finish(self) -> Result<(), DomainError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(self.0))
        }
    }
}

/// Structural email check: one `@`, a non-empty local part and a dotted
/// domain, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Trims and lowercases an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trims free text; whitespace-only input becomes `None`.
pub fn normalize_optional(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// Checks required text content, returning it trimmed.
pub fn required_text(errors: &mut FieldErrors, field: &str, value: &str, max: usize) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.push(format!("{field} must not be empty"));
    } else if value.chars().count() > max {
        errors.push(format!("{field} must be at most {max} characters"));
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_addresses() {
        assert!(is_valid_email("alice@cs.example.edu"));
        assert!(is_valid_email("a.b+tag@example.org"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "alice", "alice@", "@example.com", "a@b", "a b@example.com", "a@@b.com", "a@.com"] {
            assert!(!is_valid_email(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn collects_every_failure() {
        let mut errors = FieldErrors::new();
        errors.check(false, "first");
        errors.check(true, "skipped");
        errors.check(false, "second");
        assert_eq!(
            errors.finish(),
            Err(DomainError::Validation(vec!["first".into(), "second".into()]))
        );
    }

    #[test]
    fn required_text_trims_and_bounds() {
        let mut errors = FieldErrors::new();
        assert_eq!(required_text(&mut errors, "content", "  hi  ", 10), "hi");
        required_text(&mut errors, "title", "   ", 10);
        required_text(&mut errors, "body", "abcdefghijk", 10);
        assert_eq!(
            errors.finish(),
            Err(DomainError::Validation(vec![
                "title must not be empty".into(),
                "body must be at most 10 characters".into()
            ]))
        );
    }

    #[test]
    fn blank_optional_text_is_dropped() {
        assert_eq!(normalize_optional(Some("   ".into())), None);
        assert_eq!(normalize_optional(Some(" x ".into())), Some("x".into()));
    }
}
