//! # Domain Models
//!
//! These structs represent the core entities of the campus board.
//! Identities are database-assigned positive integers.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

pub type UserId = i64;
pub type DepartmentId = i64;
pub type PostId = i64;
pub type CommentId = i64;
pub type NoticeId = i64;

/// Permission tier of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Teacher => "TEACHER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STUDENT" => Ok(Role::Student),
            "TEACHER" => Ok(Role::Teacher),
            "ADMIN" => Ok(Role::Admin),
            other => Err(DomainError::validation(format!(
                "role must be one of STUDENT, TEACHER, ADMIN (got `{other}`)"
            ))),
        }
    }
}

/// A registered account.
///
/// `department_id` is `None` for ADMIN accounts and for federated accounts
/// that have not been assigned a department yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    /// Argon2 PHC string. `None` when the account was provisioned by an
    /// external identity provider; password login is refused for those.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub department_id: Option<DepartmentId>,
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for [`User`]; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub department_id: Option<DepartmentId>,
    pub external_id: Option<String>,
}

/// Public projection of a [`User`], safe to return to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub role: Role,
    pub department_id: Option<DepartmentId>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            role: user.role,
            department_id: user.department_id,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    /// Unique, compared case-insensitively.
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDepartment {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: Option<String>,
    pub content: String,
    pub user_id: UserId,
    pub department_id: DepartmentId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub title: Option<String>,
    pub content: String,
    pub user_id: UserId,
    pub department_id: DepartmentId,
}

/// Replacement values applied by a post update. `None` keeps the stored value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PostChanges {
    pub content: String,
    pub title: Option<String>,
    pub department_id: Option<DepartmentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub content: String,
    pub post_id: PostId,
    pub user_id: UserId,
    /// Copied from the post when the comment is written.
    pub department_id: DepartmentId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub content: String,
    pub post_id: PostId,
    pub user_id: UserId,
    pub department_id: DepartmentId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub id: NoticeId,
    pub title: String,
    pub content: String,
    pub user_id: UserId,
    /// Copied from the author when the notice is written.
    pub department_id: DepartmentId,
    /// Storage filename handed out by the attachment store.
    pub attachment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotice {
    pub title: String,
    pub content: String,
    pub user_id: UserId,
    pub department_id: DepartmentId,
    pub attachment: Option<String>,
}

/// An entry in the revocation set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidatedToken {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

/// Payload carried inside a bearer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    /// Expiry (unix timestamp, seconds).
    pub exp: i64,
    /// Issued at (unix timestamp, seconds).
    pub iat: i64,
}

impl TokenClaims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// A token freshly issued by login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserSummary,
}

/// The authenticated caller, resolved from a verified token and the
/// current user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    pub department_id: Option<DepartmentId>,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            department_id: user.department_id,
        }
    }
}

/// Result of a successful login at an external identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalProfile {
    pub email: String,
    pub display_name: String,
    pub external_id: String,
}

/// A file received with a notice.
#[derive(Debug, Clone)]
pub struct Upload {
    pub original_name: String,
    pub content_type: mime::Mime,
    pub bytes: Bytes,
}

/// A file read back from attachment storage.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Generated storage name.
    pub filename: String,
    /// Name the uploader gave the file, for download headers.
    pub original_name: String,
    pub content_type: mime::Mime,
    pub bytes: Bytes,
}
