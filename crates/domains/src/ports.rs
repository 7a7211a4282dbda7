//! # Ports
//!
//! Any adapter must implement these traits to be wired into the binary.
//! Services hold them as `Arc<dyn Trait>` and never name a concrete backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::Result;
use crate::models::{
    Comment, CommentId, Department, DepartmentId, InvalidatedToken, NewComment, NewDepartment,
    NewNotice, NewPost, NewUser, Notice, NoticeId, Post, PostChanges, PostId, StoredFile,
    TokenClaims, Upload, User, UserId,
};

/// Persistence contract for accounts.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email or username is taken.
    async fn insert(&self, user: NewUser) -> Result<User>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Matches either the email or the username.
    async fn find_by_login(&self, identifier: &str) -> Result<Option<User>>;
    /// Returns the account holding `user.email`, inserting `user` first if
    /// none exists. Concurrent calls for one email yield one row.
    async fn find_or_create_by_email(&self, user: NewUser) -> Result<User>;
    async fn count_in_department(&self, department_id: DepartmentId) -> Result<u64>;
}

/// Persistence contract for departments.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DepartmentRepository: Send + Sync {
    /// Fails with `Conflict` when the name is taken, ignoring case.
    async fn insert(&self, department: NewDepartment) -> Result<Department>;
    async fn update(&self, id: DepartmentId, department: NewDepartment) -> Result<Department>;
    /// Fails with `Conflict` while any user references the department.
    async fn delete(&self, id: DepartmentId) -> Result<()>;
    async fn find_by_id(&self, id: DepartmentId) -> Result<Option<Department>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Department>>;
    /// Ordered by name ascending.
    async fn list(&self) -> Result<Vec<Department>>;
}

/// Persistence contract for posts. Listings are newest first.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn insert(&self, post: NewPost) -> Result<Post>;
    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>>;
    async fn update(&self, id: PostId, changes: PostChanges) -> Result<Post>;
    /// Removes the post together with its comments.
    async fn delete(&self, id: PostId) -> Result<()>;
    async fn list_all(&self) -> Result<Vec<Post>>;
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Post>>;
}

/// Persistence contract for comments. Listings are newest first.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn insert(&self, comment: NewComment) -> Result<Comment>;
    async fn find_by_id(&self, id: CommentId) -> Result<Option<Comment>>;
    async fn update_content(&self, id: CommentId, content: String) -> Result<Comment>;
    async fn delete(&self, id: CommentId) -> Result<()>;
    async fn list_by_post(&self, post_id: PostId) -> Result<Vec<Comment>>;
}

/// Persistence contract for notices. Listings are newest first.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NoticeRepository: Send + Sync {
    async fn insert(&self, notice: NewNotice) -> Result<Notice>;
    async fn find_by_id(&self, id: NoticeId) -> Result<Option<Notice>>;
    async fn update(&self, id: NoticeId, title: String, content: String) -> Result<Notice>;
    async fn delete(&self, id: NoticeId) -> Result<()>;
    async fn list_by_department(&self, department_id: DepartmentId) -> Result<Vec<Notice>>;
    async fn list_by_author(&self, user_id: UserId) -> Result<Vec<Notice>>;
}

/// The revocation set consulted on every authenticated request.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RevocationRepository: Send + Sync {
    /// Inserting a token that is already present is a no-op.
    async fn insert(&self, entry: InvalidatedToken) -> Result<()>;
    async fn contains(&self, token: &str) -> Result<bool>;
    /// Deletes entries whose expiry is at or before `now`; returns how many.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// One-way credential hashing with a per-record salt.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String>;
    fn verify(&self, plaintext: &str, digest: &str) -> Result<bool>;
}

/// Why a presented token was refused by the codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenRejection {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Signs and verifies bearer tokens.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TokenCodec: Send + Sync {
    fn sign(&self, claims: &TokenClaims) -> Result<String>;
    /// Checks the signature and the `exp` claim.
    fn verify(&self, token: &str) -> std::result::Result<TokenClaims, TokenRejection>;
}

/// File storage for notice attachments.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AttachmentStorage: Send + Sync {
    /// Persists the upload and returns the generated storage filename.
    async fn save(&self, upload: Upload) -> Result<String>;
    async fn load(&self, filename: &str) -> Result<StoredFile>;
    async fn delete(&self, filename: &str) -> Result<()>;
}
