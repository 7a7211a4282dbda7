//! # services
//!
//! Application services for the campus board. Each service owns one
//! resource family and consults [`access`] before any write.

pub mod access;
pub mod comments;
pub mod departments;
pub mod identity;
pub mod notices;
pub mod posts;
pub mod validation;

use std::sync::Arc;

use domains::{
    AttachmentStorage, CommentRepository, DepartmentRepository, NoticeRepository, PasswordHasher,
    PostRepository, RevocationRepository, TokenCodec, UserRepository,
};
use serde::Deserialize;

pub use comments::CommentService;
pub use departments::DepartmentService;
pub use identity::{IdentityService, Registration};
pub use notices::NoticeService;
pub use posts::PostService;

/// Every adapter the services need, explicitly constructed by the caller.
#[derive(Clone)]
pub struct Ports {
    pub users: Arc<dyn UserRepository>,
    pub departments: Arc<dyn DepartmentRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub notices: Arc<dyn NoticeRepository>,
    pub revocations: Arc<dyn RevocationRepository>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub tokens: Arc<dyn TokenCodec>,
    pub attachments: Arc<dyn AttachmentStorage>,
}

/// Tunables the binary reads from configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceOptions {
    pub token_ttl_secs: i64,
    pub max_attachment_bytes: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            token_ttl_secs: identity::DEFAULT_TOKEN_TTL_SECS,
            max_attachment_bytes: notices::DEFAULT_MAX_ATTACHMENT_BYTES,
        }
    }
}

/// The full service layer, cheap to clone into request handlers.
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<IdentityService>,
    pub departments: Arc<DepartmentService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub notices: Arc<NoticeService>,
}

impl Services {
    pub fn new(ports: Ports, options: ServiceOptions) -> Self {
        let identity = IdentityService::new(
            ports.users.clone(),
            ports.departments.clone(),
            ports.revocations,
            ports.hasher,
            ports.tokens,
        )
        .with_token_ttl(chrono::Duration::seconds(options.token_ttl_secs));
        let notices = NoticeService::new(
            ports.notices,
            ports.departments.clone(),
            ports.attachments,
        )
        .with_max_attachment_bytes(options.max_attachment_bytes);

        Self {
            identity: Arc::new(identity),
            departments: Arc::new(DepartmentService::new(
                ports.departments.clone(),
                ports.users,
            )),
            posts: Arc::new(PostService::new(ports.posts.clone(), ports.departments)),
            comments: Arc::new(CommentService::new(ports.comments, ports.posts)),
            notices: Arc::new(notices),
        }
    }
}
