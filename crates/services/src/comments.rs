//! # Comment Store
//!
//! A comment always lands in its post's department: the commenter must
//! belong to that department, and the stored department is copied from the
//! post no matter what the caller claims.

use std::sync::Arc;

use domains::{
    Comment, CommentId, CommentRepository, DepartmentId, DomainError, Identity, NewComment,
    PostId, PostRepository, Result,
};
use tracing::{debug, info, instrument};

use crate::access::{ensure, Action};
use crate::validation::{required_text, FieldErrors, CONTENT_MAX};

pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    posts: Arc<dyn PostRepository>,
}

impl CommentService {
    pub fn new(comments: Arc<dyn CommentRepository>, posts: Arc<dyn PostRepository>) -> Self {
        Self { comments, posts }
    }

    /// `claimed_department` is accepted for compatibility with clients that
    /// send it; the post's department is authoritative.
    #[instrument(skip(self, actor, content), fields(actor = actor.user_id))]
    pub async fn create(
        &self,
        actor: &Identity,
        post_id: PostId,
        content: &str,
        claimed_department: Option<DepartmentId>,
    ) -> Result<Comment> {
        let content = validate(content)?;
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| DomainError::not_found("post"))?;
        ensure(
            actor,
            Action::CreateComment {
                post_department_id: post.department_id,
            },
        )?;
        if let Some(claimed) = claimed_department.filter(|d| *d != post.department_id) {
            debug!(claimed, actual = post.department_id, "ignoring caller-supplied department");
        }

        let comment = self
            .comments
            .insert(NewComment {
                content,
                post_id,
                user_id: actor.user_id,
                department_id: post.department_id,
            })
            .await?;
        info!(comment_id = comment.id, post_id, "comment created");
        Ok(comment)
    }

    #[instrument(skip(self, actor, content), fields(actor = actor.user_id))]
    pub async fn update(&self, actor: &Identity, id: CommentId, content: &str) -> Result<Comment> {
        let content = validate(content)?;
        let comment = self.get(id).await?;
        ensure(actor, Action::UpdateComment { owner_id: comment.user_id })?;
        let comment = self.comments.update_content(id, content).await?;
        info!(comment_id = id, "comment updated");
        Ok(comment)
    }

    #[instrument(skip(self, actor), fields(actor = actor.user_id))]
    pub async fn delete(&self, actor: &Identity, id: CommentId) -> Result<()> {
        let comment = self.get(id).await?;
        ensure(actor, Action::DeleteComment { owner_id: comment.user_id })?;
        self.comments.delete(id).await?;
        info!(comment_id = id, "comment deleted");
        Ok(())
    }

    pub async fn get(&self, id: CommentId) -> Result<Comment> {
        self.comments
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("comment"))
    }

    /// Comments on a post, newest first. Needs no identity.
    pub async fn list_by_post(&self, post_id: PostId) -> Result<Vec<Comment>> {
        if self.posts.find_by_id(post_id).await?.is_none() {
            return Err(DomainError::not_found("post"));
        }
        self.comments.list_by_post(post_id).await
    }
}

fn validate(content: &str) -> Result<String> {
    let mut errors = FieldErrors::new();
    let content = required_text(&mut errors, "content", content, CONTENT_MAX);
    errors.finish()?;
    Ok(content)
}
