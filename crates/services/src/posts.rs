//! # Post Store
//!
//! Posts are created inside the author's own department and moderated by
//! their author or by staff.

use std::sync::Arc;

use domains::{
    DepartmentId, DepartmentRepository, DomainError, Identity, NewPost, Post, PostChanges, PostId,
    PostRepository, Result, UserId,
};
use tracing::{info, instrument};

use crate::access::{ensure, Action};
use crate::validation::{normalize_optional, required_text, FieldErrors, CONTENT_MAX, POST_TITLE_MAX};

pub struct PostService {
    posts: Arc<dyn PostRepository>,
    departments: Arc<dyn DepartmentRepository>,
}

impl PostService {
    pub fn new(posts: Arc<dyn PostRepository>, departments: Arc<dyn DepartmentRepository>) -> Self {
        Self { posts, departments }
    }

    #[instrument(skip(self, actor, content, title), fields(actor = actor.user_id))]
    pub async fn create(
        &self,
        actor: &Identity,
        content: &str,
        title: Option<String>,
        department_id: DepartmentId,
    ) -> Result<Post> {
        let (content, title) = validate(content, title)?;
        ensure(actor, Action::CreatePost { department_id })?;
        self.require_department(department_id).await?;

        let post = self
            .posts
            .insert(NewPost {
                title,
                content,
                user_id: actor.user_id,
                department_id,
            })
            .await?;
        info!(post_id = post.id, department_id, "post created");
        Ok(post)
    }

    /// Replaces the content and optionally the title and department.
    #[instrument(skip(self, actor, content, title), fields(actor = actor.user_id))]
    pub async fn update(
        &self,
        actor: &Identity,
        post_id: PostId,
        content: &str,
        title: Option<String>,
        department_id: Option<DepartmentId>,
    ) -> Result<Post> {
        let (content, title) = validate(content, title)?;
        let post = self.get(post_id).await?;
        ensure(actor, Action::UpdatePost { owner_id: post.user_id })?;
        if let Some(department_id) = department_id {
            self.require_department(department_id).await?;
        }

        let post = self
            .posts
            .update(
                post_id,
                PostChanges {
                    content,
                    title,
                    department_id,
                },
            )
            .await?;
        info!(post_id, "post updated");
        Ok(post)
    }

    #[instrument(skip(self, actor), fields(actor = actor.user_id))]
    pub async fn delete(&self, actor: &Identity, post_id: PostId) -> Result<()> {
        let post = self.get(post_id).await?;
        ensure(actor, Action::DeletePost { owner_id: post.user_id })?;
        self.posts.delete(post_id).await?;
        info!(post_id, "post deleted");
        Ok(())
    }

    pub async fn get(&self, post_id: PostId) -> Result<Post> {
        self.posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| DomainError::not_found("post"))
    }

    /// Every post on the board, newest first, across all departments.
    pub async fn list_all(&self) -> Result<Vec<Post>> {
        self.posts.list_all().await
    }

    /// Posts authored by `user_id`, newest first.
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Post>> {
        self.posts.list_by_user(user_id).await
    }

    async fn require_department(&self, department_id: DepartmentId) -> Result<()> {
        match self.departments.find_by_id(department_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found("department")),
        }
    }
}

fn validate(content: &str, title: Option<String>) -> Result<(String, Option<String>)> {
    let mut errors = FieldErrors::new();
    let content = required_text(&mut errors, "content", content, CONTENT_MAX);
    let title = normalize_optional(title);
    if let Some(title) = &title {
        errors.check(
            title.chars().count() <= POST_TITLE_MAX,
            format!("title must be at most {POST_TITLE_MAX} characters"),
        );
    }
    errors.finish()?;
    Ok((content, title))
}
