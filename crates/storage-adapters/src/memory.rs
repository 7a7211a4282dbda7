//! In-memory implementation of every repository port.
//!
//! Backed by `DashMap`s so the store can be shared across request handlers
//! without a global lock. Unique constraints are enforced through secondary
//! index maps whose `entry` API gives an atomic check-and-insert.
//!
//! Nothing survives a restart; this backend serves local development and
//! the test suites. Cascades mirror the Postgres schema: deleting a post
//! removes its comments, deleting a department removes its content.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domains::{
    Comment, CommentId, CommentRepository, Department, DepartmentId, DepartmentRepository,
    DomainError, InvalidatedToken, NewComment, NewDepartment, NewNotice, NewPost, NewUser, Notice,
    NoticeId, NoticeRepository, Post, PostChanges, PostId, PostRepository, Result,
    RevocationRepository, User, UserId, UserRepository, EMAIL_TAKEN, USERNAME_TAKEN,
};
use tokio::sync::Mutex;

#[derive(Debug)]
struct Sequence(AtomicI64);

impl Sequence {
    fn new() -> Self {
        Self(AtomicI64::new(1))
    }

    fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: DashMap<UserId, User>,
    /// Lowercased email → user id.
    user_emails: DashMap<String, UserId>,
    /// Username → user id.
    user_names: DashMap<String, UserId>,
    departments: DashMap<DepartmentId, Department>,
    /// Lowercased name → department id.
    department_names: DashMap<String, DepartmentId>,
    posts: DashMap<PostId, Post>,
    comments: DashMap<CommentId, Comment>,
    notices: DashMap<NoticeId, Notice>,
    revoked: DashMap<String, InvalidatedToken>,
    /// Serializes department deletion against membership changes.
    membership: Mutex<()>,
    user_seq: Sequence,
    department_seq: Sequence,
    post_seq: Sequence,
    comment_seq: Sequence,
    notice_seq: Sequence,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_user(&self, user: NewUser) -> Result<User> {
        let email_key = user.email.to_lowercase();
        let Entry::Vacant(email_slot) = self.user_emails.entry(email_key) else {
            return Err(DomainError::conflict(EMAIL_TAKEN));
        };
        let Entry::Vacant(name_slot) = self.user_names.entry(user.username.clone()) else {
            return Err(DomainError::conflict(USERNAME_TAKEN));
        };

        let stored = User {
            id: self.user_seq.next(),
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            department_id: user.department_id,
            external_id: user.external_id,
            created_at: Utc::now(),
        };
        self.users.insert(stored.id, stored.clone());
        name_slot.insert(stored.id);
        email_slot.insert(stored.id);
        Ok(stored)
    }
}

fn newest_first<T>(items: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, i64)) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let _guard = self.membership.lock().await;
        if let Some(department_id) = user.department_id {
            if !self.departments.contains_key(&department_id) {
                return Err(DomainError::not_found("department"));
            }
        }
        self.insert_user(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let id = self.user_emails.get(&email.to_lowercase()).map(|id| *id);
        Ok(id.and_then(|id| self.users.get(&id).map(|u| u.clone())))
    }

    async fn find_by_login(&self, identifier: &str) -> Result<Option<User>> {
        if let Some(user) = self.find_by_email(identifier).await? {
            return Ok(Some(user));
        }
        let id = self.user_names.get(identifier).map(|id| *id);
        Ok(id.and_then(|id| self.users.get(&id).map(|u| u.clone())))
    }

    async fn find_or_create_by_email(&self, user: NewUser) -> Result<User> {
        let _guard = self.membership.lock().await;
        if let Some(existing) = self.find_by_email(&user.email).await? {
            return Ok(existing);
        }
        self.insert_user(user)
    }

    async fn count_in_department(&self, department_id: DepartmentId) -> Result<u64> {
        Ok(self
            .users
            .iter()
            .filter(|u| u.department_id == Some(department_id))
            .count() as u64)
    }
}

#[async_trait]
impl DepartmentRepository for InMemoryStore {
    async fn insert(&self, department: NewDepartment) -> Result<Department> {
        let Entry::Vacant(slot) = self.department_names.entry(department.name.to_lowercase())
        else {
            return Err(DomainError::conflict("department name already exists"));
        };
        let stored = Department {
            id: self.department_seq.next(),
            name: department.name,
            description: department.description,
            created_at: Utc::now(),
        };
        self.departments.insert(stored.id, stored.clone());
        slot.insert(stored.id);
        Ok(stored)
    }

    async fn update(&self, id: DepartmentId, department: NewDepartment) -> Result<Department> {
        let new_key = department.name.to_lowercase();
        let old_key = self
            .departments
            .get(&id)
            .map(|d| d.name.to_lowercase())
            .ok_or_else(|| DomainError::not_found("department"))?;

        if new_key != old_key {
            match self.department_names.entry(new_key) {
                Entry::Occupied(_) => {
                    return Err(DomainError::conflict("department name already exists"))
                }
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
            self.department_names.remove(&old_key);
        }

        let mut stored = self
            .departments
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("department"))?;
        stored.name = department.name;
        stored.description = department.description;
        Ok(stored.clone())
    }

    async fn delete(&self, id: DepartmentId) -> Result<()> {
        let _guard = self.membership.lock().await;
        if self.users.iter().any(|u| u.department_id == Some(id)) {
            return Err(DomainError::conflict("department is still referenced by users"));
        }
        let (_, removed) = self
            .departments
            .remove(&id)
            .ok_or_else(|| DomainError::not_found("department"))?;
        self.department_names.remove(&removed.name.to_lowercase());
        self.posts.retain(|_, p| p.department_id != id);
        self.comments.retain(|_, c| c.department_id != id);
        self.notices.retain(|_, n| n.department_id != id);
        Ok(())
    }

    async fn find_by_id(&self, id: DepartmentId) -> Result<Option<Department>> {
        Ok(self.departments.get(&id).map(|d| d.clone()))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Department>> {
        let id = self.department_names.get(&name.to_lowercase()).map(|id| *id);
        Ok(id.and_then(|id| self.departments.get(&id).map(|d| d.clone())))
    }

    async fn list(&self) -> Result<Vec<Department>> {
        let mut all: Vec<Department> = self.departments.iter().map(|d| d.clone()).collect();
        all.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        Ok(all)
    }
}

#[async_trait]
impl PostRepository for InMemoryStore {
    async fn insert(&self, post: NewPost) -> Result<Post> {
        if !self.departments.contains_key(&post.department_id) {
            return Err(DomainError::not_found("department"));
        }
        let stored = Post {
            id: self.post_seq.next(),
            title: post.title,
            content: post.content,
            user_id: post.user_id,
            department_id: post.department_id,
            created_at: Utc::now(),
        };
        self.posts.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>> {
        Ok(self.posts.get(&id).map(|p| p.clone()))
    }

    async fn update(&self, id: PostId, changes: PostChanges) -> Result<Post> {
        let mut stored = self
            .posts
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("post"))?;
        stored.content = changes.content;
        if changes.title.is_some() {
            stored.title = changes.title;
        }
        if let Some(department_id) = changes.department_id {
            stored.department_id = department_id;
        }
        Ok(stored.clone())
    }

    async fn delete(&self, id: PostId) -> Result<()> {
        self.posts
            .remove(&id)
            .ok_or_else(|| DomainError::not_found("post"))?;
        self.comments.retain(|_, c| c.post_id != id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Post>> {
        let mut all: Vec<Post> = self.posts.iter().map(|p| p.clone()).collect();
        newest_first(&mut all, |p| (p.created_at, p.id));
        Ok(all)
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Post>> {
        let mut mine: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| p.clone())
            .collect();
        newest_first(&mut mine, |p| (p.created_at, p.id));
        Ok(mine)
    }
}

#[async_trait]
impl CommentRepository for InMemoryStore {
    async fn insert(&self, comment: NewComment) -> Result<Comment> {
        if !self.posts.contains_key(&comment.post_id) {
            return Err(DomainError::not_found("post"));
        }
        let stored = Comment {
            id: self.comment_seq.next(),
            content: comment.content,
            post_id: comment.post_id,
            user_id: comment.user_id,
            department_id: comment.department_id,
            created_at: Utc::now(),
        };
        self.comments.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: CommentId) -> Result<Option<Comment>> {
        Ok(self.comments.get(&id).map(|c| c.clone()))
    }

    async fn update_content(&self, id: CommentId, content: String) -> Result<Comment> {
        let mut stored = self
            .comments
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("comment"))?;
        stored.content = content;
        Ok(stored.clone())
    }

    async fn delete(&self, id: CommentId) -> Result<()> {
        self.comments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found("comment"))
    }

    async fn list_by_post(&self, post_id: PostId) -> Result<Vec<Comment>> {
        let mut thread: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .map(|c| c.clone())
            .collect();
        newest_first(&mut thread, |c| (c.created_at, c.id));
        Ok(thread)
    }
}

#[async_trait]
impl NoticeRepository for InMemoryStore {
    async fn insert(&self, notice: NewNotice) -> Result<Notice> {
        if !self.departments.contains_key(&notice.department_id) {
            return Err(DomainError::not_found("department"));
        }
        let stored = Notice {
            id: self.notice_seq.next(),
            title: notice.title,
            content: notice.content,
            user_id: notice.user_id,
            department_id: notice.department_id,
            attachment: notice.attachment,
            created_at: Utc::now(),
        };
        self.notices.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: NoticeId) -> Result<Option<Notice>> {
        Ok(self.notices.get(&id).map(|n| n.clone()))
    }

    async fn update(&self, id: NoticeId, title: String, content: String) -> Result<Notice> {
        let mut stored = self
            .notices
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("notice"))?;
        stored.title = title;
        stored.content = content;
        Ok(stored.clone())
    }

    async fn delete(&self, id: NoticeId) -> Result<()> {
        self.notices
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found("notice"))
    }

    async fn list_by_department(&self, department_id: DepartmentId) -> Result<Vec<Notice>> {
        let mut board: Vec<Notice> = self
            .notices
            .iter()
            .filter(|n| n.department_id == department_id)
            .map(|n| n.clone())
            .collect();
        newest_first(&mut board, |n| (n.created_at, n.id));
        Ok(board)
    }

    async fn list_by_author(&self, user_id: UserId) -> Result<Vec<Notice>> {
        let mut authored: Vec<Notice> = self
            .notices
            .iter()
            .filter(|n| n.user_id == user_id)
            .map(|n| n.clone())
            .collect();
        newest_first(&mut authored, |n| (n.created_at, n.id));
        Ok(authored)
    }
}

#[async_trait]
impl RevocationRepository for InMemoryStore {
    async fn insert(&self, entry: InvalidatedToken) -> Result<()> {
        self.revoked.entry(entry.token.clone()).or_insert(entry);
        Ok(())
    }

    async fn contains(&self, token: &str) -> Result<bool> {
        Ok(self.revoked.contains_key(token))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let before = self.revoked.len();
        self.revoked.retain(|_, entry| entry.expires_at > now);
        Ok(before.saturating_sub(self.revoked.len()) as u64)
    }
}
