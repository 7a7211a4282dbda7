//! # Postgres store
//!
//! Implements every repository port on a shared `sqlx::PgPool`. Unique and
//! foreign-key constraints in the schema are the final word on conflicts;
//! their violations come back as `DomainError::Conflict`.
//!
//! Each method is a single statement, so atomicity is per statement. The
//! schema cascades content with its owning user, post and department, and
//! restricts deleting a department that users still reference.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    Comment, CommentId, CommentRepository, Department, DepartmentId, DepartmentRepository,
    DomainError, InvalidatedToken, NewComment, NewDepartment, NewNotice, NewPost, NewUser, Notice,
    NoticeId, NoticeRepository, Post, PostChanges, PostId, PostRepository, Result,
    RevocationRepository, User, UserId, UserRepository, EMAIL_TAKEN, USERNAME_TAKEN,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use std::time::Duration;

const USER_COLUMNS: &str =
    "id, email, username, password_hash, role, department_id, external_id, created_at";

pub struct PgStore {
    pool: PgPool,
}

/// Row shape for `users`; `role` is parsed into the domain enum on the way out.
#[derive(Debug, FromRow)]
struct DbUser {
    id: i64,
    email: String,
    username: String,
    password_hash: Option<String>,
    role: String,
    department_id: Option<i64>,
    external_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<DbUser> for User {
    type Error = DomainError;

    fn try_from(row: DbUser) -> Result<Self> {
        let role = row
            .role
            .parse()
            .map_err(|_| DomainError::internal(format!("unknown role `{}` in users", row.role)))?;
        Ok(User {
            id: row.id,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            role,
            department_id: row.department_id,
            external_id: row.external_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct DbDepartment {
    id: i64,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<DbDepartment> for Department {
    fn from(row: DbDepartment) -> Self {
        Department {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct DbPost {
    id: i64,
    title: Option<String>,
    content: String,
    user_id: i64,
    department_id: i64,
    created_at: DateTime<Utc>,
}

impl From<DbPost> for Post {
    fn from(row: DbPost) -> Self {
        Post {
            id: row.id,
            title: row.title,
            content: row.content,
            user_id: row.user_id,
            department_id: row.department_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct DbComment {
    id: i64,
    content: String,
    post_id: i64,
    user_id: i64,
    department_id: i64,
    created_at: DateTime<Utc>,
}

impl From<DbComment> for Comment {
    fn from(row: DbComment) -> Self {
        Comment {
            id: row.id,
            content: row.content,
            post_id: row.post_id,
            user_id: row.user_id,
            department_id: row.department_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct DbNotice {
    id: i64,
    title: String,
    content: String,
    user_id: i64,
    department_id: i64,
    attachment: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<DbNotice> for Notice {
    fn from(row: DbNotice) -> Self {
        Notice {
            id: row.id,
            title: row.title,
            content: row.content,
            user_id: row.user_id,
            department_id: row.department_id,
            attachment: row.attachment,
            created_at: row.created_at,
        }
    }
}

impl PgStore {
    /// Opens a pool. Connection failures surface as `Internal`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
            .map_err(|err| db_error(err, "connect"))?;
        Ok(Self { pool })
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "migration failed");
                DomainError::internal(err)
            })
    }
}

/// Maps a driver error into the domain taxonomy. Constraint violations are
/// client-visible conflicts; everything else is logged and hidden.
fn db_error(err: sqlx::Error, context: &str) -> DomainError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            let what = match db.constraint() {
                Some("users_email_ci") => EMAIL_TAKEN,
                Some("users_username") => USERNAME_TAKEN,
                Some("departments_name_ci") => "department name already exists",
                _ => "record already exists",
            };
            return DomainError::conflict(what);
        }
        if db.is_foreign_key_violation() {
            return DomainError::conflict(format!("{context}: referenced record is missing or still in use"));
        }
    }
    tracing::error!(error = %err, context, "postgres error");
    DomainError::internal(format!("{context}: {err}"))
}

fn affected(rows: u64, what: &str) -> Result<()> {
    if rows == 0 {
        Err(DomainError::not_found(what))
    } else {
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (email, username, password_hash, role, department_id, external_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, DbUser>(&sql)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.department_id)
            .bind(&user.external_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| db_error(err, "insert user"))?
            .try_into()
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, DbUser>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| db_error(err, "find user"))?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        sqlx::query_as::<_, DbUser>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| db_error(err, "find user by email"))?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_login(&self, identifier: &str) -> Result<Option<User>> {
        // An email match wins over a username that happens to look like one.
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE lower(email) = lower($1) OR username = $1 \
             ORDER BY (lower(email) = lower($1)) DESC LIMIT 1"
        );
        sqlx::query_as::<_, DbUser>(&sql)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| db_error(err, "find user by login"))?
            .map(User::try_from)
            .transpose()
    }

    async fn find_or_create_by_email(&self, user: NewUser) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (email, username, password_hash, role, department_id, external_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT ((lower(email))) DO NOTHING RETURNING {USER_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, DbUser>(&sql)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.department_id)
            .bind(&user.external_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| db_error(err, "upsert user"));

        // A concurrent first login for the same email may win the username
        // index instead of the email one.
        let inserted = match inserted {
            Err(DomainError::Conflict(reason)) if reason == USERNAME_TAKEN => {
                return match self.find_by_email(&user.email).await? {
                    Some(existing) => Ok(existing),
                    None => Err(DomainError::conflict(USERNAME_TAKEN)),
                };
            }
            other => other?,
        };

        match inserted {
            Some(row) => row.try_into(),
            None => self
                .find_by_email(&user.email)
                .await?
                .ok_or_else(|| DomainError::internal("upserted user vanished")),
        }
    }

    async fn count_in_department(&self, department_id: DepartmentId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE department_id = $1")
            .bind(department_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| db_error(err, "count department members"))?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl DepartmentRepository for PgStore {
    async fn insert(&self, department: NewDepartment) -> Result<Department> {
        sqlx::query_as::<_, DbDepartment>(
            "INSERT INTO departments (name, description) VALUES ($1, $2) \
             RETURNING id, name, description, created_at",
        )
        .bind(&department.name)
        .bind(&department.description)
        .fetch_one(&self.pool)
        .await
        .map(Department::from)
        .map_err(|err| db_error(err, "insert department"))
    }

    async fn update(&self, id: DepartmentId, department: NewDepartment) -> Result<Department> {
        sqlx::query_as::<_, DbDepartment>(
            "UPDATE departments SET name = $2, description = $3 WHERE id = $1 \
             RETURNING id, name, description, created_at",
        )
        .bind(id)
        .bind(&department.name)
        .bind(&department.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| db_error(err, "update department"))?
        .map(Department::from)
        .ok_or_else(|| DomainError::not_found("department"))
    }

    async fn delete(&self, id: DepartmentId) -> Result<()> {
        let result = sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| match db_error(err, "delete department") {
                DomainError::Conflict(_) => {
                    DomainError::conflict("department is still referenced by users")
                }
                other => other,
            })?;
        affected(result.rows_affected(), "department")
    }

    async fn find_by_id(&self, id: DepartmentId) -> Result<Option<Department>> {
        sqlx::query_as::<_, DbDepartment>(
            "SELECT id, name, description, created_at FROM departments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(Department::from))
        .map_err(|err| db_error(err, "find department"))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Department>> {
        sqlx::query_as::<_, DbDepartment>(
            "SELECT id, name, description, created_at FROM departments \
             WHERE lower(name) = lower($1)",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(Department::from))
        .map_err(|err| db_error(err, "find department by name"))
    }

    async fn list(&self) -> Result<Vec<Department>> {
        sqlx::query_as::<_, DbDepartment>(
            "SELECT id, name, description, created_at FROM departments \
             ORDER BY lower(name) ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(Department::from).collect())
        .map_err(|err| db_error(err, "list departments"))
    }
}

#[async_trait]
impl PostRepository for PgStore {
    async fn insert(&self, post: NewPost) -> Result<Post> {
        sqlx::query_as::<_, DbPost>(
            "INSERT INTO posts (title, content, user_id, department_id) VALUES ($1, $2, $3, $4) \
             RETURNING id, title, content, user_id, department_id, created_at",
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.user_id)
        .bind(post.department_id)
        .fetch_one(&self.pool)
        .await
        .map(Post::from)
        .map_err(|err| db_error(err, "insert post"))
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>> {
        sqlx::query_as::<_, DbPost>(
            "SELECT id, title, content, user_id, department_id, created_at FROM posts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(Post::from))
        .map_err(|err| db_error(err, "find post"))
    }

    async fn update(&self, id: PostId, changes: PostChanges) -> Result<Post> {
        sqlx::query_as::<_, DbPost>(
            "UPDATE posts SET content = $2, title = COALESCE($3, title), \
             department_id = COALESCE($4, department_id) WHERE id = $1 \
             RETURNING id, title, content, user_id, department_id, created_at",
        )
        .bind(id)
        .bind(&changes.content)
        .bind(&changes.title)
        .bind(changes.department_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| db_error(err, "update post"))?
        .map(Post::from)
        .ok_or_else(|| DomainError::not_found("post"))
    }

    async fn delete(&self, id: PostId) -> Result<()> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| db_error(err, "delete post"))?;
        affected(result.rows_affected(), "post")
    }

    async fn list_all(&self) -> Result<Vec<Post>> {
        sqlx::query_as::<_, DbPost>(
            "SELECT id, title, content, user_id, department_id, created_at FROM posts \
             ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(Post::from).collect())
        .map_err(|err| db_error(err, "list posts"))
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Post>> {
        sqlx::query_as::<_, DbPost>(
            "SELECT id, title, content, user_id, department_id, created_at FROM posts \
             WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(Post::from).collect())
        .map_err(|err| db_error(err, "list user posts"))
    }
}

#[async_trait]
impl CommentRepository for PgStore {
    async fn insert(&self, comment: NewComment) -> Result<Comment> {
        sqlx::query_as::<_, DbComment>(
            "INSERT INTO comments (content, post_id, user_id, department_id) VALUES ($1, $2, $3, $4) \
             RETURNING id, content, post_id, user_id, department_id, created_at",
        )
        .bind(&comment.content)
        .bind(comment.post_id)
        .bind(comment.user_id)
        .bind(comment.department_id)
        .fetch_one(&self.pool)
        .await
        .map(Comment::from)
        .map_err(|err| db_error(err, "insert comment"))
    }

    async fn find_by_id(&self, id: CommentId) -> Result<Option<Comment>> {
        sqlx::query_as::<_, DbComment>(
            "SELECT id, content, post_id, user_id, department_id, created_at FROM comments \
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(Comment::from))
        .map_err(|err| db_error(err, "find comment"))
    }

    async fn update_content(&self, id: CommentId, content: String) -> Result<Comment> {
        sqlx::query_as::<_, DbComment>(
            "UPDATE comments SET content = $2 WHERE id = $1 \
             RETURNING id, content, post_id, user_id, department_id, created_at",
        )
        .bind(id)
        .bind(&content)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| db_error(err, "update comment"))?
        .map(Comment::from)
        .ok_or_else(|| DomainError::not_found("comment"))
    }

    async fn delete(&self, id: CommentId) -> Result<()> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| db_error(err, "delete comment"))?;
        affected(result.rows_affected(), "comment")
    }

    async fn list_by_post(&self, post_id: PostId) -> Result<Vec<Comment>> {
        sqlx::query_as::<_, DbComment>(
            "SELECT id, content, post_id, user_id, department_id, created_at FROM comments \
             WHERE post_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(Comment::from).collect())
        .map_err(|err| db_error(err, "list comments"))
    }
}

#[async_trait]
impl NoticeRepository for PgStore {
    async fn insert(&self, notice: NewNotice) -> Result<Notice> {
        sqlx::query_as::<_, DbNotice>(
            "INSERT INTO notices (title, content, user_id, department_id, attachment) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, title, content, user_id, department_id, attachment, created_at",
        )
        .bind(&notice.title)
        .bind(&notice.content)
        .bind(notice.user_id)
        .bind(notice.department_id)
        .bind(&notice.attachment)
        .fetch_one(&self.pool)
        .await
        .map(Notice::from)
        .map_err(|err| db_error(err, "insert notice"))
    }

    async fn find_by_id(&self, id: NoticeId) -> Result<Option<Notice>> {
        sqlx::query_as::<_, DbNotice>(
            "SELECT id, title, content, user_id, department_id, attachment, created_at \
             FROM notices WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(Notice::from))
        .map_err(|err| db_error(err, "find notice"))
    }

    async fn update(&self, id: NoticeId, title: String, content: String) -> Result<Notice> {
        sqlx::query_as::<_, DbNotice>(
            "UPDATE notices SET title = $2, content = $3 WHERE id = $1 \
             RETURNING id, title, content, user_id, department_id, attachment, created_at",
        )
        .bind(id)
        .bind(&title)
        .bind(&content)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| db_error(err, "update notice"))?
        .map(Notice::from)
        .ok_or_else(|| DomainError::not_found("notice"))
    }

    async fn delete(&self, id: NoticeId) -> Result<()> {
        let result = sqlx::query("DELETE FROM notices WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| db_error(err, "delete notice"))?;
        affected(result.rows_affected(), "notice")
    }

    async fn list_by_department(&self, department_id: DepartmentId) -> Result<Vec<Notice>> {
        sqlx::query_as::<_, DbNotice>(
            "SELECT id, title, content, user_id, department_id, attachment, created_at \
             FROM notices WHERE department_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(department_id)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(Notice::from).collect())
        .map_err(|err| db_error(err, "list department notices"))
    }

    async fn list_by_author(&self, user_id: UserId) -> Result<Vec<Notice>> {
        sqlx::query_as::<_, DbNotice>(
            "SELECT id, title, content, user_id, department_id, attachment, created_at \
             FROM notices WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(Notice::from).collect())
        .map_err(|err| db_error(err, "list authored notices"))
    }
}

#[async_trait]
impl RevocationRepository for PgStore {
    async fn insert(&self, entry: InvalidatedToken) -> Result<()> {
        sqlx::query(
            "INSERT INTO invalidated_tokens (token, user_id, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (token) DO NOTHING",
        )
        .bind(&entry.token)
        .bind(entry.user_id)
        .bind(entry.expires_at)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|err| db_error(err, "revoke token"))
    }

    async fn contains(&self, token: &str) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM invalidated_tokens WHERE token = $1)")
            .bind(token)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| db_error(err, "check revocation"))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        sqlx::query("DELETE FROM invalidated_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map(|result| result.rows_affected())
            .map_err(|err| db_error(err, "purge revocations"))
    }
}
