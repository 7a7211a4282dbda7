//! Post endpoints. Every route needs a bearer token.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use domains::{DepartmentId, DomainError, Post};
use serde::Deserialize;

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::extract::{AuthUser, Id, ValidJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Defaults to the author's own department.
    #[serde(default, alias = "departmentId")]
    pub department_id: Option<DepartmentId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "departmentId")]
    pub department_id: Option<DepartmentId>,
}

/// All posts across departments, newest first.
pub async fn list_posts(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Json<Envelope<Vec<Post>>>> {
    let posts = state.services.posts.list_all().await?;
    Ok(Json(Envelope::ok(posts)))
}

pub async fn list_my_posts(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Envelope<Vec<Post>>>> {
    let posts = state
        .services
        .posts
        .list_by_user(user.identity.user_id)
        .await?;
    Ok(Json(Envelope::ok(posts)))
}

pub async fn get_post(
    State(state): State<AppState>,
    _user: AuthUser,
    Id(id): Id,
) -> ApiResult<Json<Envelope<Post>>> {
    let post = state.services.posts.get(id).await?;
    Ok(Json(Envelope::ok(post)))
}

pub async fn create_post(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(body): ValidJson<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Post>>)> {
    let department_id = body
        .department_id
        .or(user.identity.department_id)
        .ok_or_else(|| DomainError::forbidden("accounts without a department cannot post"))?;
    let post = state
        .services
        .posts
        .create(&user.identity, &body.content, body.title, department_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(post).with_message("post created")),
    ))
}

pub async fn update_post(
    State(state): State<AppState>,
    user: AuthUser,
    Id(id): Id,
    ValidJson(body): ValidJson<UpdatePostRequest>,
) -> ApiResult<Json<Envelope<Post>>> {
    let post = state
        .services
        .posts
        .update(&user.identity, id, &body.content, body.title, body.department_id)
        .await?;
    Ok(Json(Envelope::ok(post).with_message("post updated")))
}

pub async fn delete_post(
    State(state): State<AppState>,
    user: AuthUser,
    Id(id): Id,
) -> ApiResult<Json<Envelope<()>>> {
    state.services.posts.delete(&user.identity, id).await?;
    Ok(Json(Envelope::done("post deleted")))
}
