//! Comment endpoints. Reading a post's comments is public.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use domains::{Comment, DepartmentId};
use serde::Deserialize;

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::extract::{AuthUser, Id, ValidJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub content: String,
    /// Accepted but not trusted; the post decides the department.
    #[serde(default, alias = "departmentId")]
    pub department_id: Option<DepartmentId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    #[serde(default)]
    pub content: String,
}

pub async fn list_comments(
    State(state): State<AppState>,
    Id(post_id): Id,
) -> ApiResult<Json<Envelope<Vec<Comment>>>> {
    let comments = state.services.comments.list_by_post(post_id).await?;
    Ok(Json(Envelope::ok(comments)))
}

pub async fn create_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Id(post_id): Id,
    ValidJson(body): ValidJson<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Comment>>)> {
    let comment = state
        .services
        .comments
        .create(&user.identity, post_id, &body.content, body.department_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(comment).with_message("comment created")),
    ))
}

pub async fn update_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Id(id): Id,
    ValidJson(body): ValidJson<UpdateCommentRequest>,
) -> ApiResult<Json<Envelope<Comment>>> {
    let comment = state
        .services
        .comments
        .update(&user.identity, id, &body.content)
        .await?;
    Ok(Json(Envelope::ok(comment).with_message("comment updated")))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Id(id): Id,
) -> ApiResult<Json<Envelope<()>>> {
    state.services.comments.delete(&user.identity, id).await?;
    Ok(Json(Envelope::done("comment deleted")))
}
