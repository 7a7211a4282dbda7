//! Department registry endpoints. Listing is public; writes are ADMIN-only,
//! enforced by the service's access check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use domains::Department;
use serde::Deserialize;

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::extract::{AuthUser, Id, ValidJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DepartmentRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub async fn list_departments(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<Vec<Department>>>> {
    let departments = state.services.departments.list().await?;
    Ok(Json(Envelope::ok(departments)))
}

pub async fn get_department(
    State(state): State<AppState>,
    _user: AuthUser,
    Id(id): Id,
) -> ApiResult<Json<Envelope<Department>>> {
    let department = state.services.departments.get(id).await?;
    Ok(Json(Envelope::ok(department)))
}

pub async fn create_department(
    State(state): State<AppState>,
    user: AuthUser,
    ValidJson(body): ValidJson<DepartmentRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Department>>)> {
    let department = state
        .services
        .departments
        .create(&user.identity, &body.name, body.description)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(department).with_message("department created")),
    ))
}

pub async fn update_department(
    State(state): State<AppState>,
    user: AuthUser,
    Id(id): Id,
    ValidJson(body): ValidJson<DepartmentRequest>,
) -> ApiResult<Json<Envelope<Department>>> {
    let department = state
        .services
        .departments
        .rename(&user.identity, id, &body.name, body.description)
        .await?;
    Ok(Json(Envelope::ok(department).with_message("department updated")))
}

pub async fn delete_department(
    State(state): State<AppState>,
    user: AuthUser,
    Id(id): Id,
) -> ApiResult<Json<Envelope<()>>> {
    state.services.departments.delete(&user.identity, id).await?;
    Ok(Json(Envelope::done("department deleted")))
}
