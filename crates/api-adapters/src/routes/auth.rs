//! Registration, login, logout and the bearer's own profile.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use domains::{DepartmentId, IssuedToken, UserSummary};
use serde::Deserialize;
use services::Registration;

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::extract::{AuthUser, ValidJson};
use crate::state::AppState;

/// Missing fields deserialize as empty so the service reports them
/// together with any other validation failure.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, alias = "departmentId")]
    pub department_id: Option<DepartmentId>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email or username.
    #[serde(alias = "email", alias = "username")]
    pub identifier: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<UserSummary>>)> {
    let user = state
        .services
        .identity
        .register(Registration {
            email: body.email,
            username: body.username,
            password: body.password,
            role: body.role,
            department_id: body.department_id,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok(user).with_message("account created")),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<LoginRequest>,
) -> ApiResult<Json<Envelope<IssuedToken>>> {
    let issued = state
        .services
        .identity
        .authenticate(&body.identifier, &body.password)
        .await?;
    Ok(Json(Envelope::ok(issued)))
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Envelope<()>>> {
    state
        .services
        .identity
        .revoke(&user.token, user.identity.user_id)
        .await?;
    Ok(Json(Envelope::done("logged out")))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Envelope<UserSummary>>> {
    let profile = state.services.identity.current_user(&user.identity).await?;
    Ok(Json(Envelope::ok(profile)))
}
