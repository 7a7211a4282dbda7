//! Request extractors that reject with an [`ApiError`] envelope instead of
//! axum's plain-text rejections.

use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use domains::Identity;
use serde::de::DeserializeOwned;

use crate::error::{api_bad_request, api_unauthorized, ApiError};
use crate::state::AppState;

/// The verified caller of a bearer-authenticated route.
///
/// Resolution goes through the identity service, so revoked tokens and
/// deleted accounts are refused here with 401.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: Identity,
    /// The raw bearer token, needed to revoke it on logout.
    pub token: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| api_unauthorized("authentication required"))?;
        let identity = state.services.identity.verify(&token).await?;
        Ok(AuthUser { identity, token })
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}

/// JSON body whose parse failures come back as a 400 envelope.
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| ValidJson(value))
            .map_err(|rejection| api_bad_request(&rejection.body_text()))
    }
}

/// A single numeric id from the path.
#[derive(Debug, Clone, Copy)]
pub struct Id(pub i64);

impl<S> FromRequestParts<S> for Id
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|_| api_bad_request("id must be an integer"))?;
        if id <= 0 {
            return Err(api_bad_request("id must be positive"));
        }
        Ok(Id(id))
    }
}
