//! Liveness and metrics exposition. Both are public.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::envelope::Envelope;
use crate::error::{api_internal, ApiResult};
use crate::metrics::CONTENT_TYPE as METRICS_CONTENT_TYPE;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

pub async fn health() -> Json<Envelope<Health>> {
    Json(Envelope::ok(Health { status: "ok" }))
}

pub async fn metrics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let body = state
        .metrics
        .render()
        .map_err(|err| api_internal(format!("failed to encode metrics: {err}")))?;
    Ok(([(CONTENT_TYPE, METRICS_CONTENT_TYPE)], body))
}
