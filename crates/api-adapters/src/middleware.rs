//! Cross-cutting layers: request tracing, CORS, metrics and optional
//! disclosure of internal error detail.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{MatchedPath, Request, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{MakeSpan, TraceLayer};

use crate::envelope::Envelope;
use crate::error::InternalDetail;
use crate::metrics::Metrics;

/// One `http.request` span per request, tagged with the request id set by
/// the outer `SetRequestIdLayer`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "http.request",
            method = %request.method(),
            uri = %request.uri(),
            request_id,
        )
    }
}

pub fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan> {
    TraceLayer::new_for_http().make_span_with(RequestSpan)
}

/// Allows the configured origins, or any origin when none are configured.
pub fn cors_policy(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin, "ignoring malformed CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

/// Counts every routed request, and 403s separately by route template.
pub async fn track_metrics(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string());

    let response = next.run(request).await;
    let status = response.status();
    metrics.record_request(&method, status.as_u16());
    if status == StatusCode::FORBIDDEN {
        metrics.record_denial(&method, route.as_deref().unwrap_or("unmatched"));
    }
    response
}

/// Rewrites generic 500 bodies to include the logged detail. Installed only
/// when the deployment opts in.
pub async fn reveal_internal_errors(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    match response.extensions().get::<InternalDetail>() {
        Some(InternalDetail(detail)) => {
            let body = Envelope::failure("internal server error", Some(vec![detail.clone()]));
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
        None => response,
    }
}

/// Turns axum's plain 404 for unknown paths into an envelope.
pub async fn unknown_route() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(Envelope::failure("route not found", None)),
    )
        .into_response()
}
