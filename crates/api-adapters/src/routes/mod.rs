//! Route table. Everything is served under `/api`.

pub mod auth;
pub mod comments;
pub mod departments;
pub mod notices;
pub mod posts;
pub mod system;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::middleware::{
    cors_policy, reveal_internal_errors, trace_layer, track_metrics, unknown_route,
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(system::health))
        .route("/metrics", get(system::metrics))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route(
            "/departments",
            get(departments::list_departments).post(departments::create_department),
        )
        .route(
            "/departments/{id}",
            get(departments::get_department)
                .put(departments::update_department)
                .delete(departments::delete_department),
        )
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/mine", get(posts::list_my_posts))
        .route(
            "/posts/{id}",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route(
            "/posts/{id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/comments/{id}",
            put(comments::update_comment).delete(comments::delete_comment),
        )
        .route(
            "/notices",
            get(notices::list_notices)
                .post(notices::create_notice)
                .layer(DefaultBodyLimit::max(state.body_limit())),
        )
        .route("/notices/mine", get(notices::list_my_notices))
        .route(
            "/notices/{id}",
            put(notices::update_notice).delete(notices::delete_notice),
        )
        .route("/notices/{id}/attachment", get(notices::download_attachment))
        .route_layer(axum::middleware::from_fn_with_state(
            state.metrics.clone(),
            track_metrics,
        ));

    let mut router = Router::new()
        .nest("/api", api)
        .fallback(unknown_route)
        .with_state(state.clone());

    if state.expose_internal_errors {
        router = router.layer(axum::middleware::from_fn(reveal_internal_errors));
    }

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(trace_layer())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(cors_policy(&state.cors_origins)),
    )
}
