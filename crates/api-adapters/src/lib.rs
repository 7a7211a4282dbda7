//! # api-adapters
//!
//! The JSON request surface. Handlers translate HTTP into service calls and
//! service results into the response [`envelope::Envelope`]; no
//! authorization logic lives here beyond resolving the bearer identity.

pub mod envelope;
pub mod metrics;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod extract;
#[cfg(feature = "web-axum")]
pub mod middleware;
#[cfg(feature = "web-axum")]
pub mod routes;
#[cfg(feature = "web-axum")]
pub mod state;

pub use envelope::Envelope;
pub use metrics::Metrics;

#[cfg(feature = "web-axum")]
pub use routes::build_router;
#[cfg(feature = "web-axum")]
pub use state::AppState;
