//! Shared handler state.

use std::sync::Arc;

use services::Services;

use crate::metrics::Metrics;

/// Room for the text fields around an attachment in a multipart body.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub metrics: Arc<Metrics>,
    pub max_upload_bytes: usize,
    pub cors_origins: Arc<[String]>,
    pub expose_internal_errors: bool,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            metrics: Arc::new(Metrics::new()),
            max_upload_bytes: services::notices::DEFAULT_MAX_ATTACHMENT_BYTES,
            cors_origins: Arc::from(Vec::new()),
            expose_internal_errors: false,
        }
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    /// An empty list allows any origin.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Arc::from(origins);
        self
    }

    pub fn with_internal_errors_exposed(mut self, expose: bool) -> Self {
        self.expose_internal_errors = expose;
        self
    }

    pub(crate) fn body_limit(&self) -> usize {
        self.max_upload_bytes.saturating_add(FORM_OVERHEAD_BYTES)
    }
}
