//! Shared harness for the cross-crate scenario tests: the full service
//! layer over the in-memory store, the real Argon2 hasher (cheap
//! parameters), the JWT codec and attachment storage in a temp directory.

use std::sync::Arc;

#[cfg(feature = "web-axum")]
use api_adapters::{build_router, AppState};
use auth_adapters::{Argon2Hasher, JwtCodec};
#[cfg(feature = "web-axum")]
use axum::Router;
use domains::{Department, DepartmentId, Identity, IssuedToken, Result};
use secrecy::SecretString;
use services::{Ports, Registration, ServiceOptions, Services};
use storage_adapters::{InMemoryStore, LocalAttachmentStorage};
use tempfile::TempDir;

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub services: Services,
    pub store: Arc<InMemoryStore>,
    pub uploads: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_options(ServiceOptions::default())
    }

    pub fn with_options(options: ServiceOptions) -> Self {
        let uploads = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(InMemoryStore::new());
        let ports = Ports {
            users: store.clone(),
            departments: store.clone(),
            posts: store.clone(),
            comments: store.clone(),
            notices: store.clone(),
            revocations: store.clone(),
            hasher: Arc::new(Argon2Hasher::with_params(8, 1, 1).expect("argon2 params")),
            tokens: Arc::new(JwtCodec::new(&SecretString::from(
                "integration-secret".to_string(),
            ))),
            attachments: Arc::new(LocalAttachmentStorage::new(uploads.path())),
        };
        Self {
            services: Services::new(ports, options),
            store,
            uploads,
        }
    }

    #[cfg(feature = "web-axum")]
    pub fn router(&self) -> Router {
        build_router(AppState::new(self.services.clone()))
    }

    pub async fn register(
        &self,
        email: &str,
        role: &str,
        department_id: Option<DepartmentId>,
    ) -> Result<domains::UserSummary> {
        self.services
            .identity
            .register(Registration {
                email: email.to_string(),
                username: username_of(email),
                password: PASSWORD.to_string(),
                role: role.to_string(),
                department_id,
            })
            .await
    }

    pub async fn login(&self, identifier: &str) -> IssuedToken {
        self.services
            .identity
            .authenticate(identifier, PASSWORD)
            .await
            .expect("login")
    }

    /// Registers an account and resolves its identity through a real token.
    pub async fn member(
        &self,
        email: &str,
        role: &str,
        department_id: Option<DepartmentId>,
    ) -> Identity {
        self.register(email, role, department_id)
            .await
            .expect("register");
        let issued = self.login(email).await;
        self.services
            .identity
            .verify(&issued.token)
            .await
            .expect("verify")
    }

    pub async fn admin(&self) -> Identity {
        self.member("admin@campus.edu", "ADMIN", None).await
    }

    pub async fn department(&self, admin: &Identity, name: &str) -> Department {
        self.services
            .departments
            .create(admin, name, None)
            .await
            .expect("create department")
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

fn username_of(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}
