//! # campus-board
//!
//! Assembles the service from configuration: storage backend, password
//! hasher, token codec and attachment directory, then serves the HTTP API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use api_adapters::{build_router, AppState};
use auth_adapters::{Argon2Hasher, JwtCodec};
use configs::{LogFormat, LogSettings, Settings};
use domains::{
    AttachmentStorage, CommentRepository, DepartmentRepository, NoticeRepository,
    PasswordHasher, PostRepository, RevocationRepository, TokenCodec, UserRepository,
};
use services::{Ports, ServiceOptions, Services};
use storage_adapters::{InMemoryStore, LocalAttachmentStorage};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "db-postgres")]
use secrecy::ExposeSecret;
#[cfg(feature = "db-postgres")]
use storage_adapters::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading configuration")?;
    init_tracing(&settings.log);

    let hasher: Arc<dyn PasswordHasher> = Arc::new(Argon2Hasher::new());
    let tokens: Arc<dyn TokenCodec> = Arc::new(JwtCodec::new(&settings.auth.jwt_secret));
    let attachments: Arc<dyn AttachmentStorage> =
        Arc::new(LocalAttachmentStorage::new(settings.media.upload_root.clone()));

    let ports = match settings.database.url.as_ref() {
        #[cfg(feature = "db-postgres")]
        Some(url) => {
            let store = PgStore::connect(url.expose_secret(), settings.database.max_connections)
                .await
                .context("connecting to postgres")?;
            store.migrate().await.context("running migrations")?;
            info!("using postgres storage");
            ports_for(Arc::new(store), hasher, tokens, attachments)
        }
        #[cfg(not(feature = "db-postgres"))]
        Some(_) => anyhow::bail!("database.url is set but the db-postgres feature is disabled"),
        None => {
            warn!("no database.url configured, data lives in memory only");
            ports_for(Arc::new(InMemoryStore::new()), hasher, tokens, attachments)
        }
    };

    let services = Services::new(
        ports,
        ServiceOptions {
            token_ttl_secs: settings.auth.token_ttl_secs,
            max_attachment_bytes: settings.media.max_attachment_bytes,
        },
    );

    spawn_revocation_sweep(
        services.clone(),
        Duration::from_secs(settings.auth.revocation_sweep_secs),
    );

    let state = AppState::new(services)
        .with_max_upload_bytes(settings.media.max_attachment_bytes)
        .with_cors_origins(settings.server.cors_origins.clone())
        .with_internal_errors_exposed(settings.server.expose_internal_errors);
    let app = build_router(state);

    let listener = TcpListener::bind(&settings.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", settings.server.bind_addr))?;
    info!(addr = %settings.server.bind_addr, "campus-board listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    info!("campus-board stopped");
    Ok(())
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log.filter.as_str()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn ports_for<S>(
    store: Arc<S>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenCodec>,
    attachments: Arc<dyn AttachmentStorage>,
) -> Ports
where
    S: UserRepository
        + DepartmentRepository
        + PostRepository
        + CommentRepository
        + NoticeRepository
        + RevocationRepository
        + 'static,
{
    Ports {
        users: store.clone(),
        departments: store.clone(),
        posts: store.clone(),
        comments: store.clone(),
        notices: store.clone(),
        revocations: store,
        hasher,
        tokens,
        attachments,
    }
}

/// Drops revocation entries whose tokens have expired anyway.
fn spawn_revocation_sweep(services: Services, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match services
                .identity
                .purge_expired_revocations(chrono::Utc::now())
                .await
            {
                Ok(purged) => info!(purged, "revocation sweep finished"),
                Err(err) => warn!(error = %err, "revocation sweep failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
