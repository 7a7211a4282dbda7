//! # seed
//!
//! Bootstraps a fresh database: runs migrations, creates the first ADMIN
//! account and any departments named on the command line.
//!
//! ```text
//! seed <admin-email> <admin-password> [department ...]
//! ```
//!
//! Re-running is safe; existing accounts and departments are skipped.

use std::sync::Arc;

use anyhow::{bail, Context};
use auth_adapters::{Argon2Hasher, JwtCodec};
use configs::Settings;
use domains::{DomainError, Identity, EMAIL_TAKEN};
use secrecy::ExposeSecret;
use services::{Ports, Registration, ServiceOptions, Services};
use storage_adapters::{LocalAttachmentStorage, PgStore};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let mut args = std::env::args().skip(1);
    let (Some(email), Some(password)) = (args.next(), args.next()) else {
        bail!("usage: seed <admin-email> <admin-password> [department ...]");
    };
    let departments: Vec<String> = args.collect();

    let settings = Settings::load().context("loading configuration")?;
    let Some(url) = settings.database.url.as_ref() else {
        bail!("database.url must be set to seed");
    };
    let store = Arc::new(
        PgStore::connect(url.expose_secret(), 2)
            .await
            .context("connecting to postgres")?,
    );
    store.migrate().await.context("running migrations")?;

    let services = Services::new(
        Ports {
            users: store.clone(),
            departments: store.clone(),
            posts: store.clone(),
            comments: store.clone(),
            notices: store.clone(),
            revocations: store,
            hasher: Arc::new(Argon2Hasher::new()),
            tokens: Arc::new(JwtCodec::new(&settings.auth.jwt_secret)),
            attachments: Arc::new(LocalAttachmentStorage::new(settings.media.upload_root.clone())),
        },
        ServiceOptions::default(),
    );

    let username = email.split('@').next().unwrap_or_default().to_string();
    match services
        .identity
        .register(Registration {
            email: email.clone(),
            username,
            password: password.clone(),
            role: "ADMIN".to_string(),
            department_id: None,
        })
        .await
    {
        Ok(admin) => info!(user_id = admin.id, "admin account created"),
        Err(DomainError::Conflict(reason)) if reason == EMAIL_TAKEN => {
            info!("admin account already exists")
        }
        Err(err) => return Err(err).context("creating admin account"),
    }

    let issued = services
        .identity
        .authenticate(&email, &password)
        .await
        .context("logging in as admin")?;
    let admin: Identity = services.identity.verify(&issued.token).await?;

    for name in departments {
        match services.departments.create(&admin, &name, None).await {
            Ok(department) => info!(department_id = department.id, name = %department.name, "department created"),
            Err(DomainError::Conflict(_)) => info!(name = %name, "department already exists"),
            Err(err) => return Err(err).context(format!("creating department {name}")),
        }
    }

    services.identity.revoke(&issued.token, admin.user_id).await?;
    Ok(())
}
