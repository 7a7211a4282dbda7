//! # configs
//!
//! Layered settings for the server and the seed tool:
//!
//! 1. built-in defaults
//! 2. `config/campus-board.toml` (optional)
//! 3. environment variables prefixed `CAMPUS__`, nested with `__`,
//!    e.g. `CAMPUS__AUTH__JWT_SECRET`
//!
//! A `.env` file in the working directory is loaded into the environment
//! first, so it behaves like layer 3.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "config/campus-board";
pub const ENV_PREFIX: &str = "CAMPUS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub media: MediaSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub bind_addr: String,
    /// Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Return internal error detail to clients. Never enable in production.
    pub expose_internal_errors: bool,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// Without a URL the server runs on the in-memory store.
    pub url: Option<SecretString>,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: SecretString,
    pub token_ttl_secs: i64,
    /// How often expired revocation entries are purged.
    pub revocation_sweep_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    pub upload_root: PathBuf,
    pub max_attachment_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub format: LogFormat,
}

impl Settings {
    /// Loads `.env`, the default config file and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::load_from(Some(Path::new(DEFAULT_CONFIG_FILE)), Environment::with_prefix(ENV_PREFIX))
    }

    /// Builds settings from an optional file plus an environment source.
    /// Separators are applied here, so callers pass only the prefix or a
    /// prepared source map.
    pub fn load_from(file: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.bind_addr", "0.0.0.0:8080")?
            .set_default("server.cors_origins", Vec::<String>::new())?
            .set_default("server.expose_internal_errors", false)?
            .set_default("database.max_connections", 10)?
            .set_default("auth.token_ttl_secs", 86_400)?
            .set_default("auth.revocation_sweep_secs", 86_400)?
            .set_default("media.upload_root", "./data/uploads")?
            .set_default("media.max_attachment_bytes", 10 * 1024 * 1024)?
            .set_default("log.filter", "info")?
            .set_default("log.format", "pretty")?;

        if let Some(file) = file {
            builder = builder.add_source(File::from(file).required(false));
        }

        let settings: Settings = builder
            .add_source(
                env.prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.expose_secret().trim().is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret must not be empty".into()));
        }
        if self.auth.token_ttl_secs <= 0 {
            return Err(ConfigError::Invalid("auth.token_ttl_secs must be positive".into()));
        }
        if self.auth.revocation_sweep_secs == 0 {
            return Err(ConfigError::Invalid(
                "auth.revocation_sweep_secs must be positive".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be positive".into(),
            ));
        }
        if self.media.max_attachment_bytes == 0 {
            return Err(ConfigError::Invalid(
                "media.max_attachment_bytes must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn defaults_fill_everything_but_the_secret() {
        let settings = Settings::load_from(None, env(&[("CAMPUS__AUTH__JWT_SECRET", "s3cret")]))
            .unwrap();
        assert_eq!(settings.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(settings.auth.token_ttl_secs, 86_400);
        assert_eq!(settings.auth.revocation_sweep_secs, 86_400);
        assert_eq!(settings.media.max_attachment_bytes, 10 * 1024 * 1024);
        assert_eq!(settings.log.format, LogFormat::Pretty);
        assert!(settings.database.url.is_none());
        assert!(!settings.server.expose_internal_errors);
    }

    #[test]
    fn environment_overrides_nested_keys() {
        let settings = Settings::load_from(
            None,
            env(&[
                ("CAMPUS__AUTH__JWT_SECRET", "s3cret"),
                ("CAMPUS__AUTH__TOKEN_TTL_SECS", "600"),
                ("CAMPUS__DATABASE__URL", "postgres://localhost/campus"),
                ("CAMPUS__SERVER__CORS_ORIGINS", "http://a.test,http://b.test"),
                ("CAMPUS__LOG__FORMAT", "json"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.auth.token_ttl_secs, 600);
        assert_eq!(
            settings.database.url.as_ref().map(|u| u.expose_secret().to_string()),
            Some("postgres://localhost/campus".to_string())
        );
        assert_eq!(settings.server.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(settings.log.format, LogFormat::Json);
    }

    #[test]
    fn missing_secret_fails_to_load() {
        assert!(matches!(
            Settings::load_from(None, env(&[])),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn blank_secret_is_invalid() {
        assert!(matches!(
            Settings::load_from(None, env(&[("CAMPUS__AUTH__JWT_SECRET", "  ")])),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn non_positive_ttl_is_invalid() {
        let err = Settings::load_from(
            None,
            env(&[
                ("CAMPUS__AUTH__JWT_SECRET", "s3cret"),
                ("CAMPUS__AUTH__TOKEN_TTL_SECS", "0"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let settings = Settings::load_from(None, env(&[("CAMPUS__AUTH__JWT_SECRET", "s3cret")]))
            .unwrap();
        assert!(!format!("{settings:?}").contains("s3cret"));
    }
}
