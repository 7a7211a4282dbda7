//! # Identity & Token Service
//!
//! Registration, password and federated login, bearer verification and
//! revocation. A token is valid while its signature checks out, its `exp`
//! is in the future, it is absent from the revocation set, and the user it
//! names still exists.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use domains::{
    DepartmentId, DepartmentRepository, DomainError, ExternalProfile, Identity, InvalidatedToken,
    IssuedToken, NewUser, PasswordHasher, Result, RevocationRepository, Role, TokenClaims,
    TokenCodec, TokenRejection, User, UserId, UserRepository, UserSummary, EMAIL_TAKEN,
    USERNAME_TAKEN,
};
use tracing::{info, instrument};

use crate::validation::{
    is_valid_email, normalize_email, FieldErrors, MAX_USERNAME_LEN, MIN_PASSWORD_LEN,
};

/// Fixed lifetime of an issued token, in seconds (one day).
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 86_400;

/// Username candidates tried for a new federated account before giving up.
const MAX_USERNAME_ATTEMPTS: u32 = 100;

/// Raw registration input as received from a client.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub password: String,
    pub role: String,
    pub department_id: Option<DepartmentId>,
}

pub struct IdentityService {
    users: Arc<dyn UserRepository>,
    departments: Arc<dyn DepartmentRepository>,
    revocations: Arc<dyn RevocationRepository>,
    hasher: Arc<dyn PasswordHasher>,
    codec: Arc<dyn TokenCodec>,
    token_ttl: Duration,
}

impl IdentityService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        departments: Arc<dyn DepartmentRepository>,
        revocations: Arc<dyn RevocationRepository>,
        hasher: Arc<dyn PasswordHasher>,
        codec: Arc<dyn TokenCodec>,
    ) -> Self {
        Self {
            users,
            departments,
            revocations,
            hasher,
            codec,
            token_ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Creates an account after validating every field.
    ///
    /// ADMIN accounts must not name a department; every other role must
    /// name an existing one.
    #[instrument(skip_all, fields(email = %input.email, role = %input.role))]
    pub async fn register(&self, input: Registration) -> Result<UserSummary> {
        let email = normalize_email(&input.email);
        let username = input.username.trim().to_string();

        let mut errors = FieldErrors::new();
        errors.check(is_valid_email(&email), "email is not a valid address");
        errors.check(!username.is_empty(), "username must not be empty");
        errors.check(
            username.chars().count() <= MAX_USERNAME_LEN,
            format!("username must be at most {MAX_USERNAME_LEN} characters"),
        );
        errors.check(
            input.password.chars().count() >= MIN_PASSWORD_LEN,
            format!("password must be at least {MIN_PASSWORD_LEN} characters"),
        );
        let role = match input.role.parse::<Role>() {
            Ok(role) => Some(role),
            Err(_) => {
                errors.push("role must be one of STUDENT, TEACHER, ADMIN");
                None
            }
        };
        match (role, input.department_id) {
            (Some(Role::Admin), Some(_)) => {
                errors.push("department must be empty for ADMIN accounts")
            }
            (Some(Role::Student | Role::Teacher), None) => {
                errors.push("department is required for STUDENT and TEACHER accounts")
            }
            (_, Some(id)) if id <= 0 => errors.push("department id must be a positive integer"),
            _ => {}
        }
        errors.finish()?;
        let role = role.ok_or_else(|| DomainError::validation("role is required"))?;

        if let Some(department_id) = input.department_id {
            if self.departments.find_by_id(department_id).await?.is_none() {
                return Err(DomainError::conflict("department not found"));
            }
        }
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(DomainError::conflict(EMAIL_TAKEN));
        }

        let password_hash = self.hasher.hash(&input.password)?;
        let user = self
            .users
            .insert(NewUser {
                email,
                username,
                password_hash: Some(password_hash),
                role,
                department_id: input.department_id,
                external_id: None,
            })
            .await?;

        info!(user_id = user.id, "user registered");
        Ok(UserSummary::from(&user))
    }

    /// Password login by email or username.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, identifier: &str, password: &str) -> Result<IssuedToken> {
        let identifier = identifier.trim();
        let user = self
            .users
            .find_by_login(identifier)
            .await?
            .ok_or_else(|| DomainError::auth("invalid credentials"))?;

        let Some(digest) = user.password_hash.as_deref() else {
            return Err(DomainError::auth(
                "this account signs in through an external identity provider",
            ));
        };
        if !self.hasher.verify(password, digest)? {
            return Err(DomainError::auth("invalid credentials"));
        }

        info!(user_id = user.id, "user logged in");
        self.issue(&user)
    }

    /// Find-or-create login for an account vouched for by an external
    /// identity provider. New accounts are STUDENT, passwordless and
    /// without a department.
    #[instrument(skip_all, fields(email = %profile.email))]
    pub async fn federated_login(&self, profile: ExternalProfile) -> Result<IssuedToken> {
        let email = normalize_email(&profile.email);
        if !is_valid_email(&email) {
            return Err(DomainError::validation("email is not a valid address"));
        }

        let user = match self.users.find_by_email(&email).await? {
            Some(user) => user,
            None => self.provision_federated(&profile, email).await?,
        };

        info!(user_id = user.id, "federated login");
        self.issue(&user)
    }

    /// Adds `token` to the revocation set until its natural expiry.
    ///
    /// The revocation set itself is not consulted, so revoking twice is
    /// harmless. A token that has already expired needs no entry.
    #[instrument(skip(self, token))]
    pub async fn revoke(&self, token: &str, user_id: UserId) -> Result<()> {
        let claims = match self.codec.verify(token) {
            Ok(claims) => claims,
            Err(TokenRejection::Expired) => return Ok(()),
            Err(TokenRejection::Invalid(reason)) => {
                return Err(DomainError::auth(format!("invalid token: {reason}")))
            }
        };

        self.revocations
            .insert(InvalidatedToken {
                token: token.to_string(),
                user_id,
                expires_at: claims.expires_at(),
            })
            .await?;
        info!(user_id, "token revoked");
        Ok(())
    }

    /// Resolves a bearer token to the acting identity.
    ///
    /// Role and department come from the current user record, not from the
    /// token, so changes take effect without a new login.
    pub async fn verify(&self, token: &str) -> Result<Identity> {
        let claims = self.codec.verify(token).map_err(|rejection| match rejection {
            TokenRejection::Expired => DomainError::auth("token expired"),
            TokenRejection::Invalid(_) => DomainError::auth("invalid token"),
        })?;

        if self.revocations.contains(token).await? {
            return Err(DomainError::auth("token invalidated"));
        }

        let user = self
            .users
            .find_by_id(claims.user_id)
            .await?
            .ok_or_else(|| DomainError::auth("user no longer exists"))?;
        Ok(Identity::from(&user))
    }

    pub async fn current_user(&self, identity: &Identity) -> Result<UserSummary> {
        self.users
            .find_by_id(identity.user_id)
            .await?
            .map(|user| UserSummary::from(&user))
            .ok_or_else(|| DomainError::not_found("user"))
    }

    /// Housekeeping for the revocation set; expired tokens fail on their own
    /// `exp` claim whether or not their entry is still present.
    pub async fn purge_expired_revocations(&self, now: DateTime<Utc>) -> Result<u64> {
        let purged = self.revocations.purge_expired(now).await?;
        if purged > 0 {
            info!(purged, "purged expired revocation entries");
        }
        Ok(purged)
    }

    fn issue(&self, user: &User) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + self.token_ttl;
        let claims = TokenClaims {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };
        let token = self.codec.sign(&claims)?;
        Ok(IssuedToken {
            token,
            expires_at: claims.expires_at(),
            user: UserSummary::from(user),
        })
    }

    /// Creates the account behind a first federated login. The username is
    /// the display name (or the email's local part), suffixed with the
    /// external id and then a counter until one is free.
    async fn provision_federated(&self, profile: &ExternalProfile, email: String) -> Result<User> {
        let base = match profile.display_name.trim() {
            "" => email.split('@').next().unwrap_or(&email).to_string(),
            name => name.to_string(),
        };
        let external_id = profile.external_id.trim();

        for attempt in 0..MAX_USERNAME_ATTEMPTS {
            let suffix = match attempt {
                0 => None,
                1 if !external_id.is_empty() => Some(external_id.to_string()),
                n => Some(n.to_string()),
            };
            let username = username_candidate(&base, suffix.as_deref());
            if self.users.find_by_login(&username).await?.is_some() {
                continue;
            }
            let created = self
                .users
                .find_or_create_by_email(NewUser {
                    email: email.clone(),
                    username,
                    password_hash: None,
                    role: Role::Student,
                    department_id: None,
                    external_id: Some(profile.external_id.clone()),
                })
                .await;
            match created {
                Err(DomainError::Conflict(reason)) if reason == USERNAME_TAKEN => continue,
                other => return other,
            }
        }
        Err(DomainError::conflict(USERNAME_TAKEN))
    }
}

/// `base`, or `base-suffix` with `base` shortened so the whole name stays
/// within the username limit.
fn username_candidate(base: &str, suffix: Option<&str>) -> String {
    let Some(suffix) = suffix else {
        return base.chars().take(MAX_USERNAME_LEN).collect();
    };
    let suffix: String = suffix.chars().take(MAX_USERNAME_LEN / 2).collect();
    let room = MAX_USERNAME_LEN - suffix.chars().count() - 1;
    let head: String = base.chars().take(room).collect();
    format!("{}-{suffix}", head.trim_end())
}
