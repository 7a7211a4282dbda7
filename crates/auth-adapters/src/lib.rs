//! # auth-adapters
//!
//! Credential primitives behind the `PasswordHasher` and `TokenCodec` ports.
//! Argon2 hashing is always compiled; the JWT codec sits behind `auth-jwt`.

pub mod argon;

#[cfg(feature = "auth-jwt")]
pub mod jwt;

pub use argon::Argon2Hasher;

#[cfg(feature = "auth-jwt")]
pub use jwt::JwtCodec;
