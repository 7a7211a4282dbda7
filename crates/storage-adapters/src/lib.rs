//! # storage-adapters
//!
//! Concrete backends for the persistence and attachment ports.
//!
//! | backend | feature |
//! |---|---|
//! | [`memory::InMemoryStore`] | always |
//! | `postgres::PgStore` | `db-postgres` |
//! | `local_files::LocalAttachmentStorage` | `media-local` |

pub mod memory;

#[cfg(feature = "db-postgres")]
pub mod postgres;

#[cfg(feature = "media-local")]
pub mod local_files;

pub use memory::InMemoryStore;

#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;

#[cfg(feature = "media-local")]
pub use local_files::LocalAttachmentStorage;
