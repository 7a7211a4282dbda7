//! campus-board/crates/domains/src/lib.rs
//!
//! Domain models, the error taxonomy and the port traits every adapter
//! implements. No I/O lives here.

pub mod error;
pub mod models;
pub mod ports;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use ports::*;
