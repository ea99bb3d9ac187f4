// --- File: crates/courier_db/src/lib.rs ---
//! Database layer for Courier.
//!
//! Provides a database-agnostic client built on SQLx (SQLite by default,
//! PostgreSQL and MySQL behind feature flags) and the device token
//! registry, with an in-memory twin of the repository for tests and
//! database-less development setups.

pub mod client;
pub mod error;
pub mod repositories;

// Register the SQLite driver when the crate is loaded
#[cfg(feature = "sqlite")]
mod sqlite_driver {
    // This import ensures the SQLite driver is linked and registered
    #[allow(unused_imports)]
    use sqlx::sqlite::SqlitePoolOptions as _;
}

pub use client::DbClient;
pub use error::DbError;
pub use repositories::{
    DeviceToken, DeviceTokenRepository, InMemoryDeviceTokenRepository, SqlDeviceTokenRepository,
    TokenStatus,
};
