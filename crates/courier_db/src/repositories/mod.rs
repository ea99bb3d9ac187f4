// --- File: crates/courier_db/src/repositories/mod.rs ---
//! Repositories for the Courier database layer.

pub mod device_tokens;
pub mod device_tokens_memory;
pub mod device_tokens_sql;

pub use device_tokens::{DeviceToken, DeviceTokenRepository, TokenStatus};
pub use device_tokens_memory::InMemoryDeviceTokenRepository;
pub use device_tokens_sql::SqlDeviceTokenRepository;
