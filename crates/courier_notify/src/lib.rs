// --- File: crates/courier_notify/src/lib.rs ---
//! Notification facade for Courier.
//!
//! Wires configuration to concrete provider adapters ([`ProviderRegistry`]),
//! wraps each in the retry-aware delivery engine, and exposes the send,
//! template-lifecycle and device-token endpoints.

pub mod handlers;
pub mod registry;
pub mod routes;
pub mod service;

pub use handlers::NotifyState;
pub use registry::ProviderRegistry;
pub use routes::routes;
pub use service::{retry_policy, NotificationService, PushDispatchSummary, PushPayload};
