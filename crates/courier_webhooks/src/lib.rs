// --- File: crates/courier_webhooks/src/lib.rs ---
//! Webhook surface for Courier.
//!
//! Hosts the provider subscription handshake and the delivery-status
//! ingestion endpoint, and owns the [`DeliveryTracker`] that correlates
//! incoming status events with the usage log.

pub mod handlers;
pub mod ingest;
pub mod routes;
pub mod signature;

pub use handlers::{VerifyParams, WebhookState};
pub use ingest::{parse_events, DeliveryTracker, StatusEvent, WebhookStatus};
pub use routes::routes;
pub use signature::verify_signature;
