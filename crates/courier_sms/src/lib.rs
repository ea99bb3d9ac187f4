// --- File: crates/courier_sms/src/lib.rs ---
//! SMS channel adapters.
//!
//! Twilio and Plivo are first-class telephony backends; the webhook variant
//! covers gateways without a dedicated integration. The simulated variant
//! lives in `courier_common`.

pub mod plivo;
pub mod twilio;
pub mod webhook;

pub use plivo::PlivoProvider;
pub use twilio::TwilioProvider;
pub use webhook::WebhookSmsProvider;
