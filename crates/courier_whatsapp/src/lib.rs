// --- File: crates/courier_whatsapp/src/lib.rs ---
//! WhatsApp channel adapter for the Meta Business Cloud API.

pub mod cloud;

pub use cloud::CloudApiProvider;
