// --- File: crates/courier_common/src/lib.rs ---
//! Shared foundations for the Courier outbound-messaging workspace.
//!
//! This crate holds the pieces every other crate leans on: the error
//! taxonomy, the uniform channel-provider contract, the retry/backoff
//! delivery engine, a TTL cache and logging initialization.

pub mod cache;
pub mod delivery;
pub mod error;
pub mod logging;
pub mod services;
pub mod simulated;

pub use error::{CourierError, HttpStatusCode};
pub use services::{BoxFuture, Channel, ChannelProvider, DispatchResult};
pub use simulated::SimulatedProvider;
