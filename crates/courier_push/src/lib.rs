// --- File: crates/courier_push/src/lib.rs ---
//! Push channel adapters: FCM HTTP v1 and OneSignal.

pub mod auth;
pub mod fcm;
pub mod onesignal;

pub use fcm::{FcmProvider, UNREGISTERED_MARKER};
pub use onesignal::OneSignalProvider;
