// --- File: crates/courier_common/src/logging.rs ---
//! Logging utilities for the Courier application.
//!
//! This module provides a standardized approach to logging across all crates
//! in the Courier application. It includes functions for initializing the
//! tracing subscriber at the desired level.

use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber with the default log level (INFO).
///
/// This function should be called once at the start of the application.
pub fn init() {
    init_with_level(Level::INFO);
}

/// Initialize the tracing subscriber with a specific log level.
///
/// Respects `RUST_LOG` when set; the provided level acts as the default
/// directive for the `courier` crates. Uses `try_init` so calling this from
/// several tests does not panic.
pub fn init_with_level(level: Level) {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("courier={level}").parse().expect("static directive"));

    let result = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .try_init();

    if result.is_ok() {
        info!("Logging initialized at level: {}", level);
    }
}
